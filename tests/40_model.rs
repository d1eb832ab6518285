mod common;

use std::collections::HashMap;

use anyhow::Result;
use data_bridge::model::{FieldDefinition, ModelMapper};
use data_bridge::types::DataType;
use data_bridge::RequestParams;
use serde_json::json;

fn schema() -> HashMap<String, Vec<FieldDefinition>> {
    serde_json::from_value(json!({
        "Game": [
            { "name": "name", "type": "String" },
            { "name": "score", "type": "Number" },
            { "name": "owner", "type": "Pointer", "collection": "Player" }
        ],
        "Player": [
            { "name": "name", "type": "String" },
            { "name": "level", "type": "Number" }
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn included_pointer_maps_to_nested_model() -> Result<()> {
    let (_backend, service) = common::seeded();
    let schema = schema();
    let mapper = ModelMapper::new("Game", &schema);

    let mut params = RequestParams::with_id("g1");
    params.includes = vec!["owner".to_string()];
    let record = service.get("Game", Some(&params)).await?;
    let model = mapper.to_plain_object(&record);

    assert_eq!(model.id.as_deref(), Some("g1"));
    assert!(model.created_at.is_some());
    let owner = model.nested("owner").expect("nested owner");
    assert_eq!(owner.collection, "Player");
    assert_eq!(owner.value("level"), Some(&json!(3)));
    assert_eq!(model.to_json()["owner"]["name"], json!("Ana"));
    Ok(())
}

#[tokio::test]
async fn unexpanded_pointer_stays_raw() -> Result<()> {
    let (_backend, service) = common::seeded();
    let schema = schema();
    let mapper = ModelMapper::new("Game", &schema);

    let record = service.get("Game", Some(&RequestParams::with_id("g1"))).await?;
    let model = mapper.to_plain_object(&record);

    // Without include the backend hands back a pointer, which is structured
    let owner = model.nested("owner").expect("pointer model");
    assert_eq!(owner.id.as_deref(), Some("p1"));
    assert!(owner.value("name").is_none());
    Ok(())
}

#[tokio::test]
async fn edited_model_writes_back_through_update() -> Result<()> {
    let (_backend, service) = common::seeded();
    let schema = schema();
    let mapper = ModelMapper::new("Game", &schema);

    let record = service.get("Game", Some(&RequestParams::with_id("g3"))).await?;
    let mut model = mapper.to_plain_object(&record);
    model.set("score", json!(99));

    let saved = service.update("Game", mapper.from_plain_object(&model), None).await?;
    assert_eq!(saved.get("score"), Some(&json!(99)));
    assert_eq!(saved.get("name"), Some(&json!("Alpine")));

    let fresh = service.get("Game", Some(&RequestParams::with_id("g3"))).await?;
    assert_eq!(mapper.to_plain_object(&fresh).value("score"), Some(&json!(99)));
    Ok(())
}

#[tokio::test]
async fn new_model_is_added_as_new_record() -> Result<()> {
    let (backend, service) = common::seeded();
    let schema = schema();
    let mapper = ModelMapper::new("Player", &schema);

    let mut model = data_bridge::Model::new("Player");
    model.set("name", json!("Cy")).set("level", json!(1));
    let record = mapper.from_plain_object(&model);
    assert!(record.is_new());

    service.add("Player", record, None).await?;
    assert_eq!(backend.len("Player"), 3);
    assert_eq!(DataType::Pointer, schema["Game"][2].data_type);
    Ok(())
}
