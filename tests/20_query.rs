mod common;

use anyhow::Result;
use data_bridge::error::codes;
use serde_json::json;

#[tokio::test]
async fn or_filters_match_either_branch() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [
            { "type": "or", "operator": "=", "field": "name", "value": "Alpha" },
            { "type": "or", "operator": "=", "field": "name", "value": "Gamma" }
        ],
        "orders": [{ "field": "name", "ascending": true }]
    }));

    let records = service.get_all("Game", Some(&params)).await?;
    assert_eq!(common::ids(&records), vec!["g1", "g4"]);
    Ok(())
}

#[tokio::test]
async fn and_filters_narrow_the_disjunction() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [
            { "type": "and", "operator": ">", "field": "score", "value": 15 },
            { "type": "or", "operator": "startsWith", "field": "name", "value": "Al" },
            { "type": "or", "operator": "containsAll", "field": "tags", "value": ["retro"] }
        ],
        "orders": [{ "field": "score", "ascending": false }]
    }));

    let records = service.get_all("Game", Some(&params)).await?;
    assert_eq!(common::ids(&records), vec!["g4", "g3"]);
    assert_eq!(service.count("Game", Some(&params)).await?, 2);
    Ok(())
}

#[tokio::test]
async fn not_equal_without_value_means_exists() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [{ "type": "and", "operator": "!=", "field": "tags" }],
        "orders": [{ "field": "score", "ascending": true }]
    }));

    let records = service.get_all("Game", Some(&params)).await?;
    assert_eq!(common::ids(&records), vec!["g1", "g2", "g4"]);
    Ok(())
}

#[tokio::test]
async fn includes_expand_pointers() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [{ "type": "and", "operator": "=", "field": "objectId", "value": "g2" }],
        "includes": ["owner"]
    }));

    let records = service.get_all("Game", Some(&params)).await?;
    let owner = records[0].get("owner").expect("owner");
    assert_eq!(owner["__type"], json!("Object"));
    assert_eq!(owner["name"], json!("Bea"));
    Ok(())
}

#[tokio::test]
async fn unknown_operator_filters_by_equality() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [{ "type": "and", "operator": "like", "field": "score", "value": 20 }]
    }));
    let records = service.get_all("Game", Some(&params)).await?;
    assert_eq!(common::ids(&records), vec!["g3"]);
    Ok(())
}

#[tokio::test]
async fn equality_on_pointer_field() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [{
            "type": "and", "operator": "=", "field": "owner",
            "value": { "__type": "Pointer", "className": "Player", "objectId": "p1" }
        }]
    }));
    assert_eq!(service.count("Game", Some(&params)).await?, 1);
    Ok(())
}

#[tokio::test]
async fn filters_and_orders_need_a_field() -> Result<()> {
    let (_backend, service) = common::seeded();
    let params = common::params(json!({
        "filters": [{ "type": "and", "operator": "=", "value": "Alpha" }]
    }));
    let err = service.count("Game", Some(&params)).await.unwrap_err();
    assert_eq!(err.code, codes::INVALID_QUERY);

    let params = common::params(json!({ "orders": [{ "ascending": false }] }));
    let err = service.get_all("Game", Some(&params)).await.unwrap_err();
    assert_eq!(err.code, codes::INVALID_QUERY);
    Ok(())
}
