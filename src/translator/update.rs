use serde_json::Value;

use super::types::{RequestParams, UpdateOperator};
use super::QueryTranslator;
use crate::backend::Record;

impl QueryTranslator {
    /// Apply each update in order to `record` and hand the same record back.
    ///
    /// `increment` adds 1, `remove` drops null items from the array, and
    /// `increment`/`remove`/`unset` ignore any value. Unknown operators set.
    pub fn update_fields<'r>(record: &'r mut Record, params: Option<&RequestParams>) -> &'r mut Record {
        let Some(params) = params else { return record };

        for update in &params.updated_fields {
            let field = update.field.as_str();
            let value = || update.value.clone().unwrap_or(Value::Null);
            match update.operator {
                UpdateOperator::Set => record.set(field, value()),
                UpdateOperator::Increment => record.increment(field),
                UpdateOperator::Add => record.add(field, value()),
                UpdateOperator::AddUnique => record.add_unique(field, value()),
                UpdateOperator::Remove => record.remove(field, Value::Null),
                UpdateOperator::Unset => record.unset(field),
                UpdateOperator::Unrecognized => {
                    tracing::debug!("Unknown update operator on {}, applying set", field);
                    record.set(field, value())
                }
            };
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FieldOp;
    use crate::translator::UpdateSpec;
    use serde_json::json;

    fn params(updates: Vec<UpdateSpec>) -> RequestParams {
        RequestParams { updated_fields: updates, ..RequestParams::default() }
    }

    #[test]
    fn increment_returns_the_same_record() {
        let mut record = Record::from_json(&json!({ "className": "C", "objectId": "c1", "count": 4 })).unwrap();
        let before: *const Record = &record;
        let params = params(vec![UpdateSpec::new(UpdateOperator::Increment, "count", Some(json!(10)))]);

        let returned = QueryTranslator::update_fields(&mut record, Some(&params));
        assert!(std::ptr::eq(before, &*returned));
        assert_eq!(returned.get("count"), Some(&json!(5)));
    }

    #[test]
    fn unknown_operator_sets() {
        let mut record = Record::new("C");
        let updates: Vec<UpdateSpec> =
            serde_json::from_value(json!([{ "operator": "multiply", "field": "n", "value": 3 }])).unwrap();
        QueryTranslator::update_fields(&mut record, Some(&params(updates)));
        assert_eq!(record.get("n"), Some(&json!(3)));
    }

    #[test]
    fn updates_apply_in_order() {
        let mut record = Record::from_json(&json!({
            "className": "C", "objectId": "c1", "tags": ["a", null], "old": true
        }))
        .unwrap();
        let params = params(vec![
            UpdateSpec::new(UpdateOperator::Remove, "tags", Some(json!("a"))),
            UpdateSpec::new(UpdateOperator::Add, "tags", Some(json!("b"))),
            UpdateSpec::new(UpdateOperator::AddUnique, "tags", Some(json!("b"))),
            UpdateSpec::new(UpdateOperator::Set, "title", Some(json!("t"))),
            UpdateSpec::new(UpdateOperator::Unset, "old", Some(json!(false))),
        ]);
        QueryTranslator::update_fields(&mut record, Some(&params));

        assert_eq!(record.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(record.get("title"), Some(&json!("t")));
        assert!(!record.has("old"));
        assert_eq!(record.dirty_keys().collect::<Vec<_>>(), vec!["old", "tags", "title"]);
        // Mixed array operations are sent as the resulting value
        assert_eq!(record.pending_op("tags"), Some(&FieldOp::Set));
        assert_eq!(record.pending_op("old"), Some(&FieldOp::Unset));
    }

    #[test]
    fn no_params_leaves_record_untouched() {
        let mut record = Record::new("C");
        QueryTranslator::update_fields(&mut record, None);
        assert!(!record.is_dirty());
    }
}
