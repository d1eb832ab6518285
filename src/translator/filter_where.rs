use serde_json::Value;

use super::types::{FilterOperator, FilterSpec};
use super::QueryTranslator;
use crate::backend::Query;

impl QueryTranslator {
    /// Apply exactly one filter to `query`.
    ///
    /// `!=` without a value means "the field exists"; every other operator
    /// passes the value through, with an absent value sent as null.
    pub fn build_filter<'q>(query: &'q mut Query, filter: &FilterSpec) -> &'q mut Query {
        let field = filter.field.as_str();
        if filter.operator == FilterOperator::Ne && filter.value.is_none() {
            return query.exists(field);
        }

        let value = filter.value.clone().unwrap_or(Value::Null);
        match filter.operator {
            FilterOperator::Eq => query.equal_to(field, value),
            FilterOperator::Gt => query.greater_than(field, value),
            FilterOperator::Gte => query.greater_than_or_equal_to(field, value),
            FilterOperator::Lt => query.less_than(field, value),
            FilterOperator::Lte => query.less_than_or_equal_to(field, value),
            FilterOperator::Ne => query.not_equal_to(field, value),
            FilterOperator::ContainsAll => query.contains_all(field, value),
            FilterOperator::StartsWith => query.starts_with(field, value),
            FilterOperator::Unrecognized => {
                tracing::debug!("Unknown operator on {}, applying equality", field);
                query.equal_to(field, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Constraint, Predicate};
    use serde_json::json;

    fn single(filter: FilterSpec) -> Constraint {
        let mut query = Query::new("X");
        QueryTranslator::build_filter(&mut query, &filter);
        assert_eq!(query.constraints().len(), 1);
        query.constraints()[0].clone()
    }

    fn field(name: &str, predicate: Predicate) -> Constraint {
        Constraint::Field { field: name.to_string(), predicate }
    }

    #[test]
    fn not_equal_without_value_is_exists() {
        assert_eq!(single(FilterSpec::and(FilterOperator::Ne, "a", None)), field("a", Predicate::Exists));
        assert_eq!(
            single(FilterSpec::and(FilterOperator::Ne, "a", Some(Value::Null))),
            field("a", Predicate::NotEqualTo(Value::Null))
        );
    }

    #[test]
    fn each_operator_maps_to_its_predicate() {
        let cases = [
            (FilterOperator::Eq, Predicate::EqualTo(json!(1))),
            (FilterOperator::Gt, Predicate::GreaterThan(json!(1))),
            (FilterOperator::Gte, Predicate::GreaterThanOrEqualTo(json!(1))),
            (FilterOperator::Lt, Predicate::LessThan(json!(1))),
            (FilterOperator::Lte, Predicate::LessThanOrEqualTo(json!(1))),
            (FilterOperator::Ne, Predicate::NotEqualTo(json!(1))),
            (FilterOperator::ContainsAll, Predicate::ContainsAll(json!(1))),
            (FilterOperator::StartsWith, Predicate::StartsWith(json!(1))),
            (FilterOperator::Unrecognized, Predicate::EqualTo(json!(1))),
        ];
        for (operator, predicate) in cases {
            assert_eq!(single(FilterSpec::and(operator, "a", Some(json!(1)))), field("a", predicate));
        }
    }

    #[test]
    fn absent_value_is_sent_as_null() {
        assert_eq!(
            single(FilterSpec::and(FilterOperator::Gt, "a", None)),
            field("a", Predicate::GreaterThan(Value::Null))
        );
    }
}
