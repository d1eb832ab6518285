use super::types::OrderSpec;
use super::QueryTranslator;
use crate::backend::Query;

impl QueryTranslator {
    /// Successive sort keys, in the order given
    pub fn apply_orders<'q>(query: &'q mut Query, orders: &[OrderSpec]) -> &'q mut Query {
        for order in orders {
            if order.ascending { query.add_ascending(&order.field); } else { query.add_descending(&order.field); }
        }
        query
    }

    pub fn apply_includes<'q>(query: &'q mut Query, includes: &[String]) -> &'q mut Query {
        for field in includes {
            query.include(field);
        }
        query
    }
}
