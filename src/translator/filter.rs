use super::types::{FilterKind, FilterSpec, RequestParams};
use super::QueryTranslator;
use crate::backend::Query;
use crate::config::config;

impl QueryTranslator {
    /// Build the query for `collection` described by `params`.
    ///
    /// All `or` filters form one disjunction (one branch per filter), then
    /// every `and` filter narrows it. Filters of any other type are dropped.
    /// Orders and includes follow, in the order given.
    pub fn build_query(collection: &str, params: Option<&RequestParams>) -> Query {
        let Some(params) = params else { return Query::new(collection) };

        let (or_filters, and_filters): (Vec<&FilterSpec>, Vec<&FilterSpec>) = params
            .filters
            .iter()
            .filter(|f| f.kind != FilterKind::Unrecognized)
            .partition(|f| f.kind == FilterKind::Or);

        let mut query = if or_filters.is_empty() {
            Query::new(collection)
        } else {
            let branches = or_filters.iter().map(|filter| {
                let mut branch = Query::new(collection);
                Self::build_filter(&mut branch, filter);
                branch
            });
            Query::or(collection, branches.collect::<Vec<_>>())
        };

        for filter in and_filters {
            Self::build_filter(&mut query, filter);
        }
        Self::apply_orders(&mut query, &params.orders);
        Self::apply_includes(&mut query, &params.includes);

        if config().logging.debug_queries {
            tracing::debug!("Built query for {}: {}", collection, query.to_json());
        }
        query
    }
}
