//! Pipeline construction: operator translation, order parsing, stage building.

mod builder;
mod operator;
mod order;
mod update;

pub use builder::{
    Filter, GraphLookup, Lookup, Pipeline, QuerySpec, Unwind, date_to_string, graph_lookup_stage, in_fragment,
    limit_stage, lookup_stage, match_stage, skip_stage, sort_stage, union_with_stage, unwind_stage,
};
pub use operator::{FilterOperator, filter_fragment};
pub use order::{OrderSeparators, SortDirection, SortField, parse_orders, parse_orders_with};
pub use update::UpdateDoc;
