//! Query builders describing how a listing is scoped, searched and sorted.
//!
//! - [`SimpleQueryBuilder`]: fixed table, search fields and default sort, with
//!   an optional scoping closure.
//! - [`ChainableQueryBuilder`]: a simple builder plus select, join, group by
//!   and having clauses.
//! - [`DynamicFilter`]: conditions supplied at request time, validated against
//!   a static [`FieldDescriptor`] table.

pub mod builder;
pub mod conditions;
pub mod search;

pub use builder::{
    BaseFilter, ChainableQueryBuilder, DEFAULT_SORT, FilterFn, IncludableQueryBuilder, QueryBuilder,
    QueryLayer, SimpleQueryBuilder, parse_includes,
};
pub use conditions::{
    DescribedModel, DynamicFilter, FieldDescriptor, FilterCondition, FilterLogic, FilterOperator,
};
pub use search::search_predicate;
