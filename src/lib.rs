pub mod errors;
pub mod filtering;
pub mod models;
pub mod operations;
pub mod pagination;
pub mod query;
pub mod routes;
pub mod validation;

pub use errors::{ApiError, PaginationError};
pub use filtering::{
    BaseFilter, ChainableQueryBuilder, DescribedModel, DynamicFilter, FieldDescriptor,
    FilterCondition, FilterLogic, FilterOperator, IncludableQueryBuilder, QueryBuilder, QueryLayer,
    SimpleQueryBuilder,
};
pub use models::PaginationQuery;
pub use operations::{
    PaginatedQueryOptions, paginated_query, paginated_query_with_includable,
    paginated_query_with_includable_and_options, paginated_query_with_options,
};
pub use pagination::{
    PaginatedResponse, PaginationRequest, PaginationResponse, SortOrder, bind_pagination,
    calculate_pagination,
};
pub use query::{Dialect, JoinClause, ListingQuery, Preload};
pub use routes::{list_paginated, list_response};
pub use serde_with;
