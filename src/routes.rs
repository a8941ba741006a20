use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Serialize;
use std::convert::Infallible;

use crate::errors::ApiError;
use crate::filtering::{BaseFilter, QueryBuilder};
use crate::models::PaginationQuery;
use crate::operations::{PaginatedQueryOptions, paginated_query_with_options};
use crate::pagination::{PaginatedResponse, PaginationRequest, bind_pagination, calculate_pagination};
use crate::query::Preload;

/// Unparsable query strings bind as if no parameter had been given.
fn raw_query(parts: &Parts) -> PaginationQuery {
    match Query::<PaginationQuery>::try_from_uri(&parts.uri) {
        Ok(Query(raw)) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparsable listing query string");
            PaginationQuery::default()
        }
    }
}

impl<S> FromRequestParts<S> for PaginationQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(raw_query(parts))
    }
}

impl<S> FromRequestParts<S> for PaginationRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(bind_pagination(&raw_query(parts)))
    }
}

impl<S> FromRequestParts<S> for BaseFilter
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::bind(&raw_query(parts)))
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Wrap one page of rows in the listing envelope.
pub fn list_response<T>(
    code: u16,
    message: impl Into<String>,
    rows: Vec<T>,
    total: u64,
    request: &PaginationRequest,
) -> PaginatedResponse<Vec<T>> {
    PaginatedResponse::new(code, message, rows, calculate_pagination(request, total))
}

/// Run a paginated listing and wrap the result for an Axum handler.
///
/// ```rust,ignore
/// async fn list_posts(
///     State(db): State<Arc<DatabaseConnection>>,
///     filter: BaseFilter,
/// ) -> Result<PaginatedResponse<Vec<PostRow>>, ApiError> {
///     let builder = SimpleQueryBuilder::new("posts").with_search_fields(["title", "body"]);
///     list_paginated(&db, &builder, &filter, "Posts retrieved").await
/// }
/// ```
pub async fn list_paginated<T, B>(
    db: &DatabaseConnection,
    builder: &B,
    filter: &BaseFilter,
    message: &str,
) -> Result<PaginatedResponse<Vec<T>>, ApiError>
where
    T: Preload + Serialize,
    B: QueryBuilder + ?Sized,
{
    let options = PaginatedQueryOptions::for_backend(db.get_database_backend());
    let (rows, total) =
        paginated_query_with_options(db, builder, &filter.pagination, &filter.includes, &options)
            .await?;

    Ok(list_response(
        StatusCode::OK.as_u16(),
        message,
        rows,
        total,
        &filter.pagination,
    ))
}
