//! # Paginated Query Executor
//!
//! Runs a listing in two steps on one borrowed connection:
//!
//! 1. a count over the builder's filters (plus soft-delete exclusion), or a
//!    caller-supplied raw count statement;
//! 2. the data query: same filters, free text search, validated sort, the page
//!    window and validated includes.
//!
//! A failure in either step aborts the listing with a [`PaginationError`]
//! naming the phase. The data query is never issued when the count fails.
//!
//! ```rust,ignore
//! let builder = SimpleQueryBuilder::new("posts")
//!     .with_search_fields(["title", "body"])
//!     .with_default_sort("created_at desc");
//! let options = PaginatedQueryOptions::for_backend(db.get_database_backend()).with_soft_delete();
//! let (posts, total) =
//!     paginated_query_with_options::<PostRow, _>(&db, &builder, &request, &includes, &options).await?;
//! ```

use sea_orm::{DatabaseBackend, DatabaseConnection, Value};
use serde::{Deserialize, Serialize};

use crate::errors::PaginationError;
use crate::filtering::{IncludableQueryBuilder, QueryBuilder, search_predicate};
use crate::pagination::PaginationRequest;
use crate::query::{Dialect, ListingQuery, Preload, count_raw};
use crate::validation::{validate_includes, validate_sort_field};

const SOFT_DELETE_PREDICATE: &str = "deleted_at IS NULL";

/// Per-call executor settings. Deserializable so it can live in application
/// configuration; missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginatedQueryOptions {
    /// Picks the search operator (`ILIKE` on Postgres, `LIKE` elsewhere).
    pub dialect: Dialect,
    /// Exclude rows whose `deleted_at` is set.
    pub enable_soft_delete: bool,
    /// Raw statement replacing the generated count. Its first column is the count.
    pub custom_count_query: Option<String>,
}

impl PaginatedQueryOptions {
    /// Options whose dialect matches the connection's backend.
    #[must_use]
    pub fn for_backend(backend: DatabaseBackend) -> Self {
        Self {
            dialect: backend.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_soft_delete(mut self) -> Self {
        self.enable_soft_delete = true;
        self
    }

    #[must_use]
    pub fn with_custom_count_query(mut self, sql: impl Into<String>) -> Self {
        self.custom_count_query = Some(sql.into());
        self
    }

    fn custom_count(&self) -> Option<&str> {
        self.custom_count_query
            .as_deref()
            .map(str::trim)
            .filter(|sql| !sql.is_empty())
    }
}

/// The two queries of one listing.
#[derive(Debug, Clone)]
pub struct ListingPlan {
    pub count: ListingQuery,
    pub data: ListingQuery,
}

fn scoped<B>(builder: &B, options: &PaginatedQueryOptions) -> ListingQuery
where
    B: QueryBuilder + ?Sized,
{
    let query = builder.apply_filters(ListingQuery::table(builder.table_name()));
    if options.enable_soft_delete {
        query.where_and(SOFT_DELETE_PREDICATE, Vec::<Value>::new())
    } else {
        query
    }
}

/// Build the count and data queries without touching the database.
///
/// The count only carries the builder's filters and the soft-delete
/// exclusion. Search, sort, window and includes apply to the data query.
#[must_use]
pub fn plan_listing<B>(
    builder: &B,
    request: &PaginationRequest,
    includes: &[String],
    options: &PaginatedQueryOptions,
) -> ListingPlan
where
    B: QueryBuilder + ?Sized,
{
    let count = scoped(builder, options);

    let mut data = builder.apply_filters(ListingQuery::table(builder.table_name()));
    if let Some((predicate, values)) =
        search_predicate(builder.search_fields(), &request.search, options.dialect)
    {
        data = data.where_and(&predicate, values);
    }
    if options.enable_soft_delete {
        data = data.where_and(SOFT_DELETE_PREDICATE, Vec::new());
    }

    data = match validate_sort_field(&request.sort) {
        Some(field) => data.order_by(&format!("{field} {}", request.order)),
        None => data.order_by(builder.default_sort()),
    };

    data = data.offset(request.offset()).limit(request.limit());

    for include in validate_includes(builder, includes) {
        data = data.preload(&include);
    }

    ListingPlan { count, data }
}

/// Paginated listing with default options (MySQL dialect, no soft delete).
pub async fn paginated_query<T, B>(
    db: &DatabaseConnection,
    builder: &B,
    request: &PaginationRequest,
    includes: &[String],
) -> Result<(Vec<T>, u64), PaginationError>
where
    T: Preload,
    B: QueryBuilder + ?Sized,
{
    paginated_query_with_options(db, builder, request, includes, &PaginatedQueryOptions::default())
        .await
}

/// Count, then fetch one page of `T`.
pub async fn paginated_query_with_options<T, B>(
    db: &DatabaseConnection,
    builder: &B,
    request: &PaginationRequest,
    includes: &[String],
    options: &PaginatedQueryOptions,
) -> Result<(Vec<T>, u64), PaginationError>
where
    T: Preload,
    B: QueryBuilder + ?Sized,
{
    let plan = plan_listing(builder, request, includes, options);

    let total = match options.custom_count() {
        Some(sql) => count_raw(db, sql).await,
        None => plan.count.count(db).await,
    }
    .map_err(PaginationError::Count)?;

    let rows = plan
        .data
        .find::<T>(db)
        .await
        .map_err(PaginationError::Fetch)?;

    tracing::debug!(
        table = builder.table_name(),
        total,
        page = request.page,
        returned = rows.len(),
        "Paginated listing"
    );

    Ok((rows, total))
}

/// Listing driven entirely by an [`IncludableQueryBuilder`], using default options.
pub async fn paginated_query_with_includable<T, B>(
    db: Option<&DatabaseConnection>,
    builder: &B,
) -> Result<(Vec<T>, u64), PaginationError>
where
    T: Preload,
    B: IncludableQueryBuilder + ?Sized,
{
    paginated_query_with_includable_and_options(db, builder, &PaginatedQueryOptions::default())
        .await
}

/// Listing driven by an [`IncludableQueryBuilder`].
///
/// Uses `db` when given, else the builder's own connection. The builder's
/// pagination request is validated before use.
pub async fn paginated_query_with_includable_and_options<T, B>(
    db: Option<&DatabaseConnection>,
    builder: &B,
    options: &PaginatedQueryOptions,
) -> Result<(Vec<T>, u64), PaginationError>
where
    T: Preload,
    B: IncludableQueryBuilder + ?Sized,
{
    let db = db
        .or_else(|| builder.connection())
        .ok_or(PaginationError::MissingConnection)?;
    let request = builder.pagination().clone().validated();

    paginated_query_with_options(db, builder, &request, builder.includes(), options).await
}
