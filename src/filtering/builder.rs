use sea_orm::DatabaseConnection;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::models::PaginationQuery;
use crate::pagination::{PaginationRequest, bind_pagination};
use crate::query::{Dialect, JoinClause, ListingQuery};

/// Sort applied when a builder does not declare one.
pub const DEFAULT_SORT: &str = "id asc";

/// Closure that scopes a listing query, e.g. to the current author's posts.
pub type FilterFn = Arc<dyn Fn(ListingQuery) -> ListingQuery + Send + Sync>;

/// Describes how to scope, search and sort one kind of listing.
pub trait QueryBuilder: Send + Sync {
    /// Add the builder's own predicates (and clauses) to `query`.
    fn apply_filters(&self, query: ListingQuery) -> ListingQuery;

    fn table_name(&self) -> &str;

    /// Fallback ordering, used whenever the caller's sort field is absent or rejected.
    fn default_sort(&self) -> &str;

    /// Columns the free text `search` parameter is matched against.
    fn search_fields(&self) -> &[String];

    /// Relations callers may eager-load. `None` means any syntactically valid name.
    fn allowed_includes(&self) -> Option<&HashSet<String>> {
        None
    }
}

/// A builder that also carries the request it was bound from.
pub trait IncludableQueryBuilder: QueryBuilder {
    fn pagination(&self) -> &PaginationRequest;

    fn includes(&self) -> &[String];

    /// Connection to use when the caller does not pass one.
    fn connection(&self) -> Option<&DatabaseConnection> {
        None
    }
}

pub(crate) fn sort_or_default(sort: &str) -> &str {
    if sort.trim().is_empty() {
        DEFAULT_SORT
    } else {
        sort
    }
}

/// Fixed table, default sort and search fields, plus an optional scoping closure.
#[derive(Clone)]
pub struct SimpleQueryBuilder {
    pub table_name: String,
    pub filter: Option<FilterFn>,
    pub search_fields: Vec<String>,
    pub default_sort: String,
    pub dialect: Dialect,
    pub allowed_includes: Option<HashSet<String>>,
}

impl fmt::Debug for SimpleQueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleQueryBuilder")
            .field("table_name", &self.table_name)
            .field("filter", &self.filter.as_ref().map(|_| "Fn"))
            .field("search_fields", &self.search_fields)
            .field("default_sort", &self.default_sort)
            .field("dialect", &self.dialect)
            .field("allowed_includes", &self.allowed_includes)
            .finish()
    }
}

impl SimpleQueryBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            filter: None,
            search_fields: Vec::new(),
            default_sort: DEFAULT_SORT.to_string(),
            dialect: Dialect::MySql,
            allowed_includes: None,
        }
    }

    #[must_use]
    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_default_sort(mut self, sort: impl Into<String>) -> Self {
        self.default_sort = sort.into();
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_filters<F>(mut self, filter: F) -> Self
    where
        F: Fn(ListingQuery) -> ListingQuery + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn with_allowed_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_includes = Some(includes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn search_operator(&self) -> &'static str {
        self.dialect.search_operator()
    }
}

impl QueryBuilder for SimpleQueryBuilder {
    fn apply_filters(&self, query: ListingQuery) -> ListingQuery {
        match &self.filter {
            Some(filter) => filter(query),
            None => query,
        }
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn default_sort(&self) -> &str {
        sort_or_default(&self.default_sort)
    }

    fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    fn allowed_includes(&self) -> Option<&HashSet<String>> {
        self.allowed_includes.as_ref()
    }
}

/// A [`SimpleQueryBuilder`] plus accumulated select, join, group by and having
/// clauses, applied in that order after the base filter.
#[derive(Debug, Clone)]
pub struct ChainableQueryBuilder {
    base: SimpleQueryBuilder,
    joins: Vec<JoinClause>,
    group_by: Vec<String>,
    having: Vec<String>,
    selects: Vec<String>,
}

impl From<SimpleQueryBuilder> for ChainableQueryBuilder {
    fn from(base: SimpleQueryBuilder) -> Self {
        Self {
            base,
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            selects: Vec::new(),
        }
    }
}

impl ChainableQueryBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        SimpleQueryBuilder::new(table_name).into()
    }

    #[must_use]
    pub fn base(&self) -> &SimpleQueryBuilder {
        &self.base
    }

    #[must_use]
    pub fn join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    #[must_use]
    pub fn having(mut self, condition: impl Into<String>) -> Self {
        self.having.push(condition.into());
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selects.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = self.base.with_search_fields(fields);
        self
    }

    #[must_use]
    pub fn with_default_sort(mut self, sort: impl Into<String>) -> Self {
        self.base = self.base.with_default_sort(sort);
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.base = self.base.with_dialect(dialect);
        self
    }

    #[must_use]
    pub fn with_filters<F>(mut self, filter: F) -> Self
    where
        F: Fn(ListingQuery) -> ListingQuery + Send + Sync + 'static,
    {
        self.base = self.base.with_filters(filter);
        self
    }

    #[must_use]
    pub fn with_allowed_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = self.base.with_allowed_includes(includes);
        self
    }
}

impl QueryBuilder for ChainableQueryBuilder {
    fn apply_filters(&self, query: ListingQuery) -> ListingQuery {
        let mut query = self.base.apply_filters(query);

        if !self.selects.is_empty() {
            query = query.select(self.selects.iter().cloned());
        }
        for join in &self.joins {
            query = query.join(join.clone());
        }
        for group_by in &self.group_by {
            query = query.group_by(group_by);
        }
        for having in &self.having {
            query = query.having(having);
        }

        query
    }

    fn table_name(&self) -> &str {
        self.base.table_name()
    }

    fn default_sort(&self) -> &str {
        self.base.default_sort()
    }

    fn search_fields(&self) -> &[String] {
        self.base.search_fields()
    }

    fn allowed_includes(&self) -> Option<&HashSet<String>> {
        self.base.allowed_includes()
    }
}

/// Pagination and includes bound from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseFilter {
    pub pagination: PaginationRequest,
    pub includes: Vec<String>,
}

impl BaseFilter {
    #[must_use]
    pub fn bind(raw: &PaginationQuery) -> Self {
        Self {
            pagination: bind_pagination(raw),
            includes: raw.includes.as_deref().map(parse_includes).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.pagination.offset()
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.pagination.limit()
    }

    pub fn validate_pagination(&mut self) {
        self.pagination.validate();
    }
}

/// Split a comma separated include list, trimming whitespace and dropping
/// empty segments.
#[must_use]
pub fn parse_includes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|include| !include.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Binds any [`QueryBuilder`] to a request and, optionally, a shared connection.
#[derive(Debug, Clone)]
pub struct QueryLayer<B> {
    pub builder: B,
    pub filter: BaseFilter,
    pub db: Option<Arc<DatabaseConnection>>,
}

impl<B: QueryBuilder> QueryLayer<B> {
    pub fn new(builder: B, filter: BaseFilter) -> Self {
        Self {
            builder,
            filter,
            db: None,
        }
    }

    #[must_use]
    pub fn with_connection(mut self, db: impl Into<Arc<DatabaseConnection>>) -> Self {
        self.db = Some(db.into());
        self
    }
}

impl<B: QueryBuilder> QueryBuilder for QueryLayer<B> {
    fn apply_filters(&self, query: ListingQuery) -> ListingQuery {
        self.builder.apply_filters(query)
    }

    fn table_name(&self) -> &str {
        self.builder.table_name()
    }

    fn default_sort(&self) -> &str {
        self.builder.default_sort()
    }

    fn search_fields(&self) -> &[String] {
        self.builder.search_fields()
    }

    fn allowed_includes(&self) -> Option<&HashSet<String>> {
        self.builder.allowed_includes()
    }
}

impl<B: QueryBuilder> IncludableQueryBuilder for QueryLayer<B> {
    fn pagination(&self) -> &PaginationRequest {
        &self.filter.pagination
    }

    fn includes(&self) -> &[String] {
        &self.filter.includes
    }

    fn connection(&self) -> Option<&DatabaseConnection> {
        self.db.as_deref()
    }
}
