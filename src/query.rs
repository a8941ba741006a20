//! # Listing Query
//!
//! [`ListingQuery`] is the relational query value every builder composes onto.
//! It records the table, predicates, ordering, window, joins, grouping,
//! projection and eager-load requests of one listing, and renders them through
//! `sea_query` into a data statement or a count statement for whichever
//! backend the connection speaks.
//!
//! Predicates are raw SQL fragments with `?` placeholders, bound through
//! `Expr::cust_with_values` so values never end up in the SQL text. The
//! placeholders are renumbered to `$1, $2, ...` when rendering for Postgres;
//! `??` is a literal question mark and quoted literals are left alone. Callers
//! are responsible for only interpolating identifiers that passed
//! [`is_valid_identifier`](crate::validation::is_valid_identifier) or that come
//! from trusted code.

use async_trait::async_trait;
use sea_orm::{
    Condition, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr, FromQueryResult, Order,
    Statement, Value,
    sea_query::{
        Alias, Asterisk, Expr, IntoTableRef, JoinType, Query, SelectStatement, SimpleExpr, TableRef,
    },
};
use serde::{Deserialize, Serialize};

const COUNT_ALIAS: &str = "num_items";
const COUNT_SUBQUERY_ALIAS: &str = "sub_query";

/// SQL dialect, used where operators differ between backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgresql")]
    Postgres,
    #[serde(rename = "sqlite")]
    Sqlite,
    #[serde(rename = "sqlserver")]
    SqlServer,
}

impl Dialect {
    /// Case-insensitive pattern match operator for free text search.
    #[must_use]
    pub const fn search_operator(self) -> &'static str {
        match self {
            Self::Postgres => "ILIKE",
            Self::MySql | Self::Sqlite | Self::SqlServer => "LIKE",
        }
    }

    #[must_use]
    pub const fn supports_ilike(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

impl From<DatabaseBackend> for Dialect {
    fn from(backend: DatabaseBackend) -> Self {
        match backend {
            DatabaseBackend::Postgres => Self::Postgres,
            DatabaseBackend::Sqlite => Self::Sqlite,
            _ => Self::MySql,
        }
    }
}

/// A join between the listing table and another table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinType,
    pub table: String,
    pub on: String,
}

impl JoinClause {
    pub fn new(kind: JoinType, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            on: on.into(),
        }
    }

    pub fn inner(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::InnerJoin, table, on)
    }

    pub fn left(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::LeftJoin, table, on)
    }

    pub fn right(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::RightJoin, table, on)
    }
}

/// Eager loading of named relations onto already fetched rows.
///
/// Sea-ORM loads relations per entity, so a listing type decides for itself
/// how each include name maps onto a query. Types with no relations can rely
/// on the default, which ignores every include.
///
/// ```rust,ignore
/// #[async_trait]
/// impl Preload for PostRow {
///     async fn preload(db: &DatabaseConnection, rows: &mut [Self], relation: &str) -> Result<(), DbErr> {
///         if relation == "author" {
///             let ids: Vec<i32> = rows.iter().map(|r| r.author_id).collect();
///             let authors = author::Entity::find().filter(author::Column::Id.is_in(ids)).all(db).await?;
///             for row in rows.iter_mut() {
///                 row.author = authors.iter().find(|a| a.id == row.author_id).cloned();
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Preload: FromQueryResult + Send + Sync + Sized {
    async fn preload(
        _db: &DatabaseConnection,
        _rows: &mut [Self],
        relation: &str,
    ) -> Result<(), DbErr> {
        tracing::debug!(relation, "No preload handler for relation, skipping");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Junction {
    And,
    Or,
}

/// A predicate as it was added. Raw fragments are only turned into
/// expressions once the backend, and so the placeholder style, is known.
#[derive(Debug, Clone)]
enum Predicate {
    Raw { sql: String, values: Vec<Value> },
    Expr(SimpleExpr),
}

impl Predicate {
    fn to_expr(&self, backend: DatabaseBackend) -> SimpleExpr {
        match self {
            Self::Expr(expr) => expr.clone(),
            Self::Raw { sql, values } => {
                let (sql, placeholders) = rewrite_placeholders(sql, backend);
                if placeholders == values.len() {
                    Expr::cust_with_values(sql, values.iter().cloned())
                } else {
                    tracing::warn!(
                        predicate = %sql,
                        placeholders,
                        values = values.len(),
                        "Placeholder count does not match bound values, rendering predicate unbound"
                    );
                    Expr::cust(sql)
                }
            }
        }
    }
}

/// Fluent description of a listing query over a single table.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    table: String,
    predicates: Vec<(Junction, Predicate)>,
    orders: Vec<(String, Order)>,
    offset: Option<u64>,
    limit: Option<u64>,
    joins: Vec<JoinClause>,
    group_by: Vec<String>,
    having: Vec<String>,
    selects: Vec<String>,
    preloads: Vec<String>,
}

impl ListingQuery {
    /// Start a query over `table`. A `schema.table` name is split into both parts.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicates: Vec::new(),
            orders: Vec::new(),
            offset: None,
            limit: None,
            joins: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            selects: Vec::new(),
            preloads: Vec::new(),
        }
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// AND a raw predicate with `?` placeholders onto the query.
    #[must_use]
    pub fn where_and(mut self, predicate: &str, values: Vec<Value>) -> Self {
        self.predicates.push((Junction::And, raw(predicate, values)));
        self
    }

    /// OR a raw predicate with `?` placeholders onto the query.
    #[must_use]
    pub fn where_or(mut self, predicate: &str, values: Vec<Value>) -> Self {
        self.predicates.push((Junction::Or, raw(predicate, values)));
        self
    }

    /// AND a typed `sea_query` expression onto the query.
    #[must_use]
    pub fn filter(mut self, expr: impl Into<SimpleExpr>) -> Self {
        self.predicates.push((Junction::And, Predicate::Expr(expr.into())));
        self
    }

    /// OR a typed `sea_query` expression onto the query.
    #[must_use]
    pub fn or_filter(mut self, expr: impl Into<SimpleExpr>) -> Self {
        self.predicates.push((Junction::Or, Predicate::Expr(expr.into())));
        self
    }

    /// Append an ordering such as `created_at desc` or `pinned desc, id asc`.
    #[must_use]
    pub fn order_by(mut self, expr: &str) -> Self {
        self.orders.extend(parse_sort_expression(expr));
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by.push(expr.to_string());
        self
    }

    #[must_use]
    pub fn having(mut self, expr: &str) -> Self {
        self.having.push(expr.to_string());
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
    pub fn preload(mut self, relation: &str) -> Self {
        self.preloads.push(relation.to_string());
        self
    }

    #[must_use]
    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    /// Combined WHERE condition. Predicates fold left to right, so each
    /// junction groups everything before it: `a AND b OR c` is `(a AND b) OR c`.
    fn condition(&self, backend: DatabaseBackend) -> Option<Condition> {
        let mut predicates = self
            .predicates
            .iter()
            .map(|(junction, predicate)| (*junction, predicate.to_expr(backend)));
        let (_, first) = predicates.next()?;

        let mut condition = Condition::all().add(first);
        let mut disjunctive = false;
        for (junction, expr) in predicates {
            match (junction, disjunctive) {
                (Junction::And, false) | (Junction::Or, true) => {
                    condition = condition.add(expr);
                }
                (Junction::And, true) => {
                    condition = Condition::all().add(condition).add(expr);
                    disjunctive = false;
                }
                (Junction::Or, false) => {
                    condition = Condition::any().add(condition).add(expr);
                    disjunctive = true;
                }
            }
        }
        Some(condition)
    }

    fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || !self.having.is_empty()
    }

    /// FROM, joins, WHERE, GROUP BY and HAVING, with no projection.
    fn scoped_select(&self, backend: DatabaseBackend) -> SelectStatement {
        let mut select = Query::select();
        select.from(table_ref(&self.table));

        for join in &self.joins {
            select.join(join.kind, table_ref(&join.table), Expr::cust(join.on.as_str()));
        }

        if let Some(condition) = self.condition(backend) {
            select.cond_where(condition);
        }

        if !self.group_by.is_empty() {
            select.add_group_by(self.group_by.iter().map(|expr| Expr::cust(expr.as_str())));
        }

        for having in &self.having {
            select.and_having(Expr::cust(having.as_str()));
        }

        select
    }

    /// Filtered, joined and grouped select without ordering or window.
    fn base_select(&self, backend: DatabaseBackend) -> SelectStatement {
        let mut select = self.scoped_select(backend);

        if self.selects.is_empty() {
            select.column(Asterisk);
        } else {
            for field in &self.selects {
                select.expr(Expr::cust(field.as_str()));
            }
        }

        select
    }

    /// Render the data statement, including ordering and the page window.
    #[must_use]
    pub fn build(&self, backend: DatabaseBackend) -> Statement {
        let mut select = self.base_select(backend);

        for (expr, order) in &self.orders {
            select.order_by_expr(Expr::cust(expr.as_str()), order.clone());
        }
        if let Some(limit) = self.limit {
            select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select.offset(offset);
        }

        backend.build(&select)
    }

    /// Render the count statement.
    ///
    /// Ungrouped queries count directly over the joined, filtered table. Grouped
    /// queries count their groups through
    /// `SELECT COUNT(*) AS num_items FROM (<filtered select>) AS sub_query`.
    #[must_use]
    pub fn build_count(&self, backend: DatabaseBackend) -> Statement {
        let count_expr = Expr::cust("COUNT(*)");

        if !self.is_grouped() {
            let mut count = self.scoped_select(backend);
            count.expr_as(count_expr, Alias::new(COUNT_ALIAS));
            return backend.build(&count);
        }

        let mut count = Query::select();
        count
            .expr_as(count_expr, Alias::new(COUNT_ALIAS))
            .from_subquery(self.base_select(backend), Alias::new(COUNT_SUBQUERY_ALIAS));
        backend.build(&count)
    }

    /// Count the rows matching the query, ignoring ordering and window.
    pub async fn count(&self, db: &DatabaseConnection) -> Result<u64, DbErr> {
        let statement = self.build_count(db.get_database_backend());
        let row = db
            .query_one(statement)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("count query returned no rows".to_string()))?;
        let total: i64 = row.try_get("", COUNT_ALIAS)?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// Fetch the rows into `T`, then hand every preload request to `T::preload`
    /// in the order they were added.
    pub async fn find<T: Preload>(&self, db: &DatabaseConnection) -> Result<Vec<T>, DbErr> {
        let statement = self.build(db.get_database_backend());
        let mut rows = T::find_by_statement(statement).all(db).await?;

        for relation in &self.preloads {
            T::preload(db, &mut rows, relation).await?;
        }

        Ok(rows)
    }
}

/// Run a caller-supplied count statement. The first column of the first row
/// is the count.
pub async fn count_raw(db: &DatabaseConnection, sql: &str) -> Result<u64, DbErr> {
    let statement = Statement::from_string(db.get_database_backend(), sql.to_string());
    let row = db
        .query_one(statement)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("count query returned no rows".to_string()))?;
    let total: i64 = row.try_get_by_index(0)?;
    Ok(u64::try_from(total).unwrap_or_default())
}

fn raw(sql: &str, values: Vec<Value>) -> Predicate {
    Predicate::Raw {
        sql: sql.to_string(),
        values,
    }
}

/// Rewrite the `?` placeholders of `sql` for `backend` and count them.
///
/// Postgres gets `$1, $2, ...` and `??` becomes `?`; other backends keep the
/// fragment as is. Characters inside quoted literals or identifiers are never
/// placeholders.
fn rewrite_placeholders(sql: &str, backend: DatabaseBackend) -> (String, usize) {
    let numbered = matches!(backend, DatabaseBackend::Postgres);
    let mut rewritten = String::with_capacity(sql.len());
    let mut count = 0;
    let mut quote = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\'' | '"' | '`', None) => {
                quote = Some(c);
                rewritten.push(c);
            }
            (c, Some(open)) if c == open => {
                quote = None;
                rewritten.push(c);
            }
            ('?', None) if chars.peek() == Some(&'?') => {
                chars.next();
                rewritten.push_str(if numbered { "?" } else { "??" });
            }
            ('?', None) => {
                count += 1;
                if numbered {
                    rewritten.push_str(&format!("${count}"));
                } else {
                    rewritten.push('?');
                }
            }
            _ => rewritten.push(c),
        }
    }

    (rewritten, count)
}

fn table_ref(name: &str) -> TableRef {
    match name.split_once('.') {
        Some((schema, table)) => (Alias::new(schema), Alias::new(table)).into_table_ref(),
        None => Alias::new(name).into_table_ref(),
    }
}

/// Split `"a desc, b"` into `[("a", Desc), ("b", Asc)]`. A trailing word other
/// than `asc`/`desc` is kept as part of the expression.
fn parse_sort_expression(expr: &str) -> Vec<(String, Order)> {
    expr.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.rsplit_once(char::is_whitespace) {
            Some((column, direction)) if direction.eq_ignore_ascii_case("desc") => {
                (column.trim().to_string(), Order::Desc)
            }
            Some((column, direction)) if direction.eq_ignore_ascii_case("asc") => {
                (column.trim().to_string(), Order::Asc)
            }
            _ => (part.to_string(), Order::Asc),
        })
        .collect()
}
