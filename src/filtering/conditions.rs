use sea_orm::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

use super::builder::{BaseFilter, IncludableQueryBuilder, QueryBuilder, sort_or_default};
use crate::models::PaginationQuery;
use crate::pagination::PaginationRequest;
use crate::query::{Dialect, ListingQuery};
use crate::validation::is_valid_identifier;

/// Comparison applied by a [`FilterCondition`].
///
/// Parsing is case-insensitive and accepts symbolic and word aliases
/// (`>=`, `gte`, `GREATER_THAN_EQUALS`). Anything unrecognised is equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "!=" | "NE" | "NOT_EQUALS" => Self::Ne,
            ">" | "GT" | "GREATER_THAN" => Self::Gt,
            ">=" | "GTE" | "GREATER_THAN_EQUALS" => Self::Gte,
            "<" | "LT" | "LESS_THAN" => Self::Lt,
            "<=" | "LTE" | "LESS_THAN_EQUALS" => Self::Lte,
            "LIKE" | "CONTAINS" => Self::Like,
            "ILIKE" | "ICONTAINS" => Self::ILike,
            "IN" => Self::In,
            "NOT_IN" => Self::NotIn,
            "IS_NULL" => Self::IsNull,
            "IS_NOT_NULL" => Self::IsNotNull,
            _ => Self::Eq,
        }
    }

    /// SQL spelling of the operator.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Null checks are the only operators that need no value.
    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl From<&str> for FilterOperator {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

impl<'de> Deserialize<'de> for FilterOperator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

impl Serialize for FilterOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.sql())
    }
}

/// How a condition joins the predicate accumulated before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

impl FilterLogic {
    /// Only `or` (any case) selects OR, everything else is AND.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("or") {
            Self::Or
        } else {
            Self::And
        }
    }
}

impl<'de> Deserialize<'de> for FilterLogic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One user-supplied `(field, operator, value, logic)` filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub logic: FilterLogic,
}

impl FilterCondition {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
            logic: FilterLogic::And,
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::IsNull,
            ..Default::default()
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::IsNotNull,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn or(mut self) -> Self {
        self.logic = FilterLogic::Or;
        self
    }

    fn has_value(&self) -> bool {
        matches!(&self.value, Some(value) if !value.is_null())
    }

    /// Compile against `column` into a predicate with `?` placeholders and the
    /// values to bind. Returns `None` when the value does not fit the operator.
    #[must_use]
    pub fn compile(&self, column: &str, dialect: Dialect) -> Option<(String, Vec<Value>)> {
        match self.operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => {
                Some((format!("{column} {}", self.operator.sql()), Vec::new()))
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let values = match self.value.as_ref()? {
                    serde_json::Value::Array(items) => items
                        .iter()
                        .map(scalar_value)
                        .collect::<Option<Vec<_>>>()?,
                    other => vec![scalar_value(other)?],
                };
                if values.is_empty() {
                    let constant = if self.operator == FilterOperator::In {
                        "1 = 0"
                    } else {
                        "1 = 1"
                    };
                    return Some((constant.to_string(), Vec::new()));
                }
                let placeholders = vec!["?"; values.len()].join(", ");
                Some((
                    format!("{column} {} ({placeholders})", self.operator.sql()),
                    values,
                ))
            }
            FilterOperator::ILike if !dialect.supports_ilike() => {
                let value = scalar_value(self.value.as_ref()?)?;
                Some((format!("LOWER({column}) LIKE LOWER(?)"), vec![value]))
            }
            operator => {
                let value = scalar_value(self.value.as_ref()?)?;
                Some((format!("{column} {} ?", operator.sql()), vec![value]))
            }
        }
    }
}

fn scalar_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::from(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::from(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_u64().map(Value::from))
            .or_else(|| n.as_f64().map(Value::from)),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

/// Statically declared description of one filterable model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: Option<&'static str>,
    pub external: Option<&'static str>,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            external: None,
        }
    }

    #[must_use]
    pub const fn with_column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    #[must_use]
    pub const fn with_external(mut self, external: &'static str) -> Self {
        self.external = Some(external);
        self
    }

    /// Column the field is stored in.
    #[must_use]
    pub fn storage_column(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    /// Exact name, case-insensitive name, storage column or external name.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.name == candidate
            || self.name.eq_ignore_ascii_case(candidate)
            || self.column == Some(candidate)
            || self.external == Some(candidate)
    }
}

/// A model that publishes its table and filterable fields.
///
/// ```rust,ignore
/// impl DescribedModel for Post {
///     const TABLE_NAME: &'static str = "posts";
///     const FIELDS: &'static [FieldDescriptor] = &[
///         FieldDescriptor::new("id"),
///         FieldDescriptor::new("AuthorId").with_column("author_id").with_external("authorId"),
///     ];
/// }
/// ```
pub trait DescribedModel {
    const TABLE_NAME: &'static str;
    const FIELDS: &'static [FieldDescriptor];
}

/// Query builder driven by a list of [`FilterCondition`]s checked against a
/// model's [`FieldDescriptor`] table.
#[derive(Debug, Clone)]
pub struct DynamicFilter {
    pub base: BaseFilter,
    pub filters: Vec<FilterCondition>,
    pub table_name: String,
    pub fields: &'static [FieldDescriptor],
    pub search_fields: Vec<String>,
    pub default_sort: String,
    pub dialect: Dialect,
    pub allowed_includes: Option<HashSet<String>>,
}

impl DynamicFilter {
    pub fn new(table_name: impl Into<String>, fields: &'static [FieldDescriptor]) -> Self {
        Self {
            base: BaseFilter::default(),
            filters: Vec::new(),
            table_name: table_name.into(),
            fields,
            search_fields: Vec::new(),
            default_sort: String::new(),
            dialect: Dialect::default(),
            allowed_includes: None,
        }
    }

    #[must_use]
    pub fn for_model<M: DescribedModel>() -> Self {
        Self::new(M::TABLE_NAME, M::FIELDS)
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Vec<FilterCondition>) -> Self {
        self.filters = filters;
        self
    }

    /// Replace the conditions with a JSON-encoded array. Malformed input is
    /// logged and leaves the filter with no conditions.
    #[must_use]
    pub fn with_filters_json(mut self, raw: &str) -> Self {
        self.filters = match serde_json::from_str::<Vec<FilterCondition>>(raw) {
            Ok(filters) => filters,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed filters parameter");
                Vec::new()
            }
        };
        self
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
    pub fn with_allowed_includes<I, S>(mut self, includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_includes = Some(includes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: BaseFilter) -> Self {
        self.base = base;
        self
    }

    /// Bind pagination, includes and the JSON `filters` parameter from a request.
    #[must_use]
    pub fn bind(self, raw: &PaginationQuery) -> Self {
        let bound = self.with_base(BaseFilter::bind(raw));
        match raw.filters.as_deref().map(str::trim) {
            Some(filters) if !filters.is_empty() => bound.with_filters_json(filters),
            _ => bound,
        }
    }

    /// Declared field a user-supplied name refers to.
    #[must_use]
    pub fn resolve_field(&self, candidate: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.matches(candidate))
    }
}

impl QueryBuilder for DynamicFilter {
    fn apply_filters(&self, mut query: ListingQuery) -> ListingQuery {
        let mut applied = 0_usize;

        for condition in &self.filters {
            if condition.field.is_empty()
                || (condition.operator.takes_value() && !condition.has_value())
            {
                continue;
            }

            let Some(field) = self.resolve_field(&condition.field) else {
                tracing::debug!(field = %condition.field, "Skipping filter on undeclared field");
                continue;
            };
            let column = field.storage_column();
            if !is_valid_identifier(column) {
                continue;
            }

            let Some((predicate, values)) = condition.compile(column, self.dialect) else {
                tracing::debug!(field = %condition.field, operator = %condition.operator, "Skipping filter with unusable value");
                continue;
            };

            query = if applied > 0 && condition.logic == FilterLogic::Or {
                query.where_or(&predicate, values)
            } else {
                query.where_and(&predicate, values)
            };
            applied += 1;
        }

        query
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

impl IncludableQueryBuilder for DynamicFilter {
    fn pagination(&self) -> &PaginationRequest {
        &self.base.pagination
    }

    fn includes(&self) -> &[String] {
        &self.base.includes
    }
}
