use serde::Deserialize;
use serde_with::{NoneAsEmptyString, serde_as};
use utoipa::IntoParams;

/// Raw query parameters for paginated listing endpoints.
///
/// Every field is kept as an untrusted string. Values are only interpreted by
/// [`bind_pagination`](crate::pagination::bind_pagination) and
/// [`BaseFilter::bind`](crate::filtering::BaseFilter::bind), which silently
/// fall back to defaults when a value is out of range or unparsable.
///
/// # Pagination
/// `page` is 1-based, `per_page` accepts values between 1 and 100.
///
/// # Search and sorting
/// `search` is matched as a substring against the resource's search fields.
/// `sort` names a column (letters, digits, `_` and `.` only) and `order` is
/// either `asc` or `desc`.
///
/// # Includes and filters
/// `includes` is a comma separated list of relations to eager-load, for example
/// `author,comments`. `filters` is a JSON-encoded array of conditions:
/// ```json
/// [{"field": "status", "operator": "eq", "value": "published"},
///  {"field": "views", "operator": "gte", "value": 100, "logic": "or"}]
/// ```
#[serde_as]
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Page number (1-based).
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[param(value_type = Option<u64>, example = 1)]
    pub page: Option<String>,
    /// Number of items per page, capped at 100.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[param(value_type = Option<u64>, example = 10)]
    pub per_page: Option<String>,
    /// Free text matched against the resource's search fields.
    #[serde(default)]
    #[param(example = "rust")]
    pub search: Option<String>,
    /// Column to sort by.
    #[serde(default)]
    #[param(example = "created_at")]
    pub sort: Option<String>,
    /// Sort direction, `asc` or `desc`.
    #[serde(default)]
    #[param(example = "desc")]
    pub order: Option<String>,
    /// Comma separated relations to eager-load.
    #[serde(default)]
    #[param(example = "author,comments")]
    pub includes: Option<String>,
    /// JSON-encoded array of filter conditions.
    #[serde(default)]
    #[param(example = r#"[{"field":"status","operator":"eq","value":"published"}]"#)]
    pub filters: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_numbers_deserialize_as_none() {
        let query: PaginationQuery = serde_json::from_value(serde_json::json!({
            "page": "",
            "per_page": "25"
        }))
        .unwrap();
        assert_eq!(query.page, None);
        assert_eq!(query.per_page.as_deref(), Some("25"));
        assert_eq!(query.search, None);
    }
}
