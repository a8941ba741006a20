use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::models::PaginationQuery;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// Largest OFFSET or LIMIT the database drivers accept (a signed 64-bit integer).
pub const MAX_ROW_BOUND: u64 = i64::MAX.unsigned_abs();

/// Sort direction accepted from the `order` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse an order keyword. Only the exact lowercase forms are accepted.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized pagination, search and sort parameters for one listing request.
///
/// After [`validate`](Self::validate) the request always satisfies
/// `page >= 1`, `1 <= per_page <= 100` and an offset no larger than
/// [`MAX_ROW_BOUND`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationRequest {
    pub page: u64,
    pub per_page: u64,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            search: String::new(),
            sort: String::new(),
            order: SortOrder::Asc,
        }
    }
}

impl PaginationRequest {
    /// Number of rows to skip. A page of 0 is treated as the first page.
    /// Saturates at [`MAX_ROW_BOUND`].
    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1)
            .saturating_mul(self.limit())
            .min(MAX_ROW_BOUND)
    }

    /// Number of rows to take. A `per_page` of 0 falls back to the default.
    #[must_use]
    pub fn limit(&self) -> u64 {
        if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page.min(MAX_ROW_BOUND)
        }
    }

    /// Whether the page starts beyond the last row a database can address.
    fn page_overflows(&self) -> bool {
        (self.page.max(1) - 1)
            .checked_mul(self.limit())
            .is_none_or(|offset| offset > MAX_ROW_BOUND)
    }

    /// Coerce out-of-range values to safe defaults. Idempotent.
    pub fn validate(&mut self) {
        if self.page == 0 {
            self.page = DEFAULT_PAGE;
        }
        if self.per_page == 0 {
            self.per_page = DEFAULT_PER_PAGE;
        }
        if self.per_page > MAX_PER_PAGE {
            self.per_page = MAX_PER_PAGE;
        }
        if self.page_overflows() {
            self.page = DEFAULT_PAGE;
        }
    }

    #[must_use]
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }
}

/// Bind a [`PaginationRequest`] from raw query parameters.
///
/// Values that do not parse, or fall outside their allowed range, are ignored
/// and the default is kept. A page whose offset a database could not address
/// is out of range too. This never fails.
#[must_use]
pub fn bind_pagination(raw: &PaginationQuery) -> PaginationRequest {
    let mut pagination = PaginationRequest::default();

    if let Some(page) = raw.page.as_deref().and_then(|p| p.trim().parse::<u64>().ok())
        && page > 0
    {
        pagination.page = page;
    }

    if let Some(per_page) = raw
        .per_page
        .as_deref()
        .and_then(|p| p.trim().parse::<u64>().ok())
        && (1..=MAX_PER_PAGE).contains(&per_page)
    {
        pagination.per_page = per_page;
    }

    pagination.search = raw.search.clone().unwrap_or_default();
    pagination.sort = raw.sort.clone().unwrap_or_default();

    if let Some(order) = raw.order.as_deref().and_then(SortOrder::parse) {
        pagination.order = order;
    }

    pagination.validated()
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationResponse {
    pub page: u64,
    pub per_page: u64,
    pub max_page: u64,
    pub total: u64,
}

/// Compute pagination metadata for `total_count` matching rows.
///
/// `max_page` is never lower than 1, even when nothing matched.
#[must_use]
pub fn calculate_pagination(pagination: &PaginationRequest, total_count: u64) -> PaginationResponse {
    let per_page = pagination.limit();
    let max_page = total_count.div_ceil(per_page).max(1);

    PaginationResponse {
        page: pagination.page.max(1),
        per_page,
        max_page,
        total: total_count,
    }
}

/// Response envelope for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub code: u16,
    pub status: String,
    pub message: String,
    pub data: T,
    pub pagination: PaginationResponse,
}

impl<T> PaginatedResponse<T> {
    pub fn new(code: u16, message: impl Into<String>, data: T, pagination: PaginationResponse) -> Self {
        let status = if code >= 400 { "error" } else { "success" };
        Self {
            code,
            status: status.to_string(),
            message: message.into(),
            data,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> PaginationQuery {
        let mut query = PaginationQuery::default();
        for (key, value) in pairs {
            let value = Some((*value).to_string());
            match *key {
                "page" => query.page = value,
                "per_page" => query.per_page = value,
                "search" => query.search = value,
                "sort" => query.sort = value,
                "order" => query.order = value,
                _ => unreachable!("unknown key {key}"),
            }
        }
        query
    }

    #[test]
    fn test_bind_defaults() {
        let pagination = bind_pagination(&PaginationQuery::default());
        assert_eq!(pagination, PaginationRequest::default());
        assert_eq!(pagination.offset(), 0);
        assert_eq!(pagination.limit(), 10);
    }

    #[test]
    fn test_bind_valid_values() {
        let pagination = bind_pagination(&raw(&[
            ("page", "3"),
            ("per_page", "25"),
            ("search", "rust"),
            ("sort", "created_at"),
            ("order", "desc"),
        ]));
        assert_eq!(pagination.page, 3);
        assert_eq!(pagination.per_page, 25);
        assert_eq!(pagination.search, "rust");
        assert_eq!(pagination.sort, "created_at");
        assert_eq!(pagination.order, SortOrder::Desc);
        assert_eq!(pagination.offset(), 50);
    }

    #[test]
    fn test_bind_ignores_out_of_range_and_garbage() {
        let cases = [
            ("page", "0"),
            ("page", "-4"),
            ("page", "abc"),
            ("per_page", "0"),
            ("per_page", "101"),
            ("per_page", "1e3"),
            ("order", "DESC"),
            ("order", "sideways"),
        ];
        for (key, value) in cases {
            let pagination = bind_pagination(&raw(&[(key, value)]));
            assert_eq!(pagination.page, 1, "{key}={value}");
            assert_eq!(pagination.per_page, 10, "{key}={value}");
            assert_eq!(pagination.order, SortOrder::Asc, "{key}={value}");
        }
    }

    #[test]
    fn test_bind_ignores_pages_past_addressable_rows() {
        let pagination = bind_pagination(&raw(&[("page", "18446744073709551615")]));
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.offset(), 0);

        // (922337203685477581 - 1) * 10 still fits an i64, one page more does not.
        let last = bind_pagination(&raw(&[("page", "922337203685477581")]));
        assert_eq!(last.page, 922_337_203_685_477_581);
        assert_eq!(last.offset(), 9_223_372_036_854_775_800);
        let past = bind_pagination(&raw(&[("page", "922337203685477582")]));
        assert_eq!(past.page, 1);
    }

    #[test]
    fn test_offset_saturates_at_row_bound() {
        let request = PaginationRequest {
            page: u64::MAX,
            per_page: u64::MAX,
            ..Default::default()
        };
        assert_eq!(request.offset(), MAX_ROW_BOUND);
        assert_eq!(request.limit(), MAX_ROW_BOUND);
        assert_eq!(MAX_ROW_BOUND, 9_223_372_036_854_775_807);

        let validated = request.validated();
        assert_eq!(validated.per_page, MAX_PER_PAGE);
        assert_eq!(validated.page, 1);
        assert_eq!(validated.offset(), 0);
    }

    #[test]
    fn test_bind_accepts_per_page_boundaries() {
        assert_eq!(bind_pagination(&raw(&[("per_page", "1")])).per_page, 1);
        assert_eq!(bind_pagination(&raw(&[("per_page", "100")])).per_page, 100);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut request = PaginationRequest {
            page: 0,
            per_page: 500,
            ..Default::default()
        };
        request.validate();
        let once = request.clone();
        request.validate();
        assert_eq!(request, once);
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, 100);
    }

    #[test]
    fn test_offset_and_limit_coerce_zero() {
        let request = PaginationRequest {
            page: 0,
            per_page: 0,
            ..Default::default()
        };
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn test_calculate_pagination() {
        let request = PaginationRequest {
            page: 2,
            per_page: 10,
            ..Default::default()
        };
        assert_eq!(calculate_pagination(&request, 25).max_page, 3);
        assert_eq!(calculate_pagination(&request, 30).max_page, 3);
        assert_eq!(calculate_pagination(&request, 31).max_page, 4);

        let empty = calculate_pagination(&request, 0);
        assert_eq!(empty.max_page, 1);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.page, 2);
    }

    #[test]
    fn test_envelope_status() {
        let meta = calculate_pagination(&PaginationRequest::default(), 0);
        let ok = PaginatedResponse::new(200, "ok", Vec::<u8>::new(), meta);
        assert_eq!(ok.status, "success");
        let failed = PaginatedResponse::new(500, "boom", Vec::<u8>::new(), meta);
        assert_eq!(failed.status, "error");
    }

    #[test]
    fn test_request_serializes_snake_case() {
        let json = serde_json::to_value(PaginationRequest::default()).unwrap();
        assert_eq!(json["per_page"], 10);
        assert_eq!(json["order"], "asc");
    }
}
