//! # Error Handling
//!
//! Two layers of errors:
//! - [`PaginationError`] is returned by the paginated executor and names the
//!   phase (count or fetch) that failed.
//! - [`ApiError`] is the HTTP-facing error. It maps to a status code, logs
//!   internal details through `tracing`, and only ever sends a sanitized
//!   message to the client.
//!
//! ```rust,ignore
//! async fn list_posts(
//!     State(db): State<Arc<DatabaseConnection>>,
//!     request: PaginationRequest,
//! ) -> Result<PaginatedResponse<Vec<PostRow>>, ApiError> {
//!     let builder = SimpleQueryBuilder::new("posts").with_search_fields(["title"]);
//!     let (rows, total) = paginated_query::<PostRow, _>(&db, &builder, &request, &[]).await?;
//!     Ok(list_response(200, "Posts retrieved", rows, total, &request))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a paginated listing. Partial results are never returned.
#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("database connection not provided")]
    MissingConnection,
    #[error("failed to count records: {0}")]
    Count(#[source] DbErr),
    #[error("failed to fetch records: {0}")]
    Fetch(#[source] DbErr),
}

impl PaginationError {
    /// Which step of the listing failed: `connection`, `count` or `fetch`.
    #[must_use]
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::MissingConnection => "connection",
            Self::Count(_) => "count",
            Self::Fetch(_) => "fetch",
        }
    }
}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 500 Internal Server Error - database failure (details logged, not exposed)
    Database {
        message: String,
        internal: DbErr,
        /// Listing phase the error came from, if any.
        phase: Option<&'static str>,
    },

    /// 500 Internal Server Error
    Internal {
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    /// The database error details are logged but NOT sent to the user.
    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
            phase: None,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Sanitized message sent to the client.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database { message, .. } | Self::Internal { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database {
                internal,
                phase: Some(phase),
                ..
            } => {
                tracing::error!(error = ?internal, phase = *phase, "Database error occurred");
            }
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            Self::Internal { internal: None, .. } => {
                tracing::error!(error = %self.user_message(), "Internal error occurred");
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// Any `DbErr`, e.g. from a [`Preload`](crate::query::Preload) call made by a
/// handler, becomes a sanitized 500.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        Self::database(err)
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        let phase = err.phase();
        match err {
            PaginationError::MissingConnection => Self::internal(
                "Failed to list records",
                Some(PaginationError::MissingConnection.to_string()),
            ),
            PaginationError::Count(internal) | PaginationError::Fetch(internal) => Self::Database {
                message: "A database error occurred".to_string(),
                internal,
                phase: Some(phase),
            },
        }
    }
}
