//! Typed error handling for resource views
//!
//! Every handler generated by the framework returns a [`ViewError`], which
//! renders itself as an HTTP response with a stable status code and error
//! code. Storage backends report [`PersistenceError`]s; the conversion
//! between the two is the error translator:
//!
//! - uniqueness, not-null and foreign-key violations become
//!   [`ViewError::ValidationFailed`] (422) carrying the driver message
//! - anything else is passed through untouched as [`ViewError::Internal`]
//!
//! # Example
//!
//! ```rust,ignore
//! use viewset::prelude::*;
//!
//! async fn rename(repo: &dyn Repository<Store>, id: Uuid) -> Result<Store, ViewError> {
//!     let mut changes = Changes::new();
//!     changes.insert("name".into(), json!("Main street"));
//!     // A duplicate name surfaces as a 422 here
//!     Ok(repo.update(&id, changes).await?)
//! }
//! ```

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Message returned for every authentication failure.
///
/// Identical for every failing factor (missing header, bad
/// signature, expired token, wrong kind, unknown subject).
pub const CREDENTIALS_MESSAGE: &str = "Could not validate credentials";

/// Client-facing error produced by the auth guard and the generated handlers
#[derive(Debug)]
pub enum ViewError {
    /// Missing, invalid, expired or wrong-kind token, or unknown subject
    Unauthenticated,

    /// Authenticated principal lacking the required privilege
    Forbidden,

    /// No instance with this identifier inside the caller's scope
    NotFound { resource: String, id: String },

    /// A persistence constraint rejected the write
    ValidationFailed { message: String },

    /// Unclassified storage or transport fault
    Internal(anyhow::Error),
}

impl ViewError {
    pub fn not_found(resource: impl Into<String>, id: impl fmt::Display) -> Self {
        ViewError::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ViewError::ValidationFailed {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ViewError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ViewError::Forbidden => StatusCode::FORBIDDEN,
            ViewError::NotFound { .. } => StatusCode::NOT_FOUND,
            ViewError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ViewError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ViewError::Unauthenticated => "UNAUTHENTICATED",
            ViewError::Forbidden => "FORBIDDEN",
            ViewError::NotFound { .. } => "NOT_FOUND",
            ViewError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ViewError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ViewError::NotFound { resource, id } => Some(serde_json::json!({
                "resource": resource,
                "id": id,
            })),
            _ => None,
        }
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::Unauthenticated => write!(f, "{}", CREDENTIALS_MESSAGE),
            ViewError::Forbidden => write!(f, "Not enough permissions"),
            ViewError::NotFound { id, .. } => write!(f, "Object with id {} does not exist!", id),
            ViewError::ValidationFailed { message } => write!(f, "{}", message),
            // Internal details stay in the logs
            ViewError::Internal(_) => write!(f, "Internal server error"),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        if let ViewError::Internal(err) = &self {
            tracing::error!(error = %err, "request failed with an internal error");
        }

        let status = self.status_code();
        let mut response = (status, Json(self.to_response())).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<anyhow::Error> for ViewError {
    fn from(err: anyhow::Error) -> Self {
        ViewError::Internal(err)
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(err: serde_json::Error) -> Self {
        ViewError::Internal(err.into())
    }
}

// =============================================================================
// Persistence errors
// =============================================================================

/// Errors reported by a [`Repository`](crate::core::repository::Repository)
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A unique constraint rejected the write
    #[error("{message}")]
    UniqueViolation { message: String },

    /// A required column was missing or null
    #[error("{message}")]
    NotNullViolation { message: String },

    /// A reference pointed at a missing row
    #[error("{message}")]
    ForeignKeyViolation { message: String },

    /// Anything the translator does not classify
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PersistenceError {
    /// Whether this error is a constraint violation the client can act on
    pub fn is_constraint_violation(&self) -> bool {
        !matches!(self, PersistenceError::Other(_))
    }
}

/// Translate a persistence failure into a client-facing error
///
/// Constraint violations keep the underlying driver message for display;
/// everything else becomes an internal error.
pub fn translate(err: PersistenceError) -> ViewError {
    match err {
        PersistenceError::UniqueViolation { message }
        | PersistenceError::NotNullViolation { message }
        | PersistenceError::ForeignKeyViolation { message } => {
            ViewError::ValidationFailed { message }
        }
        PersistenceError::Other(e) => ViewError::Internal(e),
    }
}

impl From<PersistenceError> for ViewError {
    fn from(err: PersistenceError) -> Self {
        translate(err)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(db) = &err {
            let message = db.message().to_string();
            match db.kind() {
                ErrorKind::UniqueViolation => return PersistenceError::UniqueViolation { message },
                ErrorKind::NotNullViolation => {
                    return PersistenceError::NotNullViolation { message };
                }
                ErrorKind::ForeignKeyViolation => {
                    return PersistenceError::ForeignKeyViolation { message };
                }
                _ => {}
            }
        }

        PersistenceError::Other(err.into())
    }
}

/// A specialized Result type for view handlers
pub type ViewResult<T> = Result<T, ViewError>;
