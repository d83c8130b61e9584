//! # Error Handling
//!
//! Two error types:
//!
//! - [`FilterError`]: the filter itself is malformed (bad path, value of the
//!   wrong shape for its operator, unknown field or relation, undecodable
//!   payload). Produced while a filter is deserialized or lowered to SQL.
//! - [`ApiError`]: what the host returns. Filter errors become `400 Bad Request`,
//!   database errors become `500` with the details logged but never sent to the
//!   client.
//!
//! Store errors are wrapped as they are; the engine never retries.
//!
//! ## Logging
//!
//! Internal error details are logged with the `tracing` crate when the error is
//! turned into a response. Install a subscriber in the host to see them:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_target(false)
//!     .compact()
//!     .init();
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

use crate::filtering::{FieldPath, Operator};

/// A filter that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field reference does not parse
    InvalidPath { path: String, reason: String },
    /// Value shape does not match the operator
    InvalidValue {
        field: String,
        operator: Operator,
        reason: String,
    },
    /// Field is not a column of the record
    UnknownField { field: String, table: String },
    /// Relation is not declared on the record
    UnknownRelation { relation: String, table: String },
    /// Relation uses a composite key
    UnsupportedRelationKey { relation: String },
    /// Sort, select or group path joins a relation with many rows per record
    ToManyJoin { relation: String },
    /// Sort, select or group path traverses more than one relation
    UnsupportedNestedPath { path: String },
    /// Encoded filter payload could not be decoded
    Decode { reason: String },
}

impl FilterError {
    pub(crate) fn invalid_path(path: &str, reason: &str) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_value(field: &FieldPath, operator: Operator, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            operator,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unknown_field(field: &str, table: &str) -> Self {
        Self::UnknownField {
            field: field.to_string(),
            table: table.to_string(),
        }
    }

    pub(crate) fn unknown_relation(relation: &str, table: &str) -> Self {
        Self::UnknownRelation {
            relation: relation.to_string(),
            table: table.to_string(),
        }
    }

    pub(crate) fn decode(reason: impl fmt::Display) -> Self {
        Self::Decode {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPath { path, reason } => write!(f, "Invalid field '{path}': {reason}"),
            Self::InvalidValue {
                field,
                operator,
                reason,
            } => write!(f, "Invalid value for '{field}' ({operator}): {reason}"),
            Self::UnknownField { field, table } => write!(f, "Unknown field '{field}' on {table}"),
            Self::UnknownRelation { relation, table } => {
                write!(f, "Unknown relation '{relation}' on {table}")
            }
            Self::UnsupportedRelationKey { relation } => {
                write!(f, "Relation '{relation}' uses a composite key and cannot be filtered")
            }
            Self::ToManyJoin { relation } => write!(
                f,
                "Relation '{relation}' has many rows per record; filter on it instead of sorting, selecting or grouping by it"
            ),
            Self::UnsupportedNestedPath { path } => {
                write!(f, "Cannot use '{path}' here: only one relation level is supported")
            }
            Self::Decode { reason } => write!(f, "Invalid filter: {reason}"),
        }
    }
}

impl std::error::Error for FilterError {}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - Resource doesn't exist
    NotFound {
        /// Resource type (e.g., "User", "Post")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 400 Bad Request - Invalid input from user
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::BadRequest { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
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

/// `DbErr::RecordNotFound` becomes 404; every other store error is a 500 that
/// keeps the original error for logging.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::NotFound {
                    resource: resource.to_string(),
                    id: None,
                }
            }
            _ => Self::database(err),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
        }
    }
}
