//! Error handling for the Metal Stock server
//!
//! Every failure leaves the handler as `{ "error": { code, message, field? } }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// A stock lot changed between read and write
    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock engine errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(resource.to_string())
    }

    pub fn lot_conflict(lot_id: uuid::Uuid) -> Self {
        AppError::Conflict {
            resource: "stock_lot".to_string(),
            message: format!("Stock lot {} was modified concurrently, retry the operation", lot_id),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub(crate) fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }

    pub(crate) fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

fn domain_error_detail(err: &DomainError) -> (StatusCode, ErrorDetail) {
    let message = err.to_string();
    match err {
        DomainError::UnsupportedShape(_) => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new("UNSUPPORTED_SHAPE", message).with_field("shape"),
        ),
        DomainError::MissingDimension { field, .. } | DomainError::InvalidDimension { field, .. } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new("INVALID_DIMENSION", message).with_field(*field),
        ),
        DomainError::NonFinite(_) => (StatusCode::BAD_REQUEST, ErrorDetail::new("NON_FINITE", message)),
        DomainError::InsufficientStock { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("INSUFFICIENT_STOCK", message).with_field("quantity"),
        ),
        DomainError::InvalidQuantity(_) => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new("VALIDATION_ERROR", message).with_field("quantity"),
        ),
        DomainError::UnitMismatch { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new("UNIT_MISMATCH", message).with_field("unit"),
        ),
        DomainError::ProjectClosed(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("PROJECT_CLOSED", message),
        ),
        DomainError::InvalidTransition { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("INVALID_STATE_TRANSITION", message).with_field("status"),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidToken(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", msg.clone()),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field.clone()),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_ENTRY", format!("A record with this {} already exists", field))
                    .with_field(field.clone()),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    &format!("{}_NOT_FOUND", resource.to_uppercase().replace(' ', "_")),
                    format!("{} not found", resource),
                ),
            ),
            AppError::Domain(err) => domain_error_detail(err),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Map a unique-key violation on insert to `DuplicateEntry(field)`
pub fn unique_violation(field: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::DuplicateEntry(field.to_string()),
        other => AppError::DatabaseError(other),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
