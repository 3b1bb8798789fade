use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(HashMap<String, String>),
    #[error("user already invited")]
    DuplicateInvitation,
    #[error("token not found")]
    TokenNotFound,
    #[error("token expired or already used")]
    TokenExpiredOrUsed,
    #[error("invitation cancelled")]
    InvitationCancelled,
    #[error("invitation declined")]
    InvitationDeclined,
    #[error("invitation is not pending")]
    InvalidState,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthorized,
    #[error("permission denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("password hashing error: {0}")]
    Password(String),
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), message.to_string());
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateInvitation
            | AppError::TokenNotFound
            | AppError::TokenExpiredOrUsed
            | AppError::InvitationCancelled
            | AppError::InvitationDeclined
            | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::InvalidState => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Session(_) | AppError::Password(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Internal failures never leak details.
    pub fn message(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid input",
            AppError::DuplicateInvitation => "User already invited",
            AppError::TokenNotFound => "Invalid token",
            AppError::TokenExpiredOrUsed => "Token expired or already used",
            AppError::InvitationCancelled => "Invitation has been cancelled",
            AppError::InvitationDeclined => "Invitation has been declined",
            AppError::InvalidState => "Invitation is no longer pending",
            AppError::InvalidCredentials => "Invalid credentials",
            AppError::Unauthorized => "Authentication required",
            AppError::Forbidden => "Permission denied",
            AppError::NotFound => "Not found",
            AppError::Database(_) | AppError::Session(_) | AppError::Password(_) => {
                "Internal server error"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {e}"),
            AppError::Session(e) => tracing::error!("Session error: {e}"),
            AppError::Password(e) => tracing::error!("Password hashing error: {e}"),
            _ => {}
        }

        let body = match self {
            AppError::Validation(errors) => json!({
                "message": "Invalid input",
                "errors": errors,
                "status": status.as_u16(),
            }),
            other => json!({
                "message": other.message(),
                "status": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Maps a unique-constraint violation to `conflict`, passing other database
/// errors through.
pub fn on_unique_violation(e: sqlx::Error, conflict: AppError) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict,
        _ => AppError::Database(e),
    }
}
