pub mod auth;
pub mod groups;
pub mod invitations;
pub mod pokerboards;
pub mod users;
pub mod verification;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::mail::MailError;
use crate::workflow::NotifyOutcome;

/// `{message, email?, name?, status}` body shared by the token endpoints.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: u16,
}

impl MessageBody {
    pub fn new(message: &str, status: StatusCode) -> Self {
        Self {
            message: message.to_string(),
            email: None,
            name: None,
            status: status.as_u16(),
        }
    }
}

/// Renders a write-and-notify outcome. `failed` is the message for
/// non-transport failures.
pub fn notify_response(outcome: NotifyOutcome, sent: &str, failed: &str) -> Response {
    let (status, message) = match outcome {
        NotifyOutcome::Committed => (StatusCode::CREATED, sent),
        NotifyOutcome::RolledBack(MailError::Transport(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "There was an error sending an email.",
        ),
        NotifyOutcome::RolledBack(MailError::Other(_)) => (StatusCode::SERVICE_UNAVAILABLE, failed),
    };
    (status, Json(MessageBody::new(message, status))).into_response()
}
