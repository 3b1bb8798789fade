use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::{notify_response, MessageBody};
use crate::error::AppError;
use crate::models::Purpose;
use crate::workflow::{self, TokenOutcome};
use crate::AppState;

#[derive(Deserialize)]
pub struct VerificationForm {
    email: String,
    name: String,
    #[serde(default)]
    purpose: i64,
}

#[derive(Deserialize)]
pub struct VerifyTokenForm {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verifications", post(send_verification))
        .route("/verifications/verify", post(verify_token))
}

async fn send_verification(
    State(state): State<AppState>,
    Json(form): Json<VerificationForm>,
) -> Result<impl IntoResponse, AppError> {
    if Purpose::try_from(form.purpose) != Ok(Purpose::Signup) {
        return Err(AppError::validation(
            "purpose",
            "Only signup verification can be requested here",
        ));
    }

    let outcome = workflow::send_verification(
        &state.db,
        state.mail.as_ref(),
        &state.config,
        &form.email,
        &form.name,
    )
    .await?;

    Ok(notify_response(outcome, "Token sent", "Mail sending failed"))
}

async fn verify_token(
    State(state): State<AppState>,
    Json(form): Json<VerifyTokenForm>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = workflow::consume_token(&state.db, &state.config, &form.token).await?;

    let body = match outcome {
        TokenOutcome::SignupVerified { email, name } => MessageBody {
            email: Some(email),
            name: Some(name),
            ..MessageBody::new("Account verified, continue to signup", StatusCode::OK)
        },
        TokenOutcome::AlreadyRegistered => {
            MessageBody::new("User already exists, please login", StatusCode::NO_CONTENT)
        }
        TokenOutcome::SignupToJoin { email, name } => MessageBody {
            email: Some(email),
            name: Some(name),
            ..MessageBody::new("Sign up to accept the invitation", StatusCode::OK)
        },
        TokenOutcome::MembershipAdded => {
            MessageBody::new("Invitation accepted, please login", StatusCode::NO_CONTENT)
        }
    };

    Ok(Json(body))
}
