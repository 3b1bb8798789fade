use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use tower_sessions::Session;

use crate::auth::{authenticate, login_user, logout_user};
use crate::db;
use crate::error::{on_unique_violation, AppError};
use crate::models::User;
use crate::password::hash_password;
use crate::workflow::{self, normalize_email};
use crate::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    email: String,
    first_name: String,
    #[serde(default)]
    last_name: String,
    password: String,
    #[serde(default)]
    token: Option<String>,
}

fn validate_signup_form(form: &SignupForm) -> HashMap<String, String> {
    let mut errors = HashMap::new();

    if let Err(AppError::Validation(email_errors)) = normalize_email(&form.email) {
        errors.extend(email_errors);
    }

    if form.first_name.trim().is_empty() {
        errors.insert("first_name".to_string(), "First name is required".to_string());
    }

    if form.first_name.len() > 150 || form.last_name.len() > 150 {
        errors.insert("name".to_string(), "Names must be under 150 characters".to_string());
    }

    if let Some(message) = password_problem(&form.password) {
        errors.insert("password".to_string(), message.to_string());
    }

    errors
}

pub fn password_problem(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Some("Password must be at least 8 characters")
    } else if password.len() > 128 {
        Some("Password must be at most 128 characters")
    } else {
        None
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login_submit))
        .route("/logout", post(logout))
}

async fn signup(
    State(state): State<AppState>,
    Json(form): Json<SignupForm>,
) -> Result<impl IntoResponse, AppError> {
    let errors = validate_signup_form(&form);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let email = normalize_email(&form.email)?;
    let user = User::new(
        email,
        form.first_name.trim().to_string(),
        form.last_name.trim().to_string(),
        hash_password(&form.password)?,
    );

    let mut tx = state.db.begin().await?;

    if db::find_user_by_email(&mut *tx, &user.email).await?.is_some() {
        return Err(AppError::validation("email", "User already exists"));
    }
    db::insert_user(&mut tx, &user)
        .await
        .map_err(|e| on_unique_violation(e, AppError::validation("email", "User already exists")))?;

    workflow::complete_signup(&mut tx, &state.config, &user, form.token.as_deref()).await?;

    tx.commit().await?;
    tracing::info!(user_id = %user.id, "User signed up");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&state.db, &form.email, &form.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    login_user(&session, user.clone()).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(user))
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_user(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
