use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use tower_sessions::Session;

use super::auth::password_problem;
use crate::auth::{login_user, AuthUser};
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::password::{hash_password, verify_password};
use crate::AppState;

#[derive(Deserialize)]
pub struct ProfileForm {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    old_password: String,
    new_password: String,
}

fn validate_profile_form(form: &ProfileForm, current: &User) -> HashMap<String, String> {
    let mut errors = HashMap::new();

    if let Some(email) = &form.email {
        if email.trim().to_lowercase() != current.email {
            errors.insert("email".to_string(), "Email cannot be updated".to_string());
        }
    }

    if let Some(first_name) = &form.first_name {
        if first_name.trim().is_empty() {
            errors.insert("first_name".to_string(), "First name is required".to_string());
        }
    }

    if let Some(message) = form.password.as_deref().and_then(password_problem) {
        errors.insert("password".to_string(), message.to_string());
    }

    errors
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(show_profile).patch(update_profile))
        .route("/users/me/password", post(change_password))
}

async fn show_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = db::find_user(&state.db, &user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    AuthUser(user): AuthUser,
    Json(form): Json<ProfileForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut current = db::find_user(&state.db, &user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    let errors = validate_profile_form(&form, &current);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if let Some(first_name) = form.first_name {
        current.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = form.last_name {
        current.last_name = last_name.trim().to_string();
    }
    if let Some(password) = form.password {
        current.password_hash = hash_password(&password)?;
    }
    current.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE users SET first_name = ?, last_name = ?, password_hash = ?, updated_at = ? WHERE id = ?"
    )
    .bind(&current.first_name)
    .bind(&current.last_name)
    .bind(&current.password_hash)
    .bind(&current.updated_at)
    .bind(&current.id)
    .execute(&state.db)
    .await?;

    login_user(&session, current.clone()).await?;
    Ok(Json(current))
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(form): Json<ChangePasswordForm>,
) -> Result<impl IntoResponse, AppError> {
    let current = db::find_user(&state.db, &user.id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !verify_password(&form.old_password, &current.password_hash) {
        return Err(AppError::validation("old_password", "Wrong password"));
    }
    if let Some(message) = password_problem(&form.new_password) {
        return Err(AppError::validation("new_password", message));
    }

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(hash_password(&form.new_password)?)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&current.id)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %current.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
