use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Pokerboard, Role, UserPokerboard};
use crate::AppState;

#[derive(Serialize)]
struct PokerboardView {
    #[serde(flatten)]
    pokerboard: Pokerboard,
    members: Vec<MemberView>,
}

#[derive(Serialize, FromRow)]
struct MemberView {
    user_id: String,
    email: String,
    role: Role,
}

#[derive(Deserialize)]
pub struct PokerboardForm {
    title: String,
    #[serde(default)]
    description: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pokerboards", post(create_pokerboard))
        .route("/pokerboards/{id}", get(show_pokerboard))
}

async fn create_pokerboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(form): Json<PokerboardForm>,
) -> Result<impl IntoResponse, AppError> {
    if form.title.trim().is_empty() {
        return Err(AppError::validation("title", "Title is required"));
    }

    let pokerboard = Pokerboard::new(user.id.clone(), form.title.trim().to_string(), form.description);
    let manager = UserPokerboard::new(pokerboard.id.clone(), user.id.clone(), Role::Manager);

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO pokerboards (id, manager_id, title, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(&pokerboard.id)
    .bind(&pokerboard.manager_id)
    .bind(&pokerboard.title)
    .bind(&pokerboard.description)
    .bind(&pokerboard.created_at)
    .bind(&pokerboard.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_pokerboards (pokerboard_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
        .bind(&manager.pokerboard_id)
        .bind(&manager.user_id)
        .bind(manager.role)
        .bind(&manager.joined_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(pokerboard)))
}

async fn show_pokerboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let pokerboard: Option<Pokerboard> = sqlx::query_as(
        r#"
        SELECT p.* FROM pokerboards p
        WHERE p.id = ? AND (p.manager_id = ? OR p.id IN (
            SELECT pokerboard_id FROM user_pokerboards WHERE user_id = ?
        ))
        "#
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&user.id)
    .fetch_optional(&state.db)
    .await?;

    let Some(pokerboard) = pokerboard else {
        return Err(AppError::NotFound);
    };

    let members: Vec<MemberView> = sqlx::query_as(
        r#"
        SELECT up.user_id, u.email, up.role FROM user_pokerboards up
        JOIN users u ON u.id = up.user_id
        WHERE up.pokerboard_id = ?
        ORDER BY u.email, up.role
        "#
    )
    .bind(&pokerboard.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(PokerboardView { pokerboard, members }))
}
