use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::auth::AuthUser;
use crate::db;
use crate::error::{on_unique_violation, AppError};
use crate::models::{Group, GroupMember, InvitationStatus, UserSummary};
use crate::AppState;

#[derive(Serialize)]
struct GroupView {
    id: String,
    admin: UserSummary,
    title: String,
    description: String,
    users: Vec<UserSummary>,
}

/// Invitation as listed to the group admin.
#[derive(Serialize, FromRow)]
struct SentInvitationView {
    id: String,
    group_id: String,
    invitee_email: String,
    status: InvitationStatus,
    created_at: String,
}

#[derive(Deserialize)]
pub struct GroupForm {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    users: Vec<String>,
}

#[derive(Deserialize)]
pub struct GroupUpdateForm {
    title: Option<String>,
    description: Option<String>,
    users: Option<Vec<String>>,
    admin: Option<String>,
}

fn validate_title(title: &str, errors: &mut HashMap<String, String>) {
    if title.trim().is_empty() {
        errors.insert("title".to_string(), "Title is required".to_string());
    }

    if title.len() > 100 {
        errors.insert("title".to_string(), "Title must be under 100 characters".to_string());
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/{id}", get(show_group).patch(update_group))
        .route("/groups/{id}/invitations", get(list_sent_invitations))
}

async fn load_view(conn: &mut SqliteConnection, group: Group) -> Result<GroupView, AppError> {
    let admin: UserSummary = sqlx::query_as("SELECT id, email, first_name, last_name FROM users WHERE id = ?")
        .bind(&group.admin_id)
        .fetch_one(&mut *conn)
        .await?;

    let users: Vec<UserSummary> = sqlx::query_as(
        r#"
        SELECT u.id, u.email, u.first_name, u.last_name FROM users u
        JOIN group_members gm ON gm.user_id = u.id
        WHERE gm.group_id = ?
        ORDER BY u.email
        "#
    )
    .bind(&group.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(GroupView {
        id: group.id,
        admin,
        title: group.title,
        description: group.description,
        users,
    })
}

async fn add_members(
    conn: &mut SqliteConnection,
    group_id: &str,
    user_ids: &[String],
) -> Result<(), AppError> {
    for user_id in user_ids {
        if db::find_user(&mut *conn, user_id).await?.is_none() {
            return Err(AppError::validation("users", &format!("Unknown user: {user_id}")));
        }
        let member = GroupMember::new(group_id.to_string(), user_id.clone());
        sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&member.group_id)
            .bind(&member.user_id)
            .bind(&member.joined_at)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn list_groups(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let groups: Vec<Group> = sqlx::query_as(
        r#"
        SELECT g.* FROM user_groups g
        WHERE g.admin_id = ? OR g.id IN (SELECT group_id FROM group_members WHERE user_id = ?)
        ORDER BY g.title
        "#
    )
    .bind(&user.id)
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let mut conn = state.db.acquire().await?;
    let mut views = Vec::with_capacity(groups.len());
    for group in groups {
        views.push(load_view(&mut conn, group).await?);
    }
    Ok(Json(views))
}

async fn create_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(form): Json<GroupForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = HashMap::new();
    validate_title(&form.title, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let group = Group::new(user.id.clone(), form.title.trim().to_string(), form.description);

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO user_groups (id, admin_id, title, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(&group.id)
    .bind(&group.admin_id)
    .bind(&group.title)
    .bind(&group.description)
    .bind(&group.created_at)
    .bind(&group.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| on_unique_violation(e, AppError::validation("title", "A group with this title already exists")))?;

    // The admin is always a member of their own group.
    let mut members = form.users;
    if !members.contains(&user.id) {
        members.push(user.id.clone());
    }
    add_members(&mut tx, &group.id, &members).await?;

    let view = load_view(&mut tx, group).await?;
    tx.commit().await?;

    tracing::info!(group_id = %view.id, admin_id = %user.id, "Created group");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn show_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    // Verify user has access (admin or member)
    let group: Option<Group> = sqlx::query_as(
        r#"
        SELECT g.* FROM user_groups g
        WHERE g.id = ? AND (g.admin_id = ? OR g.id IN (
            SELECT group_id FROM group_members WHERE user_id = ?
        ))
        "#
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&user.id)
    .fetch_optional(&state.db)
    .await?;

    let group = group.ok_or(AppError::NotFound)?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(load_view(&mut conn, group).await?))
}

async fn update_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(form): Json<GroupUpdateForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.db.begin().await?;

    let mut group: Group = sqlx::query_as("SELECT * FROM user_groups WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;
    if group.admin_id != user.id {
        return Err(AppError::Forbidden);
    }

    let mut errors = HashMap::new();
    if let Some(admin) = &form.admin {
        if *admin != group.admin_id {
            errors.insert("admin".to_string(), "Admin cannot be updated".to_string());
        }
    }
    if let Some(title) = &form.title {
        validate_title(title, &mut errors);
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if let Some(title) = form.title {
        group.title = title.trim().to_string();
    }
    if let Some(description) = form.description {
        group.description = description;
    }
    group.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE user_groups SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&group.title)
        .bind(&group.description)
        .bind(&group.updated_at)
        .bind(&group.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_unique_violation(e, AppError::validation("title", "A group with this title already exists")))?;

    // Members are only ever added through an update, never removed.
    if let Some(users) = form.users {
        add_members(&mut tx, &group.id, &users).await?;
    }

    let view = load_view(&mut tx, group).await?;
    tx.commit().await?;
    Ok(Json(view))
}

async fn list_sent_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let group: Group = sqlx::query_as("SELECT * FROM user_groups WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;
    if group.admin_id != user.id {
        return Err(AppError::Forbidden);
    }

    let invitations: Vec<SentInvitationView> = sqlx::query_as(
        "SELECT id, group_id, invitee_email, status, created_at FROM group_invitations WHERE group_id = ? ORDER BY created_at DESC"
    )
    .bind(&group.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(invitations))
}
