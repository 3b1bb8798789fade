use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::notify_response;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{Decision, InvitationStatus, InviteTarget, Role};
use crate::workflow;
use crate::AppState;

#[derive(Deserialize)]
pub struct InvitationForm {
    email: String,
    purpose: i64,
    id: String,
}

#[derive(Deserialize)]
pub struct RoleQuery {
    role: Option<String>,
}

#[derive(Deserialize)]
pub struct ResponseForm {
    status: Decision,
}

/// Group invitation as listed to the invitee.
#[derive(Serialize, FromRow)]
struct ReceivedGroupInvitation {
    id: String,
    group_id: String,
    group_title: String,
    status: InvitationStatus,
    created_at: String,
}

#[derive(Serialize, FromRow)]
struct ReceivedPokerboardInvitation {
    id: String,
    pokerboard_id: String,
    pokerboard_title: String,
    role: Role,
    status: InvitationStatus,
    created_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/invitations", post(send_invitation))
        .route("/invitations/groups", get(received_group_invitations))
        .route(
            "/invitations/groups/{id}",
            post(respond_group).delete(cancel_group),
        )
        .route("/invitations/pokerboards", get(received_pokerboard_invitations))
        .route(
            "/invitations/pokerboards/{id}",
            post(respond_pokerboard).delete(cancel_pokerboard),
        )
}

async fn send_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<RoleQuery>,
    Json(form): Json<InvitationForm>,
) -> Result<impl IntoResponse, AppError> {
    let target = InviteTarget::from_request(form.purpose, Some(&form.id), query.role.as_deref())
        .map_err(AppError::Validation)?;

    let outcome = workflow::create_invitation(
        &state.db,
        state.mail.as_ref(),
        &state.config,
        &user,
        &form.email,
        target,
    )
    .await?;

    Ok(notify_response(outcome, "Invited", "Invitation failed"))
}

async fn received_group_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let invitations: Vec<ReceivedGroupInvitation> = sqlx::query_as(
        r#"
        SELECT gi.id, gi.group_id, g.title AS group_title, gi.status, gi.created_at
        FROM group_invitations gi
        JOIN user_groups g ON g.id = gi.group_id
        WHERE gi.user_id = ? OR (gi.user_id IS NULL AND gi.invitee_email = ?)
        ORDER BY gi.created_at DESC
        "#
    )
    .bind(&user.id)
    .bind(&user.email)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(invitations))
}

async fn received_pokerboard_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let invitations: Vec<ReceivedPokerboardInvitation> = sqlx::query_as(
        r#"
        SELECT pi.id, pi.pokerboard_id, p.title AS pokerboard_title, pi.role, pi.status, pi.created_at
        FROM pokerboard_invitations pi
        JOIN pokerboards p ON p.id = pi.pokerboard_id
        WHERE pi.user_id = ? OR (pi.user_id IS NULL AND pi.invitee_email = ?)
        ORDER BY pi.created_at DESC
        "#
    )
    .bind(&user.id)
    .bind(&user.email)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(invitations))
}

async fn respond_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(form): Json<ResponseForm>,
) -> Result<impl IntoResponse, AppError> {
    let invitation =
        workflow::respond_to_group_invitation(&state.db, &user, &id, form.status).await?;
    Ok(Json(invitation))
}

async fn cancel_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = workflow::cancel_group_invitation(&state.db, &user, &id).await?;
    Ok(Json(invitation))
}

async fn respond_pokerboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(form): Json<ResponseForm>,
) -> Result<impl IntoResponse, AppError> {
    let invitation =
        workflow::respond_to_pokerboard_invitation(&state.db, &user, &id, form.status).await?;
    Ok(Json(invitation))
}

async fn cancel_pokerboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = workflow::cancel_pokerboard_invitation(&state.db, &user, &id).await?;
    Ok(Json(invitation))
}
