use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::password::verify_password;

const USER_KEY: &str = "user";

pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let user: Option<User> = session.get(USER_KEY).await.ok().flatten();

        user.map(AuthUser).ok_or(AppError::Unauthorized)
    }
}

/// Looks up the account for `email` and checks its password.
pub async fn authenticate(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>, sqlx::Error> {
    let email = email.trim().to_lowercase();
    let user = db::find_user_by_email(pool, &email).await?;
    Ok(user.filter(|u| verify_password(password, &u.password_hash)))
}

/// Stores `user` in the session. Called again after profile changes to
/// refresh the cached copy.
pub async fn login_user(session: &Session, user: User) -> Result<(), tower_sessions::session::Error> {
    session.insert(USER_KEY, user).await
}

pub async fn logout_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
