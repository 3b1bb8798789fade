//! Verification token store.

use sqlx::{SqliteConnection, SqliteExecutor};
use uuid::Uuid;

use crate::models::{EmailVerification, Purpose};

/// Opaque, unguessable token key.
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub async fn issue(
    conn: &mut SqliteConnection,
    email: &str,
    name: &str,
    purpose: Purpose,
) -> Result<EmailVerification, sqlx::Error> {
    let verification = EmailVerification::new(
        email.to_string(),
        name.to_string(),
        generate_token(),
        purpose,
    );

    sqlx::query(
        "INSERT INTO email_verifications (id, email, name, token_key, purpose, is_used, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&verification.id)
    .bind(&verification.email)
    .bind(&verification.name)
    .bind(&verification.token_key)
    .bind(verification.purpose)
    .bind(verification.is_used)
    .bind(&verification.created_at)
    .execute(conn)
    .await?;

    tracing::info!(email = %verification.email, purpose = ?purpose, "Issued verification token");
    Ok(verification)
}

pub async fn find<'e>(
    executor: impl SqliteExecutor<'e>,
    token_key: &str,
) -> Result<Option<EmailVerification>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM email_verifications WHERE token_key = ?")
        .bind(token_key)
        .fetch_optional(executor)
        .await
}

pub async fn mark_used(conn: &mut SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE email_verifications SET is_used = 1 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
