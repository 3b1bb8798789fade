//! Verification and invitation workflow.
//!
//! Every mutating operation runs inside one transaction. Operations that
//! notify by mail commit only after the message has been handed to the
//! [`MailQueue`]; a failed hand-off rolls the whole write back and is
//! reported as [`NotifyOutcome::RolledBack`].

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqliteExecutor, SqlitePool, Transaction};

use crate::config::Config;
use crate::db;
use crate::error::{on_unique_violation, AppError};
use crate::mail::templates::{GroupInvitationEmail, PokerboardInvitationEmail, VerificationEmail};
use crate::mail::{MailError, MailQueue, OutgoingMail};
use crate::models::{
    Decision, EmailVerification, Group, GroupInvitation, GroupMember, InvitationStatus,
    InviteTarget, Pokerboard, PokerboardInvitation, Purpose, User, UserPokerboard,
};
use crate::tokens;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Committed,
    RolledBack(MailError),
}

/// Result of following a verification link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    /// Signup token is valid; the caller continues to the signup form.
    SignupVerified { email: String, name: String },
    /// Signup token for an email that already has an account.
    AlreadyRegistered,
    /// Invitation for someone without an account; resolved at signup.
    SignupToJoin { email: String, name: String },
    /// Invitation accepted for an existing account.
    MembershipAdded,
}

#[derive(Debug, Clone, Copy)]
enum InvitationTable {
    Group,
    Pokerboard,
}

impl InvitationTable {
    fn name(self) -> &'static str {
        match self {
            InvitationTable::Group => "group_invitations",
            InvitationTable::Pokerboard => "pokerboard_invitations",
        }
    }
}

/// Lowercases and validates an email address.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    email
        .parse::<lettre::Address>()
        .map_err(|_| AppError::validation("email", "Enter a valid email address"))?;
    Ok(email)
}

pub async fn send_verification(
    pool: &SqlitePool,
    queue: &dyn MailQueue,
    config: &Config,
    email: &str,
    name: &str,
) -> Result<NotifyOutcome, AppError> {
    let email = normalize_email(email)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name", "Name is required"));
    }

    let mut tx = pool.begin().await?;

    if db::find_user_by_email(&mut *tx, &email).await?.is_some() {
        return Err(AppError::validation("email", "User already exists"));
    }

    let verification = tokens::issue(&mut tx, &email, name, Purpose::Signup).await?;
    let link = config.signup_link(&verification.token_key);
    let mail = VerificationEmail {
        name,
        link: &link,
        expiry_minutes: config.token_expiry_minutes,
    }
    .to_mail(&email);

    notify(tx, queue, mail).await
}

pub async fn create_invitation(
    pool: &SqlitePool,
    queue: &dyn MailQueue,
    config: &Config,
    inviter: &User,
    email: &str,
    target: InviteTarget,
) -> Result<NotifyOutcome, AppError> {
    let email = normalize_email(email)?;
    let inviter_name = match inviter.full_name() {
        name if name.is_empty() => inviter.email.clone(),
        name => name,
    };

    let mut tx = pool.begin().await?;
    let invitee_id = db::find_user_by_email(&mut *tx, &email).await?.map(|u| u.id);
    let purpose = target.purpose();

    let mail = match target {
        InviteTarget::Signup => {
            return Err(AppError::validation("purpose", "Signup is not an invitation"));
        }
        InviteTarget::Group { group_id } => {
            let group: Group = sqlx::query_as("SELECT * FROM user_groups WHERE id = ?")
                .bind(&group_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound)?;
            if group.admin_id != inviter.id {
                return Err(AppError::Forbidden);
            }

            let (pending,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM group_invitations WHERE invitee_email = ? AND group_id = ? AND status = 'pending'"
            )
            .bind(&email)
            .bind(&group.id)
            .fetch_one(&mut *tx)
            .await?;
            if pending > 0 {
                return Err(AppError::DuplicateInvitation);
            }

            let verification = tokens::issue(&mut tx, &email, "", purpose).await?;
            let invitation = GroupInvitation::new(
                group.id.clone(),
                invitee_id,
                email.clone(),
                verification.id.clone(),
            );
            sqlx::query(
                "INSERT INTO group_invitations (id, group_id, user_id, invitee_email, verification_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(&invitation.id)
            .bind(&invitation.group_id)
            .bind(&invitation.user_id)
            .bind(&invitation.invitee_email)
            .bind(&invitation.verification_id)
            .bind(invitation.status)
            .bind(&invitation.created_at)
            .bind(&invitation.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| on_unique_violation(e, AppError::DuplicateInvitation))?;

            tracing::info!(group_id = %group.id, invitee = %email, "Created group invitation");

            let link = config.signup_link(&verification.token_key);
            GroupInvitationEmail {
                inviter: &inviter_name,
                group_title: &group.title,
                link: &link,
                expiry_minutes: config.token_expiry_minutes,
            }
            .to_mail(&email)
        }
        InviteTarget::Pokerboard { pokerboard_id, role } => {
            let pokerboard: Pokerboard = sqlx::query_as("SELECT * FROM pokerboards WHERE id = ?")
                .bind(&pokerboard_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound)?;
            if pokerboard.manager_id != inviter.id {
                return Err(AppError::Forbidden);
            }

            let (pending,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM pokerboard_invitations WHERE invitee_email = ? AND pokerboard_id = ? AND role = ? AND status = 'pending'"
            )
            .bind(&email)
            .bind(&pokerboard.id)
            .bind(role)
            .fetch_one(&mut *tx)
            .await?;
            if pending > 0 {
                return Err(AppError::DuplicateInvitation);
            }

            let verification = tokens::issue(&mut tx, &email, "", purpose).await?;
            let invitation = PokerboardInvitation::new(
                pokerboard.id.clone(),
                invitee_id,
                email.clone(),
                verification.id.clone(),
                role,
            );
            sqlx::query(
                "INSERT INTO pokerboard_invitations (id, pokerboard_id, user_id, invitee_email, verification_id, role, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(&invitation.id)
            .bind(&invitation.pokerboard_id)
            .bind(&invitation.user_id)
            .bind(&invitation.invitee_email)
            .bind(&invitation.verification_id)
            .bind(invitation.role)
            .bind(invitation.status)
            .bind(&invitation.created_at)
            .bind(&invitation.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| on_unique_violation(e, AppError::DuplicateInvitation))?;

            tracing::info!(
                pokerboard_id = %pokerboard.id,
                invitee = %email,
                role = %role,
                "Created pokerboard invitation"
            );

            let link = config.signup_link(&verification.token_key);
            PokerboardInvitationEmail {
                inviter: &inviter_name,
                pokerboard_title: &pokerboard.title,
                role: role.label(),
                link: &link,
                expiry_minutes: config.token_expiry_minutes,
            }
            .to_mail(&email)
        }
    };

    notify(tx, queue, mail).await
}

pub async fn consume_token(
    pool: &SqlitePool,
    config: &Config,
    token: &str,
) -> Result<TokenOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let verification = tokens::find(&mut *tx, token.trim())
        .await?
        .ok_or(AppError::TokenNotFound)?;
    if !verification.is_consumable(Utc::now(), config.token_expiry()) {
        tracing::warn!(email = %verification.email, "Rejected expired or used token");
        return Err(AppError::TokenExpiredOrUsed);
    }

    let user = db::find_user_by_email(&mut *tx, &verification.email).await?;

    let outcome = match verification.purpose {
        Purpose::Signup => match user {
            Some(_) => TokenOutcome::AlreadyRegistered,
            None => TokenOutcome::SignupVerified {
                email: verification.email,
                name: verification.name,
            },
        },
        Purpose::GroupInvite => {
            let invitation = find_group_invitation_by_verification(&mut *tx, &verification.id)
                .await?
                .ok_or(AppError::TokenNotFound)?;
            ensure_pending(invitation.status)?;

            let Some(user) = user else {
                return Ok(signup_to_join(verification));
            };
            accept_group_invitation(&mut tx, &invitation, &user).await?;
            tokens::mark_used(&mut tx, &verification.id).await?;
            TokenOutcome::MembershipAdded
        }
        Purpose::PokerboardInvite => {
            let invitation =
                find_pokerboard_invitation_by_verification(&mut *tx, &verification.id)
                    .await?
                    .ok_or(AppError::TokenNotFound)?;
            ensure_pending(invitation.status)?;

            let Some(user) = user else {
                return Ok(signup_to_join(verification));
            };
            accept_pokerboard_invitation(&mut tx, &invitation, &user).await?;
            tokens::mark_used(&mut tx, &verification.id).await?;
            TokenOutcome::MembershipAdded
        }
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Finishes a signup that came in through a verification link. Runs on the
/// transaction that inserted `user`.
pub async fn complete_signup(
    conn: &mut SqliteConnection,
    config: &Config,
    user: &User,
    token: Option<&str>,
) -> Result<(), AppError> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    let Some(verification) = tokens::find(&mut *conn, token).await? else {
        tracing::debug!("Signup token not found; nothing to resolve");
        return Ok(());
    };
    if !verification.is_consumable(Utc::now(), config.token_expiry()) {
        tracing::warn!(user_id = %user.id, "Ignoring expired or used signup token");
        return Ok(());
    }

    match verification.purpose {
        Purpose::Signup => {}
        Purpose::GroupInvite => {
            match find_group_invitation_by_verification(&mut *conn, &verification.id).await? {
                Some(inv) if inv.status == InvitationStatus::Pending => {
                    accept_group_invitation(conn, &inv, user).await?;
                }
                Some(inv) => {
                    tracing::warn!(invitation_id = %inv.id, status = %inv.status, "Group invitation not pending at signup");
                }
                None => {}
            }
        }
        Purpose::PokerboardInvite => {
            match find_pokerboard_invitation_by_verification(&mut *conn, &verification.id).await? {
                Some(inv) if inv.status == InvitationStatus::Pending => {
                    accept_pokerboard_invitation(conn, &inv, user).await?;
                }
                Some(inv) => {
                    tracing::warn!(invitation_id = %inv.id, status = %inv.status, "Pokerboard invitation not pending at signup");
                }
                None => {}
            }
        }
    }

    tokens::mark_used(conn, &verification.id).await?;
    Ok(())
}

pub async fn respond_to_group_invitation(
    pool: &SqlitePool,
    user: &User,
    invitation_id: &str,
    decision: Decision,
) -> Result<GroupInvitation, AppError> {
    let mut tx = pool.begin().await?;

    let invitation = find_group_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !invitation.is_addressed_to(user) {
        return Err(AppError::Forbidden);
    }
    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::InvalidState);
    }

    // Only acceptance uses up the token; a declined link reports the decline.
    match decision {
        Decision::Accepted => {
            accept_group_invitation(&mut tx, &invitation, user).await?;
            tokens::mark_used(&mut tx, &invitation.verification_id).await?;
        }
        Decision::Declined => {
            transition(
                &mut tx,
                InvitationTable::Group,
                &invitation.id,
                Some(&user.id),
                InvitationStatus::Declined,
            )
            .await?
        }
    }

    let updated = find_group_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    tx.commit().await?;
    Ok(updated)
}

pub async fn respond_to_pokerboard_invitation(
    pool: &SqlitePool,
    user: &User,
    invitation_id: &str,
    decision: Decision,
) -> Result<PokerboardInvitation, AppError> {
    let mut tx = pool.begin().await?;

    let invitation = find_pokerboard_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !invitation.is_addressed_to(user) {
        return Err(AppError::Forbidden);
    }
    if invitation.status != InvitationStatus::Pending {
        return Err(AppError::InvalidState);
    }

    // Only acceptance uses up the token; a declined link reports the decline.
    match decision {
        Decision::Accepted => {
            accept_pokerboard_invitation(&mut tx, &invitation, user).await?;
            tokens::mark_used(&mut tx, &invitation.verification_id).await?;
        }
        Decision::Declined => {
            transition(
                &mut tx,
                InvitationTable::Pokerboard,
                &invitation.id,
                Some(&user.id),
                InvitationStatus::Declined,
            )
            .await?
        }
    }

    let updated = find_pokerboard_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    tx.commit().await?;
    Ok(updated)
}

/// Withdraws a pending group invitation. Only the group admin may cancel.
pub async fn cancel_group_invitation(
    pool: &SqlitePool,
    admin: &User,
    invitation_id: &str,
) -> Result<GroupInvitation, AppError> {
    let mut tx = pool.begin().await?;

    let invitation = find_group_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let (admin_id,): (String,) = sqlx::query_as("SELECT admin_id FROM user_groups WHERE id = ?")
        .bind(&invitation.group_id)
        .fetch_one(&mut *tx)
        .await?;
    if admin_id != admin.id {
        return Err(AppError::Forbidden);
    }

    transition(
        &mut tx,
        InvitationTable::Group,
        &invitation.id,
        None,
        InvitationStatus::Cancelled,
    )
    .await?;

    let updated = find_group_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    tx.commit().await?;
    tracing::info!(invitation_id = %updated.id, "Cancelled group invitation");
    Ok(updated)
}

/// Withdraws a pending pokerboard invitation. Only the manager may cancel.
pub async fn cancel_pokerboard_invitation(
    pool: &SqlitePool,
    manager: &User,
    invitation_id: &str,
) -> Result<PokerboardInvitation, AppError> {
    let mut tx = pool.begin().await?;

    let invitation = find_pokerboard_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let (manager_id,): (String,) =
        sqlx::query_as("SELECT manager_id FROM pokerboards WHERE id = ?")
            .bind(&invitation.pokerboard_id)
            .fetch_one(&mut *tx)
            .await?;
    if manager_id != manager.id {
        return Err(AppError::Forbidden);
    }

    transition(
        &mut tx,
        InvitationTable::Pokerboard,
        &invitation.id,
        None,
        InvitationStatus::Cancelled,
    )
    .await?;

    let updated = find_pokerboard_invitation(&mut *tx, invitation_id)
        .await?
        .ok_or(AppError::NotFound)?;
    tx.commit().await?;
    tracing::info!(invitation_id = %updated.id, "Cancelled pokerboard invitation");
    Ok(updated)
}

async fn notify(
    tx: Transaction<'_, Sqlite>,
    queue: &dyn MailQueue,
    mail: Result<OutgoingMail, MailError>,
) -> Result<NotifyOutcome, AppError> {
    match mail.and_then(|m| queue.enqueue(m)) {
        Ok(()) => {
            tx.commit().await?;
            Ok(NotifyOutcome::Committed)
        }
        Err(reason) => {
            tracing::warn!("Notification failed, rolling back: {reason}");
            tx.rollback().await?;
            Ok(NotifyOutcome::RolledBack(reason))
        }
    }
}

fn ensure_pending(status: InvitationStatus) -> Result<(), AppError> {
    match status {
        InvitationStatus::Pending => Ok(()),
        InvitationStatus::Cancelled => Err(AppError::InvitationCancelled),
        InvitationStatus::Declined => Err(AppError::InvitationDeclined),
        InvitationStatus::Accepted => Err(AppError::TokenExpiredOrUsed),
    }
}

fn signup_to_join(verification: EmailVerification) -> TokenOutcome {
    TokenOutcome::SignupToJoin {
        email: verification.email,
        name: verification.name,
    }
}

async fn accept_group_invitation(
    conn: &mut SqliteConnection,
    invitation: &GroupInvitation,
    user: &User,
) -> Result<(), AppError> {
    transition(
        &mut *conn,
        InvitationTable::Group,
        &invitation.id,
        Some(&user.id),
        InvitationStatus::Accepted,
    )
    .await?;

    let member = GroupMember::new(invitation.group_id.clone(), user.id.clone());
    sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)")
        .bind(&member.group_id)
        .bind(&member.user_id)
        .bind(&member.joined_at)
        .execute(&mut *conn)
        .await?;

    tracing::info!(group_id = %member.group_id, user_id = %member.user_id, "Added user to group");
    Ok(())
}

async fn accept_pokerboard_invitation(
    conn: &mut SqliteConnection,
    invitation: &PokerboardInvitation,
    user: &User,
) -> Result<(), AppError> {
    transition(
        &mut *conn,
        InvitationTable::Pokerboard,
        &invitation.id,
        Some(&user.id),
        InvitationStatus::Accepted,
    )
    .await?;

    let member = UserPokerboard::new(invitation.pokerboard_id.clone(), user.id.clone(), invitation.role);
    sqlx::query(
        "INSERT OR IGNORE INTO user_pokerboards (pokerboard_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)"
    )
    .bind(&member.pokerboard_id)
    .bind(&member.user_id)
    .bind(member.role)
    .bind(&member.joined_at)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        pokerboard_id = %member.pokerboard_id,
        user_id = %member.user_id,
        role = %member.role,
        "Added user to pokerboard"
    );
    Ok(())
}

/// Moves a pending invitation to `to`. Fails with `InvalidState` when the
/// row is no longer pending. `user_id` links the invitee when given.
async fn transition(
    conn: &mut SqliteConnection,
    table: InvitationTable,
    invitation_id: &str,
    user_id: Option<&str>,
    to: InvitationStatus,
) -> Result<(), AppError> {
    let sql = format!(
        "UPDATE {} SET status = ?, user_id = COALESCE(?, user_id), updated_at = ? WHERE id = ? AND status = 'pending'",
        table.name()
    );
    let result = sqlx::query(&sql)
        .bind(to)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .bind(invitation_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidState);
    }
    Ok(())
}

async fn find_group_invitation<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
) -> Result<Option<GroupInvitation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM group_invitations WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

async fn find_group_invitation_by_verification<'e>(
    executor: impl SqliteExecutor<'e>,
    verification_id: &str,
) -> Result<Option<GroupInvitation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM group_invitations WHERE verification_id = ?")
        .bind(verification_id)
        .fetch_optional(executor)
        .await
}

async fn find_pokerboard_invitation<'e>(
    executor: impl SqliteExecutor<'e>,
    id: &str,
) -> Result<Option<PokerboardInvitation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM pokerboard_invitations WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

async fn find_pokerboard_invitation_by_verification<'e>(
    executor: impl SqliteExecutor<'e>,
    verification_id: &str,
) -> Result<Option<PokerboardInvitation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM pokerboard_invitations WHERE verification_id = ?")
        .bind(verification_id)
        .fetch_optional(executor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  User@X.com ").unwrap(), "user@x.com");
    }

    #[test]
    fn normalize_email_rejects_garbage() {
        let err = normalize_email("not-an-email").unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains_key("email")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn only_pending_invitations_can_be_consumed() {
        assert!(ensure_pending(InvitationStatus::Pending).is_ok());
        assert!(matches!(
            ensure_pending(InvitationStatus::Cancelled),
            Err(AppError::InvitationCancelled)
        ));
        assert!(matches!(
            ensure_pending(InvitationStatus::Declined),
            Err(AppError::InvitationDeclined)
        ));
        assert!(matches!(
            ensure_pending(InvitationStatus::Accepted),
            Err(AppError::TokenExpiredOrUsed)
        ));
    }
}
