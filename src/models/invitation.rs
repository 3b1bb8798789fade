use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationStatus::Pending => write!(f, "pending"),
            InvitationStatus::Accepted => write!(f, "accepted"),
            InvitationStatus::Declined => write!(f, "declined"),
            InvitationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An invitee's answer to a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupInvitation {
    pub id: String,
    pub group_id: String,
    pub user_id: Option<String>,
    pub invitee_email: String,
    pub verification_id: String,
    pub status: InvitationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl GroupInvitation {
    pub fn new(
        group_id: String,
        user_id: Option<String>,
        invitee_email: String,
        verification_id: String,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            group_id,
            user_id,
            invitee_email,
            verification_id,
            status: InvitationStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_addressed_to(&self, user: &User) -> bool {
        addressed_to(self.user_id.as_deref(), &self.invitee_email, user)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PokerboardInvitation {
    pub id: String,
    pub pokerboard_id: String,
    pub user_id: Option<String>,
    pub invitee_email: String,
    pub verification_id: String,
    pub role: Role,
    pub status: InvitationStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl PokerboardInvitation {
    pub fn new(
        pokerboard_id: String,
        user_id: Option<String>,
        invitee_email: String,
        verification_id: String,
        role: Role,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            pokerboard_id,
            user_id,
            invitee_email,
            verification_id,
            role,
            status: InvitationStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_addressed_to(&self, user: &User) -> bool {
        addressed_to(self.user_id.as_deref(), &self.invitee_email, user)
    }
}

// Unlinked invitations were sent before the invitee had an account.
fn addressed_to(user_id: Option<&str>, invitee_email: &str, user: &User) -> bool {
    match user_id {
        Some(id) => id == user.id,
        None => invitee_email.eq_ignore_ascii_case(&user.email),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::new(email.into(), "T".into(), "U".into(), String::new())
    }

    #[test]
    fn linked_invitation_matches_only_its_user() {
        let alice = user("alice@example.com");
        let bob = user("bob@example.com");
        let inv = GroupInvitation::new(
            "g".into(),
            Some(alice.id.clone()),
            "alice@example.com".into(),
            "v".into(),
        );
        assert!(inv.is_addressed_to(&alice));
        assert!(!inv.is_addressed_to(&bob));
    }

    #[test]
    fn unlinked_invitation_matches_by_email() {
        let alice = user("alice@example.com");
        let inv = PokerboardInvitation::new(
            "p".into(),
            None,
            "Alice@Example.com".into(),
            "v".into(),
            Role::Player,
        );
        assert!(inv.is_addressed_to(&alice));
        assert_eq!(inv.status, InvitationStatus::Pending);
    }

    #[test]
    fn decision_deserializes_lowercase() {
        let d: Decision = serde_json::from_str("\"declined\"").unwrap();
        assert_eq!(d, Decision::Declined);
        assert!(serde_json::from_str::<Decision>("\"pending\"").is_err());
    }
}
