use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use super::Role;

/// Wire and storage code for what a verification token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(i64)]
pub enum Purpose {
    Signup = 0,
    GroupInvite = 1,
    PokerboardInvite = 2,
}

impl TryFrom<i64> for Purpose {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Purpose::Signup),
            1 => Ok(Purpose::GroupInvite),
            2 => Ok(Purpose::PokerboardInvite),
            other => Err(format!("Unknown purpose: {other}")),
        }
    }
}

/// What an invitation points at. Only the fields relevant to each flow exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteTarget {
    Signup,
    Group { group_id: String },
    Pokerboard { pokerboard_id: String, role: Role },
}

impl InviteTarget {
    /// Builds a target from the raw request triple, collecting field errors
    /// the same way the form validators do.
    pub fn from_request(
        purpose: i64,
        target_id: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, HashMap<String, String>> {
        let mut errors = HashMap::new();

        let purpose = match Purpose::try_from(purpose) {
            Ok(p) => p,
            Err(e) => {
                errors.insert("purpose".to_string(), e);
                return Err(errors);
            }
        };

        let target_id = target_id.map(str::trim).filter(|id| !id.is_empty());

        match purpose {
            Purpose::Signup => Ok(InviteTarget::Signup),
            Purpose::GroupInvite => match target_id {
                Some(id) => Ok(InviteTarget::Group { group_id: id.to_string() }),
                None => {
                    errors.insert("id".to_string(), "Group id is required".to_string());
                    Err(errors)
                }
            },
            Purpose::PokerboardInvite => {
                if target_id.is_none() {
                    errors.insert("id".to_string(), "Pokerboard id is required".to_string());
                }
                let role = match role.map(str::parse::<Role>) {
                    Some(Ok(role)) => Some(role),
                    Some(Err(e)) => {
                        errors.insert("role".to_string(), e);
                        None
                    }
                    None => {
                        errors.insert("role".to_string(), "Role is required".to_string());
                        None
                    }
                };
                match (target_id, role) {
                    (Some(id), Some(role)) if errors.is_empty() => Ok(InviteTarget::Pokerboard {
                        pokerboard_id: id.to_string(),
                        role,
                    }),
                    _ => Err(errors),
                }
            }
        }
    }

    pub fn purpose(&self) -> Purpose {
        match self {
            InviteTarget::Signup => Purpose::Signup,
            InviteTarget::Group { .. } => Purpose::GroupInvite,
            InviteTarget::Pokerboard { .. } => Purpose::PokerboardInvite,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailVerification {
    pub id: String,
    pub email: String,
    pub name: String,
    pub token_key: String,
    pub purpose: Purpose,
    pub is_used: bool,
    pub created_at: String,
}

impl EmailVerification {
    pub fn new(email: String, name: String, token_key: String, purpose: Purpose) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            name,
            token_key,
            purpose,
            is_used: false,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// A token whose creation time cannot be parsed is treated as expired.
    /// A window reaching past the representable range never expires.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.created_at.parse::<DateTime<Utc>>() {
            Ok(created) => created
                .checked_add_signed(window)
                .is_some_and(|deadline| now > deadline),
            Err(_) => true,
        }
    }

    pub fn is_consumable(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.is_used && !self.is_expired(now, window)
    }
}
