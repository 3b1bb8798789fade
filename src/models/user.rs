use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An account holder. The password hash never leaves the server: it is
/// skipped on serialization, so session copies carry an empty hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, first_name: String, last_name: String, password_hash: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            first_name,
            last_name,
            password_hash,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Public projection used when a user is embedded in another resource.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}
