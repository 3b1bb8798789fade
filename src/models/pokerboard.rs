use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum Role {
    #[serde(rename = "manager")]
    #[sqlx(rename = "manager")]
    Manager,
    #[serde(rename = "player")]
    #[sqlx(rename = "player")]
    Player,
    #[serde(rename = "spectator")]
    #[sqlx(rename = "spectator")]
    Spectator,
}

impl Role {
    /// Human readable label used in invitation emails.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Manager => "Manager",
            Role::Player => "Player",
            Role::Spectator => "Spectator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Manager => write!(f, "manager"),
            Role::Player => write!(f, "player"),
            Role::Spectator => write!(f, "spectator"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "player" => Ok(Role::Player),
            "spectator" => Ok(Role::Spectator),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pokerboard {
    pub id: String,
    pub manager_id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Pokerboard {
    pub fn new(manager_id: String, title: String, description: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            manager_id,
            title,
            description,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPokerboard {
    pub pokerboard_id: String,
    pub user_id: String,
    pub role: Role,
    pub joined_at: String,
}

impl UserPokerboard {
    pub fn new(pokerboard_id: String, user_id: String, role: Role) -> Self {
        Self {
            pokerboard_id,
            user_id,
            role,
            joined_at: Utc::now().to_rfc3339(),
        }
    }
}
