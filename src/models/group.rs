use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub admin_id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Group {
    pub fn new(admin_id: String, title: String, description: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            admin_id,
            title,
            description,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub joined_at: String,
}

impl GroupMember {
    pub fn new(group_id: String, user_id: String) -> Self {
        Self {
            group_id,
            user_id,
            joined_at: Utc::now().to_rfc3339(),
        }
    }
}
