use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::get_current_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: Uuid,

    pub title: String,
    pub content: String,
    pub is_active: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Announcement {
    pub fn new(title: &str, content: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Dismissal marker; pure set-membership on (user, announcement).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSeenAnnouncement {
    pub id: Uuid,

    pub user_id: Uuid,
    pub announcement_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserSeenAnnouncement {
    pub fn new(user_id: Uuid, announcement_id: Uuid) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            announcement_id,
            created_at: now,
            updated_at: now,
        }
    }
}
