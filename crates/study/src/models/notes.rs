use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::get_current_timestamp;

/// Free-form note, one per (user, law). Content is stored opaque; the
/// sanitizer sits in front of this layer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserNote {
    pub id: Uuid,

    pub user_id: Uuid,
    pub law_id: Uuid,

    pub content: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserNote {
    pub fn new(user_id: Uuid, law_id: Uuid, content: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            law_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Highlight/markup blob, one per (user, law), written wholesale by the
/// reader view.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserMarkup {
    pub id: Uuid,

    pub user_id: Uuid,
    pub law_id: Uuid,

    pub content: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserMarkup {
    pub fn new(user_id: Uuid, law_id: Uuid, content: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            law_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
