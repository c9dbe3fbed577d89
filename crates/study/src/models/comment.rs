use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::get_current_timestamp;

/// Paragraph-anchored comment. `anchor_paragraph_id` is an opaque marker
/// owned by the rendered document.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,

    pub user_id: Uuid,
    pub law_id: Uuid,

    pub anchor_paragraph_id: String,
    pub content: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Comment {
    pub fn new(user_id: Uuid, law_id: Uuid, anchor_paragraph_id: &str, content: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            law_id,
            anchor_paragraph_id: anchor_paragraph_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
