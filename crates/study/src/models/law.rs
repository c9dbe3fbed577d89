use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::get_current_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Subject {
    pub fn new(name: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One node of the document tree. Diplomas have no parent; topics hang
/// directly under a diploma. The tree is never deeper than two levels.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Law {
    pub id: Uuid,

    pub parent_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,

    pub title: String,
    pub description: String,
    pub content: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Law {
    pub fn new_diploma(title: &str) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            subject_id: None,
            title: title.trim().to_string(),
            description: String::new(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_topic(diploma_id: Uuid, title: &str) -> Self {
        let mut law = Self::new_diploma(title);
        law.parent_id = Some(diploma_id);
        law
    }

    pub fn is_diploma(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_topic(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserFavorite {
    pub id: Uuid,

    pub user_id: Uuid,
    pub law_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserFavorite {
    pub fn new(user_id: Uuid, law_id: Uuid) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            law_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_hangs_under_its_diploma() {
        let diploma = Law::new_diploma("Código Civil");
        assert!(diploma.is_diploma());
        assert!(!diploma.is_topic());

        let mut topic = Law::new_topic(diploma.id, "  Da Personalidade  ");
        assert!(topic.is_topic());
        assert_eq!(topic.parent_id, Some(diploma.id));
        assert_eq!(topic.title, "Da Personalidade");

        let subject = Subject::new("Direito Civil");
        topic.subject_id = Some(subject.id);
        assert_eq!(subject.name, "Direito Civil");
    }
}
