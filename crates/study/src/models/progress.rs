use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use strum_macros::{Display, EnumString};

use lextrail_common::get_current_timestamp;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, sqlx::Type,
)]
#[sqlx(type_name = "progress_status", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Never stored: a missing progress row reads as `NotStarted`.
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProgress {
    pub id: Uuid,

    pub user_id: Uuid,
    pub law_id: Uuid,

    pub status: ProgressStatus,
    pub last_read_position: Option<String>,

    /// Set on the first completion and never cleared afterwards, even when
    /// the row reverts to `InProgress`. Point awards key off this field.
    pub completed_at: Option<i64>,
    pub last_accessed_at: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProgress {
    /// Create-default for lazy row creation on first view or bookmark.
    pub fn started(user_id: Uuid, law_id: Uuid) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            law_id,
            status: ProgressStatus::InProgress,
            last_read_position: None,
            completed_at: None,
            last_accessed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = get_current_timestamp();
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Returns true when this is the first completion ever for the pair,
    /// which is the only case that awards points.
    pub fn complete(&mut self) -> bool {
        let first_completion = self.completed_at.is_none();
        self.status = ProgressStatus::Completed;
        if first_completion {
            self.completed_at = Some(get_current_timestamp());
        }
        self.touch();
        first_completion
    }

    pub fn revert(&mut self) {
        self.status = ProgressStatus::InProgress;
        self.touch();
    }

    pub fn set_bookmark(&mut self, position: &str) {
        self.last_read_position = Some(position.to_string());
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_sets_completed_at_once() {
        let mut row = UserProgress::started(Uuid::new_v4(), Uuid::new_v4());
        assert!(row.complete());
        let stamp = row.completed_at;
        assert!(stamp.is_some());

        assert!(!row.complete());
        assert_eq!(row.completed_at, stamp);
    }

    #[test]
    fn revert_keeps_completion_history() {
        let mut row = UserProgress::started(Uuid::new_v4(), Uuid::new_v4());
        row.complete();
        row.revert();

        assert_eq!(row.status, ProgressStatus::InProgress);
        assert!(row.completed_at.is_some());

        assert!(!row.complete(), "re-completion must not count as first");
    }

    #[test]
    fn bookmark_does_not_downgrade_completed() {
        let mut row = UserProgress::started(Uuid::new_v4(), Uuid::new_v4());
        row.complete();
        row.set_bookmark("art-42");

        assert_eq!(row.status, ProgressStatus::Completed);
        assert_eq!(row.last_read_position.as_deref(), Some("art-42"));
    }
}
