use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::types::Uuid;

use crate::error::StudyError;
use crate::models::{
    Achievement, Announcement, Comment, Law, User, UserAchievement, UserFavorite, UserMarkup,
    UserNote, UserProgress, UserSeenAnnouncement,
};

mod memory;
mod postgres;

pub use memory::MemoryStudyStore;
pub use postgres::PgStudyStore;

/// Per-table deletion counts from a cascade purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub comments: u64,
    pub notes: u64,
    pub markups: u64,
    pub favorites: u64,
    pub seen_markers: u64,
    pub progress_rows: u64,
    pub achievement_links: u64,
    pub laws: u64,
    pub users: u64,
}

#[async_trait]
pub trait StudyStore: Clone + Send + Sync + 'static {
    type Tx: StudyTx;

    async fn begin(&self) -> Result<Self::Tx, StudyError>;
}

/// One transaction against the backing store. Everything between `begin`
/// and `commit` lands atomically; dropping the value rolls back.
#[async_trait]
pub trait StudyTx: Send {
    // document tree
    async fn law(&mut self, law_id: Uuid) -> Result<Option<Law>, StudyError>;
    /// Insert path enforces the two-level invariant: a topic's parent must
    /// exist and must itself be parentless.
    async fn insert_law(&mut self, law: &Law) -> Result<(), StudyError>;

    // users
    async fn user(&mut self, user_id: Uuid) -> Result<Option<User>, StudyError>;
    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StudyError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), StudyError>;
    async fn set_user_approval(&mut self, user_id: Uuid, approved: bool) -> Result<(), StudyError>;
    async fn unapproved_users(&mut self) -> Result<Vec<User>, StudyError>;
    /// Atomic increment; returns the new balance.
    async fn add_points(&mut self, user_id: Uuid, amount: i64) -> Result<i64, StudyError>;

    // progress
    async fn progress(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError>;
    /// Locked read of the progress row; concurrent writers queue behind it.
    async fn progress_for_update(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError>;
    async fn insert_progress(&mut self, row: &UserProgress) -> Result<(), StudyError>;
    async fn update_progress(&mut self, row: &UserProgress) -> Result<(), StudyError>;
    /// Rows currently `completed`; reverted rows do not count.
    async fn completed_count(&mut self, user_id: Uuid) -> Result<i64, StudyError>;

    // achievements
    async fn achievements(&mut self) -> Result<Vec<Achievement>, StudyError>;
    async fn insert_achievement(&mut self, achievement: &Achievement) -> Result<(), StudyError>;
    async fn achievement_ids_of(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError>;
    /// Insert-if-absent; returns false when the pair was already granted.
    async fn grant_achievement(&mut self, grant: &UserAchievement) -> Result<bool, StudyError>;

    // favorites, notes, markups, comments
    async fn is_favorited(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError>;
    async fn insert_favorite(&mut self, favorite: &UserFavorite) -> Result<bool, StudyError>;
    async fn delete_favorite(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError>;
    async fn note(&mut self, user_id: Uuid, law_id: Uuid) -> Result<Option<UserNote>, StudyError>;
    async fn upsert_note(&mut self, note: &UserNote) -> Result<(), StudyError>;
    async fn markup(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserMarkup>, StudyError>;
    async fn upsert_markup(&mut self, markup: &UserMarkup) -> Result<(), StudyError>;
    async fn comments_of(&mut self, law_id: Uuid) -> Result<Vec<Comment>, StudyError>;
    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StudyError>;

    // announcements
    async fn announcement(&mut self, id: Uuid) -> Result<Option<Announcement>, StudyError>;
    async fn active_announcements(&mut self) -> Result<Vec<Announcement>, StudyError>;
    async fn seen_announcement_ids(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError>;
    /// Insert-if-absent; returns false when already dismissed.
    async fn mark_seen(&mut self, seen: &UserSeenAnnouncement) -> Result<bool, StudyError>;

    // cascade cleanup, dependents first, owning rows last
    async fn purge_user(&mut self, user_id: Uuid) -> Result<PurgeReport, StudyError>;
    async fn purge_law(&mut self, law_id: Uuid) -> Result<PurgeReport, StudyError>;

    async fn commit(self) -> Result<(), StudyError>;
    async fn rollback(self) -> Result<(), StudyError>;
}
