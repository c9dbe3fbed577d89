use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Uuid;
use tokio::sync::{Mutex, OwnedMutexGuard};

use lextrail_common::get_current_timestamp;

use crate::error::StudyError;
use crate::models::{
    Achievement, Announcement, Comment, Law, User, UserAchievement, UserFavorite, UserMarkup,
    UserNote, UserProgress, UserSeenAnnouncement,
};
use crate::store::{PurgeReport, StudyStore, StudyTx};

#[derive(Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    laws: HashMap<Uuid, Law>,
    progress: HashMap<(Uuid, Uuid), UserProgress>,
    achievements: Vec<Achievement>,
    user_achievements: Vec<UserAchievement>,
    favorites: HashSet<(Uuid, Uuid)>,
    notes: HashMap<(Uuid, Uuid), UserNote>,
    markups: HashMap<(Uuid, Uuid), UserMarkup>,
    comments: Vec<Comment>,
    announcements: Vec<Announcement>,
    seen: HashSet<(Uuid, Uuid)>,
}

/// In-process store. A transaction holds the state lock from `begin` until
/// commit or rollback, so transactions are serialized and all-or-nothing.
#[derive(Clone, Default)]
pub struct MemoryStudyStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announcements are published out of band, there is no engine call that
    /// writes one.
    pub async fn insert_announcement(&self, announcement: Announcement) {
        let mut state = self.state.lock().await;
        state.announcements.push(announcement);
    }
}

#[async_trait]
impl StudyStore for MemoryStudyStore {
    type Tx = MemoryStudyTx;

    async fn begin(&self) -> Result<MemoryStudyTx, StudyError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryStudyTx { guard, work })
    }
}

pub struct MemoryStudyTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StudyTx for MemoryStudyTx {
    async fn law(&mut self, law_id: Uuid) -> Result<Option<Law>, StudyError> {
        Ok(self.work.laws.get(&law_id).cloned())
    }

    async fn insert_law(&mut self, law: &Law) -> Result<(), StudyError> {
        if let Some(parent_id) = law.parent_id {
            let parent = self
                .work
                .laws
                .get(&parent_id)
                .ok_or(StudyError::NotFound("parent law"))?;
            if parent.parent_id.is_some() {
                return Err(StudyError::validation(
                    "law hierarchy is limited to two levels",
                ));
            }
        }
        if self.work.laws.contains_key(&law.id) {
            return Err(StudyError::Conflict("unique key"));
        }
        self.work.laws.insert(law.id, law.clone());
        Ok(())
    }

    async fn user(&mut self, user_id: Uuid) -> Result<Option<User>, StudyError> {
        Ok(self.work.users.get(&user_id).cloned())
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StudyError> {
        Ok(self
            .work
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StudyError> {
        let duplicate = self.work.users.contains_key(&user.id)
            || self.work.users.values().any(|u| u.email == user.email);
        if duplicate {
            return Err(StudyError::Conflict("unique key"));
        }
        self.work.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_user_approval(&mut self, user_id: Uuid, approved: bool) -> Result<(), StudyError> {
        let user = self
            .work
            .users
            .get_mut(&user_id)
            .ok_or(StudyError::NotFound("user"))?;
        user.is_approved = approved;
        user.updated_at = get_current_timestamp();
        Ok(())
    }

    async fn unapproved_users(&mut self) -> Result<Vec<User>, StudyError> {
        let mut pending: Vec<User> = self
            .work
            .users
            .values()
            .filter(|user| !user.is_approved && !user.is_admin())
            .cloned()
            .collect();
        pending.sort_by_key(|user| user.created_at);
        Ok(pending)
    }

    async fn add_points(&mut self, user_id: Uuid, amount: i64) -> Result<i64, StudyError> {
        let user = self
            .work
            .users
            .get_mut(&user_id)
            .ok_or(StudyError::NotFound("user"))?;
        user.points += amount;
        user.updated_at = get_current_timestamp();
        Ok(user.points)
    }

    async fn progress(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError> {
        Ok(self.work.progress.get(&(user_id, law_id)).cloned())
    }

    async fn progress_for_update(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError> {
        // the transaction already owns the whole state, no extra locking
        self.progress(user_id, law_id).await
    }

    async fn insert_progress(&mut self, row: &UserProgress) -> Result<(), StudyError> {
        let key = (row.user_id, row.law_id);
        if self.work.progress.contains_key(&key) {
            return Err(StudyError::Conflict("unique key"));
        }
        self.work.progress.insert(key, row.clone());
        Ok(())
    }

    async fn update_progress(&mut self, row: &UserProgress) -> Result<(), StudyError> {
        let key = (row.user_id, row.law_id);
        if !self.work.progress.contains_key(&key) {
            return Err(StudyError::NotFound("progress"));
        }
        let mut stored = row.clone();
        stored.updated_at = get_current_timestamp();
        self.work.progress.insert(key, stored);
        Ok(())
    }

    async fn completed_count(&mut self, user_id: Uuid) -> Result<i64, StudyError> {
        let count = self
            .work
            .progress
            .values()
            .filter(|row| row.user_id == user_id && row.is_completed())
            .count();
        Ok(count as i64)
    }

    async fn achievements(&mut self) -> Result<Vec<Achievement>, StudyError> {
        let mut catalog = self.work.achievements.clone();
        catalog.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
        Ok(catalog)
    }

    async fn insert_achievement(&mut self, achievement: &Achievement) -> Result<(), StudyError> {
        let duplicate = self
            .work
            .achievements
            .iter()
            .any(|a| a.id == achievement.id || a.name == achievement.name);
        if duplicate {
            return Err(StudyError::Conflict("unique key"));
        }
        self.work.achievements.push(achievement.clone());
        Ok(())
    }

    async fn achievement_ids_of(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError> {
        Ok(self
            .work
            .user_achievements
            .iter()
            .filter(|grant| grant.user_id == user_id)
            .map(|grant| grant.achievement_id)
            .collect())
    }

    async fn grant_achievement(&mut self, grant: &UserAchievement) -> Result<bool, StudyError> {
        let already = self
            .work
            .user_achievements
            .iter()
            .any(|g| g.user_id == grant.user_id && g.achievement_id == grant.achievement_id);
        if already {
            return Ok(false);
        }
        self.work.user_achievements.push(grant.clone());
        Ok(true)
    }

    async fn is_favorited(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        Ok(self.work.favorites.contains(&(user_id, law_id)))
    }

    async fn insert_favorite(&mut self, favorite: &UserFavorite) -> Result<bool, StudyError> {
        Ok(self
            .work
            .favorites
            .insert((favorite.user_id, favorite.law_id)))
    }

    async fn delete_favorite(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        Ok(self.work.favorites.remove(&(user_id, law_id)))
    }

    async fn note(&mut self, user_id: Uuid, law_id: Uuid) -> Result<Option<UserNote>, StudyError> {
        Ok(self.work.notes.get(&(user_id, law_id)).cloned())
    }

    async fn upsert_note(&mut self, note: &UserNote) -> Result<(), StudyError> {
        match self.work.notes.entry((note.user_id, note.law_id)) {
            Entry::Occupied(mut existing) => {
                let row = existing.get_mut();
                row.content = note.content.clone();
                row.updated_at = get_current_timestamp();
            }
            Entry::Vacant(slot) => {
                slot.insert(note.clone());
            }
        }
        Ok(())
    }

    async fn markup(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserMarkup>, StudyError> {
        Ok(self.work.markups.get(&(user_id, law_id)).cloned())
    }

    async fn upsert_markup(&mut self, markup: &UserMarkup) -> Result<(), StudyError> {
        match self.work.markups.entry((markup.user_id, markup.law_id)) {
            Entry::Occupied(mut existing) => {
                let row = existing.get_mut();
                row.content = markup.content.clone();
                row.updated_at = get_current_timestamp();
            }
            Entry::Vacant(slot) => {
                slot.insert(markup.clone());
            }
        }
        Ok(())
    }

    // insertion order falls out of the backing Vec
    async fn comments_of(&mut self, law_id: Uuid) -> Result<Vec<Comment>, StudyError> {
        Ok(self
            .work
            .comments
            .iter()
            .filter(|comment| comment.law_id == law_id)
            .cloned()
            .collect())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StudyError> {
        self.work.comments.push(comment.clone());
        Ok(())
    }

    async fn announcement(&mut self, id: Uuid) -> Result<Option<Announcement>, StudyError> {
        Ok(self
            .work
            .announcements
            .iter()
            .find(|announcement| announcement.id == id)
            .cloned())
    }

    async fn active_announcements(&mut self) -> Result<Vec<Announcement>, StudyError> {
        let mut active: Vec<Announcement> = self
            .work
            .announcements
            .iter()
            .filter(|announcement| announcement.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn seen_announcement_ids(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError> {
        Ok(self
            .work
            .seen
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, announcement)| *announcement)
            .collect())
    }

    async fn mark_seen(&mut self, seen: &UserSeenAnnouncement) -> Result<bool, StudyError> {
        Ok(self
            .work
            .seen
            .insert((seen.user_id, seen.announcement_id)))
    }

    async fn purge_user(&mut self, user_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut report = PurgeReport::default();

        let before = self.work.comments.len();
        self.work.comments.retain(|c| c.user_id != user_id);
        report.comments = (before - self.work.comments.len()) as u64;

        let before = self.work.notes.len();
        self.work.notes.retain(|(user, _), _| *user != user_id);
        report.notes = (before - self.work.notes.len()) as u64;

        let before = self.work.markups.len();
        self.work.markups.retain(|(user, _), _| *user != user_id);
        report.markups = (before - self.work.markups.len()) as u64;

        let before = self.work.favorites.len();
        self.work.favorites.retain(|(user, _)| *user != user_id);
        report.favorites = (before - self.work.favorites.len()) as u64;

        let before = self.work.seen.len();
        self.work.seen.retain(|(user, _)| *user != user_id);
        report.seen_markers = (before - self.work.seen.len()) as u64;

        let before = self.work.progress.len();
        self.work.progress.retain(|(user, _), _| *user != user_id);
        report.progress_rows = (before - self.work.progress.len()) as u64;

        let before = self.work.user_achievements.len();
        self.work.user_achievements.retain(|g| g.user_id != user_id);
        report.achievement_links = (before - self.work.user_achievements.len()) as u64;

        report.users = self.work.users.remove(&user_id).map_or(0, |_| 1);

        Ok(report)
    }

    async fn purge_law(&mut self, law_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut ids: HashSet<Uuid> = self
            .work
            .laws
            .values()
            .filter(|law| law.parent_id == Some(law_id))
            .map(|law| law.id)
            .collect();
        ids.insert(law_id);

        let mut report = PurgeReport::default();

        let before = self.work.comments.len();
        self.work.comments.retain(|c| !ids.contains(&c.law_id));
        report.comments = (before - self.work.comments.len()) as u64;

        let before = self.work.notes.len();
        self.work.notes.retain(|(_, law), _| !ids.contains(law));
        report.notes = (before - self.work.notes.len()) as u64;

        let before = self.work.markups.len();
        self.work.markups.retain(|(_, law), _| !ids.contains(law));
        report.markups = (before - self.work.markups.len()) as u64;

        let before = self.work.favorites.len();
        self.work.favorites.retain(|(_, law)| !ids.contains(law));
        report.favorites = (before - self.work.favorites.len()) as u64;

        let before = self.work.progress.len();
        self.work.progress.retain(|(_, law), _| !ids.contains(law));
        report.progress_rows = (before - self.work.progress.len()) as u64;

        let before = self.work.laws.len();
        self.work.laws.retain(|id, _| !ids.contains(id));
        report.laws = (before - self.work.laws.len()) as u64;

        Ok(report)
    }

    async fn commit(self) -> Result<(), StudyError> {
        let Self { mut guard, work } = self;
        *guard = work;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StudyError> {
        Ok(())
    }
}
