use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::types::Uuid;
use tokio::sync::RwLock;

use crate::catalog::seed_achievements;
use crate::error::StudyError;
use crate::models::{
    Achievement, Announcement, Comment, ProgressStatus, User, UserAchievement, UserFavorite,
    UserMarkup, UserNote, UserProgress, UserSeenAnnouncement,
};
use crate::store::{PurgeReport, StudyStore, StudyTx};

pub const DEFAULT_COMPLETION_POINTS: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub law_id: Uuid,
    pub title: String,
    pub status: ProgressStatus,
    pub last_read_position: Option<String>,
    pub is_favorited: bool,
}

/// Viewing a diploma id is not an error, the caller is pointed at the
/// diploma instead of a reading view.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewOutcome {
    Topic(TopicView),
    Diploma { law_id: Uuid, title: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub already_completed: bool,
    pub points_awarded: i64,
    pub newly_unlocked: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub points: i64,
    pub completed_count: i64,
    /// Unlocked badges in catalog order.
    pub achievements: Vec<Achievement>,
    /// Badges granted by the retroactive pass this call ran.
    pub newly_unlocked: Vec<String>,
    /// Active announcements the user has not dismissed, newest first.
    pub announcements: Vec<Announcement>,
}

/// Progress, points and achievement rules on top of a [`StudyStore`].
///
/// Every mutating operation runs inside one store transaction and is retried
/// once when the store reports a conflict (unique-key race or serialization
/// failure). A second conflict surfaces to the caller.
#[derive(Clone)]
pub struct StudyEngine<S: StudyStore> {
    store: S,
    points_per_completion: i64,
    catalog: Arc<RwLock<Arc<Vec<Achievement>>>>,
}

impl<S: StudyStore> StudyEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_points(store, DEFAULT_COMPLETION_POINTS)
    }

    pub fn with_points(store: S, points_per_completion: i64) -> Self {
        Self {
            store,
            points_per_completion,
            catalog: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    /// Current cached catalog snapshot, in evaluation order.
    pub async fn catalog(&self) -> Arc<Vec<Achievement>> {
        self.catalog.read().await.clone()
    }

    /// Replaces the cached catalog with a fresh load from the store and
    /// returns the entry count.
    pub async fn reload_catalog(&self) -> Result<usize, StudyError> {
        let mut tx = self.store.begin().await?;
        let entries = tx.achievements().await?;
        tx.rollback().await?;

        let count = entries.len();
        *self.catalog.write().await = Arc::new(entries);
        Ok(count)
    }

    /// Inserts any default badge missing by name, never touching existing
    /// rows, then reloads the cache. Returns how many were inserted.
    pub async fn ensure_seed_achievements(&self) -> Result<usize, StudyError> {
        let mut tx = self.store.begin().await?;
        let existing: HashSet<String> = tx
            .achievements()
            .await?
            .into_iter()
            .map(|a| a.name)
            .collect();

        let mut inserted = 0;
        for achievement in seed_achievements() {
            if existing.contains(&achievement.name) {
                continue;
            }
            tx.insert_achievement(&achievement).await?;
            inserted += 1;
        }
        tx.commit().await?;

        self.reload_catalog().await?;
        Ok(inserted)
    }

    // ---- progress tracker ----

    pub async fn view_topic(&self, user_id: Uuid, law_id: Uuid) -> Result<ViewOutcome, StudyError> {
        match self.view_topic_once(user_id, law_id).await {
            Err(StudyError::Conflict(_)) => self.view_topic_once(user_id, law_id).await,
            other => other,
        }
    }

    async fn view_topic_once(&self, user_id: Uuid, law_id: Uuid) -> Result<ViewOutcome, StudyError> {
        let mut tx = self.store.begin().await?;
        let law = tx.law(law_id).await?.ok_or(StudyError::NotFound("law"))?;
        if law.is_diploma() {
            tx.rollback().await?;
            return Ok(ViewOutcome::Diploma {
                law_id: law.id,
                title: law.title,
            });
        }

        let progress = match tx.progress_for_update(user_id, law_id).await? {
            Some(mut row) => {
                row.touch();
                tx.update_progress(&row).await?;
                row
            }
            None => {
                let row = UserProgress::started(user_id, law_id);
                tx.insert_progress(&row).await?;
                row
            }
        };
        let is_favorited = tx.is_favorited(user_id, law_id).await?;
        tx.commit().await?;

        Ok(ViewOutcome::Topic(TopicView {
            law_id: law.id,
            title: law.title,
            status: progress.status,
            last_read_position: progress.last_read_position,
            is_favorited,
        }))
    }

    pub async fn save_bookmark(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        position: &str,
    ) -> Result<(), StudyError> {
        match self.save_bookmark_once(user_id, law_id, position).await {
            Err(StudyError::Conflict(_)) => self.save_bookmark_once(user_id, law_id, position).await,
            other => other,
        }
    }

    async fn save_bookmark_once(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        position: &str,
    ) -> Result<(), StudyError> {
        let position = position.trim();
        if position.is_empty() {
            return Err(StudyError::validation("bookmark position must not be empty"));
        }

        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;

        match tx.progress_for_update(user_id, law_id).await? {
            Some(mut row) => {
                row.set_bookmark(position);
                tx.update_progress(&row).await?;
            }
            None => {
                let mut row = UserProgress::started(user_id, law_id);
                row.set_bookmark(position);
                tx.insert_progress(&row).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_complete(
        &self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<CompletionOutcome, StudyError> {
        match self.mark_complete_once(user_id, law_id).await {
            Err(StudyError::Conflict(_)) => self.mark_complete_once(user_id, law_id).await,
            other => other,
        }
    }

    async fn mark_complete_once(
        &self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<CompletionOutcome, StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        tx.user(user_id).await?.ok_or(StudyError::NotFound("user"))?;

        // The locked read decides whether this call awards points. Points
        // go out at most once per (user, topic): completed_at is set on the
        // first completion and survives reverts.
        let first_completion = match tx.progress_for_update(user_id, law_id).await? {
            Some(mut row) => {
                if row.is_completed() {
                    tx.rollback().await?;
                    return Ok(CompletionOutcome {
                        already_completed: true,
                        points_awarded: 0,
                        newly_unlocked: Vec::new(),
                    });
                }
                let first = row.complete();
                tx.update_progress(&row).await?;
                first
            }
            None => {
                let mut row = UserProgress::started(user_id, law_id);
                row.complete();
                tx.insert_progress(&row).await?;
                true
            }
        };

        let points_awarded = if first_completion {
            tx.add_points(user_id, self.points_per_completion).await?;
            self.points_per_completion
        } else {
            0
        };

        let newly_unlocked = self.evaluate_in_tx(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(CompletionOutcome {
            already_completed: false,
            points_awarded,
            newly_unlocked,
        })
    }

    pub async fn revert_to_in_progress(
        &self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<(), StudyError> {
        match self.revert_once(user_id, law_id).await {
            Err(StudyError::Conflict(_)) => self.revert_once(user_id, law_id).await,
            other => other,
        }
    }

    async fn revert_once(&self, user_id: Uuid, law_id: Uuid) -> Result<(), StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;

        let mut row = tx
            .progress_for_update(user_id, law_id)
            .await?
            .ok_or(StudyError::NotFound("progress"))?;
        // completed_at stays set and points stay granted; only the live
        // status (and with it the completed count) moves back.
        row.revert();
        tx.update_progress(&row).await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- achievement engine ----

    pub async fn evaluate_unlocks(&self, user_id: Uuid) -> Result<Vec<String>, StudyError> {
        match self.evaluate_once(user_id).await {
            Err(StudyError::Conflict(_)) => self.evaluate_once(user_id).await,
            other => other,
        }
    }

    async fn evaluate_once(&self, user_id: Uuid) -> Result<Vec<String>, StudyError> {
        let mut tx = self.store.begin().await?;
        let newly = self.evaluate_in_tx(&mut tx, user_id).await?;
        if newly.is_empty() {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }
        Ok(newly)
    }

    /// Grants every catalog badge the user now qualifies for and is not
    /// holding yet. Returns the new names in catalog order.
    async fn evaluate_in_tx(&self, tx: &mut S::Tx, user_id: Uuid) -> Result<Vec<String>, StudyError> {
        let catalog = self.catalog.read().await.clone();
        let user = tx.user(user_id).await?.ok_or(StudyError::NotFound("user"))?;
        let completed = tx.completed_count(user_id).await?;
        let granted = tx.achievement_ids_of(user_id).await?;

        let mut newly = Vec::new();
        for achievement in catalog.iter() {
            if granted.contains(&achievement.id) {
                continue;
            }
            if !achievement.is_met(user.points, completed) {
                continue;
            }
            let grant = UserAchievement::grant(user_id, achievement.id);
            if tx.grant_achievement(&grant).await? {
                newly.push(achievement.name.clone());
            }
        }
        Ok(newly)
    }

    // ---- dashboard ----

    pub async fn dashboard(&self, user_id: Uuid) -> Result<DashboardSummary, StudyError> {
        match self.dashboard_once(user_id).await {
            Err(StudyError::Conflict(_)) => self.dashboard_once(user_id).await,
            other => other,
        }
    }

    async fn dashboard_once(&self, user_id: Uuid) -> Result<DashboardSummary, StudyError> {
        let mut tx = self.store.begin().await?;

        // Retroactive pass: thresholds may have been raised past or the
        // catalog reloaded since the user's last completion.
        let newly_unlocked = self.evaluate_in_tx(&mut tx, user_id).await?;

        let user = tx.user(user_id).await?.ok_or(StudyError::NotFound("user"))?;
        let completed_count = tx.completed_count(user_id).await?;
        let granted = tx.achievement_ids_of(user_id).await?;
        let active = tx.active_announcements().await?;
        let seen = tx.seen_announcement_ids(user_id).await?;

        if newly_unlocked.is_empty() {
            tx.rollback().await?;
        } else {
            tx.commit().await?;
        }

        let catalog = self.catalog.read().await.clone();
        let achievements: Vec<Achievement> = catalog
            .iter()
            .filter(|a| granted.contains(&a.id))
            .cloned()
            .collect();
        let announcements: Vec<Announcement> = active
            .into_iter()
            .filter(|a| !seen.contains(&a.id))
            .collect();

        Ok(DashboardSummary {
            points: user.points,
            completed_count,
            achievements,
            newly_unlocked,
            announcements,
        })
    }

    // ---- favorites, notes, markups, comments ----

    pub async fn toggle_favorite(&self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        match self.toggle_favorite_once(user_id, law_id).await {
            Err(StudyError::Conflict(_)) => self.toggle_favorite_once(user_id, law_id).await,
            other => other,
        }
    }

    async fn toggle_favorite_once(&self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;

        let favorited = if tx.is_favorited(user_id, law_id).await? {
            tx.delete_favorite(user_id, law_id).await?;
            false
        } else {
            tx.insert_favorite(&UserFavorite::new(user_id, law_id)).await?;
            true
        };
        tx.commit().await?;
        Ok(favorited)
    }

    pub async fn save_note(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        content: &str,
    ) -> Result<(), StudyError> {
        match self.save_note_once(user_id, law_id, content).await {
            Err(StudyError::Conflict(_)) => self.save_note_once(user_id, law_id, content).await,
            other => other,
        }
    }

    // Empty content is allowed, that is how a note is cleared.
    async fn save_note_once(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        content: &str,
    ) -> Result<(), StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        tx.upsert_note(&UserNote::new(user_id, law_id, content)).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn note(&self, user_id: Uuid, law_id: Uuid) -> Result<Option<UserNote>, StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        let note = tx.note(user_id, law_id).await?;
        tx.rollback().await?;
        Ok(note)
    }

    pub async fn save_markup(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        content: &str,
    ) -> Result<(), StudyError> {
        match self.save_markup_once(user_id, law_id, content).await {
            Err(StudyError::Conflict(_)) => self.save_markup_once(user_id, law_id, content).await,
            other => other,
        }
    }

    async fn save_markup_once(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        content: &str,
    ) -> Result<(), StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        tx.upsert_markup(&UserMarkup::new(user_id, law_id, content)).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn markup(
        &self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserMarkup>, StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        let markup = tx.markup(user_id, law_id).await?;
        tx.rollback().await?;
        Ok(markup)
    }

    pub async fn comments(&self, law_id: Uuid) -> Result<Vec<Comment>, StudyError> {
        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        let comments = tx.comments_of(law_id).await?;
        tx.rollback().await?;
        Ok(comments)
    }

    pub async fn add_comment(
        &self,
        user_id: Uuid,
        law_id: Uuid,
        anchor_paragraph_id: &str,
        content: &str,
    ) -> Result<Comment, StudyError> {
        let anchor = anchor_paragraph_id.trim();
        if anchor.is_empty() {
            return Err(StudyError::validation("comment anchor must not be empty"));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(StudyError::validation("comment content must not be empty"));
        }

        let mut tx = self.store.begin().await?;
        self.require_topic(&mut tx, law_id).await?;
        let comment = Comment::new(user_id, law_id, anchor, content);
        tx.insert_comment(&comment).await?;
        tx.commit().await?;
        Ok(comment)
    }

    // ---- announcements ----

    pub async fn dismiss_announcement(
        &self,
        user_id: Uuid,
        announcement_id: Uuid,
    ) -> Result<(), StudyError> {
        match self.dismiss_once(user_id, announcement_id).await {
            Err(StudyError::Conflict(_)) => self.dismiss_once(user_id, announcement_id).await,
            other => other,
        }
    }

    async fn dismiss_once(
        &self,
        user_id: Uuid,
        announcement_id: Uuid,
    ) -> Result<(), StudyError> {
        let mut tx = self.store.begin().await?;
        tx.announcement(announcement_id)
            .await?
            .ok_or(StudyError::NotFound("announcement"))?;
        // second dismissal is a no-op
        tx.mark_seen(&UserSeenAnnouncement::new(user_id, announcement_id))
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- accounts ----

    pub async fn register_user(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<User, StudyError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(StudyError::validation("a valid email is required"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(StudyError::validation("display name must not be empty"));
        }

        let mut tx = self.store.begin().await?;
        if tx.user_by_email(&email).await?.is_some() {
            tx.rollback().await?;
            return Err(StudyError::Conflict("user email"));
        }
        let user = User::new(&email, display_name);
        tx.insert_user(&user).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn user(&self, user_id: Uuid) -> Result<User, StudyError> {
        let mut tx = self.store.begin().await?;
        let user = tx.user(user_id).await?;
        tx.rollback().await?;
        user.ok_or(StudyError::NotFound("user"))
    }

    pub async fn pending_users(&self) -> Result<Vec<User>, StudyError> {
        let mut tx = self.store.begin().await?;
        let pending = tx.unapproved_users().await?;
        tx.rollback().await?;
        Ok(pending)
    }

    pub async fn approve_user(&self, user_id: Uuid) -> Result<(), StudyError> {
        let mut tx = self.store.begin().await?;
        tx.set_user_approval(user_id, true).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Purchase notification by customer email. Returns false when no user
    /// matches; the caller still reports success to the provider.
    pub async fn approve_purchase(&self, email: &str) -> Result<bool, StudyError> {
        let email = email.trim().to_lowercase();

        let mut tx = self.store.begin().await?;
        match tx.user_by_email(&email).await? {
            Some(user) if !user.is_approved => {
                tx.set_user_approval(user.id, true).await?;
                tx.commit().await?;
                Ok(true)
            }
            Some(_) => {
                tx.rollback().await?;
                Ok(true)
            }
            None => {
                tx.rollback().await?;
                tracing::warn!("[approve_purchase] no account matches {}", email);
                Ok(false)
            }
        }
    }

    // ---- cascade cleanup ----

    pub async fn purge_user(&self, user_id: Uuid) -> Result<PurgeReport, StudyError> {
        match self.purge_user_once(user_id).await {
            Err(StudyError::Conflict(_)) => self.purge_user_once(user_id).await,
            other => other,
        }
    }

    async fn purge_user_once(&self, user_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut tx = self.store.begin().await?;
        tx.user(user_id).await?.ok_or(StudyError::NotFound("user"))?;
        let report = tx.purge_user(user_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    pub async fn purge_law(&self, law_id: Uuid) -> Result<PurgeReport, StudyError> {
        match self.purge_law_once(law_id).await {
            Err(StudyError::Conflict(_)) => self.purge_law_once(law_id).await,
            other => other,
        }
    }

    async fn purge_law_once(&self, law_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut tx = self.store.begin().await?;
        tx.law(law_id).await?.ok_or(StudyError::NotFound("law"))?;
        let report = tx.purge_law(law_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Loads the law and rejects diploma ids. Callers bail with `?` and the
    /// dropped transaction rolls back.
    async fn require_topic(&self, tx: &mut S::Tx, law_id: Uuid) -> Result<(), StudyError> {
        let law = tx.law(law_id).await?.ok_or(StudyError::NotFound("law"))?;
        if law.is_diploma() {
            return Err(StudyError::validation(
                "this operation applies to topics, not diplomas",
            ));
        }
        Ok(())
    }
}
