use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::types::Uuid;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::StudyError;
use crate::models::{
    Achievement, Announcement, Comment, Law, User, UserAchievement, UserFavorite, UserMarkup,
    UserNote, UserProgress, UserSeenAnnouncement,
};
use crate::store::{PurgeReport, StudyStore, StudyTx};

/// Unique-violation and serialization failures surface as `Conflict` so the
/// engine can retry; everything else is a storage fault.
fn map_db_err(e: sqlx::Error) -> StudyError {
    if let sqlx::Error::Database(ref db_err) = e {
        if let Some(code) = db_err.code() {
            match code.as_ref() {
                "23505" => return StudyError::Conflict("unique key"),
                "40001" | "40P01" => return StudyError::Conflict("serialization"),
                _ => {}
            }
        }
    }
    StudyError::Storage(anyhow::Error::from(e))
}

#[derive(Clone)]
pub struct PgStudyStore {
    pool: PgPool,
}

impl PgStudyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudyStore for PgStudyStore {
    type Tx = PgStudyTx;

    async fn begin(&self) -> Result<PgStudyTx, StudyError> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(PgStudyTx { tx })
    }
}

pub struct PgStudyTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StudyTx for PgStudyTx {
    async fn law(&mut self, law_id: Uuid) -> Result<Option<Law>, StudyError> {
        sqlx::query_as::<_, Law>("SELECT * FROM laws WHERE id = $1")
            .bind(law_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)
    }

    async fn insert_law(&mut self, law: &Law) -> Result<(), StudyError> {
        if let Some(parent_id) = law.parent_id {
            let parent = self
                .law(parent_id)
                .await?
                .ok_or(StudyError::NotFound("parent law"))?;
            if parent.parent_id.is_some() {
                return Err(StudyError::validation(
                    "law hierarchy is limited to two levels",
                ));
            }
        }

        sqlx::query(
            "INSERT INTO laws (id, parent_id, subject_id, title, description, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(law.id)
        .bind(law.parent_id)
        .bind(law.subject_id)
        .bind(&law.title)
        .bind(&law.description)
        .bind(&law.content)
        .bind(law.created_at)
        .bind(law.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn user(&mut self, user_id: Uuid) -> Result<Option<User>, StudyError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)
    }

    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, StudyError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO users (id, email, display_name, role, is_approved, points, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.is_approved)
        .bind(user.points)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn set_user_approval(&mut self, user_id: Uuid, approved: bool) -> Result<(), StudyError> {
        let result = sqlx::query("UPDATE users SET is_approved = $2 WHERE id = $1")
            .bind(user_id)
            .bind(approved)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StudyError::NotFound("user"));
        }
        Ok(())
    }

    async fn unapproved_users(&mut self) -> Result<Vec<User>, StudyError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE is_approved = FALSE AND role = 'student' ORDER BY created_at ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn add_points(&mut self, user_id: Uuid, amount: i64) -> Result<i64, StudyError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE users SET points = points + $2 WHERE id = $1 RETURNING points",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?
        .ok_or(StudyError::NotFound("user"))
    }

    async fn progress(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError> {
        sqlx::query_as::<_, UserProgress>(
            "SELECT * FROM user_progress WHERE user_id = $1 AND law_id = $2",
        )
        .bind(user_id)
        .bind(law_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn progress_for_update(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserProgress>, StudyError> {
        sqlx::query_as::<_, UserProgress>(
            "SELECT * FROM user_progress WHERE user_id = $1 AND law_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(law_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn insert_progress(&mut self, row: &UserProgress) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO user_progress \
             (id, user_id, law_id, status, last_read_position, completed_at, last_accessed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.law_id)
        .bind(row.status)
        .bind(&row.last_read_position)
        .bind(row.completed_at)
        .bind(row.last_accessed_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_progress(&mut self, row: &UserProgress) -> Result<(), StudyError> {
        let result = sqlx::query(
            "UPDATE user_progress \
             SET status = $2, last_read_position = $3, completed_at = $4, last_accessed_at = $5 \
             WHERE id = $1",
        )
        .bind(row.id)
        .bind(row.status)
        .bind(&row.last_read_position)
        .bind(row.completed_at)
        .bind(row.last_accessed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StudyError::NotFound("progress"));
        }
        Ok(())
    }

    async fn completed_count(&mut self, user_id: Uuid) -> Result<i64, StudyError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_progress WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn achievements(&mut self) -> Result<Vec<Achievement>, StudyError> {
        sqlx::query_as::<_, Achievement>(
            "SELECT * FROM achievements ORDER BY created_at ASC, name ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn insert_achievement(&mut self, achievement: &Achievement) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO achievements \
             (id, name, description, icon, points_threshold, laws_completed_threshold, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(achievement.id)
        .bind(&achievement.name)
        .bind(&achievement.description)
        .bind(&achievement.icon)
        .bind(achievement.points_threshold)
        .bind(achievement.laws_completed_threshold)
        .bind(achievement.created_at)
        .bind(achievement.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn achievement_ids_of(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT achievement_id FROM user_achievements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn grant_achievement(&mut self, grant: &UserAchievement) -> Result<bool, StudyError> {
        let result = sqlx::query(
            "INSERT INTO user_achievements (id, user_id, achievement_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, achievement_id) DO NOTHING",
        )
        .bind(grant.id)
        .bind(grant.user_id)
        .bind(grant.achievement_id)
        .bind(grant.created_at)
        .bind(grant.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_favorited(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_favorites WHERE user_id = $1 AND law_id = $2)",
        )
        .bind(user_id)
        .bind(law_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn insert_favorite(&mut self, favorite: &UserFavorite) -> Result<bool, StudyError> {
        let result = sqlx::query(
            "INSERT INTO user_favorites (id, user_id, law_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, law_id) DO NOTHING",
        )
        .bind(favorite.id)
        .bind(favorite.user_id)
        .bind(favorite.law_id)
        .bind(favorite.created_at)
        .bind(favorite.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_favorite(&mut self, user_id: Uuid, law_id: Uuid) -> Result<bool, StudyError> {
        let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = $1 AND law_id = $2")
            .bind(user_id)
            .bind(law_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn note(&mut self, user_id: Uuid, law_id: Uuid) -> Result<Option<UserNote>, StudyError> {
        sqlx::query_as::<_, UserNote>(
            "SELECT * FROM user_notes WHERE user_id = $1 AND law_id = $2",
        )
        .bind(user_id)
        .bind(law_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn upsert_note(&mut self, note: &UserNote) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO user_notes (id, user_id, law_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, law_id) DO UPDATE SET content = EXCLUDED.content",
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(note.law_id)
        .bind(&note.content)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn markup(
        &mut self,
        user_id: Uuid,
        law_id: Uuid,
    ) -> Result<Option<UserMarkup>, StudyError> {
        sqlx::query_as::<_, UserMarkup>(
            "SELECT * FROM user_markups WHERE user_id = $1 AND law_id = $2",
        )
        .bind(user_id)
        .bind(law_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn upsert_markup(&mut self, markup: &UserMarkup) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO user_markups (id, user_id, law_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, law_id) DO UPDATE SET content = EXCLUDED.content",
        )
        .bind(markup.id)
        .bind(markup.user_id)
        .bind(markup.law_id)
        .bind(&markup.content)
        .bind(markup.created_at)
        .bind(markup.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn comments_of(&mut self, law_id: Uuid) -> Result<Vec<Comment>, StudyError> {
        // seq preserves insertion order even within one timestamp second
        sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE law_id = $1 ORDER BY seq ASC",
        )
        .bind(law_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StudyError> {
        sqlx::query(
            "INSERT INTO comments (id, user_id, law_id, anchor_paragraph_id, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.law_id)
        .bind(&comment.anchor_paragraph_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn announcement(&mut self, id: Uuid) -> Result<Option<Announcement>, StudyError> {
        sqlx::query_as::<_, Announcement>("SELECT * FROM announcements WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)
    }

    async fn active_announcements(&mut self) -> Result<Vec<Announcement>, StudyError> {
        sqlx::query_as::<_, Announcement>(
            "SELECT * FROM announcements WHERE is_active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)
    }

    async fn seen_announcement_ids(&mut self, user_id: Uuid) -> Result<HashSet<Uuid>, StudyError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT announcement_id FROM user_seen_announcements WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(ids.into_iter().collect())
    }

    async fn mark_seen(&mut self, seen: &UserSeenAnnouncement) -> Result<bool, StudyError> {
        let result = sqlx::query(
            "INSERT INTO user_seen_announcements (id, user_id, announcement_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, announcement_id) DO NOTHING",
        )
        .bind(seen.id)
        .bind(seen.user_id)
        .bind(seen.announcement_id)
        .bind(seen.created_at)
        .bind(seen.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_user(&mut self, user_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut report = PurgeReport::default();

        let steps: [(&str, &mut u64); 7] = [
            ("DELETE FROM comments WHERE user_id = $1", &mut report.comments),
            ("DELETE FROM user_notes WHERE user_id = $1", &mut report.notes),
            ("DELETE FROM user_markups WHERE user_id = $1", &mut report.markups),
            ("DELETE FROM user_favorites WHERE user_id = $1", &mut report.favorites),
            ("DELETE FROM user_seen_announcements WHERE user_id = $1", &mut report.seen_markers),
            ("DELETE FROM user_progress WHERE user_id = $1", &mut report.progress_rows),
            ("DELETE FROM user_achievements WHERE user_id = $1", &mut report.achievement_links),
        ];

        for (sql, count) in steps {
            *count = sqlx::query(sql)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await
                .map_err(map_db_err)?
                .rows_affected();
        }

        report.users = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?
            .rows_affected();

        Ok(report)
    }

    async fn purge_law(&mut self, law_id: Uuid) -> Result<PurgeReport, StudyError> {
        let mut ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM laws WHERE parent_id = $1")
            .bind(law_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_err)?;
        ids.push(law_id);

        let mut report = PurgeReport::default();

        let steps: [(&str, &mut u64); 5] = [
            ("DELETE FROM comments WHERE law_id = ANY($1)", &mut report.comments),
            ("DELETE FROM user_notes WHERE law_id = ANY($1)", &mut report.notes),
            ("DELETE FROM user_markups WHERE law_id = ANY($1)", &mut report.markups),
            ("DELETE FROM user_favorites WHERE law_id = ANY($1)", &mut report.favorites),
            ("DELETE FROM user_progress WHERE law_id = ANY($1)", &mut report.progress_rows),
        ];

        for (sql, count) in steps {
            *count = sqlx::query(sql)
                .bind(&ids)
                .execute(&mut *self.tx)
                .await
                .map_err(map_db_err)?
                .rows_affected();
        }

        // topics before the owning diploma
        let children = sqlx::query("DELETE FROM laws WHERE parent_id = $1")
            .bind(law_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?
            .rows_affected();
        let owner = sqlx::query("DELETE FROM laws WHERE id = $1")
            .bind(law_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?
            .rows_affected();
        report.laws = children + owner;

        Ok(report)
    }

    async fn commit(self) -> Result<(), StudyError> {
        self.tx.commit().await.map_err(map_db_err)
    }

    async fn rollback(self) -> Result<(), StudyError> {
        self.tx.rollback().await.map_err(map_db_err)
    }
}
