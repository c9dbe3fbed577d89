use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use lextrail_common::get_current_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Achievement {
    pub id: Uuid,

    pub name: String,
    pub description: String,
    pub icon: Option<String>,

    pub points_threshold: Option<i64>,
    pub laws_completed_threshold: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Achievement {
    pub fn for_points(name: &str, description: &str, icon: Option<&str>, threshold: i64) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.map(str::to_string),
            points_threshold: Some(threshold),
            laws_completed_threshold: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_completions(name: &str, description: &str, icon: Option<&str>, threshold: i64) -> Self {
        let mut achievement = Self::for_points(name, description, icon, 0);
        achievement.points_threshold = None;
        achievement.laws_completed_threshold = Some(threshold);
        achievement
    }

    /// OR across the two thresholds; an unset side never blocks the other.
    pub fn is_met(&self, points: i64, completed_count: i64) -> bool {
        let by_points = self.points_threshold.map_or(false, |t| points >= t);
        let by_completions = self
            .laws_completed_threshold
            .map_or(false, |t| completed_count >= t);
        by_points || by_completions
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserAchievement {
    pub id: Uuid,

    pub user_id: Uuid,
    pub achievement_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

impl UserAchievement {
    pub fn grant(user_id: Uuid, achievement_id: Uuid) -> Self {
        let now = get_current_timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            achievement_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_threshold_alone_unlocks() {
        let achievement = Achievement::for_points("Centurião", "", None, 100);
        assert!(achievement.is_met(100, 0));
        assert!(achievement.is_met(150, 0));
        assert!(!achievement.is_met(99, 1000));
    }

    #[test]
    fn completion_threshold_alone_unlocks() {
        let achievement = Achievement::for_completions("Primeiro Passo", "", None, 5);
        assert!(achievement.is_met(0, 5));
        assert!(!achievement.is_met(1_000_000, 4));
    }

    #[test]
    fn either_threshold_is_enough() {
        let mut achievement = Achievement::for_points("Misto", "", None, 100);
        achievement.laws_completed_threshold = Some(5);

        assert!(achievement.is_met(100, 0));
        assert!(achievement.is_met(0, 5));
        assert!(!achievement.is_met(99, 4));
    }

    #[test]
    fn no_thresholds_never_unlocks() {
        let mut achievement = Achievement::for_points("Vazio", "", None, 0);
        achievement.points_threshold = None;
        assert!(!achievement.is_met(i64::MAX, i64::MAX));
    }
}
