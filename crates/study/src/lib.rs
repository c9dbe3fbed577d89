pub mod catalog;
mod engine;
mod error;
pub mod models;
pub mod store;

pub use engine::{
    CompletionOutcome, DashboardSummary, StudyEngine, TopicView, ViewOutcome,
    DEFAULT_COMPLETION_POINTS,
};
pub use error::StudyError;
pub use models::{
    Achievement, Announcement, Comment, Law, ProgressStatus, Subject, User, UserAchievement,
    UserFavorite, UserMarkup, UserNote, UserProgress, UserRole, UserSeenAnnouncement,
};
pub use store::{MemoryStudyStore, PgStudyStore, PurgeReport, StudyStore, StudyTx};
