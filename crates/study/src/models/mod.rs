mod achievement;
mod announcement;
mod comment;
mod law;
mod notes;
mod progress;
mod user;

pub use achievement::{Achievement, UserAchievement};
pub use announcement::{Announcement, UserSeenAnnouncement};
pub use comment::Comment;
pub use law::{Law, Subject, UserFavorite};
pub use notes::{UserMarkup, UserNote};
pub use progress::{ProgressStatus, UserProgress};
pub use user::{User, UserRole};
