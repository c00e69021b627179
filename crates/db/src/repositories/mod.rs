//! Database repositories.

mod comment;
mod poll;
mod user_stats;

pub use comment::CommentRepository;
pub use poll::PollRepository;
pub use user_stats::UserStatsRepository;
