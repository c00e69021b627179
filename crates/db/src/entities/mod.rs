//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod poll;
pub mod user_stats;

pub use comment::Entity as Comment;
pub use poll::Entity as Poll;
pub use user_stats::Entity as UserStats;
