//! Business logic services.

#![allow(missing_docs)]

pub mod aggregator;
pub mod catalog;
pub mod comment;
pub mod memory_backend;
pub mod poll;
pub mod subscription;
pub mod vote_store;

pub use aggregator::{
    AggregateResult, AvatarPolicy, OptionTally, PlaceholderAvatarPolicy, Voter, aggregate,
};
pub use catalog::{
    Collaborators, CommentStore, DbCommentStore, DbPollCatalog, InMemoryCommentStore,
    InMemoryPollCatalog, PollCatalog, UserCounters,
};
pub use comment::CommentService;
pub use memory_backend::InMemoryVoteBackend;
pub use poll::{
    CreatePollInput, PollListing, PollService, PollWithStatus, VoteFilter, VoteFilterStats,
};
pub use subscription::{SnapshotHub, SnapshotRelay, SubscriptionHandle, VoteSubscription};
pub use vote_store::{
    CastVote, ProfileUpdate, RawVoteSet, VoteBackend, VoteRecord, VoteStore, VoterIdentity,
};
