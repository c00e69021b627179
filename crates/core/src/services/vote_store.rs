//! Vote store.
//!
//! Votes are kept per poll, per option, per user: the composite key
//! `(poll_id, option_id, user_id)` addresses exactly one [`VoteRecord`]. The
//! store enforces one vote per user per poll on a best-effort basis, patches
//! profile snapshots into existing records and hands out live subscriptions.
//! Persistence is delegated to a [`VoteBackend`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pollcast_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::subscription::{SubscriptionHandle, VoteSubscription};

/// A single user's vote on a poll.
///
/// Field names match the stored document layout, including the legacy
/// `name` / `profilePic` fields written by older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub poll_id: String,
    pub option_id: String,
    pub user_id: String,
    /// Display name captured at vote time.
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub legacy_name: Option<String>,
    /// Avatar reference captured at vote time.
    #[serde(rename = "userAvatar", default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(rename = "profilePic", default, skip_serializing_if = "Option::is_none")]
    pub legacy_avatar: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl VoteRecord {
    /// Build a fresh record for `voter`.
    #[must_use]
    pub fn new(poll_id: &str, option_id: &str, voter: &VoterIdentity, timestamp: i64) -> Self {
        Self {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            user_id: voter.user_id.clone(),
            display_name: voter.display_name.clone(),
            legacy_name: None,
            avatar_ref: voter.avatar_ref.clone(),
            legacy_avatar: None,
            timestamp,
        }
    }

    /// Apply the supplied profile fields. Returns whether anything changed.
    pub fn apply_profile(&mut self, update: &ProfileUpdate) -> bool {
        let mut changed = false;
        if let Some(name) = &update.display_name {
            if self.display_name.as_ref() != Some(name) {
                self.display_name = Some(name.clone());
                changed = true;
            }
        }
        if let Some(avatar) = &update.avatar_ref {
            if self.avatar_ref.as_ref() != Some(avatar) {
                self.avatar_ref = Some(avatar.clone());
                changed = true;
            }
        }
        changed
    }
}

/// All votes of one poll: option id → user id → record.
pub type RawVoteSet = BTreeMap<String, BTreeMap<String, VoteRecord>>;

/// Who is voting, as reported by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterIdentity {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
}

impl VoterIdentity {
    /// Identity with only a user id.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Attach an avatar reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar.into());
        self
    }
}

/// Profile fields to copy into existing vote records. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update carries no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_ref.is_none()
    }
}

impl From<&VoterIdentity> for ProfileUpdate {
    fn from(voter: &VoterIdentity) -> Self {
        Self {
            display_name: voter.display_name.clone(),
            avatar_ref: voter.avatar_ref.clone(),
        }
    }
}

/// Outcome of a successful cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVote {
    /// The record as written.
    pub record: VoteRecord,
    /// `false` when the user re-cast the option they had already picked.
    pub is_new: bool,
}

/// Storage for vote records.
///
/// Single-key operations must be atomic. `put_record` must notify live
/// subscribers of the record's poll.
#[async_trait]
pub trait VoteBackend: Send + Sync {
    /// Every poll that has at least one vote.
    async fn poll_ids(&self) -> AppResult<Vec<String>>;

    /// Option ids with votes under `poll_id`, in lexicographic order.
    async fn option_ids(&self, poll_id: &str) -> AppResult<Vec<String>>;

    /// Look up the record at the composite key.
    async fn get_record(
        &self,
        poll_id: &str,
        option_id: &str,
        user_id: &str,
    ) -> AppResult<Option<VoteRecord>>;

    /// Insert or overwrite the record at its composite key.
    async fn put_record(&self, record: VoteRecord) -> AppResult<()>;

    /// The full raw vote set of a poll.
    async fn load_poll(&self, poll_id: &str) -> AppResult<RawVoteSet>;

    /// A snapshot receiver for `poll_id`, marked changed so the first read
    /// yields the current state.
    async fn subscribe(&self, poll_id: &str) -> AppResult<watch::Receiver<RawVoteSet>>;
}

/// Vote store over an injected backend.
#[derive(Clone)]
pub struct VoteStore {
    backend: Arc<dyn VoteBackend>,
}

impl VoteStore {
    /// Create a new vote store.
    #[must_use]
    pub fn new(backend: Arc<dyn VoteBackend>) -> Self {
        Self { backend }
    }

    /// Record `voter`'s choice of `option_id` on `poll_id`.
    ///
    /// The caller has already checked that the poll and option exist. A vote
    /// for another option of the same poll is rejected with
    /// [`AppError::AlreadyVoted`]. Re-casting the same option updates the
    /// stored record with whatever profile fields `voter` carries, keeping its
    /// original timestamp and every field `voter` leaves out.
    ///
    /// The existence check and the write are separate backend calls, so two
    /// concurrent casts by one user for different options can both land.
    pub async fn cast_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        voter: &VoterIdentity,
    ) -> AppResult<CastVote> {
        if poll_id.is_empty() || option_id.is_empty() {
            return Err(AppError::BadRequest(
                "Poll and option are required".to_string(),
            ));
        }
        if voter.user_id.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let existing = self.find_user_record(poll_id, &voter.user_id).await?;

        let (record, is_new) = match existing {
            Some(record) if record.option_id != option_id => {
                debug!(
                    poll_id = %poll_id,
                    user_id = %voter.user_id,
                    existing = %record.option_id,
                    "Rejected second vote"
                );
                return Err(AppError::AlreadyVoted(poll_id.to_string()));
            }
            Some(mut record) => {
                record.apply_profile(&ProfileUpdate::from(voter));
                (record, false)
            }
            None => (
                VoteRecord::new(poll_id, option_id, voter, Utc::now().timestamp_millis()),
                true,
            ),
        };

        self.backend.put_record(record.clone()).await?;

        info!(
            poll_id = %poll_id,
            option_id = %option_id,
            user_id = %voter.user_id,
            is_new,
            "Vote recorded"
        );

        Ok(CastVote { record, is_new })
    }

    /// The option `user_id` voted for on `poll_id`, if any.
    pub async fn get_user_vote(&self, poll_id: &str, user_id: &str) -> AppResult<Option<String>> {
        Ok(self
            .find_user_record(poll_id, user_id)
            .await?
            .map(|record| record.option_id))
    }

    /// First record of `user_id` found scanning options in id order.
    async fn find_user_record(&self, poll_id: &str, user_id: &str) -> AppResult<Option<VoteRecord>> {
        for option_id in self.backend.option_ids(poll_id).await? {
            if let Some(record) = self.backend.get_record(poll_id, &option_id, user_id).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Copy new profile fields into every vote `user_id` has cast.
    ///
    /// Returns the number of records patched. If a backend call fails part way
    /// the records already patched stay patched and the error reports how many
    /// there were. Running the same update again is harmless.
    pub async fn propagate_profile_update(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> AppResult<usize> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut updated = 0;
        match self.patch_all(user_id, update, &mut updated).await {
            Ok(()) => {
                info!(user_id = %user_id, updated, "Propagated profile update");
                Ok(updated)
            }
            Err(e) => {
                warn!(user_id = %user_id, updated, error = %e, "Profile propagation interrupted");
                Err(AppError::PartialPropagation {
                    updated,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn patch_all(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        updated: &mut usize,
    ) -> AppResult<()> {
        for poll_id in self.backend.poll_ids().await? {
            for option_id in self.backend.option_ids(&poll_id).await? {
                let Some(mut record) = self
                    .backend
                    .get_record(&poll_id, &option_id, user_id)
                    .await?
                else {
                    continue;
                };

                if record.apply_profile(update) {
                    self.backend.put_record(record).await?;
                }
                *updated += 1;
            }
        }
        Ok(())
    }

    /// One-shot snapshot of a poll's raw votes.
    pub async fn snapshot(&self, poll_id: &str) -> AppResult<RawVoteSet> {
        self.backend.load_poll(poll_id).await
    }

    /// Subscribe to a poll's raw vote set.
    pub async fn subscribe(&self, poll_id: &str) -> AppResult<VoteSubscription> {
        let rx = self.backend.subscribe(poll_id).await?;
        debug!(poll_id = %poll_id, "Vote subscription opened");
        Ok(VoteSubscription::new(poll_id, rx))
    }

    /// Invoke `on_change` with every snapshot of `poll_id` until the returned
    /// handle is unsubscribed.
    pub async fn watch<F>(&self, poll_id: &str, on_change: F) -> AppResult<SubscriptionHandle>
    where
        F: FnMut(RawVoteSet) + Send + 'static,
    {
        Ok(self.subscribe(poll_id).await?.spawn_watch(on_change))
    }
}
