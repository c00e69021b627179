//! In-process vote backend.

use std::collections::HashMap;

use async_trait::async_trait;
use pollcast_common::AppResult;
use tokio::sync::{RwLock, watch};
use tracing::trace;

use super::subscription::SnapshotHub;
use super::vote_store::{RawVoteSet, VoteBackend, VoteRecord};

/// Vote backend keeping everything in memory.
///
/// Writes publish to subscribers while still holding the write lock, so every
/// subscriber observes writes in the order they were applied.
#[derive(Default)]
pub struct InMemoryVoteBackend {
    votes: RwLock<HashMap<String, RawVoteSet>>,
    hub: SnapshotHub,
}

impl InMemoryVoteBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record exactly as given, without touching subscribers.
    ///
    /// Used to seed legacy-shaped data.
    pub async fn insert_raw(&self, record: VoteRecord) {
        self.votes
            .write()
            .await
            .entry(record.poll_id.clone())
            .or_default()
            .entry(record.option_id.clone())
            .or_default()
            .insert(record.user_id.clone(), record);
    }
}

#[async_trait]
impl VoteBackend for InMemoryVoteBackend {
    async fn poll_ids(&self) -> AppResult<Vec<String>> {
        let mut ids: Vec<String> = self.votes.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn option_ids(&self, poll_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .votes
            .read()
            .await
            .get(poll_id)
            .map(|options| options.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_record(
        &self,
        poll_id: &str,
        option_id: &str,
        user_id: &str,
    ) -> AppResult<Option<VoteRecord>> {
        Ok(self
            .votes
            .read()
            .await
            .get(poll_id)
            .and_then(|options| options.get(option_id))
            .and_then(|voters| voters.get(user_id))
            .cloned())
    }

    async fn put_record(&self, record: VoteRecord) -> AppResult<()> {
        let mut votes = self.votes.write().await;
        let poll_id = record.poll_id.clone();
        let poll = votes.entry(poll_id.clone()).or_default();
        poll.entry(record.option_id.clone())
            .or_default()
            .insert(record.user_id.clone(), record);

        let snapshot = poll.clone();
        self.hub.publish(&poll_id, snapshot).await;
        trace!(poll_id = %poll_id, "Stored vote record");
        Ok(())
    }

    async fn load_poll(&self, poll_id: &str) -> AppResult<RawVoteSet> {
        Ok(self
            .votes
            .read()
            .await
            .get(poll_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe(&self, poll_id: &str) -> AppResult<watch::Receiver<RawVoteSet>> {
        let votes = self.votes.read().await;
        let current = votes.get(poll_id).cloned().unwrap_or_default();
        let rx = self.hub.subscribe(poll_id, current.clone()).await;
        self.hub.publish(poll_id, current).await;
        Ok(rx)
    }
}
