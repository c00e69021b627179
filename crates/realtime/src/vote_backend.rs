//! Redis vote backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{
    ClientLike, EventInterface, HashesInterface, PubsubInterface, SetsInterface,
    TransactionInterface,
};
use fred::types::Value;
use fred::types::config::Config as RedisConfig;
use pollcast_common::config::VoteStoreConfig;
use pollcast_common::{AppError, AppResult};
use pollcast_core::services::{RawVoteSet, SnapshotRelay, VoteBackend, VoteRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::keys::VoteKeys;

fn redis_err(e: RedisError) -> AppError {
    AppError::Redis(e.to_string())
}

/// Turn an option hash into user id → record, skipping entries that do not parse.
fn decode_voters(
    key: &str,
    fields: HashMap<String, String>,
) -> BTreeMap<String, VoteRecord> {
    fields
        .into_iter()
        .filter_map(|(user_id, payload)| {
            match serde_json::from_str::<VoteRecord>(&payload) {
                Ok(record) => Some((user_id, record)),
                Err(e) => {
                    warn!(key = %key, user_id = %user_id, error = %e, "Skipping malformed vote record");
                    None
                }
            }
        })
        .collect()
}

/// Vote backend on Redis with Pub/Sub change notification.
#[derive(Clone)]
pub struct RedisVoteBackend {
    client: Client,
    subscriber: SubscriberClient,
    keys: VoteKeys,
    relay: Arc<SnapshotRelay>,
}

impl RedisVoteBackend {
    /// Connect to Redis.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let client = Client::new(config.clone(), None, None, None);
        client.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!(prefix, "Redis vote backend initialized");

        Ok(Self {
            client,
            subscriber,
            keys: VoteKeys::new(prefix),
            relay: Arc::new(SnapshotRelay::new()),
        })
    }

    /// Connect using the `votes` configuration section.
    pub async fn from_config(config: &VoteStoreConfig) -> AppResult<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| AppError::Config("votes.redis_url is required".to_string()))?;
        Self::new(url, &config.prefix).await.map_err(redis_err)
    }

    /// Subscribe to the change channel and start relaying changes to local subscribers.
    pub async fn start(&self) -> Result<(), RedisError> {
        let channel = self.keys.channel();
        self.subscriber.subscribe(channel.as_str()).await?;
        info!(channel = %channel, "Subscribed to vote change channel");

        let backend = self.clone();
        let mut message_stream = self.subscriber.message_rx();

        tokio::spawn(async move {
            loop {
                match message_stream.recv().await {
                    Ok(message) => {
                        let Some(poll_id) = message.value.as_string() else {
                            continue;
                        };
                        backend.refresh(&poll_id).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Vote change stream lagged, reloading watched polls");
                        backend.refresh_watched().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Vote change stream ended");
        });

        Ok(())
    }

    /// Reload a poll and hand it to local subscribers, if there are any.
    async fn refresh(&self, poll_id: &str) {
        match self.relay.refresh(poll_id, || self.load_poll(poll_id)).await {
            Ok(true) => debug!(poll_id = %poll_id, "Relayed vote change"),
            Ok(false) => {}
            Err(e) => warn!(poll_id = %poll_id, error = %e, "Failed to reload poll votes"),
        }
    }

    /// Reload every poll with local subscribers.
    async fn refresh_watched(&self) {
        for poll_id in self.relay.hub().watched().await {
            self.refresh(&poll_id).await;
        }
    }

    /// Shutdown Redis connections.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.client.quit().await?;
        info!("Redis vote backend shutdown");
        Ok(())
    }
}

#[async_trait]
impl VoteBackend for RedisVoteBackend {
    async fn poll_ids(&self) -> AppResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .client
            .smembers(self.keys.polls())
            .await
            .map_err(redis_err)?;
        ids.sort();
        Ok(ids)
    }

    async fn option_ids(&self, poll_id: &str) -> AppResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .client
            .smembers(self.keys.options(poll_id))
            .await
            .map_err(redis_err)?;
        ids.sort();
        Ok(ids)
    }

    async fn get_record(
        &self,
        poll_id: &str,
        option_id: &str,
        user_id: &str,
    ) -> AppResult<Option<VoteRecord>> {
        let payload: Option<String> = self
            .client
            .hget(self.keys.option(poll_id, option_id), user_id)
            .await
            .map_err(redis_err)?;

        payload
            .map(|p| {
                serde_json::from_str(&p)
                    .map_err(|e| AppError::Storage(format!("Malformed vote record: {e}")))
            })
            .transpose()
    }

    async fn put_record(&self, record: VoteRecord) -> AppResult<()> {
        let payload = serde_json::to_string(&record)
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;

        // Record and index sets are written as one MULTI, all or nothing.
        let trx = self.client.multi();
        let _: Value = trx
            .hset(
                self.keys.option(&record.poll_id, &record.option_id),
                (record.user_id.as_str(), payload),
            )
            .await
            .map_err(redis_err)?;
        let _: Value = trx
            .sadd(self.keys.options(&record.poll_id), record.option_id.as_str())
            .await
            .map_err(redis_err)?;
        let _: Value = trx
            .sadd(self.keys.polls(), record.poll_id.as_str())
            .await
            .map_err(redis_err)?;
        let _: Value = trx.exec(true).await.map_err(redis_err)?;

        // The vote is committed; a failed notification is logged, not returned.
        let published: Result<i64, RedisError> = self
            .client
            .publish(self.keys.channel(), record.poll_id.as_str())
            .await;
        if let Err(e) = published {
            warn!(poll_id = %record.poll_id, error = %e, "Failed to publish vote change");
        }

        debug!(poll_id = %record.poll_id, option_id = %record.option_id, "Stored vote record in Redis");
        Ok(())
    }

    async fn load_poll(&self, poll_id: &str) -> AppResult<RawVoteSet> {
        let mut raw = RawVoteSet::new();
        for option_id in self.option_ids(poll_id).await? {
            let key = self.keys.option(poll_id, &option_id);
            let fields: HashMap<String, String> =
                self.client.hgetall(key.as_str()).await.map_err(redis_err)?;
            let voters = decode_voters(&key, fields);
            if !voters.is_empty() {
                raw.insert(option_id, voters);
            }
        }
        Ok(raw)
    }

    async fn subscribe(&self, poll_id: &str) -> AppResult<watch::Receiver<RawVoteSet>> {
        self.relay
            .subscribe(poll_id, || self.load_poll(poll_id))
            .await
    }
}
