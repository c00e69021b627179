//! Live subscription channel.
//!
//! Every watched poll owns one `watch` channel holding its latest raw vote set.
//! Writers replace the value, subscribers always read the newest snapshot, so a
//! slow consumer skips intermediate states instead of queueing them.

use std::collections::HashMap;
use std::sync::Arc;

use futures::Stream;
use pollcast_common::AppResult;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, trace};

use super::vote_store::RawVoteSet;

/// Fan-out point for per-poll snapshots.
#[derive(Default)]
pub struct SnapshotHub {
    channels: RwLock<HashMap<String, watch::Sender<RawVoteSet>>>,
}

impl SnapshotHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a new snapshot for `poll_id` to its subscribers.
    ///
    /// Polls nobody watches are skipped, and channels whose subscribers have all
    /// gone away are dropped.
    pub async fn publish(&self, poll_id: &str, snapshot: RawVoteSet) {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(poll_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            channels.remove(poll_id);
            debug!(poll_id = %poll_id, "Dropped idle snapshot channel");
            return;
        }

        sender.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        trace!(poll_id = %poll_id, "Published vote snapshot");
    }

    /// Register a receiver for `poll_id`.
    ///
    /// `initial` seeds the channel only when nobody is watching the poll yet.
    /// An active channel already holds the newest published snapshot and keeps
    /// it. The returned receiver is marked changed so its first read yields the
    /// current snapshot.
    pub async fn subscribe(&self, poll_id: &str, initial: RawVoteSet) -> watch::Receiver<RawVoteSet> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(poll_id.to_string())
            .or_insert_with(|| watch::Sender::new(RawVoteSet::new()));

        if sender.receiver_count() == 0 {
            sender.send_replace(initial);
        }

        let mut rx = sender.subscribe();
        rx.mark_changed();
        rx
    }

    /// Whether any live subscriber is attached to `poll_id`.
    pub async fn is_watched(&self, poll_id: &str) -> bool {
        self.channels
            .read()
            .await
            .get(poll_id)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    /// Polls with at least one live subscriber.
    pub async fn watched(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .channels
            .read()
            .await
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(poll_id, _)| poll_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Keeps a [`SnapshotHub`] in step with a store that also changes out of
/// process.
///
/// Every load runs under one lock and is published before the lock is
/// released, so snapshots reach the hub in the order they were read and a
/// later read never loses to an earlier one.
#[derive(Default)]
pub struct SnapshotRelay {
    hub: SnapshotHub,
    loads: Mutex<()>,
}

impl SnapshotRelay {
    /// Create a relay over an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The hub this relay feeds.
    #[must_use]
    pub const fn hub(&self) -> &SnapshotHub {
        &self.hub
    }

    /// Register a receiver for `poll_id` with a freshly loaded snapshot.
    ///
    /// A change that lands while `load` runs is picked up by the next
    /// [`refresh`](Self::refresh), which waits for the registration.
    pub async fn subscribe<F, Fut>(
        &self,
        poll_id: &str,
        load: F,
    ) -> AppResult<watch::Receiver<RawVoteSet>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<RawVoteSet>>,
    {
        let _guard = self.loads.lock().await;
        let snapshot = load().await?;
        let rx = self.hub.subscribe(poll_id, snapshot.clone()).await;
        self.hub.publish(poll_id, snapshot).await;
        Ok(rx)
    }

    /// Reload `poll_id` and publish it if anyone is watching.
    ///
    /// Returns whether a load happened.
    pub async fn refresh<F, Fut>(&self, poll_id: &str, load: F) -> AppResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<RawVoteSet>>,
    {
        let _guard = self.loads.lock().await;
        if !self.hub.is_watched(poll_id).await {
            return Ok(false);
        }

        let snapshot = load().await?;
        self.hub.publish(poll_id, snapshot).await;
        Ok(true)
    }
}

/// Cancels a subscription. Clones share the same cancellation.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        Self {
            cancel: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Stop future deliveries. Calling this more than once has no further effect.
    pub fn unsubscribe(&self) {
        self.cancel.send_replace(true);
    }

    /// Whether `unsubscribe` has been called.
    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// A live view of one poll's raw vote set.
pub struct VoteSubscription {
    poll_id: String,
    snapshots: watch::Receiver<RawVoteSet>,
    cancelled: watch::Receiver<bool>,
    handle: SubscriptionHandle,
}

impl VoteSubscription {
    /// Wrap a snapshot receiver obtained from a [`SnapshotHub`].
    #[must_use]
    pub fn new(poll_id: impl Into<String>, snapshots: watch::Receiver<RawVoteSet>) -> Self {
        let handle = SubscriptionHandle::new();
        Self {
            poll_id: poll_id.into(),
            snapshots,
            cancelled: handle.cancel.subscribe(),
            handle,
        }
    }

    /// The poll this subscription follows.
    #[must_use]
    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }

    /// Wait for the next snapshot.
    ///
    /// Returns the snapshot current at subscription time first. Returns `None`
    /// once the subscription is cancelled or its source is gone.
    pub async fn next(&mut self) -> Option<RawVoteSet> {
        if self.handle.is_unsubscribed() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancelled.wait_for(|cancelled| *cancelled) => None,
            changed = self.snapshots.changed() => match changed {
                Ok(()) => Some(self.snapshots.borrow_and_update().clone()),
                Err(_) => None,
            },
        }
    }

    /// Stop future deliveries.
    pub fn unsubscribe(&self) {
        self.handle.unsubscribe();
    }

    /// A cloneable handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Adapt into a stream of snapshots that ends on cancellation.
    pub fn into_stream(self) -> impl Stream<Item = RawVoteSet> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            let snapshot = sub.next().await?;
            Some((snapshot, sub))
        })
    }

    /// Invoke `on_change` for every snapshot on a background task.
    pub fn spawn_watch<F>(mut self, mut on_change: F) -> SubscriptionHandle
    where
        F: FnMut(RawVoteSet) + Send + 'static,
    {
        let handle = self.handle();
        tokio::spawn(async move {
            while let Some(snapshot) = self.next().await {
                on_change(snapshot);
            }
            debug!(poll_id = %self.poll_id, "Vote watcher stopped");
        });
        handle
    }
}

impl Drop for VoteSubscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::vote_store::VoteRecord;
    use pollcast_common::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn snapshot_with(user_id: &str) -> RawVoteSet {
        snapshot_with_all(&[user_id])
    }

    fn snapshot_with_all(user_ids: &[&str]) -> RawVoteSet {
        let voters: BTreeMap<String, VoteRecord> = user_ids
            .iter()
            .map(|user_id| (user_id.to_string(), record_for(user_id)))
            .collect();
        let mut raw = RawVoteSet::new();
        raw.insert("option_0".to_string(), voters);
        raw
    }

    fn record_for(user_id: &str) -> VoteRecord {
        VoteRecord {
            poll_id: "p1".to_string(),
            option_id: "option_0".to_string(),
            user_id: user_id.to_string(),
            display_name: Some(user_id.to_string()),
            legacy_name: None,
            avatar_ref: None,
            legacy_avatar: None,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_first_delivery_is_current_snapshot() {
        let hub = SnapshotHub::new();
        let rx = hub.subscribe("p1", snapshot_with("u1")).await;
        let mut sub = VoteSubscription::new("p1", rx);

        let first = sub.next().await.unwrap();
        assert_eq!(first, snapshot_with("u1"));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = SnapshotHub::new();
        let mut sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        assert!(sub.next().await.unwrap().is_empty());

        hub.publish("p1", snapshot_with("u2")).await;
        assert_eq!(sub.next().await.unwrap(), snapshot_with("u2"));
    }

    #[tokio::test]
    async fn test_slow_consumer_sees_latest_only() {
        let hub = SnapshotHub::new();
        let mut sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        sub.next().await.unwrap();

        hub.publish("p1", snapshot_with("u1")).await;
        hub.publish("p1", snapshot_with("u2")).await;

        assert_eq!(sub.next().await.unwrap(), snapshot_with("u2"));
        let pending = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = SnapshotHub::new();
        let mut sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(sub.handle().is_unsubscribed());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_cancels_waiting_subscriber() {
        let hub = SnapshotHub::new();
        let mut sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        sub.next().await.unwrap();

        let handle = sub.handle();
        let waiter = tokio::spawn(async move { sub.next().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.unsubscribe();

        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscriptions_are_independent() {
        let hub = SnapshotHub::new();
        let first = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        let mut second = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);

        first.unsubscribe();
        second.next().await.unwrap();
        hub.publish("p1", snapshot_with("u3")).await;

        assert_eq!(second.next().await.unwrap(), snapshot_with("u3"));
    }

    #[tokio::test]
    async fn test_idle_channels_are_dropped() {
        let hub = SnapshotHub::new();
        let sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        assert!(hub.is_watched("p1").await);

        drop(sub);
        hub.publish("p1", snapshot_with("u1")).await;
        assert!(!hub.is_watched("p1").await);
        assert!(hub.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_watch_invokes_callback() {
        let hub = SnapshotHub::new();
        let sub = VoteSubscription::new("p1", hub.subscribe("p1", RawVoteSet::new()).await);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = sub.spawn_watch(move |snapshot| {
            let _ = tx.send(snapshot.len());
        });

        assert_eq!(rx.recv().await.unwrap(), 0);
        hub.publish("p1", snapshot_with("u1")).await;
        assert_eq!(rx.recv().await.unwrap(), 1);

        handle.unsubscribe();
        hub.publish("p1", snapshot_with("u2")).await;
        let late = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(late, Err(_) | Ok(None)));
    }

    #[tokio::test]
    async fn test_late_subscriber_cannot_roll_back_active_channel() {
        let hub = SnapshotHub::new();
        let mut early = VoteSubscription::new("p1", hub.subscribe("p1", snapshot_with("u1")).await);
        early.next().await.unwrap();
        hub.publish("p1", snapshot_with_all(&["u1", "u2"])).await;
        assert_eq!(early.next().await.unwrap()["option_0"].len(), 2);

        let mut late = VoteSubscription::new("p1", hub.subscribe("p1", snapshot_with("u1")).await);

        assert_eq!(late.next().await.unwrap()["option_0"].len(), 2);
        let rolled_back = tokio::time::timeout(Duration::from_millis(50), early.next()).await;
        assert!(rolled_back.is_err());
    }

    #[tokio::test]
    async fn test_idle_channel_takes_new_seed() {
        let hub = SnapshotHub::new();
        drop(hub.subscribe("p1", snapshot_with("u1")).await);

        let mut sub = VoteSubscription::new("p1", hub.subscribe("p1", snapshot_with("u2")).await);

        assert_eq!(sub.next().await.unwrap(), snapshot_with("u2"));
    }

    #[tokio::test]
    async fn test_watched_lists_live_polls() {
        let hub = SnapshotHub::new();
        let _p2 = hub.subscribe("p2", RawVoteSet::new()).await;
        let _p1 = hub.subscribe("p1", RawVoteSet::new()).await;
        drop(hub.subscribe("p3", RawVoteSet::new()).await);

        assert_eq!(hub.watched().await, vec!["p1", "p2"]);
    }

    /// Stand-in for an out-of-process store.
    #[derive(Default)]
    struct RemoteVotes {
        votes: RwLock<RawVoteSet>,
        loads: AtomicUsize,
    }

    impl RemoteVotes {
        async fn write(&self, raw: RawVoteSet) {
            *self.votes.write().await = raw;
        }

        async fn load(&self) -> AppResult<RawVoteSet> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.votes.read().await.clone())
        }
    }

    #[tokio::test]
    async fn test_relay_picks_up_write_during_subscribe() {
        let relay = SnapshotRelay::new();
        let remote = RemoteVotes::default();
        remote.write(snapshot_with("u1")).await;

        // The load sees u1; u2 lands right after, before the registration is visible.
        let rx = relay
            .subscribe("p1", || async {
                let loaded = remote.load().await;
                remote.write(snapshot_with_all(&["u1", "u2"])).await;
                loaded
            })
            .await
            .unwrap();
        let mut sub = VoteSubscription::new("p1", rx);
        assert_eq!(sub.next().await.unwrap(), snapshot_with("u1"));

        assert!(relay.refresh("p1", || remote.load()).await.unwrap());
        assert_eq!(sub.next().await.unwrap()["option_0"].len(), 2);
    }

    #[tokio::test]
    async fn test_relay_subscribe_publishes_fresher_load_to_existing_watchers() {
        let relay = SnapshotRelay::new();
        let remote = RemoteVotes::default();
        remote.write(snapshot_with("u1")).await;
        let mut early = VoteSubscription::new(
            "p1",
            relay.subscribe("p1", || remote.load()).await.unwrap(),
        );
        early.next().await.unwrap();

        remote.write(snapshot_with_all(&["u1", "u2"])).await;
        let mut late = VoteSubscription::new(
            "p1",
            relay.subscribe("p1", || remote.load()).await.unwrap(),
        );

        assert_eq!(late.next().await.unwrap()["option_0"].len(), 2);
        assert_eq!(early.next().await.unwrap()["option_0"].len(), 2);
    }

    #[tokio::test]
    async fn test_relay_refresh_skips_unwatched_polls() {
        let relay = SnapshotRelay::new();
        let remote = RemoteVotes::default();

        assert!(!relay.refresh("p1", || remote.load()).await.unwrap());
        assert_eq!(remote.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_relay_refreshes_apply_in_load_order() {
        let relay = Arc::new(SnapshotRelay::new());
        let remote = Arc::new(RemoteVotes::default());
        let mut sub = VoteSubscription::new(
            "p1",
            relay.subscribe("p1", || remote.load()).await.unwrap(),
        );
        sub.next().await.unwrap();

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let slow = {
            let relay = relay.clone();
            tokio::spawn(async move {
                relay
                    .refresh("p1", move || async move {
                        let stale = snapshot_with("u1");
                        let _ = release_rx.await;
                        Ok::<_, AppError>(stale)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = {
            let relay = relay.clone();
            let remote = remote.clone();
            tokio::spawn(async move {
                remote.write(snapshot_with_all(&["u1", "u2"])).await;
                relay.refresh("p1", || remote.load()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!fast.is_finished());

        release_tx.send(()).unwrap();
        assert!(slow.await.unwrap().unwrap());
        assert!(fast.await.unwrap().unwrap());

        assert_eq!(sub.next().await.unwrap()["option_0"].len(), 2);
    }

    #[tokio::test]
    async fn test_relay_load_failure_propagates() {
        let relay = SnapshotRelay::new();

        let result = relay
            .subscribe("p1", || async {
                Err::<RawVoteSet, _>(AppError::Redis("connection refused".to_string()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Redis(_))));
        assert!(!relay.hub().is_watched("p1").await);
    }
}
