//! Named-group fan-out over per-subscriber channels.
//!
//! Groups are opaque string names (the engine and the gateway use
//! `"job_" + session_id`). Membership changes take effect immediately
//! for subsequent publishes: a subscriber that joins after a publish
//! never sees it, and one that left before a publish never sees it.
//! There is no replay log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

/// Opaque handle identifying one subscription within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiver half handed to a subscriber on join.
///
/// Unbounded: a lagging subscriber grows only its own queue, which is
/// freed when it leaves or disconnects; it can never block a publish or
/// another subscriber.
pub type Subscription = mpsc::UnboundedReceiver<serde_json::Value>;

type GroupMembers = HashMap<SubscriberId, mpsc::UnboundedSender<serde_json::Value>>;

/// In-memory publish/subscribe hub keyed by group name.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared between the job engine and every gateway connection.
pub struct Broker {
    groups: RwLock<HashMap<String, GroupMembers>>,
    next_id: AtomicU64,
}

impl Broker {
    /// Create a new, empty broker.
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Join a group, creating it on first join.
    ///
    /// Returns the subscriber id (needed to leave) and the receiver for
    /// every message published to the group from this moment on.
    pub async fn join(&self, group: &str) -> (SubscriberId, Subscription) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.groups
            .write()
            .await
            .entry(group.to_string())
            .or_default()
            .insert(id, tx);
        (id, rx)
    }

    /// Leave a group. The group itself is removed once its last
    /// subscriber is gone. Leaving an unknown group or id is a no-op.
    pub async fn leave(&self, group: &str, id: SubscriberId) {
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// Deliver `message` to every current member of `group`.
    ///
    /// Fire-and-forget: subscribers whose channels are closed are
    /// silently skipped (they are cleaned up when they leave). A group
    /// with zero subscribers is a no-op, not an error. Returns the
    /// number of subscribers the message was handed to.
    pub async fn publish(&self, group: &str, message: serde_json::Value) -> usize {
        let groups = self.groups.read().await;
        let Some(members) = groups.get(group) else {
            return 0;
        };
        let mut delivered = 0;
        for sender in members.values() {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Current number of subscribers in a group (0 for unknown groups).
    pub async fn group_size(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map_or(0, |members| members.len())
    }

    /// Drop every subscription in every group.
    ///
    /// Used during graceful shutdown: receivers observe channel close
    /// and their connection tasks exit.
    pub async fn shutdown(&self) {
        let mut groups = self.groups.write().await;
        let count: usize = groups.values().map(HashMap::len).sum();
        groups.clear();
        tracing::info!(count, "Dropped all broker subscriptions");
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}
