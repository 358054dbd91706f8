use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

/// Sender half held by the hub for one subscriber.
pub type HubSender<M> = mpsc::UnboundedSender<M>;

/// Receiver half handed to the subscriber on [`ConnectionHub::join`].
pub type HubReceiver<M> = mpsc::UnboundedReceiver<M>;

/// A set of live subscribers that can all be sent the same message.
///
/// Thread-safe via interior `RwLock`; wrap in `Arc` to share. Broadcasts take
/// the read lock, so concurrent broadcasts never wait on each other, while
/// `join` and `leave` take the write lock. Once `leave` returns, the departed
/// subscriber is no longer reachable from any later broadcast.
pub struct ConnectionHub<M> {
    subscribers: RwLock<HashMap<String, HubSender<M>>>,
}

impl<M: Clone> ConnectionHub<M> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber and return the receiving end of its channel.
    ///
    /// Joining with an id that is already present replaces the old channel;
    /// the old receiver then observes end-of-stream.
    pub async fn join(&self, conn_id: impl Into<String>) -> HubReceiver<M> {
        let conn_id = conn_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let total = {
            let mut subs = self.subscribers.write().await;
            subs.insert(conn_id.clone(), tx);
            subs.len()
        };
        tracing::debug!(conn_id = %conn_id, total, "Subscriber joined");
        rx
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn leave(&self, conn_id: &str) {
        let removed = self.subscribers.write().await.remove(conn_id).is_some();
        if removed {
            tracing::debug!(conn_id, "Subscriber left");
        }
    }

    /// Deliver `message` to every subscriber.
    ///
    /// A subscriber whose receiver has been dropped is skipped and then
    /// pruned; one failed delivery never stops the others. Returns the number
    /// of subscribers the message was delivered to.
    pub async fn broadcast(&self, message: M) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().await;
            for (conn_id, sender) in subs.iter() {
                if sender.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(conn_id.clone());
                }
            }
        }

        if !closed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for conn_id in &closed {
                // A new subscriber may have re-joined under the same id.
                if subs.get(conn_id).is_some_and(|s| s.is_closed()) {
                    subs.remove(conn_id);
                }
            }
            tracing::debug!(pruned = closed.len(), "Pruned closed subscribers");
        }

        delivered
    }

    /// Deliver `message` to a single subscriber. Returns `false` when the id
    /// is unknown or its receiver is gone.
    pub async fn send_to(&self, conn_id: &str, message: M) -> bool {
        self.subscribers
            .read()
            .await
            .get(conn_id)
            .is_some_and(|sender| sender.send(message).is_ok())
    }

    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn contains(&self, conn_id: &str) -> bool {
        self.subscribers.read().await.contains_key(conn_id)
    }

    /// Send an optional final message to every subscriber, then drop all
    /// senders so each receiver observes end-of-stream.
    ///
    /// Used during graceful shutdown.
    pub async fn close_all(&self, final_message: Option<M>) {
        let mut subs = self.subscribers.write().await;
        let count = subs.len();
        if let Some(message) = final_message {
            for sender in subs.values() {
                let _ = sender.send(message.clone());
            }
        }
        subs.clear();
        tracing::info!(count, "Closed all hub subscribers");
    }
}

impl<M: Clone> Default for ConnectionHub<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let hub = ConnectionHub::<String>::new();
        let mut a = hub.join("a").await;
        let mut b = hub.join("b").await;

        assert_eq!(hub.broadcast("hello".to_string()).await, 2);
        assert_eq!(a.recv().await.as_deref(), Some("hello"));
        assert_eq!(b.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_block_others() {
        let hub = ConnectionHub::<u32>::new();
        let a = hub.join("a").await;
        let mut b = hub.join("b").await;
        drop(a);

        assert_eq!(hub.broadcast(7).await, 1);
        assert_eq!(b.recv().await, Some(7));
        assert_eq!(hub.connection_count().await, 1);
        assert!(!hub.contains("a").await);
    }

    #[tokio::test]
    async fn no_delivery_after_leave() {
        let hub = ConnectionHub::<u32>::new();
        let mut a = hub.join("a").await;
        hub.leave("a").await;

        assert_eq!(hub.broadcast(1).await, 0);
        // The hub dropped its sender, so the channel is closed and empty.
        assert_eq!(a.recv().await, None);
    }

    #[tokio::test]
    async fn leave_unknown_is_noop() {
        let hub = ConnectionHub::<u32>::new();
        hub.leave("ghost").await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn send_to_targets_one_subscriber() {
        let hub = ConnectionHub::<u32>::new();
        let mut a = hub.join("a").await;
        let mut b = hub.join("b").await;

        assert!(hub.send_to("a", 5).await);
        assert!(!hub.send_to("missing", 5).await);
        assert_eq!(a.recv().await, Some(5));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_all_sends_final_message_and_ends_streams() {
        let hub = ConnectionHub::<&'static str>::new();
        let mut a = hub.join("a").await;

        hub.close_all(Some("bye")).await;
        assert_eq!(a.recv().await, Some("bye"));
        assert_eq!(a.recv().await, None);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_broadcasts_deliver_each_message_once() {
        let hub = Arc::new(ConnectionHub::<u32>::new());
        let mut rx = hub.join("watcher").await;

        let mut tasks = Vec::new();
        for i in 0..50 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move { hub.broadcast(i).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), 1);
        }

        let mut seen = Vec::new();
        while let Ok(v) = rx.try_recv() {
            seen.push(v);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn join_and_leave_race_with_broadcast() {
        let hub = Arc::new(ConnectionHub::<u32>::new());
        let mut stable = hub.join("stable").await;

        let churn = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for i in 0..100 {
                    let id = format!("transient-{i}");
                    let _rx = hub.join(id.clone()).await;
                    hub.leave(&id).await;
                }
            })
        };
        for i in 0..100 {
            hub.broadcast(i).await;
        }
        churn.await.unwrap();

        let mut count = 0;
        while stable.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 100);
        assert_eq!(hub.connection_count().await, 1);
    }
}
