use axum::body::Bytes;
use axum::extract::ws::Message;
use blackroad_events::hub::HubReceiver;
use blackroad_events::ConnectionHub;

/// Log-hub subscribers, one per `/ws/logs` connection.
///
/// A thin WebSocket-flavoured wrapper over [`ConnectionHub`]; designed to be
/// wrapped in `Arc` and shared across the application.
pub struct WsManager {
    hub: ConnectionHub<Message>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            hub: ConnectionHub::new(),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> HubReceiver<Message> {
        self.hub.join(conn_id).await
    }

    pub async fn remove(&self, conn_id: &str) {
        self.hub.leave(conn_id).await;
    }

    /// Broadcast a message to all connected clients. Returns how many
    /// received it; closed connections are pruned.
    pub async fn broadcast(&self, message: Message) -> usize {
        self.hub.broadcast(message).await
    }

    pub async fn broadcast_text(&self, text: impl Into<String>) -> usize {
        let text: String = text.into();
        self.broadcast(Message::Text(text.into())).await
    }

    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.hub.send_to(conn_id, message).await
    }

    pub async fn connection_count(&self) -> usize {
        self.hub.connection_count().await
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        self.hub.close_all(Some(Message::Close(None))).await;
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        self.hub.broadcast(Message::Ping(Bytes::new())).await;
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
