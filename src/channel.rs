//! Outbound connection table for agent sockets.
//!
//! Each live agent socket registers the sending half of its outbound queue
//! here under its connection id; dispatch pushes task messages through it.

use crate::dispatch::TaskChannel;
use crate::messages::ServerMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

/// Table of live agent connections keyed by connection id.
#[derive(Debug, Default)]
pub struct ConnectionMap {
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<ServerMessage>>>,
}

impl ConnectionMap {
    /// Create an empty connection table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound sender, replacing any previous entry
    /// for the same connection id.
    pub async fn insert(&self, connection_id: String, sender: mpsc::UnboundedSender<ServerMessage>) {
        self.senders.write().await.insert(connection_id, sender);
    }

    /// Detach a connection. No-op for unknown ids.
    pub async fn remove(&self, connection_id: &str) {
        self.senders.write().await.remove(connection_id);
    }
}

#[async_trait]
impl TaskChannel for ConnectionMap {
    /// Queue a message for the given connection. The push is in-memory and
    /// non-blocking; the socket task drains the queue onto the wire.
    async fn send(&self, connection_id: &str, message: ServerMessage) -> anyhow::Result<()> {
        let senders = self.senders.read().await;
        let sender = senders
            .get(connection_id)
            .ok_or_else(|| anyhow::anyhow!("connection {} is not attached", connection_id))?;
        sender
            .send(message)
            .map_err(|_| anyhow::anyhow!("connection {} is closed", connection_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn execute_task(task_id: &str) -> ServerMessage {
        ServerMessage::ExecuteTask {
            task_id: task_id.to_string(),
            task: json!({}),
        }
    }

    #[tokio::test]
    async fn test_send_to_attached_connection() {
        let connections = ConnectionMap::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connections.insert("c1".to_string(), tx).await;

        connections.send("c1", execute_task("t1")).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, execute_task("t1"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection_fails() {
        let connections = ConnectionMap::new();
        assert!(connections.send("ghost", execute_task("t1")).await.is_err());
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_fails() {
        let connections = ConnectionMap::new();
        let (tx, rx) = mpsc::unbounded_channel();
        connections.insert("c1".to_string(), tx).await;
        drop(rx);

        assert!(connections.send("c1", execute_task("t1")).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_detaches_connection() {
        let connections = ConnectionMap::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        connections.insert("c1".to_string(), tx).await;
        connections.remove("c1").await;

        assert!(connections.send("c1", execute_task("t1")).await.is_err());
    }
}
