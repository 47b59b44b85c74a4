//! Task dispatch
//!
//! Delivers a task to exactly one agent and reflects the assignment in the
//! registry. "Not found" and "send failed" are reported as `false`, never as
//! errors: an agent disappearing between selection and send is a normal race.

use crate::messages::ServerMessage;
use crate::state::{AgentRegistry, AgentStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Transport seam the dispatcher pushes task messages through.
///
/// Implemented by the live connection table; tests substitute a mock.
#[async_trait]
pub trait TaskChannel: Send + Sync {
    /// Deliver a message to the given connection. An error means the agent
    /// was unreachable; the dispatcher treats it as a failed send.
    async fn send(&self, connection_id: &str, message: ServerMessage) -> anyhow::Result<()>;
}

/// Selects a target agent and pushes a task to it.
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    channel: Arc<dyn TaskChannel>,
}

impl Dispatcher {
    /// Create a dispatcher over the given registry and channel.
    pub fn new(registry: Arc<AgentRegistry>, channel: Arc<dyn TaskChannel>) -> Self {
        Self { registry, channel }
    }

    /// Send a task to the agent with the given logical id.
    ///
    /// On success the agent's status becomes `Working` and its
    /// `current_task_id` is set — but only after the send returned, so status
    /// is a scheduling hint, not a delivery acknowledgment. On any failure
    /// the registry is left untouched and `false` is returned.
    pub async fn send_to_agent(&self, agent_id: &str, task_id: &str, task: Value) -> bool {
        let Some(agent) = self.registry.find_by_id(agent_id).await else {
            warn!(agent_id = %agent_id, task_id = %task_id, "Dispatch target not found");
            return false;
        };

        let message = ServerMessage::ExecuteTask {
            task_id: task_id.to_string(),
            task,
        };
        if let Err(e) = self.channel.send(&agent.connection_id, message).await {
            warn!(
                agent_id = %agent_id,
                task_id = %task_id,
                error = %e,
                "Failed to send task to agent"
            );
            return false;
        }

        self.registry
            .update_status(
                &agent.connection_id,
                AgentStatus::Working,
                Some(task_id.to_string()),
            )
            .await;
        info!(agent_id = %agent_id, task_id = %task_id, "Task dispatched");
        true
    }

    /// Send a task to the first available agent.
    ///
    /// Selection is the first element of the idle snapshot, with no priority
    /// or load awareness. Returns `false` without touching the channel when
    /// no agent is available; tasks are never queued for later.
    pub async fn send_to_first_idle(&self, task_id: &str, task: Value) -> bool {
        let idle = self.registry.list_idle().await;
        let Some(agent) = idle.first() else {
            warn!(task_id = %task_id, "No idle agent available");
            return false;
        };
        self.send_to_agent(&agent.agent_id, task_id, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Agent;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records sends; optionally fails every send.
    struct MockChannel {
        sent: Mutex<Vec<(String, ServerMessage)>>,
        fail: bool,
    }

    impl MockChannel {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn sent(&self) -> Vec<(String, ServerMessage)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskChannel for MockChannel {
        async fn send(&self, connection_id: &str, message: ServerMessage) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("send failed");
            }
            self.sent
                .lock()
                .unwrap()
                .push((connection_id.to_string(), message));
            Ok(())
        }
    }

    fn agent(agent_id: &str, connection_id: &str) -> Agent {
        Agent::connect(
            agent_id.to_string(),
            connection_id.to_string(),
            "Test Agent".to_string(),
            "test-host".to_string(),
        )
    }

    #[tokio::test]
    async fn test_send_to_agent_success_marks_working() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(agent("a1", "c1")).await;
        let channel = MockChannel::new(false);
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone());

        assert!(dispatcher.send_to_agent("a1", "t1", json!({})).await);

        let found = registry.find_by_connection("c1").await.unwrap();
        assert_eq!(found.status, AgentStatus::Working);
        assert_eq!(found.current_task_id.as_deref(), Some("t1"));

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "c1");
        match &sent[0].1 {
            ServerMessage::ExecuteTask { task_id, .. } => assert_eq!(task_id, "t1"),
        }
    }

    #[tokio::test]
    async fn test_send_to_unknown_agent_leaves_registry_untouched() {
        let registry = Arc::new(AgentRegistry::new());
        let channel = MockChannel::new(false);
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone());

        assert!(!dispatcher.send_to_agent("ghost", "t1", json!({})).await);
        assert_eq!(registry.count().await, 0);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_update_status() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(agent("a1", "c1")).await;
        let channel = MockChannel::new(true);
        let dispatcher = Dispatcher::new(registry.clone(), channel);

        assert!(!dispatcher.send_to_agent("a1", "t1", json!({})).await);

        let found = registry.find_by_connection("c1").await.unwrap();
        assert_eq!(found.status, AgentStatus::Connected);
        assert!(found.current_task_id.is_none());
    }

    #[tokio::test]
    async fn test_first_idle_with_no_agents_skips_channel() {
        let registry = Arc::new(AgentRegistry::new());
        let channel = MockChannel::new(false);
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone());

        assert!(!dispatcher.send_to_first_idle("t1", json!({})).await);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_first_idle_ignores_working_agents() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(agent("a1", "c1")).await;
        registry.register(agent("a2", "c2")).await;
        registry
            .update_status("c1", AgentStatus::Working, Some("t0".to_string()))
            .await;
        let channel = MockChannel::new(false);
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone());

        assert!(dispatcher.send_to_first_idle("t1", json!({})).await);

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "c2");
        let untouched = registry.find_by_connection("c1").await.unwrap();
        assert_eq!(untouched.current_task_id.as_deref(), Some("t0"));
    }

    #[tokio::test]
    async fn test_first_idle_dispatches_exactly_one() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(agent("a1", "c1")).await;
        registry.register(agent("a2", "c2")).await;
        registry.register(agent("a3", "c3")).await;
        let channel = MockChannel::new(false);
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone());

        assert!(dispatcher.send_to_first_idle("t1", json!({})).await);

        assert_eq!(channel.sent().len(), 1);
        let working: Vec<_> = registry
            .list_active()
            .await
            .into_iter()
            .filter(|a| a.status == AgentStatus::Working)
            .collect();
        assert_eq!(working.len(), 1);
        assert_eq!(working[0].current_task_id.as_deref(), Some("t1"));
    }
}
