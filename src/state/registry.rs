//! Agent registry
//!
//! Single source of truth for which remote agents are attached and what they
//! are doing. Safe for concurrent use from request handlers and socket tasks;
//! callers never take a lock themselves. All reads return owned snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Logical identifier an agent supplies at connect time.
///
/// Not guaranteed unique across simultaneous connections; lookups by this id
/// return the first match.
pub type AgentId = String;

/// Transport-level session identifier. Unique per live connection and
/// regenerated on every reconnect.
pub type ConnectionId = String;

/// Lifecycle state of an attached agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Freshly registered, no task seen yet
    Connected,
    /// Finished (or never started) a task, ready for dispatch
    Idle,
    /// Currently executing a task
    Working,
    /// Connection gone; terminal for this record
    Disconnected,
}

impl AgentStatus {
    /// Whether an agent in this state can accept a new task.
    /// `Connected` and `Idle` are equivalent for scheduling.
    pub fn is_available(self) -> bool {
        matches!(self, AgentStatus::Connected | AgentStatus::Idle)
    }
}

/// One remote worker attached over the agent channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Caller-supplied logical id (falls back to the connection id)
    pub agent_id: AgentId,
    /// Session id of the underlying channel connection
    pub connection_id: ConnectionId,
    /// Display name reported by the agent
    pub agent_name: String,
    /// Host the agent runs on, as reported at connect time
    pub host_name: String,
    /// When this connection registered
    pub connected_at: DateTime<Utc>,
    /// Current lifecycle state
    pub status: AgentStatus,
    /// Id of the last dispatched task. Set on dispatch and intentionally left
    /// in place after completion; only the status flips back to `Idle`.
    pub current_task_id: Option<String>,
}

impl Agent {
    /// Create a record for a freshly connected agent.
    pub fn connect(
        agent_id: AgentId,
        connection_id: ConnectionId,
        agent_name: String,
        host_name: String,
    ) -> Self {
        Self {
            agent_id,
            connection_id,
            agent_name,
            host_name,
            connected_at: Utc::now(),
            status: AgentStatus::Connected,
            current_task_id: None,
        }
    }
}

/// Concurrent directory of attached agents, keyed by connection id.
///
/// Every operation is fail-soft: absence is a normal outcome, never an error.
/// Agent churn (disconnects racing in-flight updates) is the expected
/// operating condition.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<ConnectionId, Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, replacing any existing record for the same
    /// connection id (idempotent upsert, not a merge).
    pub async fn register(&self, agent: Agent) {
        let mut agents = self.agents.write().await;
        let agent_id = agent.agent_id.clone();
        let agent_name = agent.agent_name.clone();
        agents.insert(agent.connection_id.clone(), agent);
        info!(
            agent_id = %agent_id,
            agent_name = %agent_name,
            count = agents.len(),
            "Agent registered"
        );
    }

    /// Remove an agent by connection id. No-op for unknown ids.
    pub async fn unregister(&self, connection_id: &str) {
        let mut agents = self.agents.write().await;
        if let Some(agent) = agents.remove(connection_id) {
            info!(
                agent_id = %agent.agent_id,
                remaining = agents.len(),
                "Agent unregistered"
            );
        }
    }

    /// Update an agent's status in place; also records `task_id` when given.
    ///
    /// Unknown connection ids are ignored (logged, not errored): a disconnect
    /// racing an in-flight status update is expected, not exceptional.
    pub async fn update_status(
        &self,
        connection_id: &str,
        status: AgentStatus,
        task_id: Option<String>,
    ) {
        let mut agents = self.agents.write().await;
        match agents.get_mut(connection_id) {
            Some(agent) => {
                agent.status = status;
                if let Some(task_id) = task_id {
                    agent.current_task_id = Some(task_id);
                }
            }
            None => {
                debug!(
                    connection_id = %connection_id,
                    ?status,
                    "Status update for unknown connection ignored"
                );
            }
        }
    }

    /// Snapshot of all agents that are not `Disconnected`, in unspecified
    /// order. The returned vector does not track later registry mutation.
    pub async fn list_active(&self) -> Vec<Agent> {
        let agents = self.agents.read().await;
        agents
            .values()
            .filter(|a| a.status != AgentStatus::Disconnected)
            .cloned()
            .collect()
    }

    /// Snapshot of all agents available for dispatch (`Idle` or `Connected`).
    pub async fn list_idle(&self) -> Vec<Agent> {
        let agents = self.agents.read().await;
        agents
            .values()
            .filter(|a| a.status.is_available())
            .cloned()
            .collect()
    }

    /// First agent matching the given logical id, if any.
    ///
    /// Nothing prevents two live connections from sharing an agent id; in
    /// that case the result is an arbitrary one of them.
    pub async fn find_by_id(&self, agent_id: &str) -> Option<Agent> {
        let agents = self.agents.read().await;
        agents.values().find(|a| a.agent_id == agent_id).cloned()
    }

    /// Direct lookup by connection id.
    pub async fn find_by_connection(&self, connection_id: &str) -> Option<Agent> {
        let agents = self.agents.read().await;
        agents.get(connection_id).cloned()
    }

    /// Number of records currently held, including any `Disconnected` ones.
    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }
}
