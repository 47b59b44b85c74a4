//! Agent control API handlers
//!
//! Lists attached agents and triggers task dispatch, either to a specific
//! agent or to the first available one. The busy check lives here, before
//! dispatch; the dispatcher itself does not reject busy agents.

use crate::error::AppError;
use crate::state::{Agent, AgentStatus, AppState};
use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

/// Read-only projection of one registered agent
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    /// Logical id of the agent
    pub agent_id: String,
    /// Display name reported by the agent
    pub agent_name: String,
    /// Host the agent runs on
    pub host_name: String,
    /// Current lifecycle state
    pub status: AgentStatus,
    /// When this connection registered
    pub connected_at: DateTime<Utc>,
    /// Last dispatched task id, if any
    pub current_task_id: Option<String>,
}

impl From<&Agent> for AgentResponse {
    fn from(agent: &Agent) -> Self {
        Self {
            agent_id: agent.agent_id.clone(),
            agent_name: agent.agent_name.clone(),
            host_name: agent.host_name.clone(),
            status: agent.status,
            connected_at: agent.connected_at,
            current_task_id: agent.current_task_id.clone(),
        }
    }
}

/// Agents list response
#[derive(Serialize)]
pub struct AgentsListResponse {
    /// All currently attached agents
    pub agents: Vec<AgentResponse>,
    /// Total number of attached agents
    pub count: usize,
}

/// Response for a successfully triggered task
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// Server-generated id of the dispatched task
    pub task_id: String,
    /// Human-readable confirmation
    pub message: String,
}

/// Trigger task request
///
/// All fields are passed through into the task payload uninterpreted; the
/// server only adds the generated `task_id` and the defaulted `task_type`.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerTaskRequest {
    /// Kind of task to run (defaults to "analyze")
    pub task_type: Option<String>,
    /// Source tree the agent should analyze
    pub project_path: Option<String>,
    /// Database the agent should connect to
    pub database_connection_string: Option<String>,
    /// Free-form task options
    pub options: Option<HashMap<String, Value>>,
    /// Agent-side settings overrides, keyed in dotted form
    /// (e.g. "Analysis.SourceCodePath")
    pub settings_updates: Option<HashMap<String, Value>>,
}

fn build_task_payload(task_id: &str, request: &TriggerTaskRequest) -> Value {
    json!({
        "task_id": task_id,
        "task_type": request.task_type.as_deref().unwrap_or("analyze"),
        "project_path": request.project_path,
        "database_connection_string": request.database_connection_string,
        "options": request.options,
        "settings_updates": request.settings_updates,
    })
}

/// GET /api/agents - List all attached agents
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsListResponse> {
    let agents: Vec<AgentResponse> = state
        .registry
        .list_active()
        .await
        .iter()
        .map(AgentResponse::from)
        .collect();

    Json(AgentsListResponse {
        count: agents.len(),
        agents,
    })
}

/// POST /api/agents/:agent_id/trigger - Dispatch a task to a specific agent
pub async fn trigger_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(request): Json<TriggerTaskRequest>,
) -> Result<Json<TriggerResponse>, AppError> {
    let agent = state
        .registry
        .find_by_id(&agent_id)
        .await
        .ok_or_else(|| AppError::AgentNotFound(agent_id.clone()))?;

    if agent.status == AgentStatus::Working {
        return Err(AppError::AgentBusy(agent_id));
    }

    let task_id = Uuid::new_v4().to_string();
    let task = build_task_payload(&task_id, &request);

    if !state.dispatcher.send_to_agent(&agent_id, &task_id, task).await {
        return Err(AppError::DispatchFailed { agent_id, task_id });
    }

    info!(agent_id = %agent_id, task_id = %task_id, "Task triggered");
    Ok(Json(TriggerResponse {
        task_id,
        message: "Task sent to agent".to_string(),
    }))
}

/// POST /api/agents/trigger-idle - Dispatch a task to the first available agent
pub async fn trigger_idle_agent(
    State(state): State<AppState>,
    Json(request): Json<TriggerTaskRequest>,
) -> Result<Json<TriggerResponse>, AppError> {
    let task_id = Uuid::new_v4().to_string();
    let task = build_task_payload(&task_id, &request);

    if !state.dispatcher.send_to_first_idle(&task_id, task).await {
        return Err(AppError::NoIdleAgent);
    }

    info!(task_id = %task_id, "Task triggered on idle agent");
    Ok(Json(TriggerResponse {
        task_id,
        message: "Task sent to idle agent".to_string(),
    }))
}
