//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.
//!
//! Business conditions (agent not found, busy, no idle agent) are typed
//! variants here, never panics: agent churn is routine, not exceptional.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Each variant implements automatic conversion to HTTP responses via
/// `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// No registered agent matches the given logical id
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// The target agent is already executing a task
    #[error("Agent is busy: {0}")]
    AgentBusy(String),

    /// No agent is available for dispatch
    #[error("No idle agent available")]
    NoIdleAgent,

    /// The task could not be delivered over the agent channel
    #[error("Task dispatch failed: agent {agent_id}, task {task_id}")]
    DispatchFailed {
        /// Logical id of the target agent
        agent_id: String,
        /// Id of the task that could not be delivered
        task_id: String,
    },

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AgentNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::AgentBusy(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::NoIdleAgent => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::DispatchFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
