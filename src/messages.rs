//! Typed message envelopes for both directions of the agent channel, plus
//! the events fanned out to observer dashboards.
//!
//! All frames on the wire are JSON with a `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages pushed from the server to one specific agent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Instruct the agent to execute a task.
    #[serde(rename = "execute_task")]
    ExecuteTask {
        /// Correlation id for later progress/completion callbacks
        task_id: String,
        /// Opaque task payload; the server never interprets its contents
        task: Value,
    },
}

/// Callback messages received from an agent connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentMessage {
    /// Incremental progress on a running task.
    #[serde(rename = "report_progress")]
    ReportProgress {
        /// Task the report refers to (accepted unvalidated)
        task_id: String,
        /// Percent complete, 0-100
        progress: i32,
        /// Human-readable progress description
        message: String,
    },
    /// A task finished, successfully or not.
    #[serde(rename = "report_task_completed")]
    ReportTaskCompleted {
        /// Task the report refers to
        task_id: String,
        /// Whether the task succeeded
        success: bool,
        /// Result text, when the task produced one
        #[serde(default)]
        result: Option<String>,
        /// Error description, when the task failed
        #[serde(default)]
        error: Option<String>,
    },
    /// Structured analysis output produced by a task.
    #[serde(rename = "report_analysis_result")]
    ReportAnalysisResult {
        /// Task the result belongs to
        task_id: String,
        /// Arbitrary structured result data
        payload: Value,
    },
}

/// Events broadcast to every connected observer. There is no per-task
/// routing; each observer sees all agent traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObserverEvent {
    /// A task reported progress.
    #[serde(rename = "task_progress_updated")]
    TaskProgressUpdated {
        /// Task the report refers to
        task_id: String,
        /// Percent complete, 0-100
        progress: i32,
        /// Human-readable progress description
        message: String,
    },
    /// A task completed.
    #[serde(rename = "task_completed")]
    TaskCompleted {
        /// Task the report refers to
        task_id: String,
        /// Whether the task succeeded
        success: bool,
        /// Result text, when present
        result: Option<String>,
        /// Error description, when present
        error: Option<String>,
    },
    /// A task produced an analysis result.
    #[serde(rename = "analysis_result_received")]
    AnalysisResultReceived {
        /// Task the result belongs to
        task_id: String,
        /// Arbitrary structured result data
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_task_wire_shape() {
        let message = ServerMessage::ExecuteTask {
            task_id: "t1".to_string(),
            task: json!({"task_type": "analyze"}),
        };
        let text = serde_json::to_string(&message).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "execute_task");
        assert_eq!(value["task_id"], "t1");
        assert_eq!(value["task"]["task_type"], "analyze");
    }

    #[test]
    fn test_agent_message_parses_tagged_frames() {
        let frame = r#"{"type":"report_progress","task_id":"t1","progress":40,"message":"scanning"}"#;
        let message: AgentMessage = serde_json::from_str(frame).unwrap();
        assert_eq!(
            message,
            AgentMessage::ReportProgress {
                task_id: "t1".to_string(),
                progress: 40,
                message: "scanning".to_string(),
            }
        );
    }

    #[test]
    fn test_completed_optional_fields_default() {
        let frame = r#"{"type":"report_task_completed","task_id":"t1","success":true}"#;
        let message: AgentMessage = serde_json::from_str(frame).unwrap();
        match message {
            AgentMessage::ReportTaskCompleted {
                result, error, success, ..
            } => {
                assert!(success);
                assert!(result.is_none());
                assert!(error.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
