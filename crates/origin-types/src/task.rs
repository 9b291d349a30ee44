//! Evidence task lifecycle types
//!
//! Two deliberately separate vocabularies: `TaskStatus` is the
//! worker-framework lifecycle of the broker task, `PipelineEvent` is the
//! application-level marker of what the request handler last observed.
//! They are never conflated, and neither ever carries a task id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker-framework lifecycle state of a broker task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Started => "STARTED",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(TaskStatus::Pending),
            "STARTED" => Some(TaskStatus::Started),
            "RETRY" => Some(TaskStatus::Retry),
            "SUCCESS" => Some(TaskStatus::Success),
            "FAILURE" => Some(TaskStatus::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the request handler observed about the evidence pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineEvent {
    Enqueued,
    Polling,
    StuckRequeued,
    UpdatedFromTaskResult,
}

impl PipelineEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineEvent::Enqueued => "ENQUEUED",
            PipelineEvent::Polling => "POLLING",
            PipelineEvent::StuckRequeued => "STUCK_REQUEUED",
            PipelineEvent::UpdatedFromTaskResult => "UPDATED_FROM_TASK_RESULT",
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal-or-pending state of an evidence pack row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidencePackStatus {
    Pending,
    Ready,
    Failed,
}

impl EvidencePackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidencePackStatus::Pending => "pending",
            EvidencePackStatus::Ready => "ready",
            EvidencePackStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EvidencePackStatus::Pending),
            "ready" => Some(EvidencePackStatus::Ready),
            "failed" => Some(EvidencePackStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Started).unwrap(),
            "\"STARTED\""
        );
        assert_eq!(TaskStatus::parse("FAILURE"), Some(TaskStatus::Failure));
        assert_eq!(TaskStatus::parse("evidence_pack_abc"), None);
    }

    #[test]
    fn test_pipeline_event_wire_format() {
        assert_eq!(
            serde_json::to_string(&PipelineEvent::StuckRequeued).unwrap(),
            "\"STUCK_REQUEUED\""
        );
    }
}
