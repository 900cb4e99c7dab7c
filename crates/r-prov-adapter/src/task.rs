//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Terminal-stage reporting for record-mediated requests.

use std::fmt;

use r_prov_logging::{prov_debug, LogContext};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::OperationType;
use crate::AdapterError;

/// Terminal stage of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStage {
    /// Backend and record agree.
    Finished,
    /// The request cannot complete.
    Failed,
}

impl TaskStage {
    /// Upper-case label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStage::Finished => "FINISHED",
            TaskStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse failure classification surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request or record failed validation.
    Validation,
    /// The operation has no implementation.
    NotImplemented,
    /// The backend rejected the command or was unreachable.
    Backend,
    /// The resource store rejected a read or patch.
    Store,
    /// Pipeline invariant violation, including caught panics.
    Internal,
}

/// Failure attached to a FAILED update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Classification.
    pub kind: FailureKind,
    /// Rendered cause chain.
    pub message: String,
}

impl From<&AdapterError> for TaskFailure {
    fn from(err: &AdapterError) -> Self {
        let kind = match err {
            AdapterError::NotImplemented(_) => FailureKind::NotImplemented,
            AdapterError::Store(_) => FailureKind::Store,
            AdapterError::Backend { .. }
            | AdapterError::RetriesExhausted { .. }
            | AdapterError::HostResolution { .. }
            | AdapterError::UnexpectedResponse(_) => FailureKind::Backend,
            AdapterError::Internal(_) => FailureKind::Internal,
            other if other.is_validation() => FailureKind::Validation,
            _ => FailureKind::Internal,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Terminal outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStageUpdate {
    /// Tracking id of the request.
    pub tracking_id: String,
    /// Resource reference the request targeted.
    pub resource_reference: String,
    /// Operation that reached the stage.
    pub operation: OperationType,
    /// Terminal stage.
    pub stage: TaskStage,
    /// Cause, present only for FAILED.
    pub failure: Option<TaskFailure>,
}

impl TaskStageUpdate {
    /// Whether the update reports FINISHED.
    pub fn is_finished(&self) -> bool {
        self.stage == TaskStage::Finished
    }
}

/// Receiver of terminal stage updates.
pub trait TaskStageSink: Send + Sync {
    /// Publish one update. Implementations must not block.
    fn publish(&self, update: TaskStageUpdate);
}

/// Sink forwarding updates over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTaskSink {
    tx: mpsc::UnboundedSender<TaskStageUpdate>,
}

impl ChannelTaskSink {
    /// Create a sink and the receiver observing it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskStageUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TaskStageSink for ChannelTaskSink {
    fn publish(&self, update: TaskStageUpdate) {
        if let Err(mpsc::error::SendError(update)) = self.tx.send(update) {
            prov_debug!(
                context = LogContext::new()
                    .with_tracking_id(&update.tracking_id)
                    .with_resource(&update.resource_reference)
                    .with_operation(update.operation.as_str()),
                "Task stage receiver dropped; {} update discarded",
                update.stage
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorError;

    #[test]
    fn failures_are_classified() {
        let not_impl = TaskFailure::from(&AdapterError::NotImplemented("CONNECT"));
        assert_eq!(not_impl.kind, FailureKind::NotImplemented);

        let exhausted = TaskFailure::from(&AdapterError::RetriesExhausted {
            operation: OperationType::Create,
            attempts: 4,
            source: ExecutorError::protocol(503, "busy"),
        });
        assert_eq!(exhausted.kind, FailureKind::Backend);
        assert!(exhausted.message.contains("4 attempts"));

        let missing = TaskFailure::from(&AdapterError::MissingHostLink("/n".into()));
        assert_eq!(missing.kind, FailureKind::Validation);
    }

    #[tokio::test]
    async fn channel_sink_delivers_updates() {
        let (sink, mut rx) = ChannelTaskSink::new();
        sink.publish(TaskStageUpdate {
            tracking_id: "t1".into(),
            resource_reference: "/networks/net1".into(),
            operation: OperationType::Delete,
            stage: TaskStage::Finished,
            failure: None,
        });
        let update = rx.recv().await.unwrap();
        assert!(update.is_finished());
        assert_eq!(update.stage.to_string(), "FINISHED");
    }

    #[tokio::test]
    async fn publishing_after_receiver_dropped_is_discarded() {
        r_prov_logging::init();
        let (sink, rx) = ChannelTaskSink::new();
        drop(rx);
        sink.publish(TaskStageUpdate {
            tracking_id: "t2".into(),
            resource_reference: "/networks/net2".into(),
            operation: OperationType::Create,
            stage: TaskStage::Failed,
            failure: Some(TaskFailure::from(&AdapterError::NotImplemented("CONNECT"))),
        });
        assert!(sink.tx.is_closed());
    }
}
