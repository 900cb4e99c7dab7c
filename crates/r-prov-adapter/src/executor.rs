//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Contract an engine-specific command executor must honour.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::envelope::CommandEnvelope;

/// Status code a backend uses to report that the target does not exist.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Message signature engines use for removal of an already-absent resource.
pub const DELETE_MISSING_SIGNATURE: &str = "error 404 for DELETE";

/// Result returned by every executor call.
pub type ExecutorResult = std::result::Result<ExecutorResponse, ExecutorError>;

/// Successful response from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorResponse {
    /// Transport status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

impl ExecutorResponse {
    /// Build a `200` response carrying the supplied body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Build a response with an explicit status and no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// Parse the body as a JSON object. An empty body yields an empty object.
    pub fn json_object(&self) -> Result<Map<String, Value>, serde_json::Error> {
        if self.body.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&self.body)
    }
}

/// Failure reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The backend answered with an error status.
    #[error("protocol error {status}: {message}")]
    Protocol {
        /// Status code returned by the backend.
        status: u16,
        /// Message returned by the backend.
        message: String,
    },
    /// The request did not produce a backend answer (connection, TLS, timeout).
    #[error("transport error: {message}")]
    Transport {
        /// Status code surfaced by the transport layer, if any.
        status: Option<u16>,
        /// Cause of the failure.
        message: String,
    },
}

impl ExecutorError {
    /// Build a protocol failure.
    pub fn protocol(status: u16, message: impl Into<String>) -> Self {
        ExecutorError::Protocol {
            status,
            message: message.into(),
        }
    }

    /// Build a transport failure without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        ExecutorError::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Status code attached to the failure, used for retry classification.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecutorError::Protocol { status, .. } => Some(*status),
            ExecutorError::Transport { status, .. } => *status,
        }
    }

    /// Whether the failure means the target is already absent on the backend.
    pub fn is_absent(&self) -> bool {
        match self {
            ExecutorError::Protocol { status, message } => {
                *status == STATUS_NOT_FOUND || message.contains(DELETE_MISSING_SIGNATURE)
            }
            ExecutorError::Transport { .. } => false,
        }
    }
}

/// Engine-specific client able to create, inspect, remove, and list one
/// resource kind on a backend host. Host coordinates travel in the envelope.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Create a resource; the response body carries the backend id.
    async fn create(&self, input: CommandEnvelope) -> ExecutorResult;

    /// Inspect a resource by backend id.
    async fn inspect(&self, input: CommandEnvelope) -> ExecutorResult;

    /// Remove a resource by backend id.
    async fn remove(&self, input: CommandEnvelope) -> ExecutorResult;

    /// List every resource of the kind on the host.
    async fn list(&self, input: CommandEnvelope) -> ExecutorResult;
}
