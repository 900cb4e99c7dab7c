//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Orchestration layer that reconciles container network records against
//! backend runtimes. Callers submit a [`NetworkRequest`] to a
//! [`NetworkAdapterService`]; the service acknowledges immediately and drives
//! the backend work on a spawned task, reporting the terminal stage through a
//! [`TaskStageSink`] or, for direct operations, through the returned
//! [`DirectResponse`].
#![warn(missing_docs)]

pub mod context;
pub mod envelope;
pub mod executor;
pub mod host;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod retry;
pub mod store;
pub mod task;

use model::OperationType;

/// Result alias used throughout the adapter crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Errors raised while processing an adapter request.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The inbound request is structurally invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A field required by the operation is missing on the resource record.
    #[error("{field} is required for resource {resource}")]
    MissingField {
        /// Resource record reference.
        resource: String,
        /// Name of the missing field.
        field: &'static str,
    },
    /// The record does not name the host that owns it.
    #[error("originatingHostLink missing for resource {0}")]
    MissingHostLink(String),
    /// The record carries no backend id, so the backend resource was never created.
    #[error("backend id is required to {operation} resource {resource}")]
    MissingBackendId {
        /// Resource record reference.
        resource: String,
        /// Operation that required the id.
        operation: OperationType,
    },
    /// The resource store rejected a read or patch.
    #[error("resource store error: {0}")]
    Store(#[from] store::StoreError),
    /// No executor could be bound to the host.
    #[error("unable to resolve executor for host {host}: {reason}")]
    HostResolution {
        /// Host link that failed to resolve.
        host: String,
        /// Human-readable cause.
        reason: String,
    },
    /// The backend rejected a command with a non-retryable failure.
    #[error("{operation} failed on backend: {source}")]
    Backend {
        /// Operation that failed.
        operation: OperationType,
        /// Executor failure.
        #[source]
        source: executor::ExecutorError,
    },
    /// A retryable failure persisted past the configured retry budget.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Operation that failed.
        operation: OperationType,
        /// Attempts made, including the first one.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        source: executor::ExecutorError,
    },
    /// The backend answered with a body the pipeline cannot interpret.
    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),
    /// The operation exists in the state machine but has no implementation.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    /// Invariant violation inside the pipeline itself.
    #[error("internal adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Whether the failure signals a missing capability rather than a genuine failure.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, AdapterError::NotImplemented(_))
    }

    /// Whether the failure stems from request or record validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AdapterError::InvalidRequest(_)
                | AdapterError::MissingField { .. }
                | AdapterError::MissingHostLink(_)
                | AdapterError::MissingBackendId { .. }
        )
    }
}

pub use context::{Completion, DirectResponse, RequestContext};
pub use envelope::CommandEnvelope;
pub use executor::{CommandExecutor, ExecutorError, ExecutorResponse, ExecutorResult};
pub use host::{
    AdapterType, ContainerHost, ExecutorRegistry, ExecutorResolver, HostDirectory,
    InMemoryHostDirectory, ResolvedHost,
};
pub use model::{
    Ipam, IpamConfig, NetworkRequest, ResourceRecord, ResourceRecordPatch, ResourceRequest,
};
pub use pipeline::{NetworkAdapterService, Submission};
pub use retry::RetryPolicy;
pub use store::{InMemoryResourceStore, ResourceStore, StoreError};
pub use task::{
    ChannelTaskSink, FailureKind, TaskFailure, TaskStage, TaskStageSink, TaskStageUpdate,
};
