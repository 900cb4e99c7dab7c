//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Per-request aggregate owned by exactly one in-flight request.

use r_prov_logging::LogContext;
use tokio::sync::oneshot;

use crate::host::ResolvedHost;
use crate::model::{OperationType, ResourceRecord, ResourceRequest};
use crate::{AdapterError, Result};

/// How the terminal outcome of a request reaches its caller.
#[derive(Debug)]
pub enum Completion {
    /// The caller awaits the backend payload directly.
    Direct(oneshot::Sender<Result<String>>),
    /// The caller observes the resource record and the stage sink.
    RecordMediated,
}

impl Completion {
    /// Pick the completion mode for an operation, returning the caller handle
    /// for direct operations.
    pub fn for_operation(operation: OperationType) -> (Self, Option<DirectResponse>) {
        if operation.is_direct() {
            let (tx, rx) = oneshot::channel();
            (Completion::Direct(tx), Some(DirectResponse { rx }))
        } else {
            (Completion::RecordMediated, None)
        }
    }
}

/// Caller side of a direct operation.
#[derive(Debug)]
pub struct DirectResponse {
    rx: oneshot::Receiver<Result<String>>,
}

impl DirectResponse {
    /// Wait for the backend payload.
    pub async fn wait(self) -> Result<String> {
        self.rx.await.unwrap_or_else(|_| {
            Err(AdapterError::Internal(
                "pipeline dropped a direct operation without completing it".into(),
            ))
        })
    }
}

/// Mutable state of one request as it moves through the pipeline.
#[derive(Debug)]
pub struct RequestContext {
    request: ResourceRequest,
    completion: Completion,
    record: Option<ResourceRecord>,
    target: Option<ResolvedHost>,
}

impl RequestContext {
    /// Create the context for a validated request.
    pub fn new(request: ResourceRequest) -> (Self, Option<DirectResponse>) {
        let (completion, direct) = Completion::for_operation(request.operation);
        let context = Self {
            request,
            completion,
            record: None,
            target: None,
        };
        (context, direct)
    }

    /// The validated request.
    pub fn request(&self) -> &ResourceRequest {
        &self.request
    }

    /// Operation of the request.
    pub fn operation(&self) -> OperationType {
        self.request.operation
    }

    /// Whether the caller awaits the outcome directly.
    pub fn is_direct(&self) -> bool {
        matches!(self.completion, Completion::Direct(_))
    }

    /// Store the fetched record snapshot.
    pub fn set_record(&mut self, record: ResourceRecord) {
        self.record = Some(record);
    }

    /// Fetched record snapshot.
    pub fn record(&self) -> Result<&ResourceRecord> {
        self.record.as_ref().ok_or_else(|| {
            AdapterError::Internal(format!(
                "record for {} used before it was fetched",
                self.request.resource_reference
            ))
        })
    }

    /// Link of the host that serves the request. Direct operations address
    /// the host itself; all others read it from the record.
    pub fn host_link(&self) -> Result<String> {
        if self.is_direct() {
            return Ok(self.request.resource_reference.clone());
        }
        let record = self.record()?;
        record
            .originating_host_link
            .clone()
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| AdapterError::MissingHostLink(record.document_self_link.clone()))
    }

    /// Backend id of the record, required by every operation but CREATE.
    pub fn backend_id(&self) -> Result<&str> {
        self.record()?
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AdapterError::MissingBackendId {
                resource: self.request.resource_reference.clone(),
                operation: self.request.operation,
            })
    }

    /// Record the backend id assigned by CREATE.
    pub fn set_backend_id(&mut self, id: String) -> Result<()> {
        let reference = self.request.resource_reference.clone();
        let record = self.record.as_mut().ok_or_else(|| {
            AdapterError::Internal(format!("record for {reference} used before it was fetched"))
        })?;
        record.id = Some(id);
        Ok(())
    }

    /// Bind the resolved executor.
    pub fn set_target(&mut self, target: ResolvedHost) {
        self.target = Some(target);
    }

    /// Resolved executor and base envelope.
    pub fn target(&self) -> Result<&ResolvedHost> {
        self.target.as_ref().ok_or_else(|| {
            AdapterError::Internal(format!(
                "executor for {} used before it was resolved",
                self.request.resource_reference
            ))
        })
    }

    /// Structured logging fields for this request.
    pub fn log_context(&self) -> LogContext<'_> {
        let ctx = LogContext::new()
            .with_tracking_id(&self.request.tracking_id)
            .with_resource(&self.request.resource_reference)
            .with_operation(self.request.operation.as_str());
        match &self.target {
            Some(target) => ctx.with_host(&target.host_link),
            None => ctx,
        }
    }

    /// Release the completion handle once the request is terminal.
    pub fn into_completion(self) -> Completion {
        self.completion
    }
}
