//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Network adapter pipeline: validate and acknowledge, fetch the record,
//! resolve the executor, dispatch, retry, reconcile, and complete.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use r_prov_common::AdapterConfig;
use r_prov_logging::{
    log_system_event, prov_debug, prov_error, prov_info, prov_warn, LogContext, SystemEventOutcome,
};
use r_prov_metrics::AdapterMetrics;

use crate::context::{Completion, DirectResponse, RequestContext};
use crate::host::ExecutorResolver;
use crate::mapping;
use crate::model::{NetworkRequest, OperationType};
use crate::retry::RetryPolicy;
use crate::store::ResourceStore;
use crate::task::{TaskFailure, TaskStage, TaskStageSink, TaskStageUpdate};
use crate::{AdapterError, Result};

/// Acknowledgement returned by [`NetworkAdapterService::submit`].
#[derive(Debug)]
pub enum Submission {
    /// Backend work started; the outcome is observed through the record and the stage sink.
    Accepted,
    /// Backend work started; the payload arrives through the handle.
    Direct(DirectResponse),
}

impl Submission {
    /// Handle of a direct operation, if any.
    pub fn into_direct(self) -> Option<DirectResponse> {
        match self {
            Submission::Direct(direct) => Some(direct),
            Submission::Accepted => None,
        }
    }
}

/// Orchestrates container network operations against backend hosts.
pub struct NetworkAdapterService {
    store: Arc<dyn ResourceStore>,
    resolver: Arc<dyn ExecutorResolver>,
    sink: Arc<dyn TaskStageSink>,
    retry: RetryPolicy,
    default_driver: String,
    predefined_networks: Vec<String>,
    metrics: Option<AdapterMetrics>,
}

impl std::fmt::Debug for NetworkAdapterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkAdapterService")
            .field("retry", &self.retry)
            .field("default_driver", &self.default_driver)
            .finish_non_exhaustive()
    }
}

impl NetworkAdapterService {
    /// Build the service from adapter configuration and its collaborators.
    pub fn new(
        config: &AdapterConfig,
        store: Arc<dyn ResourceStore>,
        resolver: Arc<dyn ExecutorResolver>,
        sink: Arc<dyn TaskStageSink>,
    ) -> Self {
        Self {
            store,
            resolver,
            sink,
            retry: RetryPolicy::from_config(config),
            default_driver: config.default_network_driver.clone(),
            predefined_networks: config.predefined_networks.clone(),
            metrics: None,
        }
    }

    /// Replace the retry policy derived from configuration.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish request counters to the supplied metric bundle.
    pub fn with_metrics(mut self, metrics: AdapterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Whether the network name belongs to the engine rather than to a record.
    pub fn is_predefined_network(&self, name: &str) -> bool {
        mapping::is_predefined_network(name, &self.predefined_networks)
    }

    /// Validate the request and start processing it on a spawned task.
    ///
    /// Returns as soon as the request is accepted; no backend call has been
    /// made at that point. Must be called from within a Tokio runtime.
    pub fn submit(self: &Arc<Self>, body: NetworkRequest) -> Result<Submission> {
        let request = body.validate()?;
        let (context, direct) = RequestContext::new(request);
        prov_info!(
            context = context.log_context(),
            "Processing network operation request {} for resource {} {}",
            context.operation(),
            context.request().resource_reference,
            context.request().tracking_log()
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_request(context.operation().as_str());
        }

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run(context).await;
        });

        Ok(match direct {
            Some(direct) => Submission::Direct(direct),
            None => Submission::Accepted,
        })
    }

    async fn run(&self, mut context: RequestContext) {
        let outcome = AssertUnwindSafe(self.process(&mut context))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(AdapterError::Internal(panic_message(panic))));
        self.complete(context, outcome);
    }

    /// Drive one request to a terminal outcome. Direct operations yield the
    /// backend payload.
    async fn process(&self, context: &mut RequestContext) -> Result<Option<String>> {
        if !context.is_direct() {
            let reference = context.request().resource_reference.clone();
            prov_debug!(
                context = context.log_context(),
                "Fetching network state {} {}",
                reference,
                context.request().tracking_log()
            );
            let record = self.store.get(&reference).await?;
            context.set_record(record);
        }

        let host_link = context.host_link()?;
        let target = self.resolver.resolve(&host_link).await?;
        context.set_target(target);

        match context.operation() {
            OperationType::Create => {
                self.create_network(context).await?;
                // FINISHED is reported once the inspected state is patched.
                self.inspect_and_update(context).await?;
                Ok(None)
            }
            OperationType::Inspect => {
                self.inspect_and_update(context).await?;
                Ok(None)
            }
            OperationType::Delete => {
                self.delete_network(context).await?;
                Ok(None)
            }
            OperationType::List => self.list_networks(context).await.map(Some),
            OperationType::Connect => Err(AdapterError::NotImplemented(
                "connecting containers to networks",
            )),
            OperationType::Disconnect => Err(AdapterError::NotImplemented(
                "disconnecting containers from networks",
            )),
        }
    }

    async fn create_network(&self, context: &mut RequestContext) -> Result<()> {
        let target = context.target()?;
        let executor = Arc::clone(&target.executor);
        let record = context.record()?;
        if let Some(name) = record.name.as_deref().filter(|name| self.is_predefined_network(name)) {
            return Err(AdapterError::InvalidRequest(format!(
                "network {name} is predefined by the engine and cannot be created"
            )));
        }
        let envelope = mapping::create_envelope(&target.command_input, record, &self.default_driver)?;

        let mut attempt = 0;
        let response = loop {
            match executor.create(envelope.clone()).await {
                Ok(response) => break response,
                Err(err) => match self.retry.next_attempt(&err, attempt) {
                    Some(next) => {
                        prov_warn!(
                            context = context.log_context(),
                            "Create network failed with {}. Retries left {}",
                            err,
                            self.retry.max_retries - next
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_retry(OperationType::Create.as_str());
                        }
                        tokio::time::sleep(self.retry.backoff_delay(next)).await;
                        attempt = next;
                    }
                    None if attempt > 0 && self.retry.is_retryable(&err) => {
                        return Err(AdapterError::RetriesExhausted {
                            operation: OperationType::Create,
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                    None => {
                        return Err(AdapterError::Backend {
                            operation: OperationType::Create,
                            source: err,
                        });
                    }
                },
            }
        };

        let body = response
            .json_object()
            .map_err(|err| AdapterError::UnexpectedResponse(format!("create response: {err}")))?;
        let id = mapping::created_id(&body).ok_or_else(|| {
            AdapterError::UnexpectedResponse("create response carries no network id".into())
        })?;
        prov_debug!(context = context.log_context(), "Created network {}", id);
        context.set_backend_id(id)
    }

    async fn inspect_and_update(&self, context: &RequestContext) -> Result<()> {
        let id = context.backend_id()?.to_owned();
        let target = context.target()?;
        let envelope = mapping::id_envelope(&target.command_input, &id);
        prov_debug!(
            context = context.log_context(),
            "Executing inspect network {} {}",
            id,
            context.request().tracking_log()
        );

        let response = target
            .executor
            .inspect(envelope)
            .await
            .map_err(|source| AdapterError::Backend {
                operation: OperationType::Inspect,
                source,
            })?;
        let body = response
            .json_object()
            .map_err(|err| AdapterError::UnexpectedResponse(format!("inspect response: {err}")))?;

        let record = context.record()?;
        let mut patch = mapping::properties_to_patch(&body);
        patch.id = patch.id.or(Some(id));
        patch.adapter_management_reference = record.adapter_management_reference.clone();
        self.store
            .patch(&context.request().resource_reference, patch)
            .await?;
        Ok(())
    }

    async fn delete_network(&self, context: &RequestContext) -> Result<()> {
        let id = context.backend_id()?.to_owned();
        let target = context.target()?;
        let envelope = mapping::id_envelope(&target.command_input, &id);

        match target.executor.remove(envelope).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_absent() => {
                prov_warn!(
                    context = context.log_context(),
                    "Container network {} not found on backend; treating delete as done",
                    id
                );
                Ok(())
            }
            Err(source) => Err(AdapterError::Backend {
                operation: OperationType::Delete,
                source,
            }),
        }
    }

    async fn list_networks(&self, context: &RequestContext) -> Result<String> {
        let target = context.target()?;
        let response = target
            .executor
            .list(target.command_input.clone())
            .await
            .map_err(|source| AdapterError::Backend {
                operation: OperationType::List,
                source,
            })?;
        Ok(response.body)
    }

    fn complete(&self, context: RequestContext, outcome: Result<Option<String>>) {
        let operation = context.operation();
        let stage = match &outcome {
            Ok(_) => TaskStage::Finished,
            Err(_) => TaskStage::Failed,
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_outcome(operation.as_str(), &stage.as_str().to_ascii_lowercase());
        }

        {
            let log = context.log_context();
            match &outcome {
                Ok(_) => log_system_event(
                    Some(&log),
                    "network_request",
                    &format!("{operation} reached {stage}"),
                    SystemEventOutcome::Success,
                ),
                Err(err) => {
                    prov_error!(context = log.clone(), "Failure while processing {}: {}", operation, err);
                    log_system_event(
                        Some(&log),
                        "network_request",
                        &format!("{operation} reached {stage}"),
                        SystemEventOutcome::Fault,
                    );
                }
            }
        }

        let request = context.request().clone();
        match context.into_completion() {
            Completion::Direct(tx) => {
                if tx.send(outcome.map(Option::unwrap_or_default)).is_err() {
                    prov_debug!(
                        context = LogContext::new()
                            .with_tracking_id(&request.tracking_id)
                            .with_resource(&request.resource_reference)
                            .with_operation(operation.as_str()),
                        "Direct caller went away before {} completed",
                        operation
                    );
                }
            }
            Completion::RecordMediated => {
                let failure = outcome.as_ref().err().map(TaskFailure::from);
                self.sink.publish(TaskStageUpdate {
                    tracking_id: request.tracking_id,
                    resource_reference: request.resource_reference,
                    operation,
                    stage,
                    failure,
                });
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic during dispatch: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic during dispatch: {message}")
    } else {
        "panic during dispatch".to_string()
    }
}
