//! ---
//! prov_section: "03-persistence-logging"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Structured logging adapters and sinks."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_test_writer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Tracking identifier of the request being processed.
    pub tracking_id: Option<&'a str>,
    /// Reference of the resource record (or host for direct operations).
    pub resource: Option<&'a str>,
    /// Operation type being processed.
    pub operation: Option<&'a str>,
    /// Backend host link handling the request.
    pub host: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a request tracking identifier.
    pub fn with_tracking_id(mut self, tracking_id: &'a str) -> Self {
        self.tracking_id = Some(tracking_id);
        self
    }

    /// Attach a resource reference.
    pub fn with_resource(mut self, resource: &'a str) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Attach an operation descriptor.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Attach a backend host link.
    pub fn with_host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        SystemEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            tracking_id = ctx.tracking_id.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            host = ctx.host.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            tracking_id = ctx.tracking_id.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            host = ctx.host.unwrap_or(""),
            message = %message
        ),
    }
}
