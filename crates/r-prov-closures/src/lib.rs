//! ---
//! prov_section: "06-execution-drivers"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Closure execution drivers and container launch configuration."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Execution drivers that launch and tear down code-execution containers.
//! Each launch assembles a container configuration from a closure and its
//! description, injects the callback URI, token, and current trust bundle as
//! environment entries, and delegates creation to a container client.
#![warn(missing_docs)]

use std::sync::Arc;

pub mod client;
pub mod driver;
pub mod model;
pub mod registry;

pub use client::{ClosureClientFactory, ClosureContainerClient, StaticClientFactory};
pub use driver::{DockerExecutionDriver, ExecutionDriver, ENV_TASK_URI, ENV_TOKEN, ENV_TRUST_CERTS};
pub use model::{
    Closure, ClosureDescription, ContainerConfiguration, ImageConfiguration, ResourceConstraints,
};
pub use registry::{DriverRegistry, StaticDriverRegistry};

/// Result alias used by the closures crate.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Callback receiving failures of fire-and-forget driver operations.
pub type ErrorHandler = Arc<dyn Fn(DriverError) + Send + Sync>;

/// Errors surfaced by execution drivers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// No container client is available.
    #[error("no available container clients; unable to {0}")]
    NoClient(&'static str),
    /// A required argument was empty.
    #[error("no {0} provided")]
    MissingArgument(&'static str),
    /// The closure carries no backend resource to remove.
    #[error("no resource to clean for closure {0}")]
    NothingToClean(String),
    /// The closure description names a runtime without an image mapping.
    #[error("unsupported closure runtime '{0}'")]
    UnsupportedRuntime(String),
    /// The closure document is malformed.
    #[error("invalid closure: {0}")]
    InvalidClosure(String),
    /// The container client reported a failure.
    #[error("container {operation} failed: {message}")]
    Client {
        /// Client operation that failed.
        operation: &'static str,
        /// Failure reported by the client.
        message: String,
    },
}

impl DriverError {
    /// Build a client failure.
    pub fn client(operation: &'static str, message: impl Into<String>) -> Self {
        DriverError::Client {
            operation,
            message: message.into(),
        }
    }
}
