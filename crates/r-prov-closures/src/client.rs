//! ---
//! prov_section: "06-execution-drivers"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Closure execution drivers and container launch configuration."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Container client seam used by the execution drivers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Closure, ContainerConfiguration, ImageConfiguration};
use crate::Result;

/// Backend client creating, starting, and removing execution containers.
#[async_trait]
pub trait ClosureContainerClient: Send + Sync {
    /// Create and start a container for the closure; returns the container link.
    async fn create_and_start_container(
        &self,
        closure: &Closure,
        image: &ImageConfiguration,
        config: &ContainerConfiguration,
    ) -> Result<String>;

    /// Remove a previously created container.
    async fn remove_container(&self, container_link: &str) -> Result<()>;

    /// Remove an image from the compute host.
    async fn clean_image(&self, image: &str, compute_link: &str) -> Result<()>;

    /// Inspect an image, completing the request identified by `request_link`.
    async fn inspect_image(&self, image: &str, request_link: &str) -> Result<()>;
}

/// Supplies the container client, if one is currently available.
pub trait ClosureClientFactory: Send + Sync {
    /// Client to use for the next operation.
    fn client(&self) -> Option<Arc<dyn ClosureContainerClient>>;
}

/// Factory returning a fixed client, or none.
#[derive(Clone, Default)]
pub struct StaticClientFactory {
    client: Option<Arc<dyn ClosureContainerClient>>,
}

impl StaticClientFactory {
    /// Factory always returning `client`.
    pub fn new(client: Arc<dyn ClosureContainerClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Factory with no client available.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

impl ClosureClientFactory for StaticClientFactory {
    fn client(&self) -> Option<Arc<dyn ClosureContainerClient>> {
        self.client.clone()
    }
}

impl std::fmt::Debug for StaticClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticClientFactory")
            .field("available", &self.client.is_some())
            .finish()
    }
}
