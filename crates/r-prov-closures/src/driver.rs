//! ---
//! prov_section: "06-execution-drivers"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Closure execution drivers and container launch configuration."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use r_prov_common::ClosureConfig;
use r_prov_metrics::DriverMetrics;
use r_prov_trust::TrustCertificateCache;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::client::{ClosureClientFactory, ClosureContainerClient};
use crate::model::{Closure, ClosureDescription, ContainerConfiguration, ImageConfiguration};
use crate::registry::DriverRegistry;
use crate::{DriverError, ErrorHandler, Result};

/// Environment entry carrying the callback URI.
pub const ENV_TASK_URI: &str = "TASK_URI";
/// Environment entry carrying the auth token.
pub const ENV_TOKEN: &str = "TOKEN";
/// Environment entry carrying the compressed trust bundle.
pub const ENV_TRUST_CERTS: &str = "TRUST_CERTS";

/// Launches and tears down execution containers.
///
/// Every operation is fire-and-forget: failures are reported to `on_error`
/// and never retried here.
#[async_trait]
pub trait ExecutionDriver: Send + Sync {
    /// Create and start the container running `closure`.
    async fn launch(
        &self,
        closure: &Closure,
        description: &ClosureDescription,
        token: &str,
        on_error: ErrorHandler,
    );

    /// Remove every backend container created for `closure`.
    async fn terminate(&self, closure: &Closure, on_error: ErrorHandler);

    /// Remove a runtime image from a compute host.
    async fn clean_image(&self, image: &str, compute_link: &str, on_error: ErrorHandler);

    /// Inspect a runtime image on behalf of a request.
    async fn inspect_image(&self, image: &str, request_link: &str, on_error: ErrorHandler);
}

/// Driver for Docker-compatible compute hosts.
pub struct DockerExecutionDriver {
    registry: Arc<dyn DriverRegistry>,
    clients: Arc<dyn ClosureClientFactory>,
    trust: Arc<TrustCertificateCache>,
    callback_base: Option<String>,
    public_uri: Url,
    metrics: Option<DriverMetrics>,
}

impl std::fmt::Debug for DockerExecutionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerExecutionDriver")
            .field("callback_base", &self.callback_base)
            .field("public_uri", &self.public_uri.as_str())
            .finish_non_exhaustive()
    }
}

impl DockerExecutionDriver {
    /// Build a driver from closure configuration.
    pub fn new(
        config: &ClosureConfig,
        registry: Arc<dyn DriverRegistry>,
        clients: Arc<dyn ClosureClientFactory>,
        trust: Arc<TrustCertificateCache>,
    ) -> Self {
        Self {
            registry,
            clients,
            trust,
            callback_base: config
                .callback_uri
                .clone()
                .filter(|uri| !uri.trim().is_empty()),
            public_uri: config.public_uri.clone(),
            metrics: None,
        }
    }

    /// Record launches and removals in the supplied metrics.
    pub fn with_metrics(mut self, metrics: DriverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// URI the launched process reports back to.
    pub fn callback_uri(&self, closure_link: &str) -> Url {
        if let Some(base) = &self.callback_base {
            let base = base.strip_suffix('/').unwrap_or(base);
            match Url::parse(&format!("{base}{closure_link}")) {
                Ok(uri) => return uri,
                Err(err) => error!(
                    base,
                    error = %err,
                    "malformed closure callback URI; using public address"
                ),
            }
        }
        let mut uri = self.public_uri.clone();
        uri.set_path(closure_link);
        uri
    }

    /// Container settings for one execution of `closure`.
    pub fn container_configuration(
        &self,
        closure: &Closure,
        description: &ClosureDescription,
        token: &str,
    ) -> Result<ContainerConfiguration> {
        let mut env_vars = vec![format!(
            "{ENV_TASK_URI}={}",
            self.callback_uri(&closure.document_self_link)
        )];
        if !token.is_empty() {
            env_vars.push(format!("{ENV_TOKEN}={token}"));
        }
        env_vars.push(format!(
            "{ENV_TRUST_CERTS}={}",
            self.trust.current_bundle().as_str()
        ));

        Ok(ContainerConfiguration {
            name: closure.container_name()?,
            memory_mb: description.resources.ram_mb,
            cpu_shares: description.resources.cpu_shares,
            log_configuration: description.log_configuration.clone(),
            source_url: description.source_url.clone(),
            dependencies: description.dependencies.clone(),
            env_vars,
        })
    }

    /// Image coordinates serving the description's runtime.
    pub fn image_configuration(
        &self,
        description: &ClosureDescription,
        config: &ContainerConfiguration,
    ) -> Result<ImageConfiguration> {
        let runtime = self
            .registry
            .runtime_image(&description.runtime)
            .ok_or_else(|| DriverError::UnsupportedRuntime(description.runtime.clone()))?;
        Ok(ImageConfiguration {
            image_name_version: config.image_tag(&runtime.version),
            base_image_name: format!("{}_base", runtime.image),
            base_image_version: runtime.base_version,
            registry: runtime.registry,
            image_name: runtime.image,
        })
    }

    fn client_for(&self, operation: &'static str) -> Result<Arc<dyn ClosureContainerClient>> {
        self.clients.client().ok_or(DriverError::NoClient(operation))
    }

    async fn try_launch(
        &self,
        closure: &Closure,
        description: &ClosureDescription,
        token: &str,
    ) -> Result<String> {
        let client = self.client_for("launch closure")?;
        let config = self.container_configuration(closure, description, token)?;
        let image = self.image_configuration(description, &config)?;
        debug!(
            closure = %closure.document_self_link,
            container = %config.name,
            image = %image.image_name,
            tag = %image.image_name_version,
            "launching execution container"
        );
        client.create_and_start_container(closure, &image, &config).await
    }

    fn record_launch(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_launch(success);
        }
    }

    fn record_removal(&self, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_removal(success);
        }
    }
}

#[async_trait]
impl ExecutionDriver for DockerExecutionDriver {
    async fn launch(
        &self,
        closure: &Closure,
        description: &ClosureDescription,
        token: &str,
        on_error: ErrorHandler,
    ) {
        match self.try_launch(closure, description, token).await {
            Ok(container) => {
                self.record_launch(true);
                info!(
                    closure = %closure.document_self_link,
                    container = %container,
                    "execution container started"
                );
            }
            Err(err) => {
                self.record_launch(false);
                warn!(
                    closure = %closure.document_self_link,
                    error = %err,
                    "unable to launch execution container"
                );
                on_error(err);
            }
        }
    }

    async fn terminate(&self, closure: &Closure, on_error: ErrorHandler) {
        let Some(client) = self.clients.client() else {
            warn!(
                closure = %closure.document_self_link,
                "no available container clients; skipping closure cleanup"
            );
            return;
        };
        if closure.resource_links.is_empty() {
            on_error(DriverError::NothingToClean(
                closure.document_self_link.clone(),
            ));
            return;
        }
        for link in &closure.resource_links {
            match client.remove_container(link).await {
                Ok(()) => {
                    self.record_removal(true);
                    debug!(closure = %closure.document_self_link, container = %link, "container removed");
                }
                Err(err) => {
                    self.record_removal(false);
                    warn!(
                        closure = %closure.document_self_link,
                        container = %link,
                        error = %err,
                        "unable to remove execution container"
                    );
                    on_error(err);
                }
            }
        }
    }

    async fn clean_image(&self, image: &str, compute_link: &str, on_error: ErrorHandler) {
        let outcome = async {
            let client = self.client_for("clean image")?;
            if image.is_empty() {
                return Err(DriverError::MissingArgument("image"));
            }
            if compute_link.is_empty() {
                return Err(DriverError::MissingArgument("compute host"));
            }
            client.clean_image(image, compute_link).await
        };
        if let Err(err) = outcome.await {
            warn!(image, compute = compute_link, error = %err, "image cleanup failed");
            on_error(err);
        }
    }

    async fn inspect_image(&self, image: &str, request_link: &str, on_error: ErrorHandler) {
        let outcome = async {
            let client = self.client_for("inspect image")?;
            if image.is_empty() {
                return Err(DriverError::MissingArgument("image"));
            }
            if request_link.is_empty() {
                return Err(DriverError::MissingArgument("request"));
            }
            client.inspect_image(image, request_link).await
        };
        if let Err(err) = outcome.await {
            warn!(image, request = request_link, error = %err, "image inspection failed");
            on_error(err);
        }
    }
}
