//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Resolution of the host that owns a resource and the executor bound to it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::envelope::{
    CommandEnvelope, HOST_ADAPTER_PROP, HOST_CREDENTIALS_PROP, HOST_TRUST_CERTIFICATE_PROP,
    HOST_URI_PROP,
};
use crate::executor::CommandExecutor;
use crate::{AdapterError, Result};

/// Backend family declared by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterType {
    /// Docker-compatible remote API.
    Docker,
    /// Kubernetes-compatible API.
    Kubernetes,
}

impl AdapterType {
    /// Upper-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::Docker => "DOCKER",
            AdapterType::Kubernetes => "KUBERNETES",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DOCKER" | "DOCKER_HOST" => Ok(AdapterType::Docker),
            "KUBERNETES" | "KUBERNETES_HOST" => Ok(AdapterType::Kubernetes),
            other => Err(format!("unsupported adapter type '{other}'")),
        }
    }
}

/// Compute host running a container engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerHost {
    /// Identity of the host record.
    pub self_link: String,
    /// Engine address.
    pub address: String,
    /// Declared adapter family, as stored on the host record.
    pub adapter_type: String,
    /// Link to the credentials used against the engine.
    #[serde(default)]
    pub credentials_link: Option<String>,
    /// PEM certificate presented by the engine.
    #[serde(default)]
    pub trust_certificate: Option<String>,
}

impl ContainerHost {
    /// Build a host record.
    pub fn new(
        self_link: impl Into<String>,
        address: impl Into<String>,
        adapter_type: AdapterType,
    ) -> Self {
        Self {
            self_link: self_link.into(),
            address: address.into(),
            adapter_type: adapter_type.as_str().to_string(),
            credentials_link: None,
            trust_certificate: None,
        }
    }

    /// Attach the credentials link.
    pub fn with_credentials(mut self, link: impl Into<String>) -> Self {
        self.credentials_link = Some(link.into());
        self
    }

    /// Attach the engine certificate.
    pub fn with_trust_certificate(mut self, pem: impl Into<String>) -> Self {
        self.trust_certificate = Some(pem.into());
        self
    }

    /// Base envelope carrying the connection parameters for this host.
    pub fn base_envelope(&self) -> CommandEnvelope {
        CommandEnvelope::new()
            .with_property(HOST_URI_PROP, self.address.as_str())
            .with_property_if_some(HOST_CREDENTIALS_PROP, self.credentials_link.clone())
            .with_property_if_some(HOST_TRUST_CERTIFICATE_PROP, self.trust_certificate.clone())
            .with_property(HOST_ADAPTER_PROP, self.adapter_type.as_str())
    }
}

/// Lookup of host records, owned by an external collaborator.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Fetch the host record by link.
    async fn get_host(&self, host_link: &str) -> Result<ContainerHost>;
}

/// Map-backed host directory.
#[derive(Debug, Default)]
pub struct InMemoryHostDirectory {
    hosts: RwLock<HashMap<String, ContainerHost>>,
}

impl InMemoryHostDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host under its self link.
    pub fn insert(&self, host: ContainerHost) {
        self.hosts.write().insert(host.self_link.clone(), host);
    }
}

#[async_trait]
impl HostDirectory for InMemoryHostDirectory {
    async fn get_host(&self, host_link: &str) -> Result<ContainerHost> {
        self.hosts
            .read()
            .get(host_link)
            .cloned()
            .ok_or_else(|| AdapterError::HostResolution {
                host: host_link.to_string(),
                reason: "host not found".into(),
            })
    }
}

/// Executor bound to one host, plus the base envelope for its calls.
#[derive(Clone)]
pub struct ResolvedHost {
    /// Host link the executor is bound to.
    pub host_link: String,
    /// Adapter family of the host.
    pub adapter_type: AdapterType,
    /// Connection parameters shared by every call of the request.
    pub command_input: CommandEnvelope,
    /// Executor serving the host.
    pub executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for ResolvedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHost")
            .field("host_link", &self.host_link)
            .field("adapter_type", &self.adapter_type)
            .field("executor", &self.executor.name())
            .finish()
    }
}

/// Resolves the executor that serves a host.
#[async_trait]
pub trait ExecutorResolver: Send + Sync {
    /// Bind an executor to the host behind `host_link`.
    async fn resolve(&self, host_link: &str) -> Result<ResolvedHost>;
}

/// Resolver selecting executors by the host's declared adapter type.
pub struct ExecutorRegistry {
    hosts: Arc<dyn HostDirectory>,
    executors: HashMap<AdapterType, Arc<dyn CommandExecutor>>,
}

impl ExecutorRegistry {
    /// Create a registry backed by a host directory.
    pub fn new(hosts: Arc<dyn HostDirectory>) -> Self {
        Self {
            hosts,
            executors: HashMap::new(),
        }
    }

    /// Register the executor serving an adapter family.
    pub fn with_executor(
        mut self,
        adapter_type: AdapterType,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        self.executors.insert(adapter_type, executor);
        self
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("adapter_types", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ExecutorResolver for ExecutorRegistry {
    async fn resolve(&self, host_link: &str) -> Result<ResolvedHost> {
        let host = self.hosts.get_host(host_link).await?;
        let adapter_type: AdapterType =
            host.adapter_type
                .parse()
                .map_err(|reason| AdapterError::HostResolution {
                    host: host_link.to_string(),
                    reason,
                })?;
        let executor = self
            .executors
            .get(&adapter_type)
            .cloned()
            .ok_or_else(|| AdapterError::HostResolution {
                host: host_link.to_string(),
                reason: format!("no executor registered for {adapter_type}"),
            })?;
        Ok(ResolvedHost {
            host_link: host_link.to_string(),
            adapter_type,
            command_input: host.base_envelope(),
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorResponse, ExecutorResult};

    struct NullExecutor;

    #[async_trait]
    impl CommandExecutor for NullExecutor {
        fn name(&self) -> &'static str {
            "null"
        }

        async fn create(&self, _input: CommandEnvelope) -> ExecutorResult {
            Ok(ExecutorResponse::empty(201))
        }

        async fn inspect(&self, _input: CommandEnvelope) -> ExecutorResult {
            Ok(ExecutorResponse::empty(200))
        }

        async fn remove(&self, _input: CommandEnvelope) -> ExecutorResult {
            Ok(ExecutorResponse::empty(204))
        }

        async fn list(&self, _input: CommandEnvelope) -> ExecutorResult {
            Ok(ExecutorResponse::ok("[]"))
        }
    }

    fn registry(hosts: InMemoryHostDirectory) -> ExecutorRegistry {
        ExecutorRegistry::new(Arc::new(hosts))
            .with_executor(AdapterType::Docker, Arc::new(NullExecutor))
    }

    #[tokio::test]
    async fn resolves_docker_host_with_base_envelope() {
        let hosts = InMemoryHostDirectory::new();
        hosts.insert(
            ContainerHost::new("/hosts/h1", "tcp://h1:2376", AdapterType::Docker)
                .with_credentials("/credentials/c1"),
        );
        let resolved = registry(hosts).resolve("/hosts/h1").await.unwrap();
        assert_eq!(resolved.adapter_type, AdapterType::Docker);
        assert_eq!(resolved.executor.name(), "null");
        let base = &resolved.command_input;
        assert_eq!(base.get_str(HOST_URI_PROP), Some("tcp://h1:2376"));
        assert_eq!(base.get_str(HOST_CREDENTIALS_PROP), Some("/credentials/c1"));
        assert!(!base.contains(HOST_TRUST_CERTIFICATE_PROP));
        assert_eq!(base.get_str(HOST_ADAPTER_PROP), Some("DOCKER"));
    }

    #[tokio::test]
    async fn unknown_or_unregistered_types_fail() {
        let hosts = InMemoryHostDirectory::new();
        hosts.insert(ContainerHost {
            adapter_type: "VSPHERE".into(),
            ..ContainerHost::new("/hosts/vc", "https://vc", AdapterType::Docker)
        });
        hosts.insert(ContainerHost::new(
            "/hosts/k8s",
            "https://k8s:6443",
            AdapterType::Kubernetes,
        ));
        let registry = registry(hosts);

        let err = registry.resolve("/hosts/vc").await.unwrap_err();
        assert!(err.to_string().contains("unsupported adapter type"));
        let err = registry.resolve("/hosts/k8s").await.unwrap_err();
        assert!(err.to_string().contains("no executor registered for KUBERNETES"));
        let err = registry.resolve("/hosts/missing").await.unwrap_err();
        assert!(err.to_string().contains("host not found"));
    }

    #[test]
    fn adapter_type_parses_legacy_names() {
        assert_eq!("docker_host".parse::<AdapterType>(), Ok(AdapterType::Docker));
        assert_eq!("KUBERNETES".parse::<AdapterType>(), Ok(AdapterType::Kubernetes));
    }
}
