//! ---
//! prov_section: "06-execution-drivers"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Closure execution drivers and container launch configuration."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{DriverError, Result};

/// Hex characters of the dependency digest appended to image tags.
pub const DEPENDENCY_TAG_LEN: usize = 12;

/// One execution of user code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closure {
    /// Identity of the closure document.
    pub document_self_link: String,
    /// Document version, distinguishing re-executions.
    #[serde(default)]
    pub document_version: u64,
    /// Link of the description the closure executes.
    #[serde(default)]
    pub description_link: Option<String>,
    /// Backend containers created for the closure.
    #[serde(default)]
    pub resource_links: Vec<String>,
}

impl Closure {
    /// Create a closure document.
    pub fn new(document_self_link: impl Into<String>, document_version: u64) -> Self {
        Self {
            document_self_link: document_self_link.into(),
            document_version,
            ..Self::default()
        }
    }

    /// Last path segment of the self link.
    pub fn id(&self) -> Option<&str> {
        self.document_self_link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
    }

    /// Container name unique to this execution: `<id>_<version>`.
    pub fn container_name(&self) -> Result<String> {
        let id = self.id().ok_or_else(|| {
            DriverError::InvalidClosure(format!(
                "self link '{}' has no identifier",
                self.document_self_link
            ))
        })?;
        Ok(format!("{id}_{}", self.document_version))
    }
}

/// Resource limits applied to an execution container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConstraints {
    /// Memory limit in megabytes.
    pub ram_mb: u32,
    /// Relative CPU weight.
    pub cpu_shares: u32,
}

impl Default for ResourceConstraints {
    fn default() -> Self {
        Self {
            ram_mb: 50,
            cpu_shares: 1024,
        }
    }
}

/// Definition of the code a closure runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureDescription {
    /// Runtime name, keyed into the driver registry.
    pub runtime: String,
    #[serde(default)]
    pub resources: ResourceConstraints,
    /// Location of the code bundle.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Runtime dependency manifest.
    #[serde(default)]
    pub dependencies: Option<String>,
    #[serde(default)]
    pub log_configuration: Option<Value>,
}

/// Container settings derived from a closure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfiguration {
    /// Container name.
    pub name: String,
    pub memory_mb: u32,
    pub cpu_shares: u32,
    #[serde(default)]
    pub log_configuration: Option<Value>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    /// `KEY=value` environment entries.
    #[serde(default)]
    pub env_vars: Vec<String>,
}

impl ContainerConfiguration {
    /// Value of an environment entry.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env_vars.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(name, _)| *name == key)
                .map(|(_, value)| value)
        })
    }

    /// Image tag for the runtime version. Declared dependencies are baked
    /// into the image, so they contribute a digest suffix.
    pub fn image_tag(&self, version: &str) -> String {
        match self.dependencies.as_deref().filter(|deps| !deps.trim().is_empty()) {
            Some(deps) => {
                let digest = hex::encode(Sha256::digest(deps.as_bytes()));
                format!("{version}_{}", &digest[..DEPENDENCY_TAG_LEN])
            }
            None => version.to_string(),
        }
    }
}

/// Image coordinates for an execution container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfiguration {
    pub image_name: String,
    pub image_name_version: String,
    pub base_image_name: String,
    pub base_image_version: String,
    #[serde(default)]
    pub registry: Option<String>,
}
