//! ---
//! prov_section: "06-execution-drivers"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Closure execution drivers and container launch configuration."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Runtime-to-image mapping.

use indexmap::IndexMap;
use r_prov_common::{ClosureConfig, RuntimeImageConfig};

/// Resolves the image serving a closure runtime.
pub trait DriverRegistry: Send + Sync {
    /// Image settings for the runtime, if it is supported.
    fn runtime_image(&self, runtime: &str) -> Option<RuntimeImageConfig>;

    /// Supported runtime names.
    fn runtimes(&self) -> Vec<String>;
}

/// Registry backed by the `[closures.runtimes]` configuration table.
#[derive(Debug, Clone, Default)]
pub struct StaticDriverRegistry {
    runtimes: IndexMap<String, RuntimeImageConfig>,
}

impl StaticDriverRegistry {
    /// Build the registry from closure configuration.
    pub fn from_config(config: &ClosureConfig) -> Self {
        Self {
            runtimes: config.runtimes.clone(),
        }
    }

    /// Register or replace a runtime.
    pub fn with_runtime(mut self, name: impl Into<String>, image: RuntimeImageConfig) -> Self {
        self.runtimes.insert(name.into(), image);
        self
    }
}

impl DriverRegistry for StaticDriverRegistry {
    fn runtime_image(&self, runtime: &str) -> Option<RuntimeImageConfig> {
        self.runtimes.get(runtime).cloned()
    }

    fn runtimes(&self) -> Vec<String> {
        self.runtimes.keys().cloned().collect()
    }
}
