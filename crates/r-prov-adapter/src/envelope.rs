//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Property bag addressed at a single executor call.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Network name property.
pub const NETWORK_NAME_PROP: &str = "Name";
/// Network driver property.
pub const NETWORK_DRIVER_PROP: &str = "Driver";
/// Network driver options property.
pub const NETWORK_OPTIONS_PROP: &str = "Options";
/// IP address management block property.
pub const NETWORK_IPAM_PROP: &str = "IPAM";
/// Backend-assigned network id property.
pub const NETWORK_ID_PROP: &str = "Id";

/// Backend host address.
pub const HOST_URI_PROP: &str = "host.uri";
/// Link to the credentials used against the host.
pub const HOST_CREDENTIALS_PROP: &str = "host.credentials";
/// PEM certificate the host presents.
pub const HOST_TRUST_CERTIFICATE_PROP: &str = "host.trust.certificate";
/// Adapter family declared by the host.
pub const HOST_ADAPTER_PROP: &str = "host.adapter";

/// Ordered bag of named properties. Envelopes are cheap to clone so that each
/// operation derives its own value from the shared host base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandEnvelope {
    properties: IndexMap<String, Value>,
}

impl CommandEnvelope {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value while keeping its position.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property only when a value is present.
    pub fn with_property_if_some<V: Into<Value>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_property(name, value),
            None => self,
        }
    }

    /// Look up a property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Look up a string property.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Whether the envelope carries the property.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Property names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_envelopes_do_not_share_state() {
        let base = CommandEnvelope::new().with_property(HOST_URI_PROP, "tcp://docker-1:2376");
        let create = base.clone().with_property(NETWORK_NAME_PROP, "net1");
        let inspect = base.clone().with_property(NETWORK_ID_PROP, "abc123");

        assert_eq!(base.len(), 1);
        assert!(create.contains(NETWORK_NAME_PROP));
        assert!(!create.contains(NETWORK_ID_PROP));
        assert!(inspect.contains(NETWORK_ID_PROP));
        assert_eq!(inspect.get_str(HOST_URI_PROP), Some("tcp://docker-1:2376"));
    }

    #[test]
    fn insertion_order_is_preserved() {
        let envelope = CommandEnvelope::new()
            .with_property("b", 1)
            .with_property("a", json!({"k": "v"}))
            .with_property_if_some("skipped", None::<String>)
            .with_property("b", 2);
        assert_eq!(envelope.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(envelope.get("b"), Some(&json!(2)));
    }
}
