//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AdapterError, Result};

/// Operations the adapter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Create the backend resource, then inspect and reconcile it.
    Create,
    /// Remove the backend resource.
    Delete,
    /// Inspect the backend resource and reconcile the record.
    Inspect,
    /// List resources on a host; answered directly to the caller.
    #[serde(alias = "LIST_NETWORKS")]
    List,
    /// Attach a container to the resource.
    Connect,
    /// Detach a container from the resource.
    Disconnect,
}

impl OperationType {
    /// Stable upper-case identifier used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "CREATE",
            OperationType::Delete => "DELETE",
            OperationType::Inspect => "INSPECT",
            OperationType::List => "LIST",
            OperationType::Connect => "CONNECT",
            OperationType::Disconnect => "DISCONNECT",
        }
    }

    /// Direct operations complete the caller with the backend payload instead
    /// of reconciling a resource record.
    pub fn is_direct(&self) -> bool {
        matches!(self, OperationType::List)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request body as received from callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    /// Requested operation.
    #[serde(default)]
    pub operation_type: Option<OperationType>,
    /// Resource record reference, or the host link for direct operations.
    #[serde(default)]
    pub resource_reference: Option<String>,
    /// Identifier correlating log lines of one request.
    #[serde(default)]
    pub tracking_id: Option<String>,
}

impl NetworkRequest {
    /// Build a request for the supplied operation and reference.
    pub fn new(operation: OperationType, resource_reference: impl Into<String>) -> Self {
        Self {
            operation_type: Some(operation),
            resource_reference: Some(resource_reference.into()),
            tracking_id: None,
        }
    }

    /// Attach a tracking identifier.
    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Check required fields and produce the typed request. A missing tracking
    /// id is replaced by a generated one.
    pub fn validate(self) -> Result<ResourceRequest> {
        let operation = self
            .operation_type
            .ok_or_else(|| AdapterError::InvalidRequest("operationType is required".into()))?;
        let resource_reference = self
            .resource_reference
            .filter(|reference| !reference.trim().is_empty())
            .ok_or_else(|| AdapterError::InvalidRequest("resourceReference is required".into()))?;
        let tracking_id = self
            .tracking_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        Ok(ResourceRequest {
            operation,
            resource_reference,
            tracking_id,
        })
    }
}

/// Validated request flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Requested operation.
    pub operation: OperationType,
    /// Resource record reference, or the host link for direct operations.
    pub resource_reference: String,
    /// Identifier correlating log lines of one request.
    pub tracking_id: String,
}

impl ResourceRequest {
    /// Suffix appended to log lines.
    pub fn tracking_log(&self) -> String {
        format!("[tracking: {}]", self.tracking_id)
    }
}

/// Single IPAM pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub auxiliary_addresses: IndexMap<String, String>,
}

/// IP address management block of a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ipam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<IpamConfig>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

/// Snapshot of a persisted container network record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    /// Identity of the record in the store.
    pub document_self_link: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub options: IndexMap<String, String>,
    #[serde(default)]
    pub ipam: Option<Ipam>,
    /// Backend-assigned id; absent until the resource is created.
    #[serde(default)]
    pub id: Option<String>,
    /// Host that owns the resource.
    #[serde(default)]
    pub originating_host_link: Option<String>,
    #[serde(default)]
    pub adapter_management_reference: Option<String>,
    #[serde(default)]
    pub internal: Option<bool>,
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(default)]
    pub document_expiration_time_micros: i64,
}

impl ResourceRecord {
    /// Create a record with the supplied identity and name.
    pub fn new(document_self_link: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            document_self_link: document_self_link.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Attach the owning host.
    pub fn with_host(mut self, host_link: impl Into<String>) -> Self {
        self.originating_host_link = Some(host_link.into());
        self
    }

    /// Attach a backend id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Merge a patch into the record. Absent patch fields leave values untouched.
    pub fn apply(&mut self, patch: ResourceRecordPatch) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(driver) = patch.driver {
            self.driver = Some(driver);
        }
        if let Some(options) = patch.options {
            self.options = options;
        }
        if let Some(ipam) = patch.ipam {
            self.ipam = Some(ipam);
        }
        if let Some(id) = patch.id {
            self.id = Some(id);
        }
        if let Some(reference) = patch.adapter_management_reference {
            self.adapter_management_reference = Some(reference);
        }
        if let Some(internal) = patch.internal {
            self.internal = Some(internal);
        }
        if let Some(labels) = patch.labels {
            self.labels = labels;
        }
        if let Some(expiration) = patch.document_expiration_time_micros {
            self.document_expiration_time_micros = expiration;
        }
    }
}

/// Merge-patch body issued against the resource store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_management_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_expiration_time_micros: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_is_validated() {
        let body: NetworkRequest = serde_json::from_value(json!({
            "operationType": "CREATE",
            "resourceReference": "/resources/container-networks/net1",
            "trackingId": "req-7"
        }))
        .unwrap();
        let request = body.validate().unwrap();
        assert_eq!(request.operation, OperationType::Create);
        assert_eq!(request.tracking_id, "req-7");
        assert_eq!(request.tracking_log(), "[tracking: req-7]");
    }

    #[test]
    fn missing_operation_or_reference_fails_fast() {
        let missing_op = NetworkRequest {
            resource_reference: Some("/a".into()),
            ..NetworkRequest::default()
        };
        assert!(missing_op.validate().unwrap_err().is_validation());

        let blank_reference = NetworkRequest::new(OperationType::Delete, "  ");
        let err = blank_reference.validate().unwrap_err();
        assert!(err.to_string().contains("resourceReference"));
    }

    #[test]
    fn tracking_id_is_generated_when_absent() {
        let request = NetworkRequest::new(OperationType::Inspect, "/a")
            .validate()
            .unwrap();
        assert_eq!(request.tracking_id.len(), 32);
    }

    #[test]
    fn legacy_list_alias_is_accepted() {
        let op: OperationType = serde_json::from_value(json!("LIST_NETWORKS")).unwrap();
        assert_eq!(op, OperationType::List);
        assert!(op.is_direct());
        assert!(!OperationType::Create.is_direct());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut record = ResourceRecord::new("/networks/net1", "net1").with_host("/hosts/h1");
        record.document_expiration_time_micros = 42;
        record.apply(ResourceRecordPatch {
            driver: Some("bridge".into()),
            id: Some("abc123".into()),
            document_expiration_time_micros: Some(-1),
            ..ResourceRecordPatch::default()
        });
        assert_eq!(record.name.as_deref(), Some("net1"));
        assert_eq!(record.driver.as_deref(), Some("bridge"));
        assert_eq!(record.id.as_deref(), Some("abc123"));
        assert_eq!(record.originating_host_link.as_deref(), Some("/hosts/h1"));
        assert_eq!(record.document_expiration_time_micros, -1);
    }

    #[test]
    fn patch_serializes_sparse_body() {
        let patch = ResourceRecordPatch {
            id: Some("abc".into()),
            ..ResourceRecordPatch::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"id": "abc"}));
    }
}
