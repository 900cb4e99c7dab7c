//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Translation between network records and the engine's wire shape.

use indexmap::IndexMap;
use r_prov_common::EXPIRATION_RESET;
use serde_json::{json, Map, Value};

use crate::envelope::{
    CommandEnvelope, NETWORK_DRIVER_PROP, NETWORK_ID_PROP, NETWORK_IPAM_PROP, NETWORK_NAME_PROP,
    NETWORK_OPTIONS_PROP,
};
use crate::model::{Ipam, IpamConfig, ResourceRecord, ResourceRecordPatch};
use crate::{AdapterError, Result};

const IPAM_DRIVER: &str = "Driver";
const IPAM_CONFIG: &str = "Config";
const IPAM_OPTIONS: &str = "Options";
const IPAM_SUBNET: &str = "Subnet";
const IPAM_RANGE: &str = "IPRange";
const IPAM_GATEWAY: &str = "Gateway";
const IPAM_AUX_ADDRESSES: &str = "AuxiliaryAddresses";
const NETWORK_INTERNAL: &str = "Internal";
const NETWORK_LABELS: &str = "Labels";

/// Whether the network is owned by the engine itself.
pub fn is_predefined_network(name: &str, predefined: &[String]) -> bool {
    predefined.iter().any(|candidate| candidate == name)
}

/// Serialize an IPAM block into the engine's shape.
pub fn ipam_to_properties(ipam: &Ipam) -> Value {
    let mut out = Map::new();
    if let Some(driver) = &ipam.driver {
        out.insert(IPAM_DRIVER.into(), json!(driver));
    }
    if !ipam.config.is_empty() {
        let pools = ipam.config.iter().map(pool_to_properties).collect();
        out.insert(IPAM_CONFIG.into(), Value::Array(pools));
    }
    if !ipam.options.is_empty() {
        out.insert(IPAM_OPTIONS.into(), json!(ipam.options));
    }
    Value::Object(out)
}

fn pool_to_properties(pool: &IpamConfig) -> Value {
    let mut out = Map::new();
    if let Some(subnet) = &pool.subnet {
        out.insert(IPAM_SUBNET.into(), json!(subnet));
    }
    if let Some(range) = &pool.ip_range {
        out.insert(IPAM_RANGE.into(), json!(range));
    }
    if let Some(gateway) = &pool.gateway {
        out.insert(IPAM_GATEWAY.into(), json!(gateway));
    }
    if !pool.auxiliary_addresses.is_empty() {
        out.insert(IPAM_AUX_ADDRESSES.into(), json!(pool.auxiliary_addresses));
    }
    Value::Object(out)
}

fn ipam_from_properties(value: &Value) -> Option<Ipam> {
    let obj = value.as_object()?;
    let config = obj
        .get(IPAM_CONFIG)
        .and_then(Value::as_array)
        .map(|pools| pools.iter().filter_map(pool_from_properties).collect())
        .unwrap_or_default();
    Some(Ipam {
        driver: string_field(obj, IPAM_DRIVER),
        config,
        options: obj.get(IPAM_OPTIONS).map(string_map).unwrap_or_default(),
    })
}

fn pool_from_properties(value: &Value) -> Option<IpamConfig> {
    let obj = value.as_object()?;
    Some(IpamConfig {
        subnet: string_field(obj, IPAM_SUBNET),
        ip_range: string_field(obj, IPAM_RANGE),
        gateway: string_field(obj, IPAM_GATEWAY),
        auxiliary_addresses: obj
            .get(IPAM_AUX_ADDRESSES)
            .map(string_map)
            .unwrap_or_default(),
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Engines report option values as strings, but tolerate scalars.
fn string_map(value: &Value) -> IndexMap<String, String> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build the CREATE envelope for a record on top of the host base.
pub fn create_envelope(
    base: &CommandEnvelope,
    record: &ResourceRecord,
    default_driver: &str,
) -> Result<CommandEnvelope> {
    let name = record
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AdapterError::MissingField {
            resource: record.document_self_link.clone(),
            field: "name",
        })?;
    let driver = record
        .driver
        .as_deref()
        .filter(|driver| !driver.trim().is_empty())
        .unwrap_or(default_driver);

    let mut envelope = base
        .clone()
        .with_property(NETWORK_NAME_PROP, name)
        .with_property(NETWORK_DRIVER_PROP, driver);
    if !record.options.is_empty() {
        envelope = envelope.with_property(NETWORK_OPTIONS_PROP, json!(record.options));
    }
    if let Some(ipam) = &record.ipam {
        envelope = envelope.with_property(NETWORK_IPAM_PROP, ipam_to_properties(ipam));
    }
    Ok(envelope)
}

/// Build an envelope addressing an existing backend resource by id.
pub fn id_envelope(base: &CommandEnvelope, id: &str) -> CommandEnvelope {
    base.clone().with_property(NETWORK_ID_PROP, id)
}

/// Extract the backend id from a CREATE response body.
pub fn created_id(body: &Map<String, Value>) -> Option<String> {
    string_field(body, NETWORK_ID_PROP)
}

/// Map an inspect response into a reconciliation patch. The patch always
/// clears the record's expiration.
pub fn properties_to_patch(body: &Map<String, Value>) -> ResourceRecordPatch {
    ResourceRecordPatch {
        name: string_field(body, NETWORK_NAME_PROP),
        driver: string_field(body, NETWORK_DRIVER_PROP),
        options: body
            .get(NETWORK_OPTIONS_PROP)
            .filter(|v| v.is_object())
            .map(string_map),
        ipam: body.get(NETWORK_IPAM_PROP).and_then(ipam_from_properties),
        id: string_field(body, NETWORK_ID_PROP),
        adapter_management_reference: None,
        internal: body.get(NETWORK_INTERNAL).and_then(Value::as_bool),
        labels: body
            .get(NETWORK_LABELS)
            .filter(|v| v.is_object())
            .map(string_map),
        document_expiration_time_micros: Some(EXPIRATION_RESET),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CommandEnvelope {
        CommandEnvelope::new().with_property("host.uri", "tcp://h1:2376")
    }

    #[test]
    fn create_envelope_defaults_driver() {
        let mut record = ResourceRecord::new("/networks/net1", "net1");
        record.driver = Some(String::new());
        let envelope = create_envelope(&base(), &record, "bridge").unwrap();
        assert_eq!(envelope.get_str(NETWORK_DRIVER_PROP), Some("bridge"));
        assert_eq!(envelope.get_str(NETWORK_NAME_PROP), Some("net1"));
        assert!(!envelope.contains(NETWORK_OPTIONS_PROP));
        assert!(!envelope.contains(NETWORK_IPAM_PROP));
    }

    #[test]
    fn create_envelope_requires_name() {
        let record = ResourceRecord {
            document_self_link: "/networks/anon".into(),
            ..ResourceRecord::default()
        };
        let err = create_envelope(&base(), &record, "bridge").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn ipam_uses_engine_shape() {
        let mut aux = IndexMap::new();
        aux.insert("router".to_string(), "10.0.0.2".to_string());
        let ipam = Ipam {
            driver: Some("default".into()),
            config: vec![IpamConfig {
                subnet: Some("10.0.0.0/24".into()),
                ip_range: None,
                gateway: Some("10.0.0.1".into()),
                auxiliary_addresses: aux,
            }],
            options: IndexMap::new(),
        };
        assert_eq!(
            ipam_to_properties(&ipam),
            json!({
                "Driver": "default",
                "Config": [{
                    "Subnet": "10.0.0.0/24",
                    "Gateway": "10.0.0.1",
                    "AuxiliaryAddresses": {"router": "10.0.0.2"}
                }]
            })
        );
    }

    #[test]
    fn inspect_response_maps_to_patch() {
        let body = json!({
            "Id": "abc123",
            "Name": "net1",
            "Driver": "bridge",
            "Options": {"com.docker.network.mtu": "1500"},
            "IPAM": {"Driver": "default", "Config": [{"Subnet": "172.18.0.0/16"}]},
            "Internal": false,
            "Labels": {"tier": "web"}
        });
        let patch = properties_to_patch(body.as_object().unwrap());
        assert_eq!(patch.id.as_deref(), Some("abc123"));
        assert_eq!(patch.driver.as_deref(), Some("bridge"));
        assert_eq!(patch.internal, Some(false));
        assert_eq!(patch.document_expiration_time_micros, Some(-1));
        let ipam = patch.ipam.unwrap();
        assert_eq!(ipam.config[0].subnet.as_deref(), Some("172.18.0.0/16"));
        assert_eq!(patch.labels.unwrap()["tier"], "web");
    }

    #[test]
    fn sparse_inspect_still_resets_expiration() {
        let patch = properties_to_patch(&Map::new());
        assert_eq!(
            patch,
            ResourceRecordPatch {
                document_expiration_time_micros: Some(-1),
                ..ResourceRecordPatch::default()
            }
        );
    }

    #[test]
    fn predefined_networks_are_recognised() {
        let predefined = vec!["bridge".to_string(), "host".to_string()];
        assert!(is_predefined_network("host", &predefined));
        assert!(!is_predefined_network("net1", &predefined));
    }

    #[test]
    fn created_id_is_read_from_body() {
        let body = json!({"Id": "abc123", "Warning": ""});
        assert_eq!(created_id(body.as_object().unwrap()).as_deref(), Some("abc123"));
        assert_eq!(created_id(&Map::new()), None);
    }
}
