//! ---
//! prov_section: "04-adapter-orchestration"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Adapter command orchestration pipeline and backend contracts."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Resource record store contract and an in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{ResourceRecord, ResourceRecordPatch};

/// Failure reported by the resource store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record exists under the reference.
    #[error("resource {0} not found")]
    NotFound(String),
    /// The store rejected a concurrent write.
    #[error("conflicting update on resource {0}")]
    Conflict(String),
    /// The store could not be reached.
    #[error("resource store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted document store holding resource records.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a record snapshot by reference.
    async fn get(&self, reference: &str) -> Result<ResourceRecord, StoreError>;

    /// Merge a patch into the record and return the updated snapshot.
    async fn patch(
        &self,
        reference: &str,
        patch: ResourceRecordPatch,
    ) -> Result<ResourceRecord, StoreError>;
}

/// Map-backed store used by tests and local wiring.
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    records: RwLock<HashMap<String, ResourceRecord>>,
    gets: AtomicUsize,
    patches: AtomicUsize,
}

impl InMemoryResourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record under its self link.
    pub fn insert(&self, record: ResourceRecord) {
        self.records
            .write()
            .insert(record.document_self_link.clone(), record);
    }

    /// Snapshot of a record without counting it as a store read.
    pub fn snapshot(&self, reference: &str) -> Option<ResourceRecord> {
        self.records.read().get(reference).cloned()
    }

    /// Number of `get` calls served.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `patch` calls served.
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(&self, reference: &str) -> Result<ResourceRecord, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.records
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }

    async fn patch(
        &self,
        reference: &str,
        patch: ResourceRecordPatch,
    ) -> Result<ResourceRecord, StoreError> {
        self.patches.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.write();
        let record = records
            .get_mut(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;
        record.apply(patch);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_and_patch_round_trip() {
        let store = InMemoryResourceStore::new();
        store.insert(ResourceRecord::new("/networks/net1", "net1"));

        let patched = store
            .patch(
                "/networks/net1",
                ResourceRecordPatch {
                    id: Some("abc123".into()),
                    ..ResourceRecordPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.id.as_deref(), Some("abc123"));
        assert_eq!(store.get("/networks/net1").await.unwrap(), patched);
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.patch_count(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_reported() {
        let store = InMemoryResourceStore::new();
        assert_eq!(
            store.get("/networks/none").await.unwrap_err(),
            StoreError::NotFound("/networks/none".into())
        );
        assert!(store
            .patch("/networks/none", ResourceRecordPatch::default())
            .await
            .is_err());
        assert!(store.snapshot("/networks/none").is_none());
    }
}
