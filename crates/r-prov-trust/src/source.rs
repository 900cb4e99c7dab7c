//! ---
//! prov_section: "05-trust-certificates"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Trust certificate aggregation for execution drivers."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use async_trait::async_trait;
use parking_lot::RwLock;
use r_prov_common::now_micros_utc;

use crate::{Result, TrustError};

/// Trusted certificate as stored in the backing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustCertificate {
    /// Identity of the certificate document.
    pub self_link: String,
    /// PEM-encoded certificate.
    pub certificate: String,
    /// Last update time in microseconds since the epoch.
    pub updated_micros: i64,
}

/// Backing collection of trusted certificates.
#[async_trait]
pub trait TrustCertificateSource: Send + Sync {
    /// Certificates updated at or after `since_micros`.
    async fn updated_since(&self, since_micros: i64) -> Result<Vec<TrustCertificate>>;
}

/// Vector-backed certificate collection.
#[derive(Debug, Default)]
pub struct InMemoryTrustSource {
    certificates: RwLock<Vec<TrustCertificate>>,
    offline: RwLock<Option<String>>,
}

impl InMemoryTrustSource {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a certificate stamped with the current time.
    pub fn add(&self, self_link: impl Into<String>, certificate: impl Into<String>) {
        self.certificates.write().push(TrustCertificate {
            self_link: self_link.into(),
            certificate: certificate.into(),
            updated_micros: now_micros_utc(),
        });
    }

    /// Make every query fail with the supplied reason until cleared.
    pub fn set_offline(&self, reason: Option<String>) {
        *self.offline.write() = reason;
    }
}

#[async_trait]
impl TrustCertificateSource for InMemoryTrustSource {
    async fn updated_since(&self, since_micros: i64) -> Result<Vec<TrustCertificate>> {
        if let Some(reason) = self.offline.read().clone() {
            return Err(TrustError::Source(reason));
        }
        Ok(self
            .certificates
            .read()
            .iter()
            .filter(|cert| cert.updated_micros >= since_micros)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queries_filter_by_update_time() {
        let source = InMemoryTrustSource::new();
        source.add("/certs/a", "A");
        let after_a = now_micros_utc() + 1;
        assert_eq!(source.updated_since(0).await.unwrap().len(), 1);
        assert!(source.updated_since(after_a).await.unwrap().is_empty());

        source.set_offline(Some("index rebuilding".into()));
        assert!(source.updated_since(0).await.is_err());
    }
}
