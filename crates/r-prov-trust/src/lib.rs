//! ---
//! prov_section: "05-trust-certificates"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Trust certificate aggregation for execution drivers."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Process-wide trust certificate cache. A single owning task aggregates
//! certificates from a [`TrustCertificateSource`] and publishes them as one
//! compressed [`TrustBundle`]; readers take the latest bundle without waiting.
#![warn(missing_docs)]

pub mod bundle;
pub mod cache;
pub mod source;

pub use bundle::TrustBundle;
pub use cache::{
    ConfigurationChange, RefreshReport, TrustCertificateCache, MIN_RECONCILE_INTERVAL,
    TRUST_LAST_UPDATED_KEY,
};
pub use source::{InMemoryTrustSource, TrustCertificate, TrustCertificateSource};

/// Result alias used by the trust crate.
pub type Result<T> = std::result::Result<T, TrustError>;

/// Errors raised by the trust certificate cache.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// The backing certificate collection could not be queried.
    #[error("trust certificate query failed: {0}")]
    Source(String),
    /// The bundle could not be compressed or decompressed.
    #[error("trust bundle codec error: {0}")]
    Codec(#[from] std::io::Error),
    /// The bundle is not valid base64.
    #[error("trust bundle is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    /// The decompressed bundle is not UTF-8.
    #[error("trust bundle is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The cache task has stopped.
    #[error("trust certificate cache is not running")]
    Stopped,
}
