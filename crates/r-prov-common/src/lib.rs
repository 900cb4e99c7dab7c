//! ---
//! prov_section: "01-core-functionality"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Shared primitives and utilities for the provisioning runtime."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
//! Core shared primitives for the R-PROV workspace.
//! This crate exposes configuration loading, tracing bootstrap, and the
//! time helpers consumed by the adapter, trust, and closure crates.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AdapterConfig, AppConfig, ClosureConfig, LoggingConfig, MetricsConfig, RuntimeImageConfig,
    TrustConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{now_micros_utc, EXPIRATION_RESET};
