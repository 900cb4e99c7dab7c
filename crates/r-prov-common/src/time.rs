//! ---
//! prov_section: "01-core-functionality"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Shared primitives and utilities for the provisioning runtime."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use chrono::Utc;

/// Expiration marker written on reconciliation patches to clear any pending expiry.
pub const EXPIRATION_RESET: i64 = -1;

/// Current wall-clock time in microseconds since the unix epoch.
pub fn now_micros_utc() -> i64 {
    Utc::now().timestamp_micros()
}
