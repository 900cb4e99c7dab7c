//! ---
//! prov_section: "01-core-functionality"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Shared primitives and utilities for the provisioning runtime."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::time::Duration;

use r_prov_common::config::AppConfig;
use r_prov_common::{init_tracing, LogFormat, LoggingConfig};
use tempfile::tempdir;

#[test]
fn first_existing_candidate_is_loaded() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("r-prov.toml");
    std::fs::write(
        &present,
        r#"
        [adapter]
        network_create_retries = 1
        retry_backoff_ms = 0

        [trust]
        reconcile_interval_secs = 2
        "#,
    )
    .unwrap();

    let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.adapter.network_create_retries, 1);
    assert_eq!(loaded.config.adapter.retry_backoff, Duration::ZERO);
    assert_eq!(loaded.config.trust.reconcile_interval, Duration::from_secs(2));
}

#[test]
fn missing_candidates_report_every_path() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.toml");
    let b = dir.path().join("b.toml");
    let err = AppConfig::load(&[a, b]).unwrap_err().to_string();
    assert!(err.contains("a.toml"));
    assert!(err.contains("b.toml"));
}

#[test]
fn tracing_bootstrap_creates_log_directory() {
    let dir = tempdir().unwrap();
    let config = LoggingConfig {
        directory: dir.path().join("logs"),
        format: LogFormat::Pretty,
        file_prefix: Some("test".into()),
    };
    init_tracing("r-prov-common-tests", &config).unwrap();
    assert!(config.directory.is_dir());
}
