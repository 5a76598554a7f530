// crates/nexus-router-config/tests/config_integration.rs
// ============================================================================
// Integration tests: RouterConfig loaded from disk, wired into a real
// SubprocessAdapter
// ============================================================================

//! Loads a full `RouterConfig` (all three sections) from a real file on disk
//! and checks that its sections compose the way a host process actually uses
//! them: `registry` gates an `adapter_id`, and `subprocess_defaults` is what
//! a host would hand to `SubprocessConfig` before building a
//! `SubprocessAdapter`.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "integration fixtures use explicit asserts and unwraps for clarity"
)]

use nexus_router_adapters::SubprocessAdapter;
use nexus_router_adapters::SubprocessConfig;
use nexus_router_config::EventStoreConfig;
use nexus_router_config::RouterConfig;

#[test]
fn full_config_loads_and_wires_a_subprocess_adapter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nexus-router.toml");
    std::fs::write(
        &path,
        r#"
        [event_store]
        backend = "sqlite"
        path = "run.sqlite3"
        busy_timeout_ms = 2000

        [registry]
        allow_adapter_ids = ["subprocess:echo:abcdef"]
        deny_adapter_ids = ["subprocess:rm:000000"]
        max_steps_ceiling = 50

        [subprocess_defaults]
        timeout_s = 7
        max_stdout_chars = 2048
        max_stderr_chars = 2048
        cleanup_retry_delay_ms = 25
        strict_stderr = true
        "#,
    )
    .expect("write fixture config");

    let config = RouterConfig::load(Some(&path)).expect("load should succeed");

    match &config.event_store {
        EventStoreConfig::Sqlite { path, busy_timeout_ms } => {
            assert_eq!(path.to_string_lossy(), "run.sqlite3");
            assert_eq!(*busy_timeout_ms, 2000);
        }
    }

    assert!(config.registry.permits("subprocess:echo:abcdef"));
    assert!(!config.registry.permits("subprocess:rm:000000"));
    assert!(!config.registry.permits("subprocess:curl:111111"));
    assert_eq!(config.registry.max_steps_ceiling, Some(50));

    let mut subprocess_config = SubprocessConfig::new(vec!["echo".to_string()]);
    subprocess_config.timeout_s = config.subprocess_defaults.timeout_s;
    subprocess_config.max_stdout_chars = config.subprocess_defaults.max_stdout_chars;
    subprocess_config.max_stderr_chars = config.subprocess_defaults.max_stderr_chars;
    subprocess_config.strict_stderr = config.subprocess_defaults.strict_stderr;

    let adapter = SubprocessAdapter::new(subprocess_config).expect("build adapter from config");
    assert!(adapter.adapter_id().starts_with("subprocess:echo:"));
}

#[test]
fn invalid_registry_section_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nexus-router.toml");
    std::fs::write(
        &path,
        r#"
        [registry]
        max_steps_ceiling = 0
        "#,
    )
    .expect("write fixture config");

    let err = RouterConfig::load(Some(&path)).expect_err("zero ceiling must be rejected");
    assert!(matches!(err, nexus_router_config::ConfigError::Invalid(_)));
}
