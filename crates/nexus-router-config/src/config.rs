// crates/nexus-router-config/src/config.rs
// ============================================================================
// Module: Router Configuration
// Description: Typed, validated TOML configuration for a router host.
// Purpose: Cover the event store backend, adapter registry access policy,
//          and subprocess adapter defaults from one file.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits, matching the fail-closed posture used elsewhere in this
//! workspace. A missing or invalid file is always an error; there is no
//! silent fallback to defaults for a file the caller explicitly named.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "nexus-router.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "NEXUS_ROUTER_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of steps accepted in `registry.max_steps_ceiling`.
const MAX_STEPS_CEILING_UPPER_BOUND: u32 = 100_000;

// ============================================================================
// SECTION: Top-level config
// ============================================================================

/// Full configuration for one router host process.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Event store backend configuration.
    pub event_store: EventStoreConfig,
    /// Adapter registry access policy.
    pub registry: RegistryPolicyConfig,
    /// Defaults applied to subprocess adapters constructed by this host.
    pub subprocess_defaults: SubprocessDefaultsConfig,
}

impl RouterConfig {
    /// Loads configuration from disk using the default resolution rules:
    /// an explicit path, then the `NEXUS_ROUTER_CONFIG` environment
    /// variable, then [`DEFAULT_CONFIG_NAME`] in the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the path cannot be read, the contents
    /// are not valid UTF-8 TOML, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid(
                "config file exceeds size limit".to_string(),
            ));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when any section is inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.event_store.validate()?;
        self.registry.validate()?;
        self.subprocess_defaults.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Event store section
// ============================================================================

/// Which backend the host wires up as its `EventStore`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EventStoreConfig {
    /// `SQLite`-backed store, opened at the given path.
    Sqlite {
        /// Path to the database file. `:memory:` opens an in-process
        /// database with no backing file.
        path: PathBuf,
        /// Busy timeout in milliseconds before a write gives up.
        #[serde(default = "default_busy_timeout_ms")]
        busy_timeout_ms: u64,
    },
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("nexus-router.sqlite3"),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl EventStoreConfig {
    /// Validates the event store section.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Sqlite {
                path,
                busy_timeout_ms,
            } => {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(
                        "event_store.path must be non-empty".to_string(),
                    ));
                }
                if path.as_os_str() != ":memory:" {
                    validate_path_string("event_store.path", &path.to_string_lossy())?;
                }
                if *busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "event_store.busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// SECTION: Registry policy section
// ============================================================================

/// Access policy the host applies before building its adapter registry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryPolicyConfig {
    /// If non-empty, only these `adapter_id`s may be registered.
    pub allow_adapter_ids: Vec<String>,
    /// `adapter_id`s that must never be registered, even if listed in
    /// `allow_adapter_ids`.
    pub deny_adapter_ids: Vec<String>,
    /// Upper bound a run request's `policy.max_steps` may not exceed,
    /// regardless of what the request asks for. `None` means no ceiling.
    pub max_steps_ceiling: Option<u32>,
}

impl RegistryPolicyConfig {
    /// Returns whether `adapter_id` is permitted by this policy.
    #[must_use]
    pub fn permits(&self, adapter_id: &str) -> bool {
        if self.deny_adapter_ids.iter().any(|id| id == adapter_id) {
            return false;
        }
        self.allow_adapter_ids.is_empty()
            || self.allow_adapter_ids.iter().any(|id| id == adapter_id)
    }

    /// Validates the registry policy section.
    fn validate(&self) -> Result<(), ConfigError> {
        for id in self.allow_adapter_ids.iter().chain(&self.deny_adapter_ids) {
            if id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "registry adapter id entries must be non-empty".to_string(),
                ));
            }
        }
        if let Some(ceiling) = self.max_steps_ceiling {
            if ceiling == 0 || ceiling > MAX_STEPS_CEILING_UPPER_BOUND {
                return Err(ConfigError::Invalid(format!(
                    "registry.max_steps_ceiling must be in 1..={MAX_STEPS_CEILING_UPPER_BOUND}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Subprocess adapter defaults section
// ============================================================================

/// Defaults applied to every subprocess adapter this host constructs,
/// before any per-adapter override.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubprocessDefaultsConfig {
    /// Wall-clock limit for one call, in seconds.
    pub timeout_s: u64,
    /// Truncation length for stdout stored in events.
    pub max_stdout_chars: usize,
    /// Truncation length for stderr stored in events and error details.
    pub max_stderr_chars: usize,
    /// Delay before retrying temp-file cleanup once, in milliseconds.
    pub cleanup_retry_delay_ms: u64,
    /// If set, non-blank stderr on an otherwise-successful call is an
    /// error.
    pub strict_stderr: bool,
    /// Environment overrides merged onto the parent environment for every
    /// subprocess adapter built from this config.
    pub env: BTreeMap<String, String>,
}

impl Default for SubprocessDefaultsConfig {
    fn default() -> Self {
        Self {
            timeout_s: 30,
            max_stdout_chars: 4096,
            max_stderr_chars: 4096,
            cleanup_retry_delay_ms: 50,
            strict_stderr: false,
            env: BTreeMap::new(),
        }
    }
}

impl SubprocessDefaultsConfig {
    /// Validates the subprocess defaults section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_s == 0 {
            return Err(ConfigError::Invalid(
                "subprocess_defaults.timeout_s must be greater than zero".to_string(),
            ));
        }
        for key in self.env.keys() {
            if key.is_empty() {
                return Err(ConfigError::Invalid(
                    "subprocess_defaults.env keys must be non-empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Path resolution helpers
// ============================================================================

/// Resolves the config path from an explicit argument, environment
/// variable, or the default filename, in that order.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid(
                "config path exceeds max length".to_string(),
            ));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_string("config path", &path.to_string_lossy())
}

/// Validates a path-shaped string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "{field} path component too long"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use super::*;

    fn write_toml(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write fixture config");
        path
    }

    #[test]
    fn defaults_validate() {
        let config = RouterConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_minimal_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_toml(
            &dir,
            "cfg.toml",
            r#"
            [event_store]
            backend = "sqlite"
            path = "run.sqlite3"
            "#,
        );
        let config = RouterConfig::load(Some(&path)).expect("load should succeed");
        match config.event_store {
            EventStoreConfig::Sqlite { path, .. } => {
                assert_eq!(path, PathBuf::from("run.sqlite3"));
            }
        }
    }

    #[test]
    fn load_rejects_oversized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let filler = "# padding\n".repeat((MAX_CONFIG_FILE_SIZE / 8) + 10);
        let path = write_toml(&dir, "big.toml", &filler);
        let err = RouterConfig::load(Some(&path)).expect_err("should reject oversized file");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_toml(&dir, "bad.toml", "this is not valid = = toml");
        let err = RouterConfig::load(Some(&path)).expect_err("should reject invalid toml");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist.toml");
        let err = RouterConfig::load(Some(&missing)).expect_err("should fail to read");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn registry_policy_permits_respects_allow_and_deny() {
        let mut policy = RegistryPolicyConfig::default();
        assert!(policy.permits("null"));
        policy.allow_adapter_ids.push("null".to_string());
        assert!(policy.permits("null"));
        assert!(!policy.permits("fake"));
        policy.deny_adapter_ids.push("null".to_string());
        assert!(!policy.permits("null"));
    }

    #[test]
    fn registry_policy_rejects_zero_ceiling() {
        let policy = RegistryPolicyConfig {
            max_steps_ceiling: Some(0),
            ..RegistryPolicyConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn subprocess_defaults_reject_zero_timeout() {
        let cfg = SubprocessDefaultsConfig {
            timeout_s: 0,
            ..SubprocessDefaultsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn resolve_path_prefers_explicit_argument() {
        let explicit = Path::new("explicit.toml");
        let resolved = resolve_path(Some(explicit)).expect("resolve");
        assert_eq!(resolved, PathBuf::from("explicit.toml"));
    }
}
