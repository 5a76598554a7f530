// crates/nexus-router-config/src/error.rs
// ============================================================================
// Module: Config Error
// Description: Failure modes for loading and validating RouterConfig.
// Purpose: Give the host process one error type that distinguishes a
//          missing/unreadable file from a malformed or invalid one.
// ============================================================================

use thiserror::Error;

/// Something went wrong loading or validating a [`crate::RouterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("config io error: {0}")]
    Io(String),
    /// The file contents were not valid TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The file parsed but failed validation, or the path itself was
    /// unacceptable (too long, a component too long, not UTF-8).
    #[error("invalid config: {0}")]
    Invalid(String),
}
