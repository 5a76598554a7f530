// crates/nexus-router-config/src/lib.rs
// ============================================================================
// Crate: nexus-router-config
// Description: Host process configuration model and strict TOML loader.
// Purpose: Give the router host one typed, validated configuration surface
//          instead of scattered environment reads.
// ============================================================================

//! # nexus-router-config
//!
//! [`RouterConfig`] is the one configuration object a host process builds
//! before it constructs an [`nexus_router_core::store::EventStore`], an
//! [`nexus_router_core::registry::AdapterRegistry`], and a
//! [`nexus_router_core::router::Router`]. It is loaded from a TOML file with
//! the same fail-closed discipline used across the rest of this workspace:
//! hard size and path limits, UTF-8 enforcement, and a `validate` pass that
//! runs after deserialization so defaulted fields are checked too.

mod config;
mod error;

pub use config::DEFAULT_CONFIG_NAME;
pub use config::EventStoreConfig;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::MAX_PATH_COMPONENT_LENGTH;
pub use config::MAX_TOTAL_PATH_LENGTH;
pub use config::RegistryPolicyConfig;
pub use config::RouterConfig;
pub use config::SubprocessDefaultsConfig;
pub use error::ConfigError;
