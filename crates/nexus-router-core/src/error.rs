// crates/nexus-router-core/src/error.rs
// ============================================================================
// Module: Router Error Model
// Description: Three-class error taxonomy (operational/bug/unknown) plus
//              leaf error enums for the store, adapters, and registry.
// Purpose: Give every subsystem a stable, classified failure shape.
// Dependencies: thiserror, serde_json
// ============================================================================

//! ## Overview
//! Every failure in the router is one of three classes: [`Operational`],
//! caused by an expected external condition and never fatal to the run;
//! [`Bug`], an invariant violation attributable to the adapter or the router
//! itself; or [`Unknown`], any other adapter failure, which is treated as a
//! bug once classified. [`RouterError`] is the boundary type every subsystem
//! error converts into before it crosses `Router::run`.
//!
//! [`Operational`]: ErrorKind::Operational
//! [`Bug`]: ErrorKind::Bug
//! [`Unknown`]: ErrorKind::Unknown

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Which of the three classes a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected external failure; does not abort the run.
    Operational,
    /// Invariant violation attributable to the adapter or router.
    Bug,
    /// Any other adapter failure, treated as a bug once classified.
    Unknown,
}

impl ErrorKind {
    /// Returns the `error_kind` string recorded on `TOOL_CALL_FAILED` events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Bug => "bug",
            Self::Unknown => "unknown",
        }
    }
}

// ============================================================================
// SECTION: RouterError
// ============================================================================

/// The classified, boundary-crossing error type. Operational failures never
/// propagate past `Router::run`: they are recorded and folded into a
/// well-formed response. Bug and unknown failures are recorded and then
/// returned as `Err` to the caller.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Expected external failure (timeout, non-zero exit, missing capability,
    /// unknown adapter, ...).
    #[error("operational error {code}: {message}")]
    Operational {
        /// Stable error code, e.g. `"CAPABILITY_MISSING"`.
        code: String,
        /// Human-readable message.
        message: String,
        /// Free-form structured details.
        details: Value,
    },
    /// Invariant violation attributable to the adapter or the router.
    #[error("bug {code}: {message}")]
    Bug {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Free-form structured details.
        details: Value,
    },
    /// Any other adapter failure, surfaced with `error_code = "UNKNOWN_ERROR"`.
    #[error("unknown error: {message}")]
    Unknown {
        /// Human-readable message.
        message: String,
        /// Free-form structured details.
        details: Value,
    },
}

impl RouterError {
    /// Constructs an operational error with empty details.
    #[must_use]
    pub fn operational(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operational { code: code.into(), message: message.into(), details: json!({}) }
    }

    /// Constructs an operational error carrying structured details.
    #[must_use]
    pub fn operational_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::Operational { code: code.into(), message: message.into(), details }
    }

    /// Constructs a bug error with empty details.
    #[must_use]
    pub fn bug(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bug { code: code.into(), message: message.into(), details: json!({}) }
    }

    /// Constructs a bug error carrying structured details.
    #[must_use]
    pub fn bug_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::Bug { code: code.into(), message: message.into(), details }
    }

    /// Constructs the catch-all unknown error, stable code `"UNKNOWN_ERROR"`.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { message: message.into(), details: json!({}) }
    }

    /// Which class this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Operational { .. } => ErrorKind::Operational,
            Self::Bug { .. } => ErrorKind::Bug,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The stable error code. Unknown errors report `"UNKNOWN_ERROR"`.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Operational { code, .. } | Self::Bug { code, .. } => code.as_str(),
            Self::Unknown { .. } => "UNKNOWN_ERROR",
        }
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Operational { message, .. }
            | Self::Bug { message, .. }
            | Self::Unknown { message, .. } => message.as_str(),
        }
    }

    /// The structured details payload.
    #[must_use]
    pub const fn details(&self) -> &Value {
        match self {
            Self::Operational { details, .. }
            | Self::Bug { details, .. }
            | Self::Unknown { details, .. } => details,
        }
    }

    /// `true` when this error is operational and therefore non-fatal to the run.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        matches!(self.kind(), ErrorKind::Operational)
    }
}

// ============================================================================
// SECTION: Adapter errors
// ============================================================================

/// Errors an [`crate::adapter::Adapter`] may raise from `call`. An adapter
/// may fail only as operational or bug; any other failure the implementer
/// lets escape is classified `Unknown` at the router boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Expected external failure.
    #[error("operational error {code}: {message}")]
    Operational {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Free-form structured details.
        details: Value,
    },
    /// Invariant violation attributable to the adapter.
    #[error("bug {code}: {message}")]
    Bug {
        /// Stable error code.
        code: String,
        /// Human-readable message.
        message: String,
        /// Free-form structured details.
        details: Value,
    },
}

impl AdapterError {
    /// Constructs an operational adapter error.
    #[must_use]
    pub fn operational(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operational { code: code.into(), message: message.into(), details: json!({}) }
    }

    /// Constructs an operational adapter error carrying structured details.
    #[must_use]
    pub fn operational_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::Operational { code: code.into(), message: message.into(), details }
    }

    /// Constructs a bug adapter error.
    #[must_use]
    pub fn bug(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bug { code: code.into(), message: message.into(), details: json!({}) }
    }

    /// Which class this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Operational { .. } => ErrorKind::Operational,
            Self::Bug { .. } => ErrorKind::Bug,
        }
    }

    /// The stable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Operational { code, .. } | Self::Bug { code, .. } => code.as_str(),
        }
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Operational { message, .. } | Self::Bug { message, .. } => message.as_str(),
        }
    }

    /// The structured details payload.
    #[must_use]
    pub const fn details(&self) -> &Value {
        match self {
            Self::Operational { details, .. } | Self::Bug { details, .. } => details,
        }
    }
}

impl From<AdapterError> for RouterError {
    fn from(error: AdapterError) -> Self {
        match error {
            AdapterError::Operational { code, message, details } => {
                Self::Operational { code, message, details }
            }
            AdapterError::Bug { code, message, details } => Self::Bug { code, message, details },
        }
    }
}

// ============================================================================
// SECTION: Registry errors
// ============================================================================

/// Errors raised by the [`crate::registry::AdapterRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `register` was called with an `adapter_id` already present.
    #[error("adapter already registered: {adapter_id}")]
    DuplicateAdapter {
        /// The conflicting adapter id.
        adapter_id: String,
    },
    /// The requested adapter id is not present in the registry.
    #[error("unknown adapter: {adapter_id}")]
    UnknownAdapter {
        /// The missing adapter id.
        adapter_id: String,
        /// All adapter ids currently registered, for the caller's diagnostics.
        available_adapters: Vec<String>,
    },
    /// No default adapter has been configured, or the configured default is
    /// no longer registered.
    #[error("no default adapter is configured")]
    NoDefaultAdapter {
        /// All adapter ids currently registered.
        available_adapters: Vec<String>,
    },
    /// The adapter lacks a capability required by the caller.
    #[error("adapter {adapter_id} missing capability {capability}")]
    CapabilityMissing {
        /// The adapter that was checked.
        adapter_id: String,
        /// The missing capability, as its wire string.
        capability: String,
        /// The adapter's full capability list, as wire strings.
        adapter_capabilities: Vec<String>,
    },
}

impl From<RegistryError> for RouterError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::DuplicateAdapter { adapter_id } => Self::bug_with_details(
                "ADAPTER_LOAD_FAILED",
                format!("adapter already registered: {adapter_id}"),
                json!({ "adapter_id": adapter_id }),
            ),
            RegistryError::UnknownAdapter { adapter_id, available_adapters } => {
                Self::operational_with_details(
                    "UNKNOWN_ADAPTER",
                    format!("unknown adapter: {adapter_id}"),
                    json!({ "adapter_id": adapter_id, "available_adapters": available_adapters }),
                )
            }
            RegistryError::NoDefaultAdapter { available_adapters } => {
                Self::operational_with_details(
                    "UNKNOWN_ADAPTER",
                    "no default adapter is configured",
                    json!({ "available_adapters": available_adapters }),
                )
            }
            RegistryError::CapabilityMissing {
                adapter_id,
                capability,
                adapter_capabilities,
            } => Self::operational_with_details(
                "CAPABILITY_MISSING",
                format!("adapter {adapter_id} missing capability {capability}"),
                json!({
                    "adapter_id": adapter_id,
                    "capability": capability,
                    "adapter_capabilities": adapter_capabilities,
                }),
            ),
        }
    }
}

// ============================================================================
// SECTION: Store errors
// ============================================================================

/// Errors raised by an [`crate::store::EventStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure opening or writing the backing store.
    #[error("event store io error: {0}")]
    Io(String),
    /// The backing database engine reported an error.
    #[error("event store db error: {0}")]
    Db(String),
    /// A `(run_id, seq)` duplicate was detected on append.
    #[error("duplicate sequence {seq} for run {run_id}")]
    SeqDuplicate {
        /// The run the duplicate was detected on.
        run_id: String,
        /// The colliding sequence number.
        seq: u64,
    },
    /// The referenced run does not exist.
    #[error("run not found: {run_id}")]
    RunNotFound {
        /// The missing run identifier.
        run_id: String,
    },
    /// Canonical-JSON serialization of a payload failed.
    #[error("event payload serialization error: {0}")]
    Serialization(String),
    /// A stored payload failed its integrity hash check on read-back.
    #[error("event store corruption: {0}")]
    Corrupt(String),
    /// Configuration or input to the store was invalid.
    #[error("invalid event store input: {0}")]
    Invalid(String),
}

impl From<StoreError> for RouterError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SeqDuplicate { run_id, seq } => Self::bug_with_details(
                "SEQ_DUPLICATE",
                format!("duplicate sequence {seq} for run {run_id}"),
                json!({ "run_id": run_id, "seq": seq }),
            ),
            StoreError::RunNotFound { run_id } => Self::operational_with_details(
                "RUN_NOT_FOUND",
                format!("run not found: {run_id}"),
                json!({ "run_id": run_id }),
            ),
            other => Self::bug("UNKNOWN_ERROR", other.to_string()),
        }
    }
}
