// crates/nexus-router-core/src/adapter.rs
// ============================================================================
// Module: Adapter Contract
// Description: The capability-carrying interface every transport honors.
// Purpose: Define the single virtual call site the router dispatches through.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! An adapter turns a `(tool, method, args)` triple into a real-world side
//! effect and returns a JSON value. The trait is object-safe
//! so the registry can hold `Box<dyn Adapter>`.
//!
//! Platform rules implementers must uphold: no mutation of process-wide
//! state, no swallowing of bugs, no partial work on operational failure, and
//! tolerance of never being called in `dry_run`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::error::AdapterError;
use crate::model::CapabilitySet;

// ============================================================================
// SECTION: Adapter Trait
// ============================================================================

/// The transport contract every adapter implements.
///
/// `call` takes `&self`: adapters must not require interior run-scoped
/// mutation. Implementations that need interior state (e.g. a call counter
/// for tests) use `Mutex`/atomics internally.
pub trait Adapter: Send + Sync {
    /// Stable, unique identifier within a registry.
    fn adapter_id(&self) -> &str;

    /// Short string identifying the transport family (`"null"`, `"fake"`,
    /// `"subprocess"`, ...). Emitted into events for observability.
    fn adapter_kind(&self) -> &str;

    /// The immutable capability set this adapter declares.
    fn capabilities(&self) -> &CapabilitySet;

    /// Invokes `tool.method(args)` and returns a serializable result.
    ///
    /// Deterministic given `args`. May fail only as [`AdapterError::Operational`]
    /// or [`AdapterError::Bug`]; any other failure the implementation lets
    /// escape (a panic caught at the call site, for instance) is classified
    /// `Unknown` by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the call cannot be completed.
    fn call(&self, tool: &str, method: &str, args: &Value) -> Result<Value, AdapterError>;

    /// Scrubs `args` before they are written into the event stream (e.g. a
    /// `TOOL_CALL_REQUESTED` payload). The default is a no-op passthrough;
    /// adapters that handle sensitive data (credentials, tokens) override
    /// this to redact it. Never applied to the payload actually sent to the
    /// transport — only to what the router persists.
    fn redact_args_for_event(&self, args: &Value) -> Value {
        args.clone()
    }
}

/// A read-only snapshot of an adapter's identity, used by registry listings
/// and the `DISPATCH_SELECTED` / `TOOL_CALL_REQUESTED` event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// The adapter's stable identifier.
    pub adapter_id: String,
    /// The adapter's transport family.
    pub adapter_kind: String,
    /// The adapter's declared capabilities.
    pub capabilities: CapabilitySet,
}

impl AdapterInfo {
    /// Builds an info snapshot from a live adapter reference.
    #[must_use]
    pub fn from_adapter(adapter: &dyn Adapter) -> Self {
        Self {
            adapter_id: adapter.adapter_id().to_string(),
            adapter_kind: adapter.adapter_kind().to_string(),
            capabilities: adapter.capabilities().clone(),
        }
    }
}
