// crates/nexus-router-adapters/src/null_adapter.rs
// ============================================================================
// Module: Null Adapter
// Description: A dry_run-only adapter that can never be dispatched for real.
// Purpose: Give hosts a safe default adapter before any real transport is
//          registered, and give tests a minimal `Adapter` to register.
// Dependencies: nexus-router-core
// ============================================================================

//! ## Overview
//! [`NullAdapter`] declares the [`Capability::DryRun`] capability only. A
//! call against it in `apply` mode is rejected by dispatch's capability
//! check before `call` ever runs. If `call` is reached anyway, for
//! example a registry misconfiguration bypassing dispatch, it returns a
//! `bug`, since that should be unreachable.

use nexus_router_core::adapter::Adapter;
use nexus_router_core::error::AdapterError;
use nexus_router_core::model::Capability;
use nexus_router_core::model::CapabilitySet;
use serde_json::Value;
use serde_json::json;

/// An adapter that declares no real capability beyond `dry_run`.
pub struct NullAdapter {
    /// Stable identifier for this adapter instance.
    adapter_id: String,
    /// Capability set, always `{dry_run}`.
    capabilities: CapabilitySet,
}

impl NullAdapter {
    /// Builds a null adapter with the given `adapter_id`.
    #[must_use]
    pub fn new(adapter_id: impl Into<String>) -> Self {
        Self { adapter_id: adapter_id.into(), capabilities: [Capability::DryRun].into_iter().collect() }
    }
}

impl Default for NullAdapter {
    fn default() -> Self {
        Self::new("null")
    }
}

impl Adapter for NullAdapter {
    fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    fn adapter_kind(&self) -> &str {
        "null"
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn call(&self, tool: &str, method: &str, _args: &Value) -> Result<Value, AdapterError> {
        Err(AdapterError::Bug {
            code: "NULL_ADAPTER_CALLED".to_string(),
            message: "the null adapter declares no apply capability and must never be called".to_string(),
            details: json!({ "tool": tool, "method": method }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_dry_run_only() {
        let adapter = NullAdapter::default();
        assert!(adapter.capabilities().contains(&Capability::DryRun));
        assert!(!adapter.capabilities().contains(&Capability::Apply));
    }

    #[test]
    fn call_is_a_bug() {
        let adapter = NullAdapter::default();
        let err = adapter.call("t", "m", &json!({})).expect_err("unreachable call");
        assert!(matches!(err, AdapterError::Bug { .. }));
    }
}
