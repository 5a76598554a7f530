// crates/nexus-router-adapters/src/fake_adapter.rs
// ============================================================================
// Module: Fake Adapter
// Description: A response-table test double satisfying the Adapter contract.
// Purpose: Let router and integration tests dispatch real `call`s without a
//          subprocess, following an in-process test-double style.
// Dependencies: nexus-router-core
// ============================================================================

//! ## Overview
//! [`FakeAdapter`] is keyed by `(tool, method)` to a [`FakeResponse`]. Each
//! response is one of: a fixed literal value, a value computed from `args`,
//! or a canned operational/bug failure, covering the shapes the router
//! needs to exercise the full `TOOL_CALL_{SUCCEEDED,FAILED}` branch without a
//! real external process. A call count is tracked behind a `Mutex` so
//! `call`'s `&self` receiver still allows interior bookkeeping without
//! mutating process-wide state.

use std::collections::BTreeMap;
use std::sync::Mutex;

use nexus_router_core::adapter::Adapter;
use nexus_router_core::error::AdapterError;
use nexus_router_core::model::CapabilitySet;
use serde_json::Value;
use serde_json::json;

/// A canned response for one `(tool, method)` pair.
pub enum FakeResponse {
    /// Always return this exact value.
    Literal(Value),
    /// Compute the return value from the call's `args`.
    Factory(Box<dyn Fn(&Value) -> Value + Send + Sync>),
    /// Always fail operational with this `(code, message)`.
    RaiseOperational(String, String),
    /// Always fail as a bug with this `(code, message)`.
    RaiseBug(String, String),
}

impl FakeResponse {
    /// Builds a literal response.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        Self::Literal(value)
    }

    /// Builds a factory response from a closure.
    #[must_use]
    pub fn factory(factory: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Factory(Box::new(factory))
    }

    /// Builds a canned operational failure.
    #[must_use]
    pub fn raise_operational(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RaiseOperational(code.into(), message.into())
    }

    /// Builds a canned bug failure.
    #[must_use]
    pub fn raise_bug(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RaiseBug(code.into(), message.into())
    }
}

/// A test-double adapter driven by a registered response table.
pub struct FakeAdapter {
    adapter_id: String,
    adapter_kind: String,
    capabilities: CapabilitySet,
    responses: BTreeMap<(String, String), FakeResponse>,
    call_count: Mutex<u64>,
}

impl FakeAdapter {
    /// Builds an empty fake adapter; register responses with
    /// [`FakeAdapter::with_response`] before use.
    #[must_use]
    pub fn new(adapter_id: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            adapter_kind: "fake".to_string(),
            capabilities,
            responses: BTreeMap::new(),
            call_count: Mutex::new(0),
        }
    }

    /// Registers a canned response for `(tool, method)`, builder-style.
    #[must_use]
    pub fn with_response(mut self, tool: impl Into<String>, method: impl Into<String>, response: FakeResponse) -> Self {
        self.responses.insert((tool.into(), method.into()), response);
        self
    }

    /// Returns how many times `call` has been invoked so far.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.call_count.lock().map(|guard| *guard).unwrap_or(0)
    }
}

impl Adapter for FakeAdapter {
    fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    fn adapter_kind(&self) -> &str {
        &self.adapter_kind
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn call(&self, tool: &str, method: &str, args: &Value) -> Result<Value, AdapterError> {
        if let Ok(mut count) = self.call_count.lock() {
            *count += 1;
        }
        let key = (tool.to_string(), method.to_string());
        match self.responses.get(&key) {
            Some(FakeResponse::Literal(value)) => Ok(value.clone()),
            Some(FakeResponse::Factory(factory)) => Ok(factory(args)),
            Some(FakeResponse::RaiseOperational(code, message)) => Err(AdapterError::Operational {
                code: code.clone(),
                message: message.clone(),
                details: json!({ "tool": tool, "method": method }),
            }),
            Some(FakeResponse::RaiseBug(code, message)) => Err(AdapterError::Bug {
                code: code.clone(),
                message: message.clone(),
                details: json!({ "tool": tool, "method": method }),
            }),
            None => Err(AdapterError::Operational {
                code: "NO_FAKE_RESPONSE_REGISTERED".to_string(),
                message: format!("no fake response registered for {tool}.{method}"),
                details: json!({ "tool": tool, "method": method }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use nexus_router_core::model::Capability;

    use super::*;

    fn caps() -> CapabilitySet {
        [Capability::DryRun, Capability::Apply].into_iter().collect()
    }

    #[test]
    fn literal_response_returns_fixed_value() {
        let adapter = FakeAdapter::new("fake", caps())
            .with_response("fs", "read", FakeResponse::literal(json!({"content": "hi"})));
        let out = adapter.call("fs", "read", &json!({})).expect("call succeeds");
        assert_eq!(out, json!({"content": "hi"}));
    }

    #[test]
    fn factory_response_sees_args() {
        let adapter = FakeAdapter::new("fake", caps())
            .with_response("math", "double", FakeResponse::factory(|args| json!({"out": args["n"].as_i64().unwrap_or(0) * 2})));
        let out = adapter.call("math", "double", &json!({"n": 21})).expect("call succeeds");
        assert_eq!(out, json!({"out": 42}));
    }

    #[test]
    fn unregistered_pair_is_operational() {
        let adapter = FakeAdapter::new("fake", caps());
        let err = adapter.call("x", "y", &json!({})).expect_err("no response registered");
        assert!(matches!(err, AdapterError::Operational { .. }));
    }

    #[test]
    fn raise_operational_and_bug_responses() {
        let adapter = FakeAdapter::new("fake", caps())
            .with_response("t", "op", FakeResponse::raise_operational("BOOM", "boom"))
            .with_response("t", "bug", FakeResponse::raise_bug("OOPS", "oops"));
        assert!(matches!(adapter.call("t", "op", &json!({})), Err(AdapterError::Operational { .. })));
        assert!(matches!(adapter.call("t", "bug", &json!({})), Err(AdapterError::Bug { .. })));
    }

    #[test]
    fn call_count_tracks_invocations() {
        let adapter = FakeAdapter::new("fake", caps()).with_response("t", "m", FakeResponse::literal(json!(1)));
        adapter.call("t", "m", &json!({})).expect("call");
        adapter.call("t", "m", &json!({})).expect("call");
        assert_eq!(adapter.call_count(), 2);
    }
}
