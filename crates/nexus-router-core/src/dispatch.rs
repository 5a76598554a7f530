// crates/nexus-router-core/src/dispatch.rs
// ============================================================================
// Module: Dispatch Per Step
// Description: The pure decision function for simulating or invoking a step.
// Purpose: Isolate the dry_run/apply branch from the router's event
//          bookkeeping, so it can be unit tested without a store.
// Dependencies: crate::adapter, crate::error, crate::model, crate::request
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use serde_json::Value;
use serde_json::json;

use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::model::Capability;
use crate::model::RunMode;
use crate::request::Policy;
use crate::request::StepCall;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// The result of dispatching one step, before the router folds it into
/// events.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The tool call's output.
    pub output: Value,
    /// Whether the call was simulated rather than actually invoked.
    pub simulated: bool,
    /// Wall-clock duration of the call, in milliseconds. Always `0` when
    /// simulated.
    pub duration_ms: u64,
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Dispatches a single step against `adapter` under `mode` and `policy`.
///
/// - In `dry_run`, the adapter is never touched; the output is the fixed
///   `{simulated: true, adapter_id, tool, method}` shape.
/// - In `apply`, the `apply` capability and the `allow_apply` policy gate are
///   checked before the adapter is invoked; wall time is measured around the
///   call, and `adapter_id` is injected into the result.
///
/// # Errors
///
/// Returns [`AdapterError::Operational`] for a missing capability, a policy
/// denial, or any operational failure the adapter itself raises; returns
/// [`AdapterError::Bug`] for a bug the adapter raises.
pub fn dispatch_step(
    mode: RunMode,
    policy: &Policy,
    adapter: &dyn Adapter,
    call: &StepCall,
) -> Result<DispatchOutcome, AdapterError> {
    match mode {
        RunMode::DryRun => Ok(DispatchOutcome {
            output: json!({
                "simulated": true,
                "adapter_id": adapter.adapter_id(),
                "tool": call.tool,
                "method": call.method,
            }),
            simulated: true,
            duration_ms: 0,
        }),
        RunMode::Apply => dispatch_apply(policy, adapter, call),
    }
}

fn dispatch_apply(
    policy: &Policy,
    adapter: &dyn Adapter,
    call: &StepCall,
) -> Result<DispatchOutcome, AdapterError> {
    if !adapter.capabilities().contains(&Capability::Apply) {
        let adapter_capabilities: Vec<&'static str> =
            adapter.capabilities().iter().map(|cap| cap.as_str()).collect();
        return Err(AdapterError::operational_with_details(
            "CAPABILITY_MISSING",
            format!("adapter {} missing capability apply", adapter.adapter_id()),
            json!({
                "adapter_id": adapter.adapter_id(),
                "capability": "apply",
                "adapter_capabilities": adapter_capabilities,
            }),
        ));
    }
    if policy.allow_apply == Some(false) {
        return Err(AdapterError::operational(
            "POLICY_DENIED",
            "policy denies apply-mode dispatch",
        ));
    }
    let started = Instant::now();
    let mut output = adapter.call(&call.tool, &call.method, &call.args)?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if let Value::Object(map) = &mut output {
        map.insert("adapter_id".to_string(), Value::String(adapter.adapter_id().to_string()));
    }
    Ok(DispatchOutcome { output, simulated: false, duration_ms })
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

    use std::collections::BTreeSet;

    use super::*;
    use crate::model::CapabilitySet;

    struct StubAdapter {
        caps: CapabilitySet,
    }

    impl Adapter for StubAdapter {
        fn adapter_id(&self) -> &str {
            "stub"
        }
        fn adapter_kind(&self) -> &str {
            "stub"
        }
        fn capabilities(&self) -> &CapabilitySet {
            &self.caps
        }
        fn call(&self, _tool: &str, _method: &str, _args: &Value) -> Result<Value, AdapterError> {
            Ok(json!({"ok": true}))
        }
    }

    fn call_fixture() -> StepCall {
        StepCall { tool: "t".to_string(), method: "m".to_string(), args: json!({}) }
    }

    #[test]
    fn dry_run_never_touches_adapter() {
        let adapter = StubAdapter { caps: BTreeSet::new() };
        let outcome =
            dispatch_step(RunMode::DryRun, &Policy::default(), &adapter, &call_fixture())
                .expect("dry run never fails");
        assert!(outcome.simulated);
        assert_eq!(outcome.duration_ms, 0);
        assert_eq!(outcome.output["adapter_id"], "stub");
    }

    #[test]
    fn apply_without_capability_is_operational() {
        let adapter = StubAdapter { caps: BTreeSet::new() };
        let err = dispatch_step(RunMode::Apply, &Policy::default(), &adapter, &call_fixture())
            .expect_err("missing apply capability");
        assert_eq!(err.code(), "CAPABILITY_MISSING");
    }

    #[test]
    fn apply_denied_by_policy_is_operational() {
        let adapter = StubAdapter { caps: BTreeSet::from([Capability::Apply]) };
        let policy = Policy { allow_apply: Some(false), max_steps: None };
        let err = dispatch_step(RunMode::Apply, &policy, &adapter, &call_fixture())
            .expect_err("policy denies apply");
        assert_eq!(err.code(), "POLICY_DENIED");
    }

    #[test]
    fn apply_injects_adapter_id() {
        let adapter = StubAdapter { caps: BTreeSet::from([Capability::Apply]) };
        let policy = Policy { allow_apply: Some(true), max_steps: None };
        let outcome = dispatch_step(RunMode::Apply, &policy, &adapter, &call_fixture())
            .expect("apply succeeds");
        assert!(!outcome.simulated);
        assert_eq!(outcome.output["adapter_id"], "stub");
        assert_eq!(outcome.output["ok"], true);
    }
}
