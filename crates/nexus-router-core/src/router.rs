// crates/nexus-router-core/src/router.rs
// ============================================================================
// Module: Router
// Description: The event-sourced state machine binding store, registry, and
//              planner: validate, select, plan, dispatch, finalize.
// Purpose: The orchestrator's core decision loop.
// Dependencies: crate::{adapter,canonical,dispatch,error,model,planner,
//               registry,request,store}, tracing
// ============================================================================

//! ## Overview
//! `Router::run` is the single entry point: it opens a run, selects an
//! adapter, plans, dispatches each step in strict sequence, and finalizes the
//! run. Operational failures are always recorded and folded into a
//! well-formed [`RunResponse`]; bug and unknown failures are recorded and
//! then returned as `Err`. The router never initializes a tracing
//! subscriber itself; that is left to the host binary or test harness,
//! matching library-crate convention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use serde_json::Value;
use serde_json::json;

use crate::adapter::Adapter;
use crate::dispatch::DispatchOutcome;
use crate::dispatch::dispatch_step;
use crate::error::AdapterError;
use crate::error::ErrorKind;
use crate::error::RegistryError;
use crate::error::RouterError;
use crate::model::Capability;
use crate::model::EventType;
use crate::model::RunMode;
use crate::model::RunStatus;
use crate::model::capabilities_sorted;
use crate::planner::PassthroughPlanner;
use crate::planner::Planner;
use crate::registry::AdapterRegistry;
use crate::request::DispatchInfo;
use crate::request::ProvenanceBundle;
use crate::request::ResponseError;
use crate::request::RunInfo;
use crate::request::RunRequest;
use crate::request::RunResponse;
use crate::request::RunSummary;
use crate::request::SelectionSource;
use crate::request::StepResult;
use crate::request::StepStatus;
use crate::store::EventStore;

// ============================================================================
// SECTION: Router
// ============================================================================

/// The state machine for one run. Borrows its store, registry, and planner;
/// it holds no state of its own between `run` calls.
pub struct Router<'a> {
    store: &'a dyn EventStore,
    registry: &'a AdapterRegistry,
    planner: &'a dyn Planner,
}

impl<'a> Router<'a> {
    /// Builds a router using the default pass-through planner.
    #[must_use]
    pub fn new(store: &'a dyn EventStore, registry: &'a AdapterRegistry) -> Self {
        Self { store, registry, planner: &PASSTHROUGH }
    }

    /// Builds a router with a custom planner.
    #[must_use]
    pub fn with_planner(
        store: &'a dyn EventStore,
        registry: &'a AdapterRegistry,
        planner: &'a dyn Planner,
    ) -> Self {
        Self { store, registry, planner }
    }

    /// Executes one run end to end.
    ///
    /// # Errors
    ///
    /// Returns `Err(RouterError::Bug | RouterError::Unknown)` when the
    /// adapter or the router itself raises a bug-class failure. Operational
    /// failures, including selection failures, are always folded into
    /// `Ok(RunResponse)`.
    ///
    /// # Panics
    ///
    /// Does not panic: adapter panics are caught and reclassified as
    /// `RouterError::Unknown`.
    pub fn run(&self, request: RunRequest) -> Result<RunResponse, RouterError> {
        let run_id = self.store.create_run(request.mode, &request.goal)?;
        self.store.append(
            &run_id,
            EventType::RunStarted,
            json!({ "mode": request.mode, "goal": request.goal }),
        )?;
        tracing::debug!(run_id = %run_id, mode = %request.mode, "run opened");

        match self.select_adapter(&run_id, &request)? {
            Selection::Failed { error } => {
                self.store.set_run_status(&run_id, RunStatus::Failed)?;
                let committed = self.committed_events(&run_id)?;
                return Ok(failed_selection_response(&request, run_id, committed, &error));
            }
            Selection::Selected { adapter, selection_source } => {
                self.run_with_adapter(run_id, request, adapter, selection_source)
            }
        }
    }

    fn run_with_adapter(
        &self,
        run_id: String,
        request: RunRequest,
        adapter: &dyn Adapter,
        selection_source: SelectionSource,
    ) -> Result<RunResponse, RouterError> {
        let policy = request.policy();
        let plan = self.planner.plan(&request);
        self.store.append(
            &run_id,
            EventType::PlanCreated,
            json!({ "plan": plan }),
        )?;

        let mut outcome_ok = true;
        let mut executed_plan = plan;
        if let Some(max_steps) = policy.max_steps {
            let max_steps = usize::try_from(max_steps).unwrap_or(usize::MAX);
            if executed_plan.len() > max_steps {
                self.store.append(
                    &run_id,
                    EventType::RunFailed,
                    json!({
                        "reason": "max_steps_exceeded",
                        "max_steps": max_steps,
                        "plan_steps": executed_plan.len(),
                    }),
                )?;
                self.store.set_run_status(&run_id, RunStatus::Failed)?;
                outcome_ok = false;
                executed_plan.truncate(max_steps);
            }
        }

        let mut results = Vec::with_capacity(executed_plan.len());
        let mut tools_used: Vec<String> = Vec::new();
        let mut outputs_applied = 0usize;
        let mut outputs_skipped = 0usize;

        for step in &executed_plan {
            if !tools_used.contains(&step.call.method) {
                tools_used.push(step.call.method.clone());
            }
            self.store.append(
                &run_id,
                EventType::StepStarted,
                json!({ "step_id": step.step_id }),
            )?;
            let logged_call = crate::request::StepCall {
                tool: step.call.tool.clone(),
                method: step.call.method.clone(),
                args: adapter.redact_args_for_event(&step.call.args),
            };
            self.store.append(
                &run_id,
                EventType::ToolCallRequested,
                json!({
                    "step_id": step.step_id,
                    "call": logged_call,
                    "adapter_id": adapter.adapter_id(),
                    "adapter_capabilities": capabilities_sorted(adapter.capabilities()),
                }),
            )?;

            match self.dispatch_guarded(request.mode, &policy, adapter, step) {
                Ok(dispatch) => {
                    self.store.append(
                        &run_id,
                        EventType::ToolCallSucceeded,
                        json!({
                            "step_id": step.step_id,
                            "simulated": dispatch.simulated,
                            "output": dispatch.output,
                            "adapter_id": adapter.adapter_id(),
                            "duration_ms": dispatch.duration_ms,
                        }),
                    )?;
                    self.store.append(
                        &run_id,
                        EventType::StepCompleted,
                        json!({ "step_id": step.step_id, "status": "ok" }),
                    )?;
                    if !dispatch.simulated {
                        outputs_applied += 1;
                    }
                    results.push(StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Ok,
                        simulated: dispatch.simulated,
                        output: dispatch.output,
                        evidence: Vec::new(),
                    });
                }
                Err(StepFailure::Operational { code, message }) => {
                    tracing::warn!(
                        run_id = %run_id, step_id = %step.step_id, code = %code,
                        "step failed operationally"
                    );
                    self.store.append(
                        &run_id,
                        EventType::ToolCallFailed,
                        json!({
                            "step_id": step.step_id,
                            "error_kind": "operational",
                            "error_code": code,
                            "message": message,
                            "adapter_id": adapter.adapter_id(),
                        }),
                    )?;
                    self.store.append(
                        &run_id,
                        EventType::StepCompleted,
                        json!({ "step_id": step.step_id, "status": "error" }),
                    )?;
                    outcome_ok = false;
                    outputs_skipped += 1;
                    results.push(StepResult {
                        step_id: step.step_id.clone(),
                        status: StepStatus::Error,
                        simulated: request.mode == RunMode::DryRun,
                        output: Value::Null,
                        evidence: Vec::new(),
                    });
                }
                Err(StepFailure::Fatal { error_kind, code, message }) => {
                    tracing::error!(
                        run_id = %run_id, step_id = %step.step_id, code = %code,
                        "step failed as {}", error_kind.as_str()
                    );
                    self.store.append(
                        &run_id,
                        EventType::ToolCallFailed,
                        json!({
                            "step_id": step.step_id,
                            "error_kind": error_kind.as_str(),
                            "error_code": code,
                            "message": message,
                            "adapter_id": adapter.adapter_id(),
                        }),
                    )?;
                    let reason = if matches!(error_kind, ErrorKind::Bug) {
                        "bug_error"
                    } else {
                        "unexpected_exception"
                    };
                    self.store.append(
                        &run_id,
                        EventType::RunFailed,
                        json!({ "reason": reason, "step_id": step.step_id }),
                    )?;
                    self.store.set_run_status(&run_id, RunStatus::Failed)?;
                    return Err(if matches!(error_kind, ErrorKind::Bug) {
                        RouterError::Bug {
                            code,
                            message,
                            details: json!({ "step_id": step.step_id }),
                        }
                    } else {
                        RouterError::Unknown {
                            message,
                            details: json!({ "step_id": step.step_id }),
                        }
                    });
                }
            }
        }

        let provenance = build_provenance(&request, &results);
        self.store.append(
            &run_id,
            EventType::ProvenanceEmitted,
            json!({ "bundle": provenance }),
        )?;
        if outcome_ok {
            self.store.append(
                &run_id,
                EventType::RunCompleted,
                json!({ "outcome": "ok" }),
            )?;
            self.store.set_run_status(&run_id, RunStatus::Completed)?;
        } else {
            self.store.append(
                &run_id,
                EventType::RunFailed,
                json!({ "outcome": "error" }),
            )?;
            self.store.set_run_status(&run_id, RunStatus::Failed)?;
        }

        let committed = self.committed_events(&run_id)?;
        Ok(RunResponse {
            summary: RunSummary {
                mode: request.mode,
                steps: executed_plan.len(),
                tools_used,
                outputs_total: results.len(),
                outputs_applied,
                outputs_skipped,
                adapter_id: Some(adapter.adapter_id().to_string()),
            },
            dispatch: DispatchInfo {
                adapter_id: Some(adapter.adapter_id().to_string()),
                adapter_kind: Some(adapter.adapter_kind().to_string()),
                selection_source,
            },
            run: RunInfo { run_id, events_committed: committed },
            plan: executed_plan,
            results,
            provenance,
            error: None,
        })
    }

    /// Dispatches a step, catching any adapter panic and reclassifying it as
    /// `ErrorKind::Unknown`.
    fn dispatch_guarded(
        &self,
        mode: RunMode,
        policy: &crate::request::Policy,
        adapter: &dyn Adapter,
        step: &crate::request::PlanStep,
    ) -> Result<DispatchOutcome, StepFailure> {
        let result =
            catch_unwind(AssertUnwindSafe(|| dispatch_step(mode, policy, adapter, &step.call)));
        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(AdapterError::Operational { code, message, .. })) => {
                Err(StepFailure::Operational { code, message })
            }
            Ok(Err(AdapterError::Bug { code, message, .. })) => {
                Err(StepFailure::Fatal { error_kind: ErrorKind::Bug, code, message })
            }
            Err(panic) => Err(StepFailure::Fatal {
                error_kind: ErrorKind::Unknown,
                code: "UNKNOWN_ERROR".to_string(),
                message: panic_message(&panic),
            }),
        }
    }

    fn select_adapter(
        &self,
        run_id: &str,
        request: &RunRequest,
    ) -> Result<Selection<'_>, RouterError> {
        let dispatch_request = request.dispatch();
        let selection = match &dispatch_request.adapter_id {
            Some(adapter_id) => {
                self.registry.get(adapter_id).map(|adapter| (adapter, SelectionSource::Request))
            }
            None => self.registry.get_default().map(|adapter| (adapter, SelectionSource::Default)),
        };
        let (adapter, selection_source) = match selection {
            Ok(pair) => pair,
            Err(err) => return Ok(self.record_selection_failure(run_id, err)?),
        };
        for raw_capability in &dispatch_request.require_capabilities {
            let present = Capability::parse(raw_capability)
                .is_some_and(|cap| adapter.capabilities().contains(&cap));
            if !present {
                let err = RegistryError::CapabilityMissing {
                    adapter_id: adapter.adapter_id().to_string(),
                    capability: raw_capability.clone(),
                    adapter_capabilities: adapter
                        .capabilities()
                        .iter()
                        .map(|cap| cap.as_str().to_string())
                        .collect(),
                };
                return Ok(self.record_selection_failure(run_id, err)?);
            }
        }
        self.store.append(
            run_id,
            EventType::DispatchSelected,
            json!({
                "adapter_id": adapter.adapter_id(),
                "adapter_kind": adapter.adapter_kind(),
                "capabilities": capabilities_sorted(adapter.capabilities()),
                "selection_source": selection_source,
            }),
        )?;
        Ok(Selection::Selected { adapter, selection_source })
    }

    fn record_selection_failure(
        &self,
        run_id: &str,
        err: RegistryError,
    ) -> Result<Selection<'_>, RouterError> {
        let router_error = RouterError::from(err);
        let code = router_error.code().to_string();
        let message = router_error.message().to_string();
        let details = router_error.details().clone();
        self.store.append(
            run_id,
            EventType::RunFailed,
            json!({
                "reason": "dispatch_selection_failed",
                "error_code": code,
                "message": message,
                "details": details,
            }),
        )?;
        Ok(Selection::Failed { error: router_error })
    }

    fn committed_events(&self, run_id: &str) -> Result<u64, RouterError> {
        Ok(self.store.read_events(run_id)?.len() as u64)
    }
}

static PASSTHROUGH: PassthroughPlanner = PassthroughPlanner;

enum Selection<'a> {
    Selected { adapter: &'a dyn Adapter, selection_source: SelectionSource },
    Failed { error: RouterError },
}

enum StepFailure {
    Operational { code: String, message: String },
    Fatal { error_kind: ErrorKind, code: String, message: String },
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "adapter panicked with a non-string payload".to_string()
    }
}

fn failed_selection_response(
    request: &RunRequest,
    run_id: String,
    events_committed: u64,
    error: &RouterError,
) -> RunResponse {
    RunResponse {
        summary: RunSummary {
            mode: request.mode,
            steps: 0,
            tools_used: Vec::new(),
            outputs_total: 0,
            outputs_applied: 0,
            outputs_skipped: 0,
            adapter_id: None,
        },
        dispatch: DispatchInfo {
            adapter_id: None,
            adapter_kind: None,
            selection_source: SelectionSource::Failed,
        },
        run: RunInfo { run_id, events_committed },
        plan: Vec::new(),
        results: Vec::new(),
        provenance: ProvenanceBundle::default(),
        error: Some(ResponseError {
            code: error.code().to_string(),
            message: error.message().to_string(),
        }),
    }
}

/// Builds the provenance bundle as a pure function of `{request, results}`.
/// The real artifact builder is an external collaborator; this default
/// echoes each step's output as a record so the response shape is always
/// populated.
fn build_provenance(request: &RunRequest, results: &[StepResult]) -> ProvenanceBundle {
    let artifacts = request
        .context
        .as_ref()
        .map(|ctx| ctx.artifacts.iter().map(|artifact| json!(artifact)).collect())
        .unwrap_or_default();
    let records = results
        .iter()
        .map(|result| {
            json!({
                "step_id": result.step_id,
                "status": result.status,
                "simulated": result.simulated,
            })
        })
        .collect();
    ProvenanceBundle { artifacts, records }
}
