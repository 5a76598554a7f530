// crates/nexus-router-core/src/request.rs
// ============================================================================
// Module: Run Request / Response
// Description: The external request/response contract.
// Purpose: Wire-stable types for submitting a run and reading back its result.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These types mirror the external run request and response contract
//! exactly. The JSON-schema validator for these shapes is an external
//! collaborator out of scope here; this module only carries the Rust-side
//! contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::model::RunMode;

/// Protocol version carried by requests and responses.
pub const PROTOCOL_VERSION: &str = "v0.7";

// ============================================================================
// SECTION: Request
// ============================================================================

/// An artifact digest, `{alg, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    /// Digest algorithm, e.g. `"sha256"`.
    pub alg: String,
    /// Lowercase hex digest value.
    pub value: String,
}

/// A context artifact referenced by the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextArtifact {
    /// Stable artifact identifier.
    pub artifact_id: String,
    /// Media type (MIME) of the artifact.
    pub media_type: String,
    /// Opaque locator (path, URL, etc.).
    pub locator: String,
    /// Content digest.
    pub digest: ArtifactDigest,
}

/// Caller-supplied context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Artifacts referenced by the run.
    #[serde(default)]
    pub artifacts: Vec<ContextArtifact>,
}

/// Run policy gates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Whether `apply`-mode dispatch is permitted at all.
    #[serde(default)]
    pub allow_apply: Option<bool>,
    /// Maximum number of plan steps permitted.
    #[serde(default)]
    pub max_steps: Option<u64>,
}

/// Declarative adapter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Explicit adapter id to select, if any.
    #[serde(default)]
    pub adapter_id: Option<String>,
    /// Capabilities the selected adapter must declare.
    #[serde(default)]
    pub require_capabilities: Vec<String>,
}

/// A single tool invocation within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCall {
    /// Tool name.
    pub tool: String,
    /// Method name within the tool.
    pub method: String,
    /// Call arguments.
    #[serde(default)]
    pub args: Value,
}

/// A single step of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Stable step identifier, unique within the plan.
    pub step_id: String,
    /// Free-text description of intent.
    #[serde(default)]
    pub intent: String,
    /// The tool call to dispatch.
    pub call: StepCall,
    /// Optional JSON pointer into the eventual output, reserved for callers
    /// that want to validate expected shape; the router does not interpret
    /// it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_pointer: Option<String>,
}

/// A run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Free-text goal.
    pub goal: String,
    /// Execution mode; defaults to `dry_run`.
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    /// Caller-supplied context.
    #[serde(default)]
    pub context: Option<RequestContext>,
    /// Policy gates.
    #[serde(default)]
    pub policy: Option<Policy>,
    /// Declarative adapter selection.
    #[serde(default)]
    pub dispatch: Option<DispatchRequest>,
    /// The plan to execute. Planning is a pass-through fixture; this is
    /// the plan the default planner returns verbatim.
    #[serde(default)]
    pub plan_override: Option<Vec<PlanStep>>,
}

const fn default_mode() -> RunMode {
    RunMode::DryRun
}

impl RunRequest {
    /// Returns the effective policy, defaulting every field when absent.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy.clone().unwrap_or_default()
    }

    /// Returns the effective dispatch request, defaulting when absent.
    #[must_use]
    pub fn dispatch(&self) -> DispatchRequest {
        self.dispatch.clone().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Where the dispatched adapter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Taken from `request.dispatch.adapter_id`.
    Request,
    /// Taken from the registry's configured default.
    Default,
    /// Selection failed; no adapter was chosen.
    Failed,
}

/// Run-level summary statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Execution mode.
    pub mode: RunMode,
    /// Number of steps in the (possibly truncated) plan.
    pub steps: usize,
    /// Distinct method names invoked, in first-seen order.
    pub tools_used: Vec<String>,
    /// Total number of step outputs produced.
    pub outputs_total: usize,
    /// Number of steps that actually invoked an adapter (`apply`, non-simulated).
    pub outputs_applied: usize,
    /// Number of steps skipped due to failure.
    pub outputs_skipped: usize,
    /// The selected adapter's id, if selection succeeded.
    pub adapter_id: Option<String>,
}

/// Dispatch metadata echoed in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchInfo {
    /// The selected adapter's id, if any.
    pub adapter_id: Option<String>,
    /// The selected adapter's transport family, if any.
    pub adapter_kind: Option<String>,
    /// Where the selection came from.
    pub selection_source: SelectionSource,
}

/// Run identity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    /// The run identifier.
    pub run_id: String,
    /// Number of events committed for this run.
    pub events_committed: u64,
}

/// The outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step's tool call succeeded.
    Ok,
    /// The step's tool call failed.
    Error,
}

/// A single step's recorded result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// The step identifier.
    pub step_id: String,
    /// The step's terminal status.
    pub status: StepStatus,
    /// Whether the step was simulated (`dry_run`) rather than applied.
    pub simulated: bool,
    /// The tool call's output, or `null` on failure.
    pub output: Value,
    /// Evidence references, reserved for provenance builders; always empty
    /// here, since provenance is a pure function supplied by the caller.
    #[serde(default)]
    pub evidence: Vec<Value>,
}

/// The provenance section of the response. Building the bundle's contents is
/// a pure function of `{request, results}` and is an external collaborator;
/// this crate only carries the shape and the default identity builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceBundle {
    /// Artifact references produced by the run.
    #[serde(default)]
    pub artifacts: Vec<Value>,
    /// Structured provenance records.
    #[serde(default)]
    pub records: Vec<Value>,
}

/// A top-level error, present iff adapter selection failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// The always-returned run response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    /// Run-level summary.
    pub summary: RunSummary,
    /// Dispatch metadata.
    pub dispatch: DispatchInfo,
    /// Run identity metadata.
    pub run: RunInfo,
    /// The plan actually executed (after any `max_steps` truncation).
    pub plan: Vec<PlanStep>,
    /// Per-step results.
    pub results: Vec<StepResult>,
    /// Provenance section.
    pub provenance: ProvenanceBundle,
    /// Present iff adapter selection failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}
