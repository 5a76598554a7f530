// crates/nexus-router-core/src/planner.rs
// ============================================================================
// Module: Planner
// Description: Pluggable planning step; default is a fixture pass-through.
// Purpose: Let the router call a single `plan()` seam without caring how the
//          plan was produced. Planning itself is a trivial fixture
//          pass-through and not a design surface of this crate.
// Dependencies: crate::request
// ============================================================================

use crate::request::PlanStep;
use crate::request::RunRequest;

/// Produces the plan for a run. The router calls this once, after adapter
/// selection, and records the result verbatim as `PLAN_CREATED`.
pub trait Planner: Send + Sync {
    /// Returns the plan for `request`.
    fn plan(&self, request: &RunRequest) -> Vec<PlanStep>;
}

/// The default planner: returns `request.plan_override` verbatim, or an
/// empty plan when none was supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughPlanner;

impl Planner for PassthroughPlanner {
    fn plan(&self, request: &RunRequest) -> Vec<PlanStep> {
        request.plan_override.clone().unwrap_or_default()
    }
}
