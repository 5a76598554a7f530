// crates/nexus-router-core/src/replay.rs
// ============================================================================
// Module: Replay / Inspect
// Description: Rebuild a derived run view from events and check invariants.
// Purpose: Offline integrity verification, used after import and by tests
//          that assert a run's event stream is well-formed.
// Dependencies: crate::model, serde
// ============================================================================

//! ## Overview
//! Replay is a pure fold over an ordered event slice; it never touches the
//! store itself. It is intentionally permissive about a second terminal
//! `RUN_FAILED` event: the `max_steps_exceeded` path writes one mid-stream and
//! finalize writes another, and only the last event is checked for
//! terminality.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::model::Event;
use crate::model::EventType;

// ============================================================================
// SECTION: Violations
// ============================================================================

/// A single invariant violation found while replaying a run's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Violation {
    /// The first event was not `RUN_STARTED`.
    MissingRunStarted,
    /// A `STEP_STARTED` for `step_id` had no matching `STEP_COMPLETED`.
    StepNeverCompleted {
        /// The step identifier left open.
        step_id: String,
    },
    /// A `TOOL_CALL_REQUESTED` for `step_id` had no matching success or
    /// failure event.
    ToolCallNeverResolved {
        /// The step identifier left unresolved.
        step_id: String,
    },
    /// The event stream had no terminal `RUN_COMPLETED` or `RUN_FAILED` as
    /// its last event.
    NoTerminalEvent,
    /// `seq` values had a gap.
    SeqGap {
        /// The sequence number expected next.
        expected: u64,
        /// The sequence number actually found.
        found: u64,
    },
}

// ============================================================================
// SECTION: Run view
// ============================================================================

/// A single step's outcome as seen from the replayed event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStep {
    /// The step identifier.
    pub step_id: String,
    /// `"ok"` or `"error"`, taken from `STEP_COMPLETED.status`.
    pub status: String,
}

/// The derived, read-only view of a run produced by replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunView {
    /// Execution mode, read from `RUN_STARTED`.
    pub mode: Option<String>,
    /// Free-text goal, read from `RUN_STARTED`.
    pub goal: Option<String>,
    /// `"ok"` or `"error"`, read from the terminal event. `None` if the
    /// stream never reached a terminal event.
    pub outcome: Option<String>,
    /// Steps observed, in `seq` order.
    pub steps: Vec<ReplayStep>,
    /// Distinct method names invoked, in first-seen order.
    pub tools_used: Vec<String>,
    /// Invariant violations found, if any.
    pub violations: Vec<Violation>,
}

impl RunView {
    /// `true` when replay found no violations.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Replays `events` (already ordered by `seq`) into a [`RunView`].
///
/// This never returns `Err`: every failure mode is recorded as a
/// [`Violation`] rather than aborting the fold, so the caller always gets a
/// best-effort view alongside the complete violation list.
#[must_use]
pub fn replay(events: &[Event]) -> RunView {
    let mut violations = Vec::new();

    if let Some(first) = events.first() {
        if first.event_type != EventType::RunStarted {
            violations.push(Violation::MissingRunStarted);
        }
    } else {
        violations.push(Violation::MissingRunStarted);
        violations.push(Violation::NoTerminalEvent);
        return RunView {
            mode: None,
            goal: None,
            outcome: None,
            steps: Vec::new(),
            tools_used: Vec::new(),
            violations,
        };
    }

    check_seq_gaps(events, &mut violations);

    let mode = events
        .iter()
        .find(|event| event.event_type == EventType::RunStarted)
        .and_then(|event| event.payload.get("mode"))
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    let goal = events
        .iter()
        .find(|event| event.event_type == EventType::RunStarted)
        .and_then(|event| event.payload.get("goal"))
        .and_then(|value| value.as_str())
        .map(ToString::to_string);

    let mut started_steps: BTreeSet<String> = BTreeSet::new();
    let mut completed_steps: BTreeMap<String, String> = BTreeMap::new();
    let mut requested_calls: BTreeSet<String> = BTreeSet::new();
    let mut resolved_calls: BTreeSet<String> = BTreeSet::new();
    let mut tools_used = Vec::new();

    for event in events {
        match event.event_type {
            EventType::StepStarted => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    started_steps.insert(step_id.to_string());
                }
            }
            EventType::StepCompleted => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    let status = event
                        .payload
                        .get("status")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_string();
                    completed_steps.insert(step_id.to_string(), status);
                }
            }
            EventType::ToolCallRequested => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    requested_calls.insert(step_id.to_string());
                }
                if let Some(method) = event
                    .payload
                    .get("call")
                    .and_then(|call| call.get("method"))
                    .and_then(|v| v.as_str())
                {
                    if !tools_used.contains(&method.to_string()) {
                        tools_used.push(method.to_string());
                    }
                }
            }
            EventType::ToolCallSucceeded | EventType::ToolCallFailed => {
                if let Some(step_id) = event.payload.get("step_id").and_then(|v| v.as_str()) {
                    resolved_calls.insert(step_id.to_string());
                }
            }
            _ => {}
        }
    }

    for step_id in &started_steps {
        if !completed_steps.contains_key(step_id) {
            violations.push(Violation::StepNeverCompleted { step_id: step_id.clone() });
        }
    }
    for step_id in &requested_calls {
        if !resolved_calls.contains(step_id) {
            violations.push(Violation::ToolCallNeverResolved { step_id: step_id.clone() });
        }
    }

    let outcome = match events.last().map(|event| event.event_type) {
        Some(EventType::RunCompleted) => Some("ok".to_string()),
        Some(EventType::RunFailed) => Some("error".to_string()),
        _ => {
            violations.push(Violation::NoTerminalEvent);
            None
        }
    };

    let steps = started_steps
        .into_iter()
        .map(|step_id| {
            let status = completed_steps.get(&step_id).cloned().unwrap_or_else(|| "open".to_string());
            ReplayStep { step_id, status }
        })
        .collect();

    RunView { mode, goal, outcome, steps, tools_used, violations }
}

fn check_seq_gaps(events: &[Event], violations: &mut Vec<Violation>) {
    let mut expected = 1u64;
    for event in events {
        if event.seq != expected {
            violations.push(Violation::SeqGap { expected, found: event.seq });
            expected = event.seq;
        }
        expected += 1;
    }
}
