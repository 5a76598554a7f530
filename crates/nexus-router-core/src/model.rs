// crates/nexus-router-core/src/model.rs
// ============================================================================
// Module: Router Data Model
// Description: Runs, events, capabilities, and canonical timestamps.
// Purpose: Provide the wire- and storage-stable types every other module builds on.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! This module defines the data model shared by the event store, the router,
//! and the export/import round-trip: [`Run`], [`Event`], [`EventType`], and
//! the [`Capability`] set used for adapter selection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical RFC 3339 timestamp used for `Run.created_at` and `Event.ts`.
///
/// # Invariants
/// - Always serializes/deserializes as an RFC 3339 string in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Wraps an explicit `OffsetDateTime`. Callers supply the clock; this type
    /// never reads wall-clock time itself, keeping the router deterministic
    /// given its inputs.
    #[must_use]
    pub const fn new(value: OffsetDateTime) -> Self {
        Self(value)
    }

    /// Returns the wrapped `OffsetDateTime`.
    #[must_use]
    pub const fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Parses an RFC 3339 string into a timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is not a valid RFC 3339 timestamp.
    pub fn parse(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Capability
// ============================================================================

/// A declarative tag on an adapter used for pre-flight selection and enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The adapter may be selected for `dry_run` mode.
    DryRun,
    /// The adapter may be selected for `apply` mode.
    Apply,
    /// The adapter enforces a wall-clock timeout on its own calls.
    Timeout,
    /// The adapter reaches outside the host process.
    External,
}

impl Capability {
    /// Returns the stable wire string for this capability.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Apply => "apply",
            Self::Timeout => "timeout",
            Self::External => "external",
        }
    }

    /// Parses a capability from its stable wire string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dry_run" => Some(Self::DryRun),
            "apply" => Some(Self::Apply),
            "timeout" => Some(Self::Timeout),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, deduplicated set of capabilities. `BTreeSet` gives us the
/// sorted-listing invariant for free.
pub type CapabilitySet = BTreeSet<Capability>;

/// Renders a capability set as its sorted list of wire strings, the shape the
/// event payloads and registry listings carry.
#[must_use]
pub fn capabilities_sorted(capabilities: &CapabilitySet) -> Vec<&'static str> {
    capabilities.iter().map(|cap| cap.as_str()).collect()
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Execution mode requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Simulate every step; adapters are never invoked.
    DryRun,
    /// Invoke adapters for real, subject to capability and policy checks.
    Apply,
}

impl RunMode {
    /// Returns the stable wire string for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Apply => "apply",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal or in-flight status of a run, persisted on the `runs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The run has started and has not yet reached a terminal state.
    Running,
    /// The run finished with `outcome == "ok"`.
    Completed,
    /// The run finished with `outcome == "error"`, or failed before steps ran.
    Failed,
}

impl RunStatus {
    /// Returns the stable wire string for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run row as persisted by the event store.
///
/// # Invariants
/// - Created by the store before any event is appended.
/// - Mutated only via `set_run_status`, never deleted except by an explicit
///   overwrite-import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Stable run identifier.
    pub run_id: String,
    /// Execution mode requested for this run.
    pub mode: RunMode,
    /// Free-text goal supplied by the caller.
    pub goal: String,
    /// Current status.
    pub status: RunStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// The closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// The run has been opened.
    RunStarted,
    /// A plan (possibly truncated) has been recorded.
    PlanCreated,
    /// An adapter has been selected for dispatch.
    DispatchSelected,
    /// A step has begun execution.
    StepStarted,
    /// A tool call has been requested from the selected adapter.
    ToolCallRequested,
    /// A tool call completed successfully.
    ToolCallSucceeded,
    /// A tool call failed (operational, bug, or unknown).
    ToolCallFailed,
    /// A step has reached a terminal per-step state.
    StepCompleted,
    /// The provenance bundle has been recorded.
    ProvenanceEmitted,
    /// The run completed with `outcome == "ok"`.
    RunCompleted,
    /// The run failed, at selection time, mid-plan, or at finalize.
    RunFailed,
}

impl EventType {
    /// Returns the stable wire string for this event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::PlanCreated => "PLAN_CREATED",
            Self::DispatchSelected => "DISPATCH_SELECTED",
            Self::StepStarted => "STEP_STARTED",
            Self::ToolCallRequested => "TOOL_CALL_REQUESTED",
            Self::ToolCallSucceeded => "TOOL_CALL_SUCCEEDED",
            Self::ToolCallFailed => "TOOL_CALL_FAILED",
            Self::StepCompleted => "STEP_COMPLETED",
            Self::ProvenanceEmitted => "PROVENANCE_EMITTED",
            Self::RunCompleted => "RUN_COMPLETED",
            Self::RunFailed => "RUN_FAILED",
        }
    }

    /// Parses an event type from its stable wire string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RUN_STARTED" => Some(Self::RunStarted),
            "PLAN_CREATED" => Some(Self::PlanCreated),
            "DISPATCH_SELECTED" => Some(Self::DispatchSelected),
            "STEP_STARTED" => Some(Self::StepStarted),
            "TOOL_CALL_REQUESTED" => Some(Self::ToolCallRequested),
            "TOOL_CALL_SUCCEEDED" => Some(Self::ToolCallSucceeded),
            "TOOL_CALL_FAILED" => Some(Self::ToolCallFailed),
            "STEP_COMPLETED" => Some(Self::StepCompleted),
            "PROVENANCE_EMITTED" => Some(Self::ProvenanceEmitted),
            "RUN_COMPLETED" => Some(Self::RunCompleted),
            "RUN_FAILED" => Some(Self::RunFailed),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, appended-once event row.
///
/// # Invariants
/// - `(run_id, seq)` is unique across the store.
/// - `seq` starts at 1 and has no gaps within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable event identifier.
    pub event_id: String,
    /// Owning run identifier.
    pub run_id: String,
    /// 1-based, gapless sequence number within the run.
    pub seq: u64,
    /// Event type, drawn from the closed set.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Canonical JSON payload. Shape depends on `event_type`.
    pub payload: serde_json::Value,
    /// Recording timestamp.
    pub ts: Timestamp,
}
