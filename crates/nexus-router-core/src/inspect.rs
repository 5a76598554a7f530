// crates/nexus-router-core/src/inspect.rs
// ============================================================================
// Module: Inspect
// Description: Read-only projections over the Event Store for listing runs
//              by status, creation-time window, or id.
// Purpose: The companion read path alongside Export/Import/Replay; never
//          mutates the store.
// Dependencies: crate::{model, replay, store}
// ============================================================================

//! ## Overview
//! Inspect never writes. [`list_runs`] filters the store's run listing by
//! status and/or a creation-time [`RunWindow`]; [`run_view`] reads one run's
//! events back and folds them through [`crate::replay::replay`] to produce
//! its [`crate::replay::RunView`] plus any invariant violations, the same
//! derived view `import`'s `replay_after_import` surfaces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::StoreError;
use crate::model::Run;
use crate::model::RunStatus;
use crate::model::Timestamp;
use crate::replay::RunView;
use crate::replay::replay;
use crate::store::EventStore;

// ============================================================================
// SECTION: Run window
// ============================================================================

/// A creation-time window to filter runs by. Either bound may be omitted for
/// an open-ended range; `since` is inclusive, `until` is exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunWindow {
    /// Inclusive lower bound on `Run.created_at`.
    pub since: Option<Timestamp>,
    /// Exclusive upper bound on `Run.created_at`.
    pub until: Option<Timestamp>,
}

impl RunWindow {
    /// `true` when `run`'s `created_at` falls inside this window.
    #[must_use]
    pub fn contains(&self, run: &Run) -> bool {
        self.since.is_none_or(|since| run.created_at >= since)
            && self.until.is_none_or(|until| run.created_at < until)
    }
}

// ============================================================================
// SECTION: Listing
// ============================================================================

/// Lists runs matching `status` (when given) and `window` (when given),
/// most recently created first, truncated to `limit`.
///
/// The store's own `list_runs` already filters by status and orders by
/// creation time; the window filter is applied afterward over an
/// unbounded read, since no backend here indexes on `created_at` directly.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying read fails.
pub fn list_runs(
    store: &dyn EventStore,
    status: Option<RunStatus>,
    window: Option<RunWindow>,
    limit: usize,
) -> Result<Vec<Run>, StoreError> {
    let runs = store.list_runs(status, usize::MAX)?;
    let mut filtered: Vec<Run> = match window {
        Some(window) => runs.into_iter().filter(|run| window.contains(run)).collect(),
        None => runs,
    };
    filtered.truncate(limit);
    Ok(filtered)
}

// ============================================================================
// SECTION: By id
// ============================================================================

/// Reads one run's events back and replays them into a [`RunView`].
/// Returns `None` when `run_id` does not exist.
///
/// # Errors
///
/// Returns [`StoreError`] when the underlying read fails.
pub fn run_view(store: &dyn EventStore, run_id: &str) -> Result<Option<RunView>, StoreError> {
    if store.get_run(run_id)?.is_none() {
        return Ok(None);
    }
    let events = store.read_events(run_id)?;
    Ok(Some(replay(&events)))
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

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::Value;
    use serde_json::json;

    use super::*;
    use crate::model::Event;
    use crate::model::EventType;
    use crate::model::RunMode;

    #[derive(Default)]
    struct MemoryStore {
        runs: Mutex<BTreeMap<String, Run>>,
        events: Mutex<BTreeMap<String, Vec<Event>>>,
    }

    impl EventStore for MemoryStore {
        fn create_run_with_id(
            &self,
            run_id: Option<String>,
            mode: RunMode,
            goal: &str,
        ) -> Result<String, StoreError> {
            let run_id = run_id.unwrap_or_else(|| "generated".to_string());
            self.runs.lock().expect("lock").insert(
                run_id.clone(),
                Run {
                    run_id: run_id.clone(),
                    mode,
                    goal: goal.to_string(),
                    status: RunStatus::Running,
                    created_at: Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"),
                },
            );
            self.events.lock().expect("lock").insert(run_id.clone(), Vec::new());
            Ok(run_id)
        }

        fn append(&self, run_id: &str, event_type: EventType, payload: Value) -> Result<Event, StoreError> {
            let mut events = self.events.lock().expect("lock");
            let bucket = events
                .get_mut(run_id)
                .ok_or_else(|| StoreError::RunNotFound { run_id: run_id.to_string() })?;
            let seq = bucket.len() as u64 + 1;
            let event = Event {
                event_id: format!("evt-{seq}"),
                run_id: run_id.to_string(),
                seq,
                event_type,
                payload,
                ts: Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"),
            };
            bucket.push(event.clone());
            Ok(event)
        }

        fn read_events(&self, run_id: &str) -> Result<Vec<Event>, StoreError> {
            Ok(self.events.lock().expect("lock").get(run_id).cloned().unwrap_or_default())
        }

        fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), StoreError> {
            let mut runs = self.runs.lock().expect("lock");
            let run =
                runs.get_mut(run_id).ok_or_else(|| StoreError::RunNotFound { run_id: run_id.to_string() })?;
            run.status = status;
            Ok(())
        }

        fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
            Ok(self.runs.lock().expect("lock").get(run_id).cloned())
        }

        fn list_runs(&self, status: Option<RunStatus>, limit: usize) -> Result<Vec<Run>, StoreError> {
            let mut runs: Vec<Run> = self
                .runs
                .lock()
                .expect("lock")
                .values()
                .filter(|run| status.is_none_or(|wanted| run.status == wanted))
                .cloned()
                .collect();
            runs.truncate(limit);
            Ok(runs)
        }

        fn delete_run(&self, run_id: &str) -> Result<(), StoreError> {
            if self.runs.lock().expect("lock").remove(run_id).is_none() {
                return Err(StoreError::RunNotFound { run_id: run_id.to_string() });
            }
            self.events.lock().expect("lock").remove(run_id);
            Ok(())
        }

        fn import_rows(&self, run: Run, events: Vec<Event>) -> Result<(), StoreError> {
            self.events.lock().expect("lock").insert(run.run_id.clone(), events);
            self.runs.lock().expect("lock").insert(run.run_id.clone(), run);
            Ok(())
        }
    }

    #[test]
    fn window_filters_by_created_at() {
        let store = MemoryStore::default();
        store.create_run_with_id(Some("early".to_string()), RunMode::DryRun, "g").expect("create");
        store.runs.lock().expect("lock").get_mut("early").expect("run").created_at =
            Timestamp::parse("2020-01-01T00:00:00Z").expect("ts");
        store.create_run_with_id(Some("late".to_string()), RunMode::DryRun, "g").expect("create");
        store.runs.lock().expect("lock").get_mut("late").expect("run").created_at =
            Timestamp::parse("2026-01-01T00:00:00Z").expect("ts");

        let window =
            RunWindow { since: Some(Timestamp::parse("2025-01-01T00:00:00Z").expect("ts")), until: None };
        let runs = list_runs(&store, None, Some(window), 10).expect("list runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "late");
    }

    #[test]
    fn run_view_reads_back_events() {
        let store = MemoryStore::default();
        let run_id = store.create_run_with_id(None, RunMode::DryRun, "g").expect("create");
        store.append(&run_id, EventType::RunStarted, json!({"mode": "dry_run", "goal": "g"})).expect("append");
        store.append(&run_id, EventType::RunCompleted, json!({"outcome": "ok"})).expect("append");
        let view = run_view(&store, &run_id).expect("run view").expect("run exists");
        assert_eq!(view.outcome.as_deref(), Some("ok"));
    }

    #[test]
    fn run_view_of_unknown_run_is_none() {
        let store = MemoryStore::default();
        assert!(run_view(&store, "nope").expect("run view").is_none());
    }
}
