// crates/nexus-router-core/src/store.rs
// ============================================================================
// Module: Event Store Interface
// Description: Backend-agnostic contract for the append-only event log.
// Purpose: Let the router, replay, and bundle code depend on an interface
//          instead of a concrete database.
// Dependencies: crate::model, crate::error
// ============================================================================

//! ## Overview
//! `EventStore` is the durable log on which determinism and replay depend.
//! `nexus-router-store` provides the `SQLite`-backed implementation; this
//! crate only specifies the contract so the router stays backend-agnostic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::error::StoreError;
use crate::model::Event;
use crate::model::EventType;
use crate::model::Run;
use crate::model::RunMode;
use crate::model::RunStatus;

// ============================================================================
// SECTION: EventStore
// ============================================================================

/// The append-only log that is the sole durable record of a run.
///
/// # Invariants
/// - `(run_id, seq)` is unique; `append` allocates the next `seq` atomically.
/// - Events, once appended, are immutable.
pub trait EventStore: Send + Sync {
    /// Inserts a `RUNNING` row and allocates a fresh `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be inserted.
    fn create_run(&self, mode: RunMode, goal: &str) -> Result<String, StoreError> {
        self.create_run_with_id(None, mode, goal)
    }

    /// Inserts a `RUNNING` row using a caller-supplied `run_id` when given,
    /// or an allocated one otherwise. Used by import's `new_run_id` mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be inserted, including when
    /// a caller-supplied `run_id` already exists.
    fn create_run_with_id(
        &self,
        run_id: Option<String>,
        mode: RunMode,
        goal: &str,
    ) -> Result<String, StoreError>;

    /// Atomically allocates the next `seq` for `run_id`, canonically
    /// serializes `payload`, and inserts the event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SeqDuplicate`] on a `(run_id, seq)` collision, or
    /// another [`StoreError`] variant for I/O or serialization failures.
    fn append(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: Value,
    ) -> Result<Event, StoreError>;

    /// Reads all events for `run_id`, ordered by `seq`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn read_events(&self, run_id: &str) -> Result<Vec<Event>, StoreError>;

    /// Updates a run's status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RunNotFound`] when `run_id` does not exist.
    fn set_run_status(&self, run_id: &str, status: RunStatus) -> Result<(), StoreError>;

    /// Reads a run row by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError>;

    /// Lists runs, most recently created first, optionally filtered by
    /// status. Used by the read-only Inspect projection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_runs(
        &self,
        status: Option<RunStatus>,
        limit: usize,
    ) -> Result<Vec<Run>, StoreError>;

    /// Deletes a run and all of its events. Used by import's `overwrite`
    /// conflict mode to clear the existing row before re-inserting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RunNotFound`] when `run_id` does not exist.
    fn delete_run(&self, run_id: &str) -> Result<(), StoreError>;

    /// Atomically inserts a run row and its event rows exactly as given, with
    /// no `seq` allocation or run-id generation. Used by import, which has
    /// already resolved ids and ordering via [`crate::bundle::build_import_plan`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `run.run_id` already exists, or
    /// [`StoreError::SeqDuplicate`] if two events share a `(run_id, seq)`
    /// pair; either failure rolls back the whole call, inserting nothing.
    fn import_rows(&self, run: Run, events: Vec<Event>) -> Result<(), StoreError>;
}
