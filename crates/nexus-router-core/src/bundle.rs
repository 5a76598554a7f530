// crates/nexus-router-core/src/bundle.rs
// ============================================================================
// Module: Bundle (Export / Import)
// Description: Canonical bundle serialization, content digest, conflict-mode
//              row transformation, recursive run_id remapping, and the
//              store-driving export/import operations built on top.
// Purpose: The Export/Import round-trip, backend-agnostic over any
//          `EventStore`. The atomic insert itself is the one part that must
//          live behind the trait (`EventStore::import_rows`); everything
//          else — digesting, validating, conflict-mode row transformation,
//          post-import replay — lives here as ordinary calls against that
//          trait.
// Dependencies: crate::{canonical, error, model, replay, store}, serde,
//               serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`Bundle`] is the exported snapshot of one run: `{bundle_version,
//! exported_at, run, events, digests, provenance?}`. Its digest is computed
//! over the canonical JSON of `{run, events}` only, deliberately excluding
//! `exported_at` and `provenance` so re-exporting an unchanged run is
//! bit-equal in digest.
//!
//! [`export`] reads a run and its events back from an [`EventStore`] and
//! builds its bundle. [`import`] validates a bundle, optionally verifies its
//! digest, resolves the decided [`ConflictMode`] into a row transformation
//! via [`build_import_plan`] (a pure function: given the mode and, for
//! `new_run_id`, a target id, it produces the final `{run, events}` to
//! insert), and hands the result to `EventStore::import_rows` for one atomic
//! insert. Conflict *detection* (does `run_id` already exist) is a plain
//! `get_run` call in `import` itself; only the insert needs the store's
//! transactional guarantee.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::canonical::canonical_json_bytes;
use crate::canonical::sha256_hex;
use crate::error::RouterError;
use crate::error::StoreError;
use crate::model::Event;
use crate::model::EventType;
use crate::model::Run;
use crate::model::Timestamp;
use crate::replay::Violation;
use crate::replay::replay;
use crate::store::EventStore;

/// The bundle format version this crate reads and writes.
pub const BUNDLE_VERSION: &str = "0.3";

// ============================================================================
// SECTION: Bundle
// ============================================================================

/// The digest block of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digests {
    /// Lowercase hex SHA-256 over the canonical JSON of `{run, events}`.
    pub sha256: String,
}

/// An exported run snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle format version, currently always [`BUNDLE_VERSION`].
    pub bundle_version: String,
    /// When this bundle was produced. Excluded from the digest.
    pub exported_at: Timestamp,
    /// The exported run row.
    pub run: Run,
    /// The exported events, in `seq` order.
    pub events: Vec<Event>,
    /// Content digests.
    pub digests: Digests,
    /// Optional provenance bundle, included only when requested. Excluded
    /// from the digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Value>,
}

/// The `{run, events}` projection the digest is computed over.
#[derive(Serialize)]
struct DigestSubject<'a> {
    run: &'a Run,
    events: &'a [Event],
}

/// Computes the content digest for `{run, events}` only, deliberately
/// excluding `exported_at` and `provenance` so repeat exports are bit-equal.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when the subject cannot be
/// serialized to canonical JSON.
pub fn compute_digest(run: &Run, events: &[Event]) -> Result<String, StoreError> {
    let subject = DigestSubject { run, events };
    let bytes = canonical_json_bytes(&subject)?;
    Ok(sha256_hex(&bytes))
}

/// Builds a bundle from a run and its events.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when the digest cannot be computed.
pub fn build_bundle(
    run: Run,
    events: Vec<Event>,
    exported_at: Timestamp,
    provenance: Option<Value>,
) -> Result<Bundle, StoreError> {
    let sha256 = compute_digest(&run, &events)?;
    Ok(Bundle {
        bundle_version: BUNDLE_VERSION.to_string(),
        exported_at,
        run,
        events,
        digests: Digests { sha256 },
        provenance,
    })
}

/// Recomputes `bundle`'s digest and compares it against the recorded one.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] when the digest cannot be
/// recomputed.
pub fn verify_bundle_digest(bundle: &Bundle) -> Result<bool, StoreError> {
    let recomputed = compute_digest(&bundle.run, &bundle.events)?;
    Ok(recomputed == bundle.digests.sha256)
}

// ============================================================================
// SECTION: Import conflict modes
// ============================================================================

/// How import handles an existing row with the same `run_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Default: skip the import, reporting the conflict.
    RejectOnConflict,
    /// Delete the existing run and its events, then proceed.
    Overwrite,
    /// Import under a different `run_id`, provided or freshly allocated.
    NewRunId,
}

/// The rows ready for the store to insert inside one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPlan {
    /// The run row to insert, with `run_id` already resolved.
    pub run: Run,
    /// The event rows to insert, with `run_id` and any nested `run_id`
    /// payload fields already rewritten, in their original `seq` order.
    pub events: Vec<Event>,
}

/// Transforms a bundle's `{run, events}` into the final rows to insert,
/// given a decided [`ConflictMode`]. For [`ConflictMode::NewRunId`],
/// `target_run_id` is the id to remap onto (caller-provided or freshly
/// allocated) and `fresh_event_id` is consulted once per event to avoid a
/// primary-key collision with the original bundle. For the other two
/// modes, rows pass through with only their shape validated.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when `mode` is [`ConflictMode::NewRunId`]
/// but `target_run_id` is empty.
pub fn build_import_plan(
    bundle: &Bundle,
    mode: ConflictMode,
    target_run_id: Option<&str>,
    mut fresh_event_id: impl FnMut(usize) -> String,
) -> Result<ImportPlan, StoreError> {
    match mode {
        ConflictMode::RejectOnConflict | ConflictMode::Overwrite => {
            Ok(ImportPlan { run: bundle.run.clone(), events: bundle.events.clone() })
        }
        ConflictMode::NewRunId => {
            let new_run_id = target_run_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| StoreError::Invalid("new_run_id mode requires a target run_id".to_string()))?;
            let mut run = bundle.run.clone();
            run.run_id = new_run_id.to_string();
            let events = bundle
                .events
                .iter()
                .enumerate()
                .map(|(index, event)| {
                    let mut remapped = event.clone();
                    remapped.run_id = new_run_id.to_string();
                    remapped.event_id = fresh_event_id(index);
                    remapped.payload = remap_run_id(&remapped.payload, new_run_id);
                    remapped
                })
                .collect();
            Ok(ImportPlan { run, events })
        }
    }
}

// ============================================================================
// SECTION: Recursive run_id remap
// ============================================================================

/// Recursively rewrites every object key literally named `run_id`, anywhere
/// in `value`'s object/array tree, to `new_run_id`. A strict superset of a
/// top-level-only rewrite, since a JSON-tree walk finds nested occurrences
/// for free.
#[must_use]
pub fn remap_run_id(value: &Value, new_run_id: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| {
                    let rewritten = if key == "run_id" {
                        Value::String(new_run_id.to_string())
                    } else {
                        remap_run_id(nested, new_run_id)
                    };
                    (key.clone(), rewritten)
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| remap_run_id(item, new_run_id)).collect())
        }
        scalar => scalar.clone(),
    }
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Reads `run_id` and its events back from `store` and builds its [`Bundle`],
/// optionally carrying the run's last `PROVENANCE_EMITTED` bundle along.
///
/// `exported_at` is supplied by the caller rather than read here: this crate
/// has no I/O of its own, and wall-clock time is the host-owned store's
/// responsibility, not the core's.
///
/// # Errors
///
/// Returns [`StoreError::RunNotFound`] when `run_id` does not exist, or
/// another [`StoreError`] variant when the read or digest computation fails.
pub fn export(
    store: &dyn EventStore,
    run_id: &str,
    include_provenance: bool,
    exported_at: Timestamp,
) -> Result<Bundle, StoreError> {
    let Some(run) = store.get_run(run_id)? else {
        return Err(StoreError::RunNotFound { run_id: run_id.to_string() });
    };
    let events = store.read_events(run_id)?;
    let provenance = include_provenance
        .then(|| {
            events
                .iter()
                .rev()
                .find(|event| event.event_type == EventType::ProvenanceEmitted)
                .and_then(|event| event.payload.get("bundle").cloned())
        })
        .flatten();
    build_bundle(run, events, exported_at, provenance)
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Input options for [`import`], mirroring the operation's external
/// parameters: `(db_path, bundle, mode, new_run_id?, verify_digest,
/// replay_after_import)`. `db_path` is implicit in which `store` the caller
/// passes.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// How to handle an existing row with the bundle's `run_id`.
    pub mode: ConflictMode,
    /// Target id for [`ConflictMode::NewRunId`]. `None` asks the caller's
    /// `allocate_run_id` closure to mint a fresh one.
    pub new_run_id: Option<String>,
    /// Recompute and compare the bundle's digest before importing.
    pub verify_digest: bool,
    /// Run strict replay over the imported events once they land.
    pub replay_after_import: bool,
}

/// The outcome of one [`import`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// The bundle was inserted (possibly under a remapped `run_id`).
    Ok {
        /// The `run_id` the bundle now lives under.
        imported_run_id: String,
        /// Set when `replay_after_import` was requested.
        #[serde(skip_serializing_if = "Option::is_none")]
        replay_ok: Option<bool>,
        /// Violations found by the post-import replay, if it ran.
        #[serde(default)]
        violations: Vec<Violation>,
    },
    /// The import was skipped because `run_id` already exists under
    /// [`ConflictMode::RejectOnConflict`].
    Skipped {
        /// Always `"run_id_exists"`.
        reason: String,
        /// The `run_id` already present in the target store.
        existing_run_id: String,
    },
}

/// Failures [`import`] can raise. Unlike [`ImportOutcome::Skipped`], which is
/// the expected idempotent no-op under `reject_on_conflict`, these are
/// genuine operational failures: a malformed bundle, a digest that does not
/// match its contents, or a `(run_id, seq)` collision the store detected
/// mid-transaction.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The bundle failed required-field validation.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
    /// `verify_digest` was set and the recomputed digest did not match.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// The digest recorded in the bundle.
        expected: String,
        /// The digest recomputed from `{run, events}`.
        computed: String,
    },
    /// The underlying store rejected the insert.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ImportError> for RouterError {
    fn from(error: ImportError) -> Self {
        match error {
            ImportError::InvalidBundle(message) => {
                Self::operational_with_details("BUNDLE_INVALID", message, json!({}))
            }
            ImportError::DigestMismatch { expected, computed } => Self::operational_with_details(
                "DIGEST_MISMATCH",
                "bundle digest does not match its recorded contents",
                json!({ "expected": expected, "computed": computed }),
            ),
            // `SEQ_DUPLICATE` is a bug when `append` allocates a colliding
            // seq itself; during import it reflects a collision in caller-
            // supplied data, which is operational instead.
            ImportError::Store(StoreError::SeqDuplicate { run_id, seq }) => {
                Self::operational_with_details(
                    "SEQ_DUPLICATE",
                    format!("duplicate sequence {seq} for run {run_id}"),
                    json!({ "run_id": run_id, "seq": seq }),
                )
            }
            ImportError::Store(other) => other.into(),
        }
    }
}

/// Validates required fields on `bundle` and every event it carries. Most of
/// this is already enforced by [`Bundle`]'s and [`Event`]'s non-optional
/// fields at deserialization time; this re-checks the fields whose *values*
/// (not just presence) must be non-empty.
///
/// # Errors
///
/// Returns [`ImportError::InvalidBundle`] on the first violation found.
fn validate_bundle(bundle: &Bundle) -> Result<(), ImportError> {
    if bundle.bundle_version != BUNDLE_VERSION {
        return Err(ImportError::InvalidBundle(format!(
            "unsupported bundle_version: {}",
            bundle.bundle_version
        )));
    }
    if bundle.run.run_id.is_empty() {
        return Err(ImportError::InvalidBundle("run.run_id must not be empty".to_string()));
    }
    for event in &bundle.events {
        if event.event_id.is_empty() || event.run_id.is_empty() {
            return Err(ImportError::InvalidBundle(
                "every event requires a non-empty event_id and run_id".to_string(),
            ));
        }
        if event.run_id != bundle.run.run_id {
            return Err(ImportError::InvalidBundle(format!(
                "event {} belongs to run {} but bundle.run is {}",
                event.event_id, event.run_id, bundle.run.run_id
            )));
        }
    }
    Ok(())
}

/// Imports `bundle` into `store` per `options`.
///
/// `fresh_event_id` mints a fresh event id for the `index`-th event under
/// [`ConflictMode::NewRunId`] (avoiding a primary-key collision with the
/// source bundle); `allocate_run_id` mints a fresh `run_id` when
/// `options.new_run_id` is `None` under that same mode. Both are left to the
/// caller because id generation is host-owned (see
/// `nexus-router-store`'s `rand`-backed allocator), not something this
/// backend-agnostic crate does itself.
///
/// # Errors
///
/// Returns [`ImportError::InvalidBundle`] when the bundle fails validation,
/// [`ImportError::DigestMismatch`] when `verify_digest` is set and the
/// recomputed digest disagrees, or [`ImportError::Store`] when the
/// underlying store rejects the write (including a `(run_id, seq)`
/// collision, which rolls back the whole import).
pub fn import(
    store: &dyn EventStore,
    bundle: &Bundle,
    options: &ImportOptions,
    fresh_event_id: impl FnMut(usize) -> String,
    allocate_run_id: impl FnOnce() -> String,
) -> Result<ImportOutcome, ImportError> {
    validate_bundle(bundle)?;

    if options.verify_digest {
        let computed = compute_digest(&bundle.run, &bundle.events)?;
        if computed != bundle.digests.sha256 {
            return Err(ImportError::DigestMismatch { expected: bundle.digests.sha256.clone(), computed });
        }
    }

    let existing = store.get_run(&bundle.run.run_id)?;
    match options.mode {
        ConflictMode::RejectOnConflict => {
            if existing.is_some() {
                return Ok(ImportOutcome::Skipped {
                    reason: "run_id_exists".to_string(),
                    existing_run_id: bundle.run.run_id.clone(),
                });
            }
        }
        ConflictMode::Overwrite => {
            if existing.is_some() {
                store.delete_run(&bundle.run.run_id)?;
            }
        }
        ConflictMode::NewRunId => {}
    }

    let target_run_id = match options.mode {
        ConflictMode::NewRunId => {
            Some(options.new_run_id.clone().unwrap_or_else(allocate_run_id))
        }
        ConflictMode::RejectOnConflict | ConflictMode::Overwrite => None,
    };
    let plan = build_import_plan(bundle, options.mode, target_run_id.as_deref(), fresh_event_id)?;
    let imported_run_id = plan.run.run_id.clone();
    store.import_rows(plan.run, plan.events)?;

    let (replay_ok, violations) = if options.replay_after_import {
        let events = store.read_events(&imported_run_id)?;
        let view = replay(&events);
        (Some(view.is_ok()), view.violations)
    } else {
        (None, Vec::new())
    };

    Ok(ImportOutcome::Ok { imported_run_id, replay_ok, violations })
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

    use serde_json::json;

    use super::*;
    use crate::model::EventType;
    use crate::model::RunMode;
    use crate::model::RunStatus;

    fn fixture_run(run_id: &str) -> Run {
        Run {
            run_id: run_id.to_string(),
            mode: RunMode::DryRun,
            goal: "demo".to_string(),
            status: RunStatus::Completed,
            created_at: Timestamp::parse("2026-01-01T00:00:00Z").expect("valid timestamp"),
        }
    }

    fn fixture_event(run_id: &str, seq: u64) -> Event {
        Event {
            event_id: format!("evt-{seq}"),
            run_id: run_id.to_string(),
            seq,
            event_type: EventType::RunStarted,
            payload: json!({ "run_id": run_id, "nested": { "run_id": run_id } }),
            ts: Timestamp::parse("2026-01-01T00:00:00Z").expect("valid timestamp"),
        }
    }

    #[test]
    fn digest_is_stable_across_reexport() {
        let run = fixture_run("r1");
        let events = vec![fixture_event("r1", 1)];
        let first = build_bundle(run.clone(), events.clone(), Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle");
        let second = build_bundle(run, events, Timestamp::parse("2026-06-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle again, later");
        assert_eq!(first.digests.sha256, second.digests.sha256);
    }

    #[test]
    fn verify_digest_detects_tampering() {
        let run = fixture_run("r1");
        let events = vec![fixture_event("r1", 1)];
        let mut bundle = build_bundle(run, events, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle");
        assert!(verify_bundle_digest(&bundle).expect("verify"));
        bundle.run.goal = "tampered".to_string();
        assert!(!verify_bundle_digest(&bundle).expect("verify"));
    }

    #[test]
    fn new_run_id_remaps_run_id_recursively() {
        let run = fixture_run("r1");
        let events = vec![fixture_event("r1", 1)];
        let bundle = build_bundle(run, events, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle");
        let plan = build_import_plan(&bundle, ConflictMode::NewRunId, Some("r2"), |index| format!("evt-new-{index}"))
            .expect("build plan");
        assert_eq!(plan.run.run_id, "r2");
        assert_eq!(plan.events[0].run_id, "r2");
        assert_eq!(plan.events[0].payload["run_id"], "r2");
        assert_eq!(plan.events[0].payload["nested"]["run_id"], "r2");
        assert_eq!(plan.events[0].event_id, "evt-new-0");
    }

    #[test]
    fn new_run_id_without_target_is_invalid() {
        let run = fixture_run("r1");
        let events = vec![fixture_event("r1", 1)];
        let bundle = build_bundle(run, events, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle");
        let err = build_import_plan(&bundle, ConflictMode::NewRunId, None, |index| format!("evt-{index}"))
            .expect_err("missing target run_id");
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn reject_and_overwrite_modes_pass_rows_through_unchanged() {
        let run = fixture_run("r1");
        let events = vec![fixture_event("r1", 1)];
        let bundle = build_bundle(run, events, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"), None)
            .expect("build bundle");
        let plan = build_import_plan(&bundle, ConflictMode::Overwrite, None, |index| format!("evt-{index}"))
            .expect("build plan");
        assert_eq!(plan.run.run_id, "r1");
        assert_eq!(plan.events[0].event_id, "evt-1");
    }

    // ========================================================================
    // SECTION: export / import, against a minimal in-memory EventStore
    // ========================================================================

    #[derive(Default)]
    struct MemoryStore {
        runs: std::sync::Mutex<std::collections::BTreeMap<String, Run>>,
        events: std::sync::Mutex<std::collections::BTreeMap<String, Vec<Event>>>,
    }

    impl EventStore for MemoryStore {
        fn create_run_with_id(
            &self,
            run_id: Option<String>,
            mode: RunMode,
            goal: &str,
        ) -> Result<String, StoreError> {
            let run_id = run_id.unwrap_or_else(|| "generated".to_string());
            let mut runs = self.runs.lock().expect("lock");
            if runs.contains_key(&run_id) {
                return Err(StoreError::Invalid(format!("run already exists: {run_id}")));
            }
            runs.insert(
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
            let bucket = events.get_mut(run_id).ok_or_else(|| StoreError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
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
            let run = runs.get_mut(run_id).ok_or_else(|| StoreError::RunNotFound { run_id: run_id.to_string() })?;
            run.status = status;
            Ok(())
        }

        fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
            Ok(self.runs.lock().expect("lock").get(run_id).cloned())
        }

        fn list_runs(&self, _status: Option<RunStatus>, _limit: usize) -> Result<Vec<Run>, StoreError> {
            Ok(self.runs.lock().expect("lock").values().cloned().collect())
        }

        fn delete_run(&self, run_id: &str) -> Result<(), StoreError> {
            if self.runs.lock().expect("lock").remove(run_id).is_none() {
                return Err(StoreError::RunNotFound { run_id: run_id.to_string() });
            }
            self.events.lock().expect("lock").remove(run_id);
            Ok(())
        }

        fn import_rows(&self, run: Run, events: Vec<Event>) -> Result<(), StoreError> {
            let mut runs = self.runs.lock().expect("lock");
            if runs.contains_key(&run.run_id) {
                return Err(StoreError::Invalid(format!("run already exists: {}", run.run_id)));
            }
            let mut seen = std::collections::BTreeSet::new();
            for event in &events {
                if !seen.insert(event.seq) {
                    return Err(StoreError::SeqDuplicate { run_id: run.run_id.clone(), seq: event.seq });
                }
            }
            self.events.lock().expect("lock").insert(run.run_id.clone(), events);
            runs.insert(run.run_id.clone(), run);
            Ok(())
        }
    }

    fn seeded_store(run_id: &str) -> MemoryStore {
        let store = MemoryStore::default();
        store.create_run_with_id(Some(run_id.to_string()), RunMode::DryRun, "goal").expect("create run");
        store.append(run_id, EventType::RunStarted, json!({"mode": "dry_run", "goal": "goal"})).expect("append");
        store.append(run_id, EventType::RunCompleted, json!({"outcome": "ok"})).expect("append");
        store.set_run_status(run_id, RunStatus::Completed).expect("set status");
        store
    }

    #[test]
    fn export_unknown_run_is_not_found() {
        let store = MemoryStore::default();
        let err = export(&store, "nope", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect_err("missing run");
        assert!(matches!(err, StoreError::RunNotFound { .. }));
    }

    #[test]
    fn export_twice_is_digest_stable() {
        let store = seeded_store("r1");
        let first = export(&store, "r1", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("export");
        let second = export(&store, "r1", false, Timestamp::parse("2027-01-01T00:00:00Z").expect("ts"))
            .expect("export again, later");
        assert_eq!(first.digests.sha256, second.digests.sha256);
    }

    #[test]
    fn import_reject_on_conflict_skips_existing_run() {
        let store = seeded_store("r1");
        let bundle = export(&store, "r1", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("export");
        let options = ImportOptions {
            mode: ConflictMode::RejectOnConflict,
            new_run_id: None,
            verify_digest: true,
            replay_after_import: false,
        };
        let outcome = import(&store, &bundle, &options, |i| format!("evt-new-{i}"), || "unused".to_string())
            .expect("import");
        assert!(matches!(
            outcome,
            ImportOutcome::Skipped { reason, existing_run_id } if reason == "run_id_exists" && existing_run_id == "r1"
        ));
    }

    #[test]
    fn import_new_run_id_remaps_and_replays_clean() {
        let source = seeded_store("r1");
        let bundle = export(&source, "r1", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("export");
        let target = MemoryStore::default();
        let options = ImportOptions {
            mode: ConflictMode::NewRunId,
            new_run_id: Some("r2".to_string()),
            verify_digest: true,
            replay_after_import: true,
        };
        let outcome = import(&target, &bundle, &options, |i| format!("evt-new-{i}"), || "unused".to_string())
            .expect("import");
        match outcome {
            ImportOutcome::Ok { imported_run_id, replay_ok, violations } => {
                assert_eq!(imported_run_id, "r2");
                assert_eq!(replay_ok, Some(true));
                assert!(violations.is_empty());
            }
            ImportOutcome::Skipped { .. } => panic!("expected a successful import"),
        }
        let imported_events = target.read_events("r2").expect("read events");
        assert!(imported_events.iter().all(|event| event.run_id == "r2"));

        let reexported = export(&target, "r2", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("re-export");
        assert_ne!(reexported.digests.sha256, bundle.digests.sha256);
    }

    #[test]
    fn import_with_tampered_digest_is_rejected() {
        let store = seeded_store("r1");
        let mut bundle = export(&store, "r1", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("export");
        bundle.digests.sha256 = "0".repeat(64);
        let target = MemoryStore::default();
        let options = ImportOptions {
            mode: ConflictMode::NewRunId,
            new_run_id: Some("r2".to_string()),
            verify_digest: true,
            replay_after_import: false,
        };
        let err = import(&target, &bundle, &options, |i| format!("evt-{i}"), || "unused".to_string())
            .expect_err("digest mismatch");
        assert!(matches!(err, ImportError::DigestMismatch { .. }));
    }

    #[test]
    fn import_overwrite_replaces_existing_run() {
        let store = seeded_store("r1");
        let mut bundle = export(&store, "r1", false, Timestamp::parse("2026-01-01T00:00:00Z").expect("ts"))
            .expect("export");
        bundle.run.goal = "replaced".to_string();
        bundle.digests.sha256 = compute_digest(&bundle.run, &bundle.events).expect("digest");
        let options = ImportOptions {
            mode: ConflictMode::Overwrite,
            new_run_id: None,
            verify_digest: true,
            replay_after_import: false,
        };
        let outcome = import(&store, &bundle, &options, |i| format!("evt-{i}"), || "unused".to_string())
            .expect("import");
        assert!(matches!(outcome, ImportOutcome::Ok { imported_run_id, .. } if imported_run_id == "r1"));
        let run = store.get_run("r1").expect("get run").expect("run exists");
        assert_eq!(run.goal, "replaced");
    }
}
