// crates/nexus-router-store/src/lib.rs
// ============================================================================
// Crate: nexus-router-store
// Description: SQLite-backed EventStore implementation.
// Purpose: Give the router a durable, crash-safe backing for the
//          append-only event log specified by `nexus-router-core::store`.
// ============================================================================

//! # nexus-router-store
//!
//! A `SQLite`-backed [`nexus_router_core::store::EventStore`]. Opened in WAL
//! journal mode with a configured busy timeout; every write path hashes its
//! canonical JSON payload at the moment of insert and verifies it on
//! read-back, so silent page corruption surfaces as a `Bug` rather than
//! being silently replayed.

pub mod sqlite_store;

pub use sqlite_store::SqliteEventStore;
pub use sqlite_store::SqliteStoreConfig;
pub use sqlite_store::SqliteStoreError;
pub use sqlite_store::SqliteSyncMode;
