// crates/nexus-router-adapters/src/lib.rs
// ============================================================================
// Crate: nexus-router-adapters
// Description: Concrete Adapter implementations: null, fake, subprocess.
// Purpose: Give hosts ready-made transports that satisfy
//          `nexus_router_core::adapter::Adapter`.
// ============================================================================

//! # nexus-router-adapters
//!
//! Three adapters, in increasing order of how much of the outside world they
//! touch:
//!
//! - [`null_adapter::NullAdapter`] declares only `dry_run` and is never
//!   expected to have its `call` invoked.
//! - [`fake_adapter::FakeAdapter`] is a response-table test double: register a
//!   canned [`fake_adapter::FakeResponse`] per `(tool, method)` and it replays
//!   deterministically, the way in-process test doubles usually work.
//! - [`subprocess::SubprocessAdapter`] shells out to an external command per
//!   call, with a timeout, redaction, and the full operational error
//!   taxonomy that entails.

pub mod fake_adapter;
pub mod null_adapter;
pub mod redact;
pub mod subprocess;

pub use fake_adapter::FakeAdapter;
pub use fake_adapter::FakeResponse;
pub use null_adapter::NullAdapter;
pub use subprocess::SubprocessAdapter;
pub use subprocess::SubprocessConfig;
