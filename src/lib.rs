//! # droplift
//!
//! Snapshot-backed droplet lifecycle orchestration.
//!
//! Servers live as droplets only while in use; between sessions each one is
//! a snapshot lineage addressed by a logical name. The engine materializes a
//! droplet from the latest snapshot on `start`, snapshots-then-terminates on
//! `end`, and enforces retention over the lineage's history.
//!
//! ## Architecture
//!
//! ```text
//! front end (chat / CLI)
//!   └── ServerEngine            one operation per invocation, no state kept
//!       ├── inventory           unified per-name status views
//!       ├── lifecycle           start / end state transitions
//!       ├── retention           keep-N snapshot cleanup
//!       ├── ordering + naming   lineage grouping, "latest" selection
//!       ├── Reporter            injected progress sink
//!       └── CloudClient         eight remote operations (REST, paginated)
//! ```
//!
//! The remote API is eventually consistent, so multi-step transitions poll
//! listings at fixed intervals; every poll is bounded. The engine never
//! deletes a droplet without positive confirmation that its backing snapshot
//! exists.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod naming;
pub mod ordering;
pub mod reporter;
pub mod retention;

#[cfg(test)]
pub(crate) mod test_support;

// Error handling
pub use error::{EngineError, Result};

// Engine and configuration
pub use config::EngineConfig;
pub use engine::ServerEngine;

// Remote client
pub use client::{CloudClient, DoApiClient, Droplet, Snapshot};

// Operation outcomes and views
pub use inventory::{ServerStatus, ServerView};
pub use lifecycle::{EndOutcome, StartOutcome};
pub use retention::{CleanupOutcome, DEFAULT_KEEP_COUNT};

// Progress sink
pub use reporter::{Reporter, StdoutReporter, TracingReporter};
