//! Progress reporting sink
//!
//! The engine narrates every operation through an injected [`Reporter`]; the
//! front end (chat channel, CLI, test harness) owns delivery. The engine never
//! retries sink failures, so `report` is infallible from its point of view.

use async_trait::async_trait;

/// Sink for human-readable progress messages.
///
/// One message per milestone; listings and retention plans arrive as a single
/// consolidated message, never one per row.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Deliver one progress message.
    async fn report(&self, message: &str);
}

/// Reporter that prints to stdout. Used by the CLI binary.
pub struct StdoutReporter;

#[async_trait]
impl Reporter for StdoutReporter {
    async fn report(&self, message: &str) {
        println!("{message}");
    }
}

/// Reporter that routes messages into the tracing log, for embedding the
/// engine somewhere without a user-facing channel.
pub struct TracingReporter;

#[async_trait]
impl Reporter for TracingReporter {
    async fn report(&self, message: &str) {
        tracing::info!("{message}");
    }
}
