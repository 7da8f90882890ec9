//! Snapshot retention
//!
//! Partitions a lineage into keep/delete sets under the ordering policy and
//! executes the deletions. Each deletion is isolated: a failure is counted
//! and logged, never escalated, and there is no retry or rollback. A pacing
//! delay between deletions respects remote rate limits.

use crate::client::Snapshot;
use crate::engine::ServerEngine;
use crate::error::Result;
use crate::naming;
use crate::ordering;
use tracing::{info, warn};

/// Default number of snapshots retained by cleanup
pub const DEFAULT_KEEP_COUNT: usize = 3;

/// What `cleanup` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The lineage has no snapshots at all
    NoSnapshots,
    /// Lineage size is within the keep count; zero deletions attempted
    NothingToDelete,
    /// Deletions were attempted
    Done {
        /// Snapshots successfully deleted
        deleted: usize,
        /// Deletions that failed and were skipped
        failed: usize,
    },
}

impl ServerEngine {
    /// Delete all but the `keep` newest snapshots of a lineage.
    ///
    /// A lineage of exactly `keep` snapshots triggers no deletion. The full
    /// keep/delete plan is reported as one message before anything is
    /// deleted.
    pub async fn cleanup(&self, name: &str, keep: usize) -> Result<CleanupOutcome> {
        let _lease = self.lease(name).await;

        let result = self.cleanup_inner(name, keep).await;
        if let Err(e) = &result {
            self.report(format!("cleanup of {name} failed: {e}")).await;
        }
        result
    }

    async fn cleanup_inner(&self, name: &str, keep: usize) -> Result<CleanupOutcome> {
        let mut snapshots: Vec<Snapshot> = self
            .client()
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| naming::matches(&s.name, name))
            .collect();

        if snapshots.is_empty() {
            self.report(format!("no snapshots found for {name}")).await;
            return Ok(CleanupOutcome::NoSnapshots);
        }

        ordering::sort_newest_first(&mut snapshots);

        if snapshots.len() <= keep {
            self.report(format!(
                "nothing to delete: {} has {} snapshots, keeping up to {keep}",
                name,
                snapshots.len()
            ))
            .await;
            return Ok(CleanupOutcome::NothingToDelete);
        }

        let (retained, marked) = snapshots.split_at(keep);
        self.report(format_plan(name, retained, marked)).await;

        let mut deleted = 0;
        let mut failed = 0;
        for (i, snapshot) in marked.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config().cleanup_pacing()).await;
            }
            match self.client().delete_snapshot(&snapshot.id).await {
                Ok(()) => {
                    info!("deleted snapshot {}", snapshot.name);
                    deleted += 1;
                }
                Err(e) => {
                    warn!("failed to delete snapshot {}: {}", snapshot.name, e);
                    failed += 1;
                }
            }
        }

        self.report(format!(
            "cleanup of {name} finished: {deleted} deleted, {failed} failed"
        ))
        .await;
        Ok(CleanupOutcome::Done { deleted, failed })
    }
}

fn format_plan(name: &str, retained: &[Snapshot], marked: &[Snapshot]) -> String {
    let mut text = format!("retention plan for {name}:\n");
    for s in retained {
        text.push_str(&format!(
            "- keep   {} ({})\n",
            s.name,
            s.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    for s in marked {
        text.push_str(&format!(
            "- delete {} ({})\n",
            s.name,
            s.created_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    text.trim_end().to_string()
}
