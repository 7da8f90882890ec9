//! Inventory aggregation
//!
//! Merges live droplets and snapshot lineages into a unified per-name view.
//! Everything here is re-derived from the remote API on every call; nothing
//! is cached.

use crate::client::{Droplet, Snapshot};
use crate::engine::ServerEngine;
use crate::error::Result;
use crate::naming;
use crate::ordering;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Lifecycle phase of a logical server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    /// Droplet up with at least one address
    Running,
    /// Droplet created but not yet addressable
    Provisioning,
    /// No droplet; the name survives only as a snapshot lineage
    Stopped,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Read-only projection of one logical server, built per operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerView {
    /// Logical server name
    pub name: String,

    /// Current phase
    pub status: ServerStatus,

    /// Public address, when running
    pub address: Option<String>,

    /// Name of the lineage's latest snapshot, when stopped
    pub latest_snapshot: Option<String>,

    /// Droplet creation time, or the latest snapshot's creation time
    pub created_at: DateTime<Utc>,
}

/// Merge droplets and snapshots into at-most-one view per logical name.
///
/// Droplet presence wins over snapshot presence; a second droplet sharing a
/// name is a detected anomaly and is logged, not listed. Views are ordered by
/// creation time, newest first.
pub(crate) fn build_views(droplets: &[Droplet], snapshots: &[Snapshot]) -> Vec<ServerView> {
    let mut views = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for d in droplets {
        if !seen.insert(&d.name) {
            warn!("multiple droplets named {}; listing the first only", d.name);
            continue;
        }
        let address = d.public_ip().map(str::to_string);
        views.push(ServerView {
            name: d.name.clone(),
            status: if address.is_some() {
                ServerStatus::Running
            } else {
                ServerStatus::Provisioning
            },
            address,
            latest_snapshot: None,
            created_at: d.created_at,
        });
    }

    let mut lineages: HashMap<&str, Vec<&Snapshot>> = HashMap::new();
    for s in snapshots {
        lineages.entry(naming::logical_name(&s.name)).or_default().push(s);
    }

    for (name, mut lineage) in lineages {
        if seen.contains(name) {
            continue;
        }
        lineage.sort_by(|a, b| ordering::newest_first(a, b));
        let latest = lineage[0];
        views.push(ServerView {
            name: name.to_string(),
            status: ServerStatus::Stopped,
            address: None,
            latest_snapshot: Some(latest.name.clone()),
            created_at: latest.created_at,
        });
    }

    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    views
}

fn format_views(views: &[ServerView]) -> String {
    if views.is_empty() {
        return "no servers and no snapshots found".to_string();
    }
    let mut text = String::new();
    for v in views {
        text.push_str("- ");
        text.push_str(&v.name);
        match v.status {
            ServerStatus::Running => {
                let addr = v.address.as_deref().unwrap_or("?");
                text.push_str(&format!(" : {addr} [running]"));
            }
            ServerStatus::Provisioning => text.push_str(" [provisioning]"),
            ServerStatus::Stopped => {
                let snap = v.latest_snapshot.as_deref().unwrap_or("?");
                text.push_str(&format!(" [stopped, snapshot {snap}]"));
            }
        }
        text.push('\n');
    }
    text.trim_end().to_string()
}

impl ServerEngine {
    /// Report the status of every known server: live droplets first, then
    /// names surviving only as snapshot lineages. Emits one message up front
    /// and one consolidated report at the end.
    pub async fn list(&self) -> Result<Vec<ServerView>> {
        self.report("fetching server list...").await;
        let result = self.list_inner().await;
        if let Err(e) = &result {
            self.report(format!("listing failed: {e}")).await;
        }
        result
    }

    async fn list_inner(&self) -> Result<Vec<ServerView>> {
        let droplets = self.client().list_droplets().await?;
        let snapshots = self.client().list_snapshots().await?;
        let views = build_views(&droplets, &snapshots);
        self.report(format_views(&views)).await;
        Ok(views)
    }

    /// Every logical name known to the remote API: droplet names plus
    /// resolved snapshot-lineage names. Used to populate selectable name
    /// lists; truncation for presentation is the front end's concern.
    pub async fn resolve_names(&self) -> Result<BTreeSet<String>> {
        let droplets = self.client().list_droplets().await?;
        let snapshots = self.client().list_snapshots().await?;

        let mut names: BTreeSet<String> =
            droplets.into_iter().map(|d| d.name).collect();
        names.extend(
            snapshots
                .iter()
                .map(|s| naming::logical_name(&s.name).to_string()),
        );
        Ok(names)
    }

    /// Report a server's snapshot lineage, newest first, as one consolidated
    /// message. Returns whether any snapshot was found.
    pub async fn snapshot_list(&self, name: &str) -> Result<bool> {
        let result = self.snapshot_list_inner(name).await;
        if let Err(e) = &result {
            self.report(format!("snapshot listing for {name} failed: {e}"))
                .await;
        }
        result
    }

    async fn snapshot_list_inner(&self, name: &str) -> Result<bool> {
        let mut snapshots: Vec<Snapshot> = self
            .client()
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| naming::matches(&s.name, name))
            .collect();

        if snapshots.is_empty() {
            self.report(format!("no snapshots found for {name}")).await;
            return Ok(false);
        }

        ordering::sort_newest_first(&mut snapshots);

        let mut text = format!("snapshots of {name}:\n");
        for s in &snapshots {
            text.push_str(&format!(
                "- {} ({}, id {}, {}GB)\n",
                s.name,
                s.created_at.format("%Y-%m-%d %H:%M UTC"),
                s.id,
                s.size_gigabytes,
            ));
        }
        self.report(text.trim_end()).await;
        Ok(true)
    }
}
