//! Server lifecycle transitions
//!
//! `start` materializes a droplet from the latest snapshot of a lineage;
//! `end` snapshots a running droplet and tears it down. Both are multi-step
//! sequences of remote calls interleaved with fixed-interval polls, because
//! the remote listings are read-after-write eventually consistent.
//!
//! Every poll is bounded. The snapshot-confirmation wait in `end` is the
//! load-bearing one: the droplet is never deleted without a listing that
//! positively contains the snapshot created for it. A timeout there preserves
//! the droplet and fails the operation, directing manual follow-up.

use crate::client::Snapshot;
use crate::engine::ServerEngine;
use crate::error::{EngineError, Result};
use crate::naming;
use crate::ordering;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What `start` did, or why it declined to act
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Droplet created and addressable
    Started {
        /// The new droplet's public address
        address: String,
    },
    /// An exact-name droplet already runs; nothing was created
    AlreadyRunning {
        /// The existing droplet's address
        address: String,
    },
    /// An exact-name droplet exists but has no address yet
    AlreadyProvisioning,
    /// The lineage has no snapshot to start from
    NoSnapshot,
}

impl StartOutcome {
    /// Whether a droplet was actually created by this call
    pub fn started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// What `end` did, or why it declined to act
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// Snapshot confirmed, droplet deleted
    Ended,
    /// No exact-name droplet exists
    NotRunning,
}

impl ServerEngine {
    /// Boot a server from the latest snapshot of its lineage.
    ///
    /// Refuses to create a duplicate when an exact-name droplet already
    /// exists, and requires at least one matching snapshot. Waits (bounded)
    /// for the new droplet to acquire an address before reporting success.
    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        let _lease = self.lease(name).await;
        self.report("this may take a moment...").await;

        let result = self.start_inner(name).await;
        if let Err(e) = &result {
            self.report(format!("starting {name} failed: {e}")).await;
        }
        result
    }

    async fn start_inner(&self, name: &str) -> Result<StartOutcome> {
        let droplets = self.client().list_droplets().await?;
        if let Some(existing) = droplets.iter().find(|d| d.name == name) {
            return Ok(match existing.public_ip() {
                Some(address) => {
                    self.report(format!("{name} is already running\nIP: {address}"))
                        .await;
                    StartOutcome::AlreadyRunning {
                        address: address.to_string(),
                    }
                }
                None => {
                    self.report(format!("{name} is still provisioning")).await;
                    StartOutcome::AlreadyProvisioning
                }
            });
        }

        let mut snapshots: Vec<Snapshot> = self
            .client()
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| naming::matches(&s.name, name))
            .collect();
        if snapshots.is_empty() {
            self.report(format!("no snapshot available for {name}")).await;
            return Ok(StartOutcome::NoSnapshot);
        }

        ordering::sort_newest_first(&mut snapshots);
        let latest = &snapshots[0];
        let region = latest.regions.first().ok_or_else(|| {
            EngineError::config(format!("snapshot {} has no source region", latest.name))
        })?;
        info!(
            "starting {} from snapshot {} in {}",
            name, latest.name, region
        );

        self.client()
            .create_droplet(name, region, &self.config().droplet_size, &latest.id)
            .await?;
        self.report(format!("booting {name} from snapshot {}...", latest.name))
            .await;

        let address = self.wait_for_address(name).await?;
        self.report(format!(
            "{name} is up!\nIP: {address} (give it a few minutes before connecting)"
        ))
        .await;
        Ok(StartOutcome::Started { address })
    }

    /// Snapshot a running server, then tear the droplet down.
    ///
    /// The droplet is deleted only after a snapshot listing positively
    /// contains the snapshot created for this call; on a confirmation
    /// timeout the droplet is preserved and the operation fails.
    pub async fn end(&self, name: &str) -> Result<EndOutcome> {
        let _lease = self.lease(name).await;
        self.report("this may take a moment...").await;

        let result = self.end_inner(name).await;
        if let Err(e) = &result {
            // Timeouts already carried their own message with the
            // manual-follow-up instruction.
            if !e.is_timeout() {
                self.report(format!("ending {name} failed: {e}")).await;
            }
        }
        result
    }

    async fn end_inner(&self, name: &str) -> Result<EndOutcome> {
        let droplets = self.client().list_droplets().await?;
        let Some(target) = droplets.iter().find(|d| d.name == name) else {
            self.report(format!("{name} is not currently running")).await;
            return Ok(EndOutcome::NotRunning);
        };

        self.client().power_off_droplet(target.id).await?;
        self.report(format!("powering {name} off...")).await;
        self.wait_for_power_off(target.id).await?;

        // Computed once; confirmation below looks for this exact name.
        let snapshot_name = naming::snapshot_name_for(name, Utc::now());
        self.client()
            .snapshot_droplet(target.id, &snapshot_name)
            .await?;
        self.report(format!(
            "snapshotting {name} as {snapshot_name} (this can take ~10 minutes)..."
        ))
        .await;

        if let Err(e) = self.wait_for_snapshot(&snapshot_name).await {
            self.report(format!(
                "snapshot {snapshot_name} was not confirmed in time; \
                 {name} has NOT been deleted, manual follow-up required"
            ))
            .await;
            return Err(e);
        }

        self.client().delete_droplet(target.id).await?;
        self.report(format!("shutting {name} down...")).await;
        self.wait_for_droplet_gone(name).await?;

        self.report(format!(
            "{name} stopped cleanly; snapshot {snapshot_name} saved"
        ))
        .await;
        Ok(EndOutcome::Ended)
    }

    /// Poll droplet listings until an exact-name droplet has an address.
    async fn wait_for_address(&self, name: &str) -> Result<String> {
        let interval = self.config().start_poll();
        let timeout = self.config().start_timeout();
        let started = Instant::now();

        loop {
            tokio::time::sleep(interval).await;
            let droplets = self.client().list_droplets().await?;
            if let Some(address) = droplets
                .iter()
                .find(|d| d.name == name)
                .and_then(|d| d.public_ip())
            {
                return Ok(address.to_string());
            }
            debug!("{} has no address yet", name);
            if started.elapsed() >= timeout {
                return Err(EngineError::timeout(
                    format!("{name} to acquire an address"),
                    started.elapsed(),
                ));
            }
        }
    }

    /// Poll a droplet until the remote API reports it powered off.
    async fn wait_for_power_off(&self, id: u64) -> Result<()> {
        let interval = self.config().power_off_poll();
        let timeout = self.config().power_off_timeout();
        let started = Instant::now();

        loop {
            tokio::time::sleep(interval).await;
            let droplet = self.client().get_droplet(id).await?;
            if droplet.is_off() {
                return Ok(());
            }
            debug!("droplet {} still {}", id, droplet.status);
            if started.elapsed() >= timeout {
                return Err(EngineError::timeout(
                    format!("droplet {id} to power off"),
                    started.elapsed(),
                ));
            }
        }
    }

    /// Poll snapshot listings, a bounded number of times, until one with the
    /// exact expected name appears.
    async fn wait_for_snapshot(&self, snapshot_name: &str) -> Result<()> {
        let interval = self.config().snapshot_poll();
        let attempts = self.config().snapshot_confirm_attempts;
        let started = Instant::now();

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            let snapshots = self.client().list_snapshots().await?;
            if snapshots.iter().any(|s| s.name == snapshot_name) {
                info!("snapshot {} confirmed", snapshot_name);
                return Ok(());
            }
            debug!(
                "snapshot {} not visible yet ({}/{})",
                snapshot_name, attempt, attempts
            );
        }

        warn!(
            "snapshot {} unconfirmed after {} attempts",
            snapshot_name, attempts
        );
        Err(EngineError::timeout(
            format!("snapshot {snapshot_name} to be confirmed"),
            started.elapsed(),
        ))
    }

    /// Poll droplet listings until no exact-name droplet remains.
    async fn wait_for_droplet_gone(&self, name: &str) -> Result<()> {
        let interval = self.config().delete_poll();
        let timeout = self.config().delete_timeout();
        let started = Instant::now();

        loop {
            tokio::time::sleep(interval).await;
            let droplets = self.client().list_droplets().await?;
            if !droplets.iter().any(|d| d.name == name) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(EngineError::timeout(
                    format!("droplet {name} to be deleted"),
                    started.elapsed(),
                ));
            }
        }
    }
}
