//! In-memory fake cloud API and recording reporter for engine tests.
//!
//! The fake models the eventual consistency the engine polls against: newly
//! created droplets acquire an address only on a later listing, and requested
//! snapshots appear in listings only after a configurable number of polls.
//! Every call is appended to a log so tests can assert on call order.

use crate::client::{CloudClient, Droplet, NetworkV4, Networks, Snapshot};
use crate::error::{EngineError, Result};
use crate::reporter::Reporter;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Mutex;

/// Number of listings a pending change waits for before materializing
const NEXT_LISTING: u32 = 1;

/// Pending-change counter that never reaches zero
const NEVER: u32 = u32::MAX;

pub(crate) struct FakeState {
    pub droplets: Vec<Droplet>,
    pub snapshots: Vec<Snapshot>,
    pub calls: Vec<String>,
    next_droplet_id: u64,
    /// Droplet names acquiring an address after N more droplet listings
    pending_addresses: Vec<(String, u32)>,
    /// Snapshots appearing after N more snapshot listings
    pending_snapshots: Vec<(Snapshot, u32)>,
    /// Snapshot ids whose deletion fails with a server error
    failing_snapshot_deletes: HashSet<String>,
    /// When false, requested snapshots never materialize
    confirm_snapshots: bool,
    /// When false, created droplets never acquire an address
    provision_droplets: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            droplets: Vec::new(),
            snapshots: Vec::new(),
            calls: Vec::new(),
            next_droplet_id: 100,
            pending_addresses: Vec::new(),
            pending_snapshots: Vec::new(),
            failing_snapshot_deletes: HashSet::new(),
            confirm_snapshots: true,
            provision_droplets: true,
        }
    }
}

/// In-memory [`CloudClient`]
#[derive(Default)]
pub(crate) struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn add_droplet(&self, droplet: Droplet) {
        self.state.lock().unwrap().droplets.push(droplet);
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.state.lock().unwrap().snapshots.push(snapshot);
    }

    pub fn fail_snapshot_delete(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_snapshot_deletes
            .insert(id.to_string());
    }

    /// Requested snapshots will never appear in listings
    pub fn never_confirm_snapshots(&self) {
        self.state.lock().unwrap().confirm_snapshots = false;
    }

    /// Created droplets will never acquire an address
    pub fn never_provision(&self) {
        self.state.lock().unwrap().provision_droplets = false;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn droplet_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .droplets
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }
}

/// A droplet fixture; `ip` of `None` models one still provisioning
pub(crate) fn droplet(id: u64, name: &str, ip: Option<&str>) -> Droplet {
    Droplet {
        id,
        name: name.to_string(),
        status: if ip.is_some() { "active" } else { "new" }.to_string(),
        networks: Networks {
            v4: ip
                .map(|ip| {
                    vec![NetworkV4 {
                        ip_address: ip.to_string(),
                        kind: "public".to_string(),
                    }]
                })
                .unwrap_or_default(),
        },
        created_at: at(1_000 + id as i64),
    }
}

/// A snapshot fixture with a derived id
pub(crate) fn snapshot(name: &str, created_secs: i64) -> Snapshot {
    Snapshot {
        id: format!("snap-{name}"),
        name: name.to_string(),
        created_at: at(created_secs),
        regions: vec!["nyc3".to_string()],
        size_gigabytes: 10.0,
    }
}

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn list_droplets(&self) -> Result<Vec<Droplet>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_droplets".to_string());

        let mut due = Vec::new();
        for (name, remaining) in &mut state.pending_addresses {
            *remaining -= 1;
            if *remaining == 0 {
                due.push(name.clone());
            }
        }
        state.pending_addresses.retain(|(_, r)| *r > 0);
        for name in due {
            if let Some(d) = state.droplets.iter_mut().find(|d| d.name == name) {
                d.status = "active".to_string();
                d.networks.v4.push(NetworkV4 {
                    ip_address: "203.0.113.10".to_string(),
                    kind: "public".to_string(),
                });
            }
        }

        Ok(state.droplets.clone())
    }

    async fn get_droplet(&self, id: u64) -> Result<Droplet> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get_droplet:{id}"));
        state
            .droplets
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| EngineError::api(404, "droplet not found"))
    }

    async fn create_droplet(
        &self,
        name: &str,
        region: &str,
        size: &str,
        image: &str,
    ) -> Result<Droplet> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("create_droplet:{name}:{region}:{size}:{image}"));

        let id = state.next_droplet_id;
        state.next_droplet_id += 1;
        let created = droplet(id, name, None);
        state.droplets.push(created.clone());

        let countdown = if state.provision_droplets {
            NEXT_LISTING
        } else {
            NEVER
        };
        state.pending_addresses.push((name.to_string(), countdown));

        Ok(created)
    }

    async fn power_off_droplet(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("power_off_droplet:{id}"));
        match state.droplets.iter_mut().find(|d| d.id == id) {
            Some(d) => {
                d.status = "off".to_string();
                Ok(())
            }
            None => Err(EngineError::api(404, "droplet not found")),
        }
    }

    async fn delete_droplet(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_droplet:{id}"));
        state.droplets.retain(|d| d.id != id);
        Ok(())
    }

    async fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_snapshots".to_string());

        let mut due = Vec::new();
        for (snap, remaining) in &mut state.pending_snapshots {
            *remaining -= 1;
            if *remaining == 0 {
                due.push(snap.clone());
            }
        }
        state.pending_snapshots.retain(|(_, r)| *r > 0);
        state.snapshots.extend(due);

        Ok(state.snapshots.clone())
    }

    async fn snapshot_droplet(&self, id: u64, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("snapshot_droplet:{id}:{name}"));
        if state.confirm_snapshots {
            let snap = Snapshot {
                id: format!("snap-{name}"),
                name: name.to_string(),
                created_at: Utc::now(),
                regions: vec!["nyc3".to_string()],
                size_gigabytes: 10.0,
            };
            state.pending_snapshots.push((snap, NEXT_LISTING));
        }
        Ok(())
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_snapshot:{id}"));
        if state.failing_snapshot_deletes.contains(id) {
            return Err(EngineError::api(500, "internal server error"));
        }
        state.snapshots.retain(|s| s.id != id);
        Ok(())
    }
}

/// Reporter that records every message for assertions
#[derive(Default)]
pub(crate) struct RecordingReporter {
    messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// All messages joined, for contains-style assertions
    pub fn transcript(&self) -> String {
        self.messages().join("\n")
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
