// ── Camera table ──
//
// Concurrent map of every camera the controller has heard from, keyed by
// MAC. Each mutation is one short critical section on a single shard and
// never spans an await; callers persist to the registry afterwards.

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{Attachment, Camera, MacAddress};

/// What a heartbeat changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First heartbeat from this MAC.
    Discovered,
    /// Known camera came back online or moved address.
    Recovered,
    /// Nothing but `last_seen` changed.
    Refreshed,
}

/// Owned store of [`Camera`] records.
#[derive(Debug, Default)]
pub struct CameraTable {
    cameras: DashMap<MacAddress, Camera>,
}

impl CameraTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn get(&self, mac: &MacAddress) -> Option<Camera> {
        self.cameras.get(mac).map(|c| c.clone())
    }

    /// Every camera, ordered by MAC.
    pub fn snapshot(&self) -> Vec<Camera> {
        let mut cameras: Vec<Camera> = self.cameras.iter().map(|c| c.clone()).collect();
        cameras.sort_by(|a, b| a.mac.cmp(&b.mac));
        cameras
    }

    /// Record a heartbeat from `mac` at `address`.
    pub fn observe(&self, mac: MacAddress, address: IpAddr, now: DateTime<Utc>) -> Observation {
        match self.cameras.entry(mac) {
            Entry::Vacant(slot) => {
                let camera = Camera::discovered(slot.key().clone(), address, now);
                slot.insert(camera);
                Observation::Discovered
            }
            Entry::Occupied(mut slot) => {
                let camera = slot.get_mut();
                let outcome = if camera.address != address || !camera.online {
                    camera.address = address;
                    camera.online = true;
                    Observation::Recovered
                } else {
                    Observation::Refreshed
                };
                camera.last_seen = Some(now);
                outcome
            }
        }
    }

    /// Set the attachment of a known camera. Returns `true` if it changed.
    ///
    /// Unknown MACs are ignored; the MAC table lists every device on the
    /// switch, not just cameras.
    pub fn attach(&self, mac: &MacAddress, attachment: &Attachment) -> bool {
        let Some(mut camera) = self.cameras.get_mut(mac) else {
            return false;
        };
        if camera.attachment.as_ref() == Some(attachment) {
            return false;
        }
        camera.attachment = Some(attachment.clone());
        true
    }

    /// Flip `online` off. Returns `true` if the camera was online.
    pub fn mark_offline(&self, mac: &MacAddress) -> bool {
        self.cameras
            .get_mut(mac)
            .is_some_and(|mut camera| std::mem::replace(&mut camera.online, false))
    }

    /// Stamp `last_reboot` on each of `macs`.
    pub fn mark_rebooted<'a>(&self, macs: impl IntoIterator<Item = &'a MacAddress>, at: DateTime<Utc>) {
        for mac in macs {
            if let Some(mut camera) = self.cameras.get_mut(mac) {
                camera.last_reboot = Some(at);
            }
        }
    }

    /// Ports on `interface` that some camera is known to be plugged into.
    pub fn claimed_ports(&self, interface: &str) -> BTreeSet<u16> {
        self.cameras
            .iter()
            .filter_map(|camera| {
                camera
                    .attachment
                    .as_ref()
                    .filter(|a| a.interface == interface)
                    .map(|a| a.port)
            })
            .collect()
    }

    /// Run `f` over every camera with mutable access, one at a time.
    pub(crate) fn for_each_mut(&self, mut f: impl FnMut(&mut Camera)) {
        for mut camera in self.cameras.iter_mut() {
            f(camera.value_mut());
        }
    }
}
