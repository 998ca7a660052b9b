// ── Liveness & recovery ──
//
// A camera that stops answering pings is marked offline and, once its
// reboot cooldown has passed, power-cycled through the switch port it is
// plugged into. Cameras on the same switch are pulsed together over one
// session so two sessions never target the same switch at once; different
// switches are handled in parallel, alongside the offline patches.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use futures::future::{join, join_all};
use tracing::{debug, info, warn};

use camrig_api::{CameraPatch, Registry, SwitchDriver};

use crate::config::Timing;
use crate::model::MacAddress;
use crate::session::power_cycle;
use crate::store::CameraTable;

/// Cameras due for a power-cycle that sit on one switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootGroup {
    pub interface: String,
    pub switch_address: Ipv4Addr,
    /// `(camera, port)`, ordered by port.
    pub cameras: Vec<(MacAddress, u16)>,
}

impl RebootGroup {
    /// Distinct ports in the group, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.cameras.iter().map(|(_, port)| *port).collect();
        ports.dedup();
        ports
    }
}

/// Outcome of evaluating the table at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
    /// Cameras that were online and just went stale.
    pub went_offline: Vec<MacAddress>,
    pub reboots: Vec<RebootGroup>,
    /// Stale, off cooldown, but with no known switch port.
    pub unrecoverable: Vec<MacAddress>,
}

/// What a recovery pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub marked_offline: usize,
    pub power_cycled: Vec<MacAddress>,
    pub failed_switches: usize,
    pub unrecoverable: usize,
}

/// Mark stale cameras offline and pick the ones to power-cycle.
///
/// Each camera is evaluated and updated in one step, so `online` always
/// matches the staleness verdict at `now`.
pub fn assess(table: &CameraTable, now: DateTime<Utc>, timing: &Timing) -> Assessment {
    let mut went_offline = Vec::new();
    let mut unrecoverable = Vec::new();
    let mut groups: BTreeMap<(String, Ipv4Addr), Vec<(MacAddress, u16)>> = BTreeMap::new();

    table.for_each_mut(|camera| {
        if camera.seen_within(now, timing.stale_after) {
            return;
        }
        if camera.online {
            camera.online = false;
            went_offline.push(camera.mac.clone());
        }
        if !camera.reboot_allowed(now, timing.reboot_cooldown) {
            return;
        }
        match &camera.attachment {
            Some(a) => groups
                .entry((a.interface.clone(), a.switch_address))
                .or_default()
                .push((camera.mac.clone(), a.port)),
            None => unrecoverable.push(camera.mac.clone()),
        }
    });

    went_offline.sort();
    unrecoverable.sort();
    let reboots = groups
        .into_iter()
        .map(|((interface, switch_address), mut cameras)| {
            cameras.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            RebootGroup {
                interface,
                switch_address,
                cameras,
            }
        })
        .collect();

    Assessment {
        went_offline,
        reboots,
        unrecoverable,
    }
}

/// Persist offline flags and power-cycle every reboot group, concurrently.
///
/// One failure never stops its siblings. `last_reboot` is stamped with
/// `now` only for cameras whose switch completed the pulse.
pub async fn recover(
    assessment: &Assessment,
    driver: &dyn SwitchDriver,
    registry: &dyn Registry,
    table: &CameraTable,
    timing: &Timing,
    now: DateTime<Utc>,
) -> RecoveryReport {
    for mac in &assessment.unrecoverable {
        debug!(%mac, "camera offline on an unknown port, cannot power-cycle");
    }

    let patches = join_all(assessment.went_offline.iter().map(|mac| async move {
        info!(%mac, "lost connection to camera");
        if let Err(e) = registry.patch(mac.as_str(), &CameraPatch::online(false)).await {
            warn!(%mac, error = %e, "registry offline update failed");
        }
    }));

    let cycles = join_all(assessment.reboots.iter().map(|group| async move {
        let result = power_cycle(
            driver,
            &group.interface,
            group.switch_address,
            &group.ports(),
            timing.session,
            timing.pulse,
        )
        .await;
        (group, result)
    }));

    let (_, outcomes) = join(patches, cycles).await;

    let mut report = RecoveryReport {
        marked_offline: assessment.went_offline.len(),
        unrecoverable: assessment.unrecoverable.len(),
        ..RecoveryReport::default()
    };
    for (group, result) in outcomes {
        match result {
            Ok(()) => {
                let macs = group.cameras.iter().map(|(mac, _)| mac);
                table.mark_rebooted(macs, now);
                report
                    .power_cycled
                    .extend(group.cameras.iter().map(|(mac, _)| mac.clone()));
            }
            Err(e) => {
                warn!(
                    interface = %group.interface,
                    address = %group.switch_address,
                    error = %e,
                    "power cycle failed"
                );
                report.failed_switches += 1;
            }
        }
    }
    report
}
