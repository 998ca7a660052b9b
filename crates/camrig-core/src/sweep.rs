// ── Orphan port sweep ──
//
// A camera that never answered a ping has no attachment, so the regular
// recovery cannot reach it. Periodically every switch port that no known
// camera claims gets one power pulse, which brings such cameras up.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use camrig_api::{SessionOptions, SwitchDriver};

use crate::model::{Switch, elapsed_beyond};
use crate::session::power_cycle;
use crate::store::CameraTable;

/// When the last sweep finished.
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl SweepSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// `true` if no sweep has run yet or the last one is older than the
    /// interval.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.last
            .is_none_or(|last| elapsed_beyond(last, now, self.interval))
    }

    pub fn record(&mut self, finished: DateTime<Utc>) {
        self.last = Some(finished);
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

/// Per-switch result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepResult {
    pub interface: String,
    pub ports: Vec<u16>,
    pub ok: bool,
}

/// Ports on `switch` that no camera in `table` is attached to.
pub fn unclaimed_ports(switch: &Switch, table: &CameraTable) -> Vec<u16> {
    let claimed = table.claimed_ports(&switch.interface);
    switch
        .port_indices()
        .filter(|port| !claimed.contains(port))
        .collect()
}

/// Pulse every unclaimed port, one session per switch, all switches in
/// parallel. Switches with nothing to pulse are skipped.
pub async fn sweep_orphans(
    switches: &[Switch],
    driver: &dyn SwitchDriver,
    table: &CameraTable,
    options: SessionOptions,
    pulse: Duration,
) -> Vec<SweepResult> {
    let jobs = switches.iter().filter_map(|switch| {
        let ports = unclaimed_ports(switch, table);
        if ports.is_empty() {
            return None;
        }
        Some(async move {
            debug!(interface = %switch.interface, ?ports, "sweeping unclaimed ports");
            let result = power_cycle(
                driver,
                &switch.interface,
                switch.switch_address,
                &ports,
                options,
                pulse,
            )
            .await;
            if let Err(e) = &result {
                warn!(interface = %switch.interface, error = %e, "orphan sweep failed");
            }
            SweepResult {
                interface: switch.interface.clone(),
                ports,
                ok: result.is_ok(),
            }
        })
    });
    join_all(jobs).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeDriver, SW0, SW1, at, attachment, cam_ip, fleet_config, mac};
    use pretty_assertions::assert_eq;

    #[test]
    fn schedule_runs_first_time_then_waits() {
        let mut schedule = SweepSchedule::new(Duration::from_secs(60));
        assert!(schedule.due(at(0)));
        schedule.record(at(5));
        assert!(!schedule.due(at(65)));
        assert!(schedule.due(at(66)));
        assert_eq!(schedule.last(), Some(at(5)));
    }

    #[tokio::test]
    async fn claimed_ports_are_never_pulsed() {
        let switches = fleet_config().resolved_switches();
        let table = CameraTable::new();
        table.observe(mac("AA:BB:CC:DD:EE:01"), cam_ip(5), at(0));
        table.attach(&mac("AA:BB:CC:DD:EE:01"), &attachment("eth0", SW0, 1));
        table.observe(mac("AA:BB:CC:DD:EE:02"), cam_ip(6), at(0));
        table.attach(&mac("AA:BB:CC:DD:EE:02"), &attachment("eth0", SW0, 3));
        let driver = FakeDriver::reachable(&[SW0, SW1]);

        let results = sweep_orphans(
            &switches,
            &driver,
            &table,
            SessionOptions::default(),
            Duration::from_millis(4000),
        )
        .await;

        let mut cycles = driver.power_cycles();
        cycles.sort();
        assert_eq!(
            cycles,
            vec![
                (SW0, vec![0, 2], Duration::from_millis(4000)),
                (SW1, vec![0, 1, 2, 3], Duration::from_millis(4000)),
            ]
        );
        assert!(results.iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn fully_claimed_switch_is_left_alone() {
        let mut config = fleet_config();
        config.switches.truncate(1);
        config.defaults.ports = 1;
        let switches = config.resolved_switches();
        let table = CameraTable::new();
        table.observe(mac("AA:BB:CC:DD:EE:01"), cam_ip(5), at(0));
        table.attach(&mac("AA:BB:CC:DD:EE:01"), &attachment("eth0", SW0, 0));
        let driver = FakeDriver::reachable(&[SW0]);

        let results = sweep_orphans(
            &switches,
            &driver,
            &table,
            SessionOptions::default(),
            Duration::from_secs(4),
        )
        .await;

        assert!(results.is_empty());
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn unreachable_switch_is_reported_not_fatal() {
        let switches = fleet_config().resolved_switches();
        let table = CameraTable::new();
        let driver = FakeDriver::reachable(&[SW1]);

        let results = sweep_orphans(
            &switches,
            &driver,
            &table,
            SessionOptions::default(),
            Duration::from_secs(4),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].ok);
        assert!(results[1].ok);
    }
}
