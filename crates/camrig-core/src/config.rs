// ── Fleet configuration ──
//
// Runtime configuration for the controller. Constructed by the binary from
// camrig-config; the core never reads config files or the environment.

use std::net::Ipv4Addr;
use std::time::Duration;

use camrig_api::{MulticastGroup, SessionOptions};

use crate::model::Switch;

/// Default factory management address of the rig's switches.
pub const FACTORY_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

/// Last octet the controller takes on a switch subnet while probing.
pub const PROBE_OCTET: u8 = 200;

/// One switch as configured; unset fields fall back to [`SwitchDefaults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSpec {
    pub interface: String,
    pub switch_address: Ipv4Addr,
    pub host_address: Ipv4Addr,
    pub default_address: Option<Ipv4Addr>,
    pub ports: Option<u16>,
}

/// Fleet-wide switch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchDefaults {
    pub default_address: Ipv4Addr,
    pub ports: u16,
    pub management_vlan: u16,
    pub prefix_len: u8,
}

impl Default for SwitchDefaults {
    fn default() -> Self {
        Self {
            default_address: FACTORY_ADDRESS,
            ports: 8,
            management_vlan: 1,
            prefix_len: 24,
        }
    }
}

/// Every interval and timeout the control loop uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// A camera not heard from for longer than this is offline.
    pub stale_after: Duration,
    /// Minimum gap between two power-cycles of the same camera.
    pub reboot_cooldown: Duration,
    /// How long PoE stays off during a power-cycle.
    pub pulse: Duration,
    /// Minimum gap between two orphan port sweeps.
    pub sweep_interval: Duration,
    pub ping_interval: Duration,
    /// Floor on the duration of one main loop iteration.
    pub loop_min_period: Duration,
    /// Pause between starting the heartbeat tasks and the first iteration.
    pub settle_delay: Duration,
    /// How long shutdown waits for an in-flight pass, so a pulse that
    /// already cut power can restore it.
    pub shutdown_grace: Duration,
    /// Attempts per switch during provisioning.
    pub provision_attempts: u32,
    /// Reachability checks during provisioning.
    pub probe: SessionOptions,
    /// Sessions that reconfigure a switch.
    pub configure: SessionOptions,
    /// Routine sessions: MAC tables and power-cycles.
    pub session: SessionOptions,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            reboot_cooldown: Duration::from_secs(60),
            pulse: Duration::from_millis(4000),
            sweep_interval: Duration::from_secs(60),
            ping_interval: Duration::from_secs(1),
            loop_min_period: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
            shutdown_grace: Duration::from_secs(15),
            provision_attempts: 5,
            probe: SessionOptions::new(Duration::from_secs(60), Duration::from_secs(60)),
            configure: SessionOptions::new(Duration::from_secs(120), Duration::from_secs(120)),
            session: SessionOptions::default(),
        }
    }
}

/// Configuration for a [`Controller`](crate::Controller).
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub switches: Vec<SwitchSpec>,
    pub defaults: SwitchDefaults,
    pub multicast: MulticastGroup,
    pub timing: Timing,
}

impl FleetConfig {
    /// Switches with defaults applied, in configured order.
    pub fn resolved_switches(&self) -> Vec<Switch> {
        self.switches
            .iter()
            .map(|spec| Switch {
                interface: spec.interface.clone(),
                switch_address: spec.switch_address,
                default_address: spec.default_address.unwrap_or(self.defaults.default_address),
                host_address: spec.host_address,
                ports: spec.ports.unwrap_or(self.defaults.ports),
            })
            .collect()
    }

    /// Controller address on every switch link.
    pub fn host_addresses(&self) -> Vec<Ipv4Addr> {
        self.switches.iter().map(|s| s.host_address).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn switch_fields_fall_back_to_defaults() {
        let config = FleetConfig {
            switches: vec![
                SwitchSpec {
                    interface: "eth0".into(),
                    switch_address: Ipv4Addr::new(10, 0, 1, 2),
                    host_address: Ipv4Addr::new(10, 0, 1, 1),
                    default_address: None,
                    ports: None,
                },
                SwitchSpec {
                    interface: "eth1".into(),
                    switch_address: Ipv4Addr::new(10, 0, 2, 2),
                    host_address: Ipv4Addr::new(10, 0, 2, 1),
                    default_address: Some(Ipv4Addr::new(192, 168, 1, 1)),
                    ports: Some(24),
                },
            ],
            defaults: SwitchDefaults::default(),
            multicast: MulticastGroup {
                group: Ipv4Addr::new(239, 255, 42, 1),
                command_port: 5000,
                reply_port: 5001,
            },
            timing: Timing::default(),
        };

        let switches = config.resolved_switches();
        assert_eq!(switches[0].default_address, FACTORY_ADDRESS);
        assert_eq!(switches[0].ports, 8);
        assert_eq!(switches[1].default_address, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(switches[1].ports, 24);
        assert_eq!(
            config.host_addresses(),
            vec![Ipv4Addr::new(10, 0, 1, 1), Ipv4Addr::new(10, 0, 2, 1)]
        );
    }
}
