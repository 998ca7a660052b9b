// ── Switch auto-provisioning ──
//
// Switches arrive with a factory management address and default settings.
// On startup each one is probed at its operational address; if it is not
// there it is found on the factory address, reconfigured (RSTP with
// portfast everywhere, quiet console), moved to the operational address
// and the running config persisted. The controller's own link addresses
// follow the switch between the two subnets.

use std::net::Ipv4Addr;

use futures::future::try_join_all;
use serde::Serialize;
use strum::Display;
use tracing::{debug, info};

use camrig_api::{HostInterfaces, SwitchDriver, SwitchSession};

use crate::config::{PROBE_OCTET, SwitchDefaults, Timing};
use crate::error::CoreError;
use crate::model::{Switch, netmask, with_last_octet};
use crate::retry::retry;
use crate::session::close_after;

const QUIET_CONSOLE: &[&str] = &["no logging monitor", "no logging buffer"];
const ENABLE_RSTP: &[&str] = &["spanning-tree", "spanning-tree mode rstp"];
const PORTFAST: &[&str] = &["spanning-tree", "spanning-tree common-config portfast enable"];
const SAVE_CONFIG: &str = "copy running-config startup-config";

/// Where a switch is in the provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionState {
    Unprobed,
    FactoryDefault,
    Configuring,
    IpReassigned,
    Saved,
    Operational,
}

/// How a switch reached [`ProvisionState::Operational`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum ProvisionOutcome {
    /// Already answering on its operational address.
    AlreadyOperational,
    /// Reconfigured from factory defaults.
    Configured { attempts: u32 },
}

/// Result of provisioning one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub interface: String,
    pub switch_address: Ipv4Addr,
    #[serde(flatten)]
    pub outcome: ProvisionOutcome,
}

/// Drives the provisioning sequence against a set of switches.
pub struct Provisioner<'a> {
    driver: &'a dyn SwitchDriver,
    interfaces: &'a dyn HostInterfaces,
    defaults: &'a SwitchDefaults,
    timing: &'a Timing,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        driver: &'a dyn SwitchDriver,
        interfaces: &'a dyn HostInterfaces,
        defaults: &'a SwitchDefaults,
        timing: &'a Timing,
    ) -> Self {
        Self {
            driver,
            interfaces,
            defaults,
            timing,
        }
    }

    /// Give every controller link its host address and bring it up.
    pub async fn prepare_interfaces(&self, switches: &[Switch]) -> Result<(), CoreError> {
        try_join_all(switches.iter().map(|switch| async move {
            self.interfaces
                .add(&switch.interface, switch.host_address)
                .await
                .map_err(|source| interface_error(switch, source))
        }))
        .await?;

        try_join_all(switches.iter().map(|switch| async move {
            self.interfaces
                .up(&switch.interface, None)
                .await
                .map_err(|source| interface_error(switch, source))
        }))
        .await?;
        Ok(())
    }

    /// `true` if every switch already answers on its operational address.
    ///
    /// Stops at the first switch that does not.
    pub async fn fleet_operational(&self, switches: &[Switch]) -> bool {
        for switch in switches {
            if !self
                .driver
                .probe(switch.switch_address, self.timing.session)
                .await
            {
                info!(
                    interface = %switch.interface,
                    address = %switch.switch_address,
                    "switch not answering on its operational address"
                );
                return false;
            }
        }
        true
    }

    /// Provision every switch in order, then bring all links fully up.
    ///
    /// The first switch that cannot be provisioned aborts the whole run;
    /// later switches are not touched.
    pub async fn provision_all(&self, switches: &[Switch]) -> Result<Vec<ProvisionReport>, CoreError> {
        let mut reports = Vec::with_capacity(switches.len());
        for switch in switches {
            reports.push(self.provision(switch).await?);
        }

        debug!("enabling all controller links");
        try_join_all(switches.iter().map(|switch| async move {
            self.interfaces
                .up(&switch.interface, Some(switch.host_address))
                .await
                .map_err(|source| interface_error(switch, source))
        }))
        .await?;

        Ok(reports)
    }

    /// Bring one switch to [`ProvisionState::Operational`].
    pub async fn provision(&self, switch: &Switch) -> Result<ProvisionReport, CoreError> {
        transition(switch, ProvisionState::Unprobed);

        let outcome = if self.probe(switch, switch.switch_address).await? {
            ProvisionOutcome::AlreadyOperational
        } else if self.probe(switch, switch.default_address).await? {
            transition(switch, ProvisionState::FactoryDefault);
            let attempts = retry(self.timing.provision_attempts, |attempt| async move {
                self.configure(switch).await.map(|()| attempt)
            })
            .await
            .map_err(|source| CoreError::Provisioning {
                interface: switch.interface.clone(),
                attempts: self.timing.provision_attempts.max(1),
                source,
            })?;
            ProvisionOutcome::Configured { attempts }
        } else {
            return Err(CoreError::SwitchUnreachable {
                interface: switch.interface.clone(),
                switch_address: switch.switch_address,
                default_address: switch.default_address,
            });
        };

        transition(switch, ProvisionState::Operational);
        Ok(ProvisionReport {
            interface: switch.interface.clone(),
            switch_address: switch.switch_address,
            outcome,
        })
    }

    /// Re-address the link onto `address`'s subnet and check for a switch.
    async fn probe(&self, switch: &Switch, address: Ipv4Addr) -> Result<bool, CoreError> {
        debug!(interface = %switch.interface, %address, "probing switch");
        self.interfaces
            .up_only(&switch.interface, with_last_octet(address, PROBE_OCTET))
            .await
            .map_err(|source| interface_error(switch, source))?;
        Ok(self.driver.probe(address, self.timing.probe).await)
    }

    /// One full configuration attempt from factory defaults.
    async fn configure(&self, switch: &Switch) -> Result<(), camrig_api::Error> {
        let factory = switch.default_address;
        let desired = switch.switch_address;
        let options = self.timing.configure;

        transition(switch, ProvisionState::Configuring);
        let mut session = self.driver.open(factory, options).await?;
        let result = apply_base_config(session.as_mut(), switch.ports).await;
        close_after(session, factory, result).await?;

        self.driver
            .change_ip_address(
                factory,
                self.defaults.management_vlan,
                desired,
                netmask(self.defaults.prefix_len),
                options,
            )
            .await?;
        self.interfaces
            .set_address(&switch.interface, with_last_octet(desired, PROBE_OCTET))
            .await?;
        transition(switch, ProvisionState::IpReassigned);

        let mut session = self.driver.open(desired, options).await?;
        let result = session.privileged(SAVE_CONFIG).await.map(drop);
        close_after(session, desired, result).await?;
        transition(switch, ProvisionState::Saved);
        Ok(())
    }
}

async fn apply_base_config(
    session: &mut dyn SwitchSession,
    ports: u16,
) -> Result<(), camrig_api::Error> {
    session.config(QUIET_CONSOLE).await?;
    session.config(ENABLE_RSTP).await?;
    for port in 0..ports {
        session.port(port, PORTFAST).await?;
    }
    Ok(())
}

fn transition(switch: &Switch, state: ProvisionState) {
    info!(interface = %switch.interface, %state, "provisioning");
}

fn interface_error(switch: &Switch, source: camrig_api::Error) -> CoreError {
    CoreError::Interface {
        interface: switch.interface.clone(),
        source,
    }
}
