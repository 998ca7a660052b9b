// In-memory stand-ins for the device adapters, shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use camrig_api::{
    CameraCommand, CameraPatch, CameraRecord, CommandSender, Error, HostInterfaces,
    MulticastGroup, PortMac, Registry, SessionOptions, SwitchDriver, SwitchSession,
};

use crate::config::{FleetConfig, SwitchDefaults, SwitchSpec, Timing};
use crate::model::{Attachment, MacAddress};

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub(crate) fn mac(s: &str) -> MacAddress {
    MacAddress::parse(s).unwrap()
}

pub(crate) fn cam_ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 1, last))
}

pub(crate) fn attachment(interface: &str, switch: Ipv4Addr, port: u16) -> Attachment {
    Attachment {
        interface: interface.into(),
        switch_address: switch,
        port,
    }
}

pub(crate) const SW0: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 2);
pub(crate) const SW1: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
pub(crate) const FACTORY: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

/// Two four-port switches on eth0 / eth1.
pub(crate) fn fleet_config() -> FleetConfig {
    FleetConfig {
        switches: vec![
            SwitchSpec {
                interface: "eth0".into(),
                switch_address: SW0,
                host_address: Ipv4Addr::new(10, 0, 1, 1),
                default_address: None,
                ports: None,
            },
            SwitchSpec {
                interface: "eth1".into(),
                switch_address: SW1,
                host_address: Ipv4Addr::new(10, 0, 2, 1),
                default_address: None,
                ports: None,
            },
        ],
        defaults: SwitchDefaults {
            default_address: FACTORY,
            ports: 4,
            ..SwitchDefaults::default()
        },
        multicast: MulticastGroup {
            group: Ipv4Addr::new(239, 255, 42, 1),
            command_port: 5000,
            reply_port: 5001,
        },
        timing: Timing::default(),
    }
}

// ── Switch driver ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DriverCall {
    Probe(Ipv4Addr),
    Open(Ipv4Addr),
    Config(Ipv4Addr, Vec<String>),
    Port(Ipv4Addr, u16, Vec<String>),
    Privileged(Ipv4Addr, String),
    MacTable(Ipv4Addr),
    /// Power cut on `ports`.
    PowerCycle(Ipv4Addr, Vec<u16>, Duration),
    PowerRestored(Ipv4Addr, Vec<u16>),
    Close(Ipv4Addr),
    ChangeIp {
        current: Ipv4Addr,
        vlan: u16,
        new: Ipv4Addr,
        mask: Ipv4Addr,
    },
}

#[derive(Debug, Default)]
struct DriverState {
    reachable: HashSet<Ipv4Addr>,
    tables: HashMap<Ipv4Addr, Vec<PortMac>>,
    failing_power: HashSet<Ipv4Addr>,
    refused: HashSet<Ipv4Addr>,
    timed_pulses: bool,
    calls: Vec<DriverCall>,
}

/// Scriptable switch fleet. Sessions open only on reachable addresses.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDriver {
    state: Arc<Mutex<DriverState>>,
}

impl FakeDriver {
    pub(crate) fn reachable(addresses: &[Ipv4Addr]) -> Self {
        let driver = Self::default();
        driver.state.lock().unwrap().reachable = addresses.iter().copied().collect();
        driver
    }

    pub(crate) fn set_table(&self, address: Ipv4Addr, rows: &[(u16, &str)]) {
        let rows = rows
            .iter()
            .map(|(port, mac)| PortMac {
                port: *port,
                mac: (*mac).to_owned(),
            })
            .collect();
        self.state.lock().unwrap().tables.insert(address, rows);
    }

    /// Answer probes on `address` but reject every session.
    pub(crate) fn refuse_sessions(&self, address: Ipv4Addr) {
        self.state.lock().unwrap().refused.insert(address);
    }

    pub(crate) fn fail_power_cycles(&self, address: Ipv4Addr) {
        self.state.lock().unwrap().failing_power.insert(address);
    }

    /// Keep PoE off for the requested duration instead of returning at once.
    pub(crate) fn timed_pulses(&self) {
        self.state.lock().unwrap().timed_pulses = true;
    }

    pub(crate) fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than probes, i.e. everything that needed a session.
    pub(crate) fn session_calls(&self) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, DriverCall::Probe(_)))
            .collect()
    }

    pub(crate) fn power_cycles(&self) -> Vec<(Ipv4Addr, Vec<u16>, Duration)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::PowerCycle(address, ports, duration) => {
                    Some((address, ports, duration))
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn restored(&self) -> Vec<(Ipv4Addr, Vec<u16>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::PowerRestored(address, ports) => Some((address, ports)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DriverCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl SwitchDriver for FakeDriver {
    async fn probe(&self, address: Ipv4Addr, _options: SessionOptions) -> bool {
        self.record(DriverCall::Probe(address));
        self.state.lock().unwrap().reachable.contains(&address)
    }

    async fn open(
        &self,
        address: Ipv4Addr,
        _options: SessionOptions,
    ) -> Result<Box<dyn SwitchSession>, Error> {
        self.record(DriverCall::Open(address));
        let accepted = {
            let state = self.state.lock().unwrap();
            state.reachable.contains(&address) && !state.refused.contains(&address)
        };
        if !accepted {
            return Err(Error::Connect {
                address,
                reason: "no route to host".into(),
            });
        }
        Ok(Box::new(FakeSession {
            driver: self.clone(),
            address,
        }))
    }

    async fn change_ip_address(
        &self,
        current: Ipv4Addr,
        vlan: u16,
        new: Ipv4Addr,
        mask: Ipv4Addr,
        _options: SessionOptions,
    ) -> Result<(), Error> {
        self.record(DriverCall::ChangeIp {
            current,
            vlan,
            new,
            mask,
        });
        let mut state = self.state.lock().unwrap();
        if !state.reachable.remove(&current) {
            return Err(Error::Connect {
                address: current,
                reason: "no route to host".into(),
            });
        }
        state.reachable.insert(new);
        Ok(())
    }
}

struct FakeSession {
    driver: FakeDriver,
    address: Ipv4Addr,
}

fn owned(commands: &[&str]) -> Vec<String> {
    commands.iter().map(|c| (*c).to_owned()).collect()
}

#[async_trait]
impl SwitchSession for FakeSession {
    async fn config(&mut self, commands: &[&str]) -> Result<(), Error> {
        self.driver
            .record(DriverCall::Config(self.address, owned(commands)));
        Ok(())
    }

    async fn port(&mut self, index: u16, commands: &[&str]) -> Result<(), Error> {
        self.driver
            .record(DriverCall::Port(self.address, index, owned(commands)));
        Ok(())
    }

    async fn privileged(&mut self, command: &str) -> Result<String, Error> {
        self.driver
            .record(DriverCall::Privileged(self.address, command.to_owned()));
        Ok(String::new())
    }

    async fn port_mac_table(&mut self) -> Result<Vec<PortMac>, Error> {
        self.driver.record(DriverCall::MacTable(self.address));
        let state = self.driver.state.lock().unwrap();
        Ok(state.tables.get(&self.address).cloned().unwrap_or_default())
    }

    async fn power_cycle(&mut self, ports: &[u16], duration: Duration) -> Result<(), Error> {
        let (failing, timed) = {
            let state = self.driver.state.lock().unwrap();
            (state.failing_power.contains(&self.address), state.timed_pulses)
        };
        if failing {
            return Err(Error::Command {
                command: "power inline supply disable".into(),
                output: "Error: PoE controller busy".into(),
            });
        }
        self.driver.record(DriverCall::PowerCycle(
            self.address,
            ports.to_vec(),
            duration,
        ));
        if timed {
            tokio::time::sleep(duration).await;
        }
        self.driver
            .record(DriverCall::PowerRestored(self.address, ports.to_vec()));
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), Error> {
        self.driver.record(DriverCall::Close(self.address));
        Ok(())
    }
}

// ── Registry ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryCall {
    Create(CameraRecord),
    Patch(String, CameraPatch),
}

#[derive(Debug)]
pub(crate) struct FakeRegistry {
    calls: Mutex<Vec<RegistryCall>>,
    failing: Mutex<bool>,
    held: watch::Sender<bool>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            failing: Mutex::default(),
            held: watch::channel(false).0,
        }
    }
}

impl FakeRegistry {
    pub(crate) fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn patches(&self) -> Vec<(String, CameraPatch)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RegistryCall::Patch(id, patch) => Some((id, patch)),
                RegistryCall::Create(_) => None,
            })
            .collect()
    }

    pub(crate) fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    /// Park every request after it is recorded until [`release`](Self::release).
    pub(crate) fn hold(&self) {
        self.held.send_replace(true);
    }

    pub(crate) fn release(&self) {
        self.held.send_replace(false);
    }

    async fn outcome(&self) -> Result<(), Error> {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        if *self.failing.lock().unwrap() {
            Err(Error::Registry {
                status: 503,
                message: "unavailable".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn create(&self, record: &CameraRecord) -> Result<(), Error> {
        self.calls
            .lock()
            .unwrap()
            .push(RegistryCall::Create(record.clone()));
        self.outcome().await
    }

    async fn patch(&self, id: &str, patch: &CameraPatch) -> Result<(), Error> {
        self.calls
            .lock()
            .unwrap()
            .push(RegistryCall::Patch(id.to_owned(), patch.clone()));
        self.outcome().await
    }
}

// ── Host interfaces ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct FakeInterfaces {
    calls: Mutex<Vec<String>>,
}

impl FakeInterfaces {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, line: String) {
        self.calls.lock().unwrap().push(line);
    }
}

#[async_trait]
impl HostInterfaces for FakeInterfaces {
    async fn add(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        self.record(format!("add {interface} {address}"));
        Ok(())
    }

    async fn up(&self, interface: &str, address: Option<Ipv4Addr>) -> Result<(), Error> {
        match address {
            Some(address) => self.record(format!("up {interface} {address}")),
            None => self.record(format!("up {interface}")),
        }
        Ok(())
    }

    async fn up_only(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        self.record(format!("up_only {interface} {address}"));
        Ok(())
    }

    async fn set_address(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        self.record(format!("set_address {interface} {address}"));
        Ok(())
    }
}

// ── Command sender ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct FakeSender {
    sent: Mutex<Vec<CameraCommand>>,
    failing: Mutex<bool>,
}

impl FakeSender {
    pub(crate) fn sent(&self) -> Vec<CameraCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }
}

#[async_trait]
impl CommandSender for FakeSender {
    async fn send(&self, command: CameraCommand) -> Result<(), Error> {
        if *self.failing.lock().unwrap() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NetworkUnreachable,
                "network unreachable",
            )));
        }
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}
