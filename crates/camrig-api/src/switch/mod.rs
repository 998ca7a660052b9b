// Switch session surface
//
// The core talks to managed PoE switches through these two traits. A
// `SwitchSession` is one authenticated CLI connection scoped to a single
// operation; callers always `close()` it, on success or failure.
// `TelnetDriver` is the stock implementation for the rig's TP-Link
// style CLI switches.

mod parse;
mod telnet;

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

pub use parse::{mac_table, port_interface};
pub use telnet::{SwitchCredentials, TelnetDriver};

/// Connect and per-command timeouts for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Budget for TCP connect plus login.
    pub timeout: Duration,
    /// Budget for each command exchange.
    pub exec_timeout: Duration,
}

impl SessionOptions {
    pub const fn new(timeout: Duration, exec_timeout: Duration) -> Self {
        Self {
            timeout,
            exec_timeout,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(30))
    }
}

/// One row of a switch's MAC address table. `port` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMac {
    pub port: u16,
    pub mac: String,
}

/// An open, authenticated CLI session on one switch.
#[async_trait]
pub trait SwitchSession: Send {
    /// Run commands in global configuration mode.
    async fn config(&mut self, commands: &[&str]) -> Result<(), Error>;

    /// Run commands in the interface configuration of port `index`.
    async fn port(&mut self, index: u16, commands: &[&str]) -> Result<(), Error>;

    /// Run a single privileged-mode command and return its output.
    async fn privileged(&mut self, command: &str) -> Result<String, Error>;

    /// Fetch the learned port → MAC table.
    async fn port_mac_table(&mut self) -> Result<Vec<PortMac>, Error>;

    /// De-energize PoE on every listed port, wait `duration`, re-energize.
    ///
    /// All ports share one pulse: they go dark together and come back
    /// together.
    async fn power_cycle(&mut self, ports: &[u16], duration: Duration) -> Result<(), Error>;

    /// Log out and release the connection.
    async fn close(self: Box<Self>) -> Result<(), Error>;
}

/// Factory for switch sessions plus the operations that outlive one.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    /// `true` if a session can be opened at `address` within `options`.
    async fn probe(&self, address: Ipv4Addr, options: SessionOptions) -> bool;

    async fn open(
        &self,
        address: Ipv4Addr,
        options: SessionOptions,
    ) -> Result<Box<dyn SwitchSession>, Error>;

    /// Move the switch's management address on `vlan` from `current` to
    /// `new`. The switch drops the session as soon as the address changes,
    /// so this never waits for a prompt after the final command.
    async fn change_ip_address(
        &self,
        current: Ipv4Addr,
        vlan: u16,
        new: Ipv4Addr,
        mask: Ipv4Addr,
        options: SessionOptions,
    ) -> Result<(), Error>;
}
