// Host link manipulation
//
// The controller owns one NIC per switch uplink. Provisioning moves those
// links between the factory subnet and the operational one, so the core
// needs to add, replace and raise addresses. `IpRoute2` shells out to `ip`.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;

/// Address management for controller-side links.
#[async_trait]
pub trait HostInterfaces: Send + Sync {
    /// Add `address` to the link, keeping any existing ones.
    async fn add(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error>;

    /// Raise the link, first adding `address` if one is given.
    async fn up(&self, interface: &str, address: Option<Ipv4Addr>) -> Result<(), Error>;

    /// Raise the link with `address` as its only address.
    async fn up_only(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error>;

    /// Replace every address on the link with `address`.
    async fn set_address(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error>;
}

/// `HostInterfaces` backed by iproute2.
#[derive(Debug, Clone)]
pub struct IpRoute2 {
    prefix_len: u8,
    program: String,
}

impl IpRoute2 {
    pub fn new(prefix_len: u8) -> Self {
        Self {
            prefix_len,
            program: "ip".into(),
        }
    }

    /// Use a different binary (e.g. a `sudo` wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn cidr(&self, address: Ipv4Addr) -> String {
        format!("{address}/{}", self.prefix_len)
    }

    async fn ip(&self, interface: &str, args: &[&str]) -> Result<(), Error> {
        debug!(interface, ?args, "{}", self.program);
        let output = Command::new(&self.program).args(args).output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        // Re-adding an address that is already there is fine.
        if stderr.contains("File exists") || stderr.contains("Address already assigned") {
            return Ok(());
        }
        Err(Error::Interface {
            interface: interface.to_owned(),
            message: stderr.trim().to_owned(),
        })
    }

    async fn link_up(&self, interface: &str) -> Result<(), Error> {
        self.ip(interface, &["link", "set", "dev", interface, "up"])
            .await
    }

    async fn flush(&self, interface: &str) -> Result<(), Error> {
        self.ip(interface, &["-4", "addr", "flush", "dev", interface])
            .await
    }
}

#[async_trait]
impl HostInterfaces for IpRoute2 {
    async fn add(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        let cidr = self.cidr(address);
        self.ip(interface, &["addr", "add", &cidr, "dev", interface])
            .await
    }

    async fn up(&self, interface: &str, address: Option<Ipv4Addr>) -> Result<(), Error> {
        if let Some(address) = address {
            self.add(interface, address).await?;
        }
        self.link_up(interface).await
    }

    async fn up_only(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        self.set_address(interface, address).await?;
        self.link_up(interface).await
    }

    async fn set_address(&self, interface: &str, address: Ipv4Addr) -> Result<(), Error> {
        self.flush(interface).await?;
        self.add(interface, address).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cidr_uses_prefix_len() {
        let ip = IpRoute2::new(24);
        assert_eq!(ip.cidr(Ipv4Addr::new(10, 0, 1, 200)), "10.0.1.200/24");
    }

    #[tokio::test]
    async fn failing_program_reports_interface() {
        let ip = IpRoute2::new(24).with_program("false");
        let err = ip.up("eth9", None).await.unwrap_err();
        assert!(matches!(err, Error::Interface { ref interface, .. } if interface == "eth9"));
    }
}
