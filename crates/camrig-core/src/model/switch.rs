// ── Switch domain types ──

use std::net::Ipv4Addr;

use serde::Serialize;

/// A managed PoE switch, resolved against the fleet defaults.
///
/// Identified by the controller-side link it hangs off. Static for the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Switch {
    pub interface: String,
    /// Operational management address.
    pub switch_address: Ipv4Addr,
    /// Factory management address.
    pub default_address: Ipv4Addr,
    /// Controller address on this link.
    pub host_address: Ipv4Addr,
    pub ports: u16,
}

impl Switch {
    /// Every port index on the switch, zero-based.
    pub fn port_indices(&self) -> std::ops::Range<u16> {
        0..self.ports
    }
}

/// `address` with its last octet replaced, e.g. the controller's probe
/// address on a switch subnet.
pub fn with_last_octet(address: Ipv4Addr, octet: u8) -> Ipv4Addr {
    let [a, b, c, _] = address.octets();
    Ipv4Addr::new(a, b, c, octet)
}

/// Dotted netmask for a prefix length (clamped to 32).
pub fn netmask(prefix_len: u8) -> Ipv4Addr {
    let bits = u32::from(prefix_len.min(32));
    let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
    Ipv4Addr::from(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_address_replaces_host_octet() {
        assert_eq!(
            with_last_octet(Ipv4Addr::new(10, 0, 1, 2), 200),
            Ipv4Addr::new(10, 0, 1, 200)
        );
    }

    #[test]
    fn netmask_from_prefix() {
        assert_eq!(netmask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(netmask(16), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(netmask(0), Ipv4Addr::UNSPECIFIED);
        assert_eq!(netmask(40), Ipv4Addr::BROADCAST);
    }
}
