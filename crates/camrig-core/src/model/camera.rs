// ── Camera domain types ──

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::MacAddress;

/// Where a camera is physically plugged in.
///
/// Learned from switch MAC tables; all three parts are known together or
/// not at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Controller-side link the switch hangs off.
    pub interface: String,
    pub switch_address: Ipv4Addr,
    /// Zero-based port index.
    pub port: u16,
}

/// A camera as tracked by the controller. Cameras are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub mac: MacAddress,
    pub address: IpAddr,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_reboot: Option<DateTime<Utc>>,
    pub attachment: Option<Attachment>,
}

impl Camera {
    /// A camera that just answered a ping.
    pub fn discovered(mac: MacAddress, address: IpAddr, now: DateTime<Utc>) -> Self {
        Self {
            mac,
            address,
            online: true,
            last_seen: Some(now),
            last_reboot: None,
            attachment: None,
        }
    }

    /// `true` if a heartbeat arrived within `window` of `now`.
    pub fn seen_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.last_seen
            .is_some_and(|seen| !elapsed_beyond(seen, now, window))
    }

    /// `true` if the reboot cooldown has passed (or it was never rebooted).
    pub fn reboot_allowed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_reboot
            .is_none_or(|rebooted| elapsed_beyond(rebooted, now, cooldown))
    }
}

/// Strictly more than `window` has passed between `since` and `now`.
pub(crate) fn elapsed_beyond(since: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match chrono::Duration::from_std(window) {
        Ok(window) => now.signed_duration_since(since) > window,
        // Windows too large for chrono never elapse.
        Err(_) => false,
    }
}
