// ── Core error types ──
//
// Errors from camrig-core carry the fleet context the adapters lack (which
// switch, which camera) and a severity. Only provisioning ever retries;
// elsewhere a transient failure is logged and the next loop pass tries again.

use std::net::Ipv4Addr;

use strum::Display;
use thiserror::Error;

/// How the caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Worth another attempt; the device or service may recover.
    Transient,
    /// Startup cannot continue.
    Fatal,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Provisioning ─────────────────────────────────────────────────
    #[error(
        "Switch on {interface} unreachable at both {switch_address} and factory address {default_address}"
    )]
    SwitchUnreachable {
        interface: String,
        switch_address: Ipv4Addr,
        default_address: Ipv4Addr,
    },

    #[error("Provisioning switch on {interface} failed after {attempts} attempts")]
    Provisioning {
        interface: String,
        attempts: u32,
        #[source]
        source: camrig_api::Error,
    },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Switch {address} ({interface}) failed")]
    Switch {
        interface: String,
        address: Ipv4Addr,
        #[source]
        source: camrig_api::Error,
    },

    #[error("Registry update for {id} failed")]
    Registry {
        id: String,
        #[source]
        source: camrig_api::Error,
    },

    #[error("Multicast command failed")]
    Multicast(#[source] camrig_api::Error),

    #[error("Host interface {interface} failed")]
    Interface {
        interface: String,
        #[source]
        source: camrig_api::Error,
    },

    #[error("Controller has not been started")]
    NotStarted,
}

impl CoreError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::SwitchUnreachable { .. }
            | Self::Provisioning { .. }
            | Self::NotStarted => Severity::Fatal,
            Self::Switch { source, .. }
            | Self::Registry { source, .. }
            | Self::Multicast(source)
            | Self::Interface { source, .. } => {
                if source.is_transient() {
                    Severity::Transient
                } else {
                    Severity::Fatal
                }
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.severity() == Severity::Transient
    }
}
