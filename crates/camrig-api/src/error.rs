use std::net::Ipv4Addr;

use thiserror::Error;

/// Top-level error type for the `camrig-api` crate.
///
/// Covers every failure mode of the device-facing adapters: switch CLI
/// sessions, the registry HTTP client, multicast sockets and host link
/// manipulation. `camrig-core` wraps these with the context it knows about
/// (which switch, which camera) and decides what is fatal.
#[derive(Debug, Error)]
pub enum Error {
    // ── Switch sessions ─────────────────────────────────────────────
    /// TCP connect to the switch failed or was refused.
    #[error("Cannot connect to switch at {address}: {reason}")]
    Connect { address: Ipv4Addr, reason: String },

    /// The switch rejected the configured credentials.
    #[error("Login rejected by switch at {address}")]
    Login { address: Ipv4Addr },

    /// A connect or command exchange did not finish in time.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    /// The switch answered a command with an error message.
    #[error("Switch rejected `{command}`: {output}")]
    Command { command: String, output: String },

    /// The switch closed the connection mid-exchange.
    #[error("Session to {address} closed unexpectedly")]
    SessionClosed { address: Ipv4Addr },

    /// Switch output could not be understood.
    #[error("Unexpected switch output: {0}")]
    Parse(String),

    // ── Registry ────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The registry answered with a non-success status.
    #[error("Registry error (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    // ── Host ────────────────────────────────────────────────────────
    /// Socket or process I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An `ip` invocation against a host link failed.
    #[error("Interface {interface}: {message}")]
    Interface { interface: String, message: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Registry { status, .. } => *status >= 500,
            Self::Connect { .. }
            | Self::Timeout { .. }
            | Self::Command { .. }
            | Self::SessionClosed { .. }
            | Self::Io(_) => true,
            Self::Login { .. }
            | Self::Parse(_)
            | Self::InvalidUrl(_)
            | Self::Interface { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_timeouts_are_transient() {
        let err = Error::Timeout {
            operation: "connect to 10.0.1.2".into(),
            timeout_secs: 60,
        };
        assert!(err.is_transient());
    }

    #[test]
    fn registry_client_errors_are_not_transient() {
        let err = Error::Registry {
            status: 400,
            message: "bad patch".into(),
        };
        assert!(!err.is_transient());

        let err = Error::Registry {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn login_rejection_is_permanent() {
        let err = Error::Login {
            address: Ipv4Addr::new(192, 168, 0, 1),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Login rejected by switch at 192.168.0.1");
    }
}
