//! Device-facing adapters for the camrig fleet controller.
//!
//! Everything the control loop touches outside its own memory goes through
//! a trait defined here, with one stock implementation each:
//!
//! - **[`SwitchDriver`] / [`SwitchSession`]**: CLI sessions on managed PoE
//!   switches ([`TelnetDriver`]).
//! - **[`Registry`]**: camera record persistence ([`RegistryClient`], HTTP
//!   JSON via `reqwest`).
//! - **[`CommandSender`]**: one-byte multicast commands
//!   ([`MulticastSender`]); replies arrive on a [`ReplyListener`].
//! - **[`HostInterfaces`]**: controller-side link addressing ([`IpRoute2`]).

pub mod error;
pub mod interfaces;
pub mod multicast;
pub mod registry;
pub mod switch;
pub mod transport;

pub use error::Error;
pub use interfaces::{HostInterfaces, IpRoute2};
pub use multicast::{
    CameraCommand, CommandSender, Datagram, MulticastGroup, MulticastSender, ReplyListener,
};
pub use registry::{CameraPatch, CameraRecord, Registry, RegistryClient};
pub use switch::{
    PortMac, SessionOptions, SwitchCredentials, SwitchDriver, SwitchSession, TelnetDriver,
};
pub use transport::{TlsMode, TransportConfig};
