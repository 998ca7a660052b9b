// Device registry surface
//
// The registry is the persistence service behind the admin front-end. The
// controller only ever creates camera records and patches fields on them;
// both calls are safe to repeat, and the controller never retries them
// itself (the next loop pass re-derives whatever was lost).

mod client;

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use client::RegistryClient;

/// Full camera record, sent once on first discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraRecord {
    /// Registry key. Always the MAC address.
    pub id: String,
    pub address: IpAddr,
    pub mac: String,
    pub online: bool,
}

/// Partial update. Absent fields are left untouched by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_address: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl CameraPatch {
    pub fn online(online: bool) -> Self {
        Self {
            online: Some(online),
            ..Self::default()
        }
    }

    pub fn recovered(address: IpAddr) -> Self {
        Self {
            address: Some(address),
            online: Some(true),
            ..Self::default()
        }
    }

    pub fn attachment(interface: &str, switch_address: Ipv4Addr, port: u16) -> Self {
        Self {
            interface: Some(interface.to_owned()),
            switch_address: Some(switch_address),
            port: Some(port),
            ..Self::default()
        }
    }
}

/// Persistence contract the controller core depends on.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn create(&self, record: &CameraRecord) -> Result<(), Error>;

    async fn patch(&self, id: &str, patch: &CameraPatch) -> Result<(), Error>;
}
