// ── Discovery & heartbeat handling ──
//
// Every ping is answered by each camera with a datagram that starts with
// its MAC address. A reply from an unknown MAC registers a new camera; a
// reply from a camera that was offline or moved address recovers it.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use camrig_api::{CameraPatch, CameraRecord, Datagram, Registry};

use crate::error::CoreError;
use crate::model::MacAddress;
use crate::store::{CameraTable, Observation};

/// Sender identity of a heartbeat reply, if the payload is well formed.
pub fn parse_reply(datagram: &Datagram) -> Option<(MacAddress, IpAddr)> {
    match MacAddress::from_payload(&datagram.payload) {
        Ok(mac) => Some((mac, datagram.from.ip())),
        Err(e) => {
            debug!(from = %datagram.from, error = %e, "dropping malformed heartbeat");
            None
        }
    }
}

/// One accepted heartbeat and what it changed in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub mac: MacAddress,
    pub address: IpAddr,
    pub observation: Observation,
}

impl Heartbeat {
    /// `true` if the registry has to hear about this reply.
    pub fn needs_persisting(&self) -> bool {
        self.observation != Observation::Refreshed
    }
}

/// Apply one heartbeat reply to the table. Never suspends, so the
/// receive loop keeps pace with the fleet.
pub fn record_reply(
    table: &CameraTable,
    datagram: &Datagram,
    now: DateTime<Utc>,
) -> Option<Heartbeat> {
    let (mac, address) = parse_reply(datagram)?;
    let observation = table.observe(mac.clone(), address, now);
    match observation {
        Observation::Discovered => info!(%mac, %address, "camera discovered"),
        Observation::Recovered => info!(%mac, %address, "camera back online"),
        Observation::Refreshed => {}
    }
    Some(Heartbeat {
        mac,
        address,
        observation,
    })
}

/// Tell the registry about a discovered or recovered camera.
pub async fn persist(registry: &dyn Registry, heartbeat: &Heartbeat) -> Result<(), CoreError> {
    let Heartbeat {
        mac,
        address,
        observation,
    } = heartbeat;
    let result = match observation {
        Observation::Discovered => {
            let record = CameraRecord {
                id: mac.to_string(),
                address: *address,
                mac: mac.to_string(),
                online: true,
            };
            registry.create(&record).await
        }
        Observation::Recovered => {
            registry
                .patch(mac.as_str(), &CameraPatch::recovered(*address))
                .await
        }
        Observation::Refreshed => Ok(()),
    };
    result.map_err(|source| CoreError::Registry {
        id: mac.to_string(),
        source,
    })
}
