// ── Topology mapping ──
//
// Each pass reads the MAC table of every switch and records which port
// each known camera is plugged into. Only cameras already in the table are
// touched, and an attachment is never cleared because a camera dropped
// out of a MAC table; it is only replaced by a newer observation.

use futures::future::join_all;
use tracing::{debug, warn};

use camrig_api::{CameraPatch, PortMac, Registry, SessionOptions, SwitchDriver};

use crate::error::CoreError;
use crate::model::{Attachment, MacAddress, Switch};
use crate::session::close_after;
use crate::store::CameraTable;

/// Query every switch in order and update camera attachments.
///
/// Returns the number of attachments that changed. A switch that cannot be
/// queried is logged and skipped.
pub async fn map_topology(
    switches: &[Switch],
    driver: &dyn SwitchDriver,
    registry: &dyn Registry,
    table: &CameraTable,
    options: SessionOptions,
) -> usize {
    let mut changed = 0;
    for switch in switches {
        let rows = match read_mac_table(driver, switch, options).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(interface = %switch.interface, error = %e, "MAC table query failed");
                continue;
            }
        };
        changed += link_cameras(switch, &rows, registry, table).await;
    }
    changed
}

async fn read_mac_table(
    driver: &dyn SwitchDriver,
    switch: &Switch,
    options: SessionOptions,
) -> Result<Vec<PortMac>, CoreError> {
    let wrap = |source| CoreError::Switch {
        interface: switch.interface.clone(),
        address: switch.switch_address,
        source,
    };
    let mut session = driver
        .open(switch.switch_address, options)
        .await
        .map_err(wrap)?;
    let result = session.port_mac_table().await;
    close_after(session, switch.switch_address, result)
        .await
        .map_err(wrap)
}

/// Apply one switch's rows to the table and persist what changed.
async fn link_cameras(
    switch: &Switch,
    rows: &[PortMac],
    registry: &dyn Registry,
    table: &CameraTable,
) -> usize {
    let updates: Vec<(MacAddress, Attachment)> = rows
        .iter()
        .filter_map(|row| {
            let mac = MacAddress::parse(&row.mac).ok()?;
            let attachment = Attachment {
                interface: switch.interface.clone(),
                switch_address: switch.switch_address,
                port: row.port,
            };
            table.attach(&mac, &attachment).then_some((mac, attachment))
        })
        .collect();

    let persisted = updates.iter().map(|(mac, attachment)| async move {
        debug!(
            interface = %attachment.interface,
            port = attachment.port,
            %mac,
            "linking camera to switch port"
        );
        let patch = CameraPatch::attachment(
            &attachment.interface,
            attachment.switch_address,
            attachment.port,
        );
        if let Err(e) = registry.patch(mac.as_str(), &patch).await {
            warn!(%mac, error = %e, "registry attachment update failed");
        }
    });
    join_all(persisted).await;

    updates.len()
}
