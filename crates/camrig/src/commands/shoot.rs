//! `camrig shoot`: one capture, without running the controller.

use std::sync::Arc;

use camrig_api::MulticastSender;
use camrig_core::Broadcaster;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(cfg: &camrig_config::Config, global: &GlobalOpts) -> Result<(), CliError> {
    let fleet = cfg.to_fleet_config()?;
    let group = fleet.multicast;

    let sender = MulticastSender::bind(group, &fleet.host_addresses())
        .await
        .map_err(|e| CliError::network("multicast sender", e))?;
    Broadcaster::new(Arc::new(sender)).shoot().await?;

    if !global.quiet {
        eprintln!("shoot sent to {}:{}", group.group, group.command_port);
    }
    Ok(())
}
