//! `camrig run`: the long-running controller.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use camrig_api::{MulticastSender, ReplyListener};
use camrig_core::Controller;

use crate::cli::GlobalOpts;
use crate::commands::{build_services, fleet_config};
use crate::error::CliError;
use crate::http;

pub async fn handle(cfg: &camrig_config::Config, global: &GlobalOpts) -> Result<(), CliError> {
    let fleet = fleet_config(cfg, global)?;
    let hosts = fleet.host_addresses();
    let group = fleet.multicast;
    let controller = Controller::new(fleet, build_services(cfg)?);

    for report in controller.provision().await? {
        info!(
            interface = %report.interface,
            address = %report.switch_address,
            outcome = ?report.outcome,
            "switch ready"
        );
    }

    let sender = MulticastSender::bind(group, &hosts)
        .await
        .map_err(|e| CliError::network("multicast sender", e))?;
    let replies = ReplyListener::bind(group, &hosts)
        .await
        .map_err(|e| CliError::network("reply listener", e))?;
    let listener = TcpListener::bind(cfg.http.listen)
        .await
        .map_err(|e| CliError::network("http listener", e))?;

    controller.start(Arc::new(sender), replies).await;

    let cancel = controller.cancellation();
    let server = tokio::spawn(http::serve(listener, controller.clone(), cancel.clone()));

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupt received, shutting down");
        }
        () = cancel.cancelled() => {}
    }

    controller.shutdown().await;
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "http server failed"),
        Err(e) => warn!(error = %e, "http server task panicked"),
    }
    Ok(())
}
