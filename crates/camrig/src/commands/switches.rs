//! `camrig switches`: the configured switches, optionally probed.

use futures::future::join_all;
use serde::Serialize;
use tabled::Tabled;

use camrig_api::{SwitchDriver, TelnetDriver};
use camrig_core::Switch;

use crate::cli::{GlobalOpts, SwitchesArgs};
use crate::commands::fleet_config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct SwitchStatus {
    #[serde(flatten)]
    switch: Switch,
    #[serde(skip_serializing_if = "Option::is_none")]
    reachable: Option<bool>,
}

#[derive(Tabled)]
struct SwitchRow {
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Switch")]
    switch: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Factory")]
    factory: String,
    #[tabled(rename = "Ports")]
    ports: u16,
    #[tabled(rename = "Reachable")]
    reachable: &'static str,
}

fn switch_row(s: &SwitchStatus) -> SwitchRow {
    SwitchRow {
        interface: s.switch.interface.clone(),
        switch: s.switch.switch_address.to_string(),
        host: s.switch.host_address.to_string(),
        factory: s.switch.default_address.to_string(),
        ports: s.switch.ports,
        reachable: match s.reachable {
            None => "-",
            Some(true) => "yes",
            Some(false) => "no",
        },
    }
}

pub async fn handle(
    args: &SwitchesArgs,
    cfg: &camrig_config::Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let fleet = fleet_config(cfg, global)?;
    let switches = fleet.resolved_switches();

    let reachable: Vec<Option<bool>> = if args.probe {
        let driver = TelnetDriver::new(cfg.switch_credentials()?)
            .with_port(cfg.switch_defaults.telnet_port);
        let options = fleet.timing.session;
        join_all(
            switches
                .iter()
                .map(|s| driver.probe(s.switch_address, options)),
        )
        .await
        .into_iter()
        .map(Some)
        .collect()
    } else {
        vec![None; switches.len()]
    };

    let statuses: Vec<SwitchStatus> = switches
        .into_iter()
        .zip(reachable)
        .map(|(switch, reachable)| SwitchStatus { switch, reachable })
        .collect();

    let out = output::render_list(global.output, &statuses, switch_row)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
