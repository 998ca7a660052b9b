//! Command handlers and the helpers they share.

pub mod config_cmd;
pub mod provision;
pub mod run;
pub mod shoot;
pub mod switches;

use std::sync::Arc;

use camrig_api::{IpRoute2, RegistryClient, TelnetDriver};
use camrig_config::Config;
use camrig_core::{FleetConfig, Services};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a fleet command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run => run::handle(cfg, global).await,
        Command::Provision => provision::handle(cfg, global).await,
        Command::Shoot => shoot::handle(cfg, global).await,
        Command::Switches(args) => switches::handle(&args, cfg, global).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Validated fleet configuration with at least one switch.
pub(crate) fn fleet_config(cfg: &Config, global: &GlobalOpts) -> Result<FleetConfig, CliError> {
    let fleet = cfg.to_fleet_config()?;
    if fleet.switches.is_empty() {
        let path = global
            .config
            .clone()
            .unwrap_or_else(camrig_config::config_path);
        return Err(CliError::NoSwitches {
            path: path.display().to_string(),
        });
    }
    Ok(fleet)
}

/// Switch driver, registry client and host links as configured.
pub(crate) fn build_services(cfg: &Config) -> Result<Services, CliError> {
    let driver = TelnetDriver::new(cfg.switch_credentials()?)
        .with_port(cfg.switch_defaults.telnet_port);

    let registry = RegistryClient::new(cfg.registry_url()?, &cfg.registry_transport())
        .map_err(|e| CliError::network("registry client", e))?;

    Ok(Services {
        driver: Arc::new(driver),
        registry: Arc::new(registry),
        interfaces: Arc::new(IpRoute2::new(cfg.switch_defaults.prefix_len)),
    })
}
