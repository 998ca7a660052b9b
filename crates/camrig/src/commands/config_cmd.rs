//! Config subcommand handlers.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use camrig_config::{Config, SwitchSettings};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn target_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(camrig_config::config_path)
}

/// Defaults plus one example switch to edit.
fn starter_config() -> Config {
    let mut cfg = Config::default();
    cfg.switches.push(SwitchSettings {
        interface: "eth1".into(),
        switch_address: Ipv4Addr::new(10, 0, 1, 2),
        host_address: Ipv4Addr::new(10, 0, 1, 1),
        default_address: None,
        ports: None,
    });
    cfg
}

fn redacted(mut cfg: Config) -> Config {
    if cfg.switch_defaults.password.is_some() {
        cfg.switch_defaults.password = Some("****".into());
    }
    cfg
}

fn render_config(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => {
            toml::to_string_pretty(cfg).map_err(|e| CliError::Output(e.to_string()))
        }
        OutputFormat::Json => output::render_json(cfg),
        OutputFormat::Yaml => output::render_yaml(cfg),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { force } => {
            let path = target_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            camrig_config::save_config(&starter_config(), &path)?;
            if !global.quiet {
                eprintln!("Wrote {}", path.display());
                eprintln!("Edit [[switches]] to match the rig, then run: camrig config set-password");
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = camrig_config::load_config(global.config.as_deref())?;
            let out = render_config(&redacted(cfg), global.output)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&target_path(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let password = rpassword::prompt_password("Switch password: ")?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "cannot be empty".into(),
                });
            }
            camrig_config::store_switch_password(&password)?;
            if !global.quiet {
                eprintln!("Switch password stored in the system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starter_config_is_valid() {
        let fleet = starter_config().to_fleet_config().unwrap();
        assert_eq!(fleet.switches.len(), 1);
        assert_eq!(fleet.host_addresses(), vec![Ipv4Addr::new(10, 0, 1, 1)]);
    }

    #[test]
    fn password_is_masked() {
        let mut cfg = Config::default();
        cfg.switch_defaults.password = Some("hunter2".into());
        let out = render_config(&redacted(cfg), OutputFormat::Table).unwrap();
        assert!(out.contains("****"));
        assert!(!out.contains("hunter2"));
    }
}
