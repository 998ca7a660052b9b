//! Configuration for the camrig controller.
//!
//! TOML file + `CAMRIG_` environment overrides, switch password resolution
//! (env var, system keyring, plaintext), and translation to
//! `camrig_core::FleetConfig`. The core never reads files itself.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camrig_api::{MulticastGroup, SessionOptions, SwitchCredentials, TlsMode, TransportConfig};
use camrig_core::{FleetConfig, SwitchDefaults, SwitchSpec, Timing};

const KEYRING_SERVICE: &str = "camrig";
const KEYRING_SWITCH_PASSWORD: &str = "switch/password";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no switch password configured (set password_env, store one in the keyring, or set password)")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub multicast: MulticastSettings,

    #[serde(default)]
    pub switch_defaults: SwitchDefaultsSettings,

    /// One entry per switch, each on its own controller link.
    #[serde(default)]
    pub switches: Vec<SwitchSettings>,

    #[serde(default)]
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistrySettings {
    /// Base URL of the registry REST service.
    #[serde(default = "default_registry_url")]
    pub url: String,

    #[serde(default = "default_registry_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            timeout: default_registry_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_registry_url() -> String {
    "http://127.0.0.1:3000/api".into()
}
fn default_registry_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 80))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MulticastSettings {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,

    #[serde(default = "default_command_port")]
    pub command_port: u16,

    #[serde(default = "default_reply_port")]
    pub reply_port: u16,
}

impl Default for MulticastSettings {
    fn default() -> Self {
        Self {
            group: default_group(),
            command_port: default_command_port(),
            reply_port: default_reply_port(),
        }
    }
}

fn default_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 255, 42, 1)
}
fn default_command_port() -> u16 {
    5000
}
fn default_reply_port() -> u16 {
    5001
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitchDefaultsSettings {
    /// Factory management address.
    #[serde(default = "default_factory_address")]
    pub default_address: Ipv4Addr,

    #[serde(default = "default_ports")]
    pub ports: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// Switch password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the switch password.
    pub password_env: Option<String>,

    #[serde(default = "default_vlan")]
    pub management_vlan: u16,

    #[serde(default = "default_prefix_len")]
    pub prefix_len: u8,

    #[serde(default = "default_telnet_port")]
    pub telnet_port: u16,
}

impl Default for SwitchDefaultsSettings {
    fn default() -> Self {
        Self {
            default_address: default_factory_address(),
            ports: default_ports(),
            username: default_username(),
            password: None,
            password_env: None,
            management_vlan: default_vlan(),
            prefix_len: default_prefix_len(),
            telnet_port: default_telnet_port(),
        }
    }
}

fn default_factory_address() -> Ipv4Addr {
    camrig_core::config::FACTORY_ADDRESS
}
fn default_ports() -> u16 {
    SwitchDefaults::default().ports
}
fn default_username() -> String {
    "admin".into()
}
fn default_vlan() -> u16 {
    SwitchDefaults::default().management_vlan
}
fn default_prefix_len() -> u8 {
    SwitchDefaults::default().prefix_len
}
fn default_telnet_port() -> u16 {
    23
}

/// One switch and the controller link it hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SwitchSettings {
    pub interface: String,
    pub switch_address: Ipv4Addr,
    pub host_address: Ipv4Addr,
    pub default_address: Option<Ipv4Addr>,
    pub ports: Option<u16>,
}

/// Loop intervals and device timeouts. Field suffixes give the unit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingSettings {
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    #[serde(default = "default_reboot_cooldown")]
    pub reboot_cooldown_secs: u64,
    #[serde(default = "default_pulse")]
    pub pulse_ms: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_loop_min_period")]
    pub loop_min_period_ms: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_provision_attempts")]
    pub provision_attempts: u32,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_configure_timeout")]
    pub configure_timeout_secs: u64,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
            reboot_cooldown_secs: default_reboot_cooldown(),
            pulse_ms: default_pulse(),
            sweep_interval_secs: default_sweep_interval(),
            ping_interval_ms: default_ping_interval(),
            loop_min_period_ms: default_loop_min_period(),
            settle_delay_ms: default_settle_delay(),
            shutdown_grace_secs: default_shutdown_grace(),
            provision_attempts: default_provision_attempts(),
            probe_timeout_secs: default_probe_timeout(),
            configure_timeout_secs: default_configure_timeout(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

fn default_stale_after() -> u64 {
    10
}
fn default_reboot_cooldown() -> u64 {
    60
}
fn default_pulse() -> u64 {
    4000
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_ping_interval() -> u64 {
    1000
}
fn default_loop_min_period() -> u64 {
    1000
}
fn default_settle_delay() -> u64 {
    2000
}
fn default_shutdown_grace() -> u64 {
    15
}
fn default_provision_attempts() -> u32 {
    5
}
fn default_probe_timeout() -> u64 {
    60
}
fn default_configure_timeout() -> u64 {
    120
}
fn default_session_timeout() -> u64 {
    30
}

impl TimingSettings {
    pub fn to_timing(&self) -> Timing {
        let symmetric = |secs: u64| {
            let d = Duration::from_secs(secs);
            SessionOptions::new(d, d)
        };
        Timing {
            stale_after: Duration::from_secs(self.stale_after_secs),
            reboot_cooldown: Duration::from_secs(self.reboot_cooldown_secs),
            pulse: Duration::from_millis(self.pulse_ms),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            ping_interval: Duration::from_millis(self.ping_interval_ms.max(1)),
            loop_min_period: Duration::from_millis(self.loop_min_period_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            provision_attempts: self.provision_attempts,
            probe: symmetric(self.probe_timeout_secs),
            configure: symmetric(self.configure_timeout_secs),
            session: symmetric(self.session_timeout_secs),
        }
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn multicast_group(&self) -> MulticastGroup {
        MulticastGroup {
            group: self.multicast.group,
            command_port: self.multicast.command_port,
            reply_port: self.multicast.reply_port,
        }
    }

    /// Validate and build the core's runtime configuration.
    pub fn to_fleet_config(&self) -> Result<FleetConfig, ConfigError> {
        self.validate()?;

        let d = &self.switch_defaults;
        let defaults = SwitchDefaults {
            default_address: d.default_address,
            ports: d.ports,
            management_vlan: d.management_vlan,
            prefix_len: d.prefix_len,
        };
        let switches = self
            .switches
            .iter()
            .map(|s| SwitchSpec {
                interface: s.interface.clone(),
                switch_address: s.switch_address,
                host_address: s.host_address,
                default_address: s.default_address,
                ports: s.ports,
            })
            .collect();

        Ok(FleetConfig {
            switches,
            defaults,
            multicast: self.multicast_group(),
            timing: self.timing.to_timing(),
        })
    }

    pub fn registry_url(&self) -> Result<url::Url, ConfigError> {
        self.registry
            .url
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "registry.url".into(),
                reason: format!("invalid URL: {}", self.registry.url),
            })
    }

    pub fn registry_transport(&self) -> TransportConfig {
        let tls = if self.registry.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.registry.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.registry.timeout),
        }
    }

    /// Credentials for switch sessions, resolving the password.
    pub fn switch_credentials(&self) -> Result<SwitchCredentials, ConfigError> {
        Ok(SwitchCredentials {
            username: self.switch_defaults.username.clone(),
            password: resolve_switch_password(&self.switch_defaults)?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.switch_defaults;
        if d.prefix_len > 32 {
            return Err(invalid("switch_defaults.prefix_len", "must be at most 32"));
        }
        if d.ports == 0 {
            return Err(invalid("switch_defaults.ports", "must be at least 1"));
        }
        if self.multicast.command_port == self.multicast.reply_port {
            return Err(invalid(
                "multicast.reply_port",
                "must differ from multicast.command_port",
            ));
        }

        let mut seen = HashSet::new();
        for switch in &self.switches {
            if !seen.insert(switch.interface.as_str()) {
                return Err(invalid(
                    "switches.interface",
                    &format!("'{}' is listed twice", switch.interface),
                ));
            }
            if switch.ports == Some(0) {
                return Err(invalid(
                    "switches.ports",
                    &format!("'{}' must have at least 1 port", switch.interface),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "camrig", "camrig").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camrig");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from `path` (or the canonical path) + environment.
///
/// A missing file yields the defaults. `CAMRIG_` variables override the
/// file; `__` separates nested keys (`CAMRIG_REGISTRY__URL`).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CAMRIG_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the switch password from the credential chain.
pub fn resolve_switch_password(
    settings: &SwitchDefaultsSettings,
) -> Result<SecretString, ConfigError> {
    // 1. password_env → env var lookup
    if let Some(ref env_name) = settings.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_SWITCH_PASSWORD) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = settings.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials)
}

/// Store the switch password in the system keyring.
pub fn store_switch_password(password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_SWITCH_PASSWORD)?;
    entry.set_password(password)?;
    Ok(())
}
