//! CLI error types with miette diagnostics.
//!
//! Maps config and core failures into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use camrig_config::ConfigError;
use camrig_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const AUTH: i32 = 4;
    pub const PROVISIONING: i32 = 5;
    pub const NETWORK: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camrig::validation))]
    Validation { field: String, reason: String },

    #[error("No switch password configured")]
    #[diagnostic(
        code(camrig::no_credentials),
        help(
            "Store one with: camrig config set-password\n\
             Or set switch_defaults.password_env to the name of an environment variable."
        )
    )]
    NoCredentials,

    #[error("No switches configured")]
    #[diagnostic(
        code(camrig::no_switches),
        help(
            "Add a [[switches]] table to the config file.\n\
             Config file: {path}"
        )
    )]
    NoSwitches { path: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(camrig::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(camrig::config))]
    Config(ConfigError),

    // ── Fleet ────────────────────────────────────────────────────────
    #[error("Provisioning failed")]
    #[diagnostic(
        code(camrig::provisioning),
        help(
            "Check the switch cabling and that the controller interfaces exist.\n\
             Factory-default switches must answer on their factory address."
        )
    )]
    Provisioning {
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    #[diagnostic(code(camrig::core))]
    Core(CoreError),

    #[error("Could not set up {what}")]
    #[diagnostic(
        code(camrig::network),
        help("Check that the configured host addresses are assigned to this machine.")
    )]
    Network {
        what: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(camrig::output))]
    Output(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            Self::NoSwitches { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::NoCredentials => exit_code::AUTH,
            Self::Provisioning { .. } => exit_code::PROVISIONING,
            Self::Network { .. } => exit_code::NETWORK,
            Self::Core(_) | Self::Io(_) | Self::Output(_) => exit_code::GENERAL,
        }
    }

    pub fn network(what: &str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Network {
            what: what.into(),
            source: Box::new(source),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials => Self::NoCredentials,
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SwitchUnreachable { .. } | CoreError::Provisioning { .. } => {
                Self::Provisioning { source: err }
            }
            other => Self::Core(other),
        }
    }
}
