//! Fleet control loop for a rig of PoE-powered network cameras.
//!
//! This crate owns the domain model and the control logic; every device
//! and service it touches is reached through the traits in `camrig-api`:
//!
//! - **[`Controller`]**: Central facade. [`provision()`](Controller::provision)
//!   brings factory-default switches into their operational configuration,
//!   [`start()`](Controller::start) spawns the heartbeat listener, the ping
//!   ticker and the main loop, [`shoot()`](Controller::shoot) triggers a
//!   fleet-wide capture.
//!
//! - **[`CameraTable`]**: Concurrent store of every camera ever heard from,
//!   keyed by [`MacAddress`]. Mutations are single short critical sections.
//!
//! - **Main loop steps**: [`topology`] learns which switch port each camera
//!   is plugged into, [`liveness`] marks silent cameras offline and
//!   power-cycles them, [`sweep`] pulses ports no camera claims.
//!
//! - **[`provision`]**: The switch auto-provisioning sequence, run under
//!   [`retry()`](retry::retry).

pub mod broadcast;
pub mod config;
pub mod controller;
pub mod error;
pub mod heartbeat;
pub mod liveness;
pub mod model;
pub mod provision;
pub mod retry;
pub mod store;
pub mod sweep;
pub mod topology;

mod session;
#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use broadcast::Broadcaster;
pub use config::{FleetConfig, SwitchDefaults, SwitchSpec, Timing};
pub use controller::{Controller, IterationReport, Services};
pub use error::{CoreError, Severity};
pub use model::{Attachment, Camera, MacAddress, Switch};
pub use provision::{ProvisionOutcome, ProvisionReport, ProvisionState};
pub use store::{CameraTable, Observation};
