// ── Controller ──
//
// Owns the camera table and the device adapters, and runs the fleet:
// provisioning once at startup, then three background tasks (heartbeat
// listener, ping ticker, main loop) until cancelled. The main loop maps
// topology, evaluates liveness and recovers cameras, and sweeps orphan
// ports, one pass at a time with a floor on the pass duration.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use camrig_api::{CommandSender, HostInterfaces, Registry, ReplyListener, SwitchDriver};

use crate::broadcast::Broadcaster;
use crate::config::FleetConfig;
use crate::error::CoreError;
use crate::heartbeat::{persist, record_reply};
use crate::liveness::{RecoveryReport, assess, recover};
use crate::model::{Camera, Switch};
use crate::provision::{ProvisionOutcome, ProvisionReport, Provisioner};
use crate::store::CameraTable;
use crate::sweep::{SweepResult, SweepSchedule, sweep_orphans};
use crate::topology::map_topology;

/// Back-off after a failed receive on the reply socket.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The device adapters a controller drives.
#[derive(Clone)]
pub struct Services {
    pub driver: Arc<dyn SwitchDriver>,
    pub registry: Arc<dyn Registry>,
    pub interfaces: Arc<dyn HostInterfaces>,
}

/// What one main loop pass did.
#[derive(Debug, Clone, Default)]
pub struct IterationReport {
    pub attachments_changed: usize,
    pub recovery: RecoveryReport,
    /// Present when the orphan sweep ran this pass.
    pub sweep: Option<Vec<SweepResult>>,
}

// ── Controller ───────────────────────────────────────────────────

/// Fleet controller handle.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Construct with
/// [`new()`](Self::new), run [`provision()`](Self::provision), bind the
/// multicast sockets, then [`start()`](Self::start).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: FleetConfig,
    switches: Vec<Switch>,
    services: Services,
    table: CameraTable,
    broadcaster: OnceLock<Broadcaster>,
    sweep: Mutex<SweepSchedule>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(config: FleetConfig, services: Services) -> Self {
        let switches = config.resolved_switches();
        let sweep = SweepSchedule::new(config.timing.sweep_interval);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                switches,
                services,
                table: CameraTable::new(),
                broadcaster: OnceLock::new(),
                sweep: Mutex::new(sweep),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.inner.config
    }

    /// Configured switches with defaults applied.
    pub fn switches(&self) -> &[Switch] {
        &self.inner.switches
    }

    pub fn table(&self) -> &CameraTable {
        &self.inner.table
    }

    /// Snapshot of every known camera, ordered by MAC.
    pub fn cameras(&self) -> Vec<Camera> {
        self.inner.table.snapshot()
    }

    /// Token cancelled on [`shutdown()`](Self::shutdown).
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── Startup ──────────────────────────────────────────────────

    /// Prepare host links and make sure every switch is operational.
    ///
    /// If every switch already answers on its operational address the
    /// provisioning pass is skipped entirely.
    pub async fn provision(&self) -> Result<Vec<ProvisionReport>, CoreError> {
        let config = &self.inner.config;
        let services = &self.inner.services;
        let provisioner = Provisioner::new(
            services.driver.as_ref(),
            services.interfaces.as_ref(),
            &config.defaults,
            &config.timing,
        );
        let switches = self.switches();

        provisioner.prepare_interfaces(switches).await?;

        if provisioner.fleet_operational(switches).await {
            info!(switches = switches.len(), "all switches operational");
            return Ok(switches
                .iter()
                .map(|s| ProvisionReport {
                    interface: s.interface.clone(),
                    switch_address: s.switch_address,
                    outcome: ProvisionOutcome::AlreadyOperational,
                })
                .collect());
        }

        info!("provisioning switches");
        provisioner.provision_all(switches).await
    }

    /// Spawn the heartbeat listener, the ping ticker and the main loop.
    ///
    /// The main loop waits for the settle delay first so cameras that are
    /// already up get a chance to answer before liveness is judged.
    pub async fn start(&self, commands: Arc<dyn CommandSender>, replies: ReplyListener) {
        let broadcaster = self
            .inner
            .broadcaster
            .get_or_init(|| Broadcaster::new(commands))
            .clone();
        let cancel = self.inner.cancel.clone();
        let timing = &self.inner.config.timing;

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(supervise(
            "heartbeat",
            heartbeat_task(self.clone(), replies, cancel.clone()),
        ));
        handles.push(supervise(
            "ping",
            broadcaster.ping_task(timing.ping_interval, cancel.clone()),
        ));
        handles.push(supervise("main-loop", main_loop_task(self.clone(), cancel)));
        info!("controller started");
    }

    /// Trigger a capture on every camera.
    pub async fn shoot(&self) -> Result<(), CoreError> {
        self.inner
            .broadcaster
            .get()
            .ok_or(CoreError::NotStarted)?
            .shoot()
            .await
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("controller stopped");
    }

    // ── Main loop steps ──────────────────────────────────────────

    /// One full pass: topology, then liveness and recovery, then the
    /// orphan sweep when due.
    pub async fn run_iteration(&self) -> IterationReport {
        let attachments_changed = self.refresh_topology().await;
        let now = Utc::now();
        let recovery = self.check_liveness(now).await;
        let sweep = self.sweep_if_due(now).await;
        IterationReport {
            attachments_changed,
            recovery,
            sweep,
        }
    }

    /// Read every switch's MAC table and update attachments.
    pub async fn refresh_topology(&self) -> usize {
        let services = &self.inner.services;
        map_topology(
            &self.inner.switches,
            services.driver.as_ref(),
            services.registry.as_ref(),
            &self.inner.table,
            self.inner.config.timing.session,
        )
        .await
    }

    /// Mark stale cameras offline and power-cycle the ones due, at `now`.
    pub async fn check_liveness(&self, now: DateTime<Utc>) -> RecoveryReport {
        let timing = &self.inner.config.timing;
        let services = &self.inner.services;
        let assessment = assess(&self.inner.table, now, timing);
        recover(
            &assessment,
            services.driver.as_ref(),
            services.registry.as_ref(),
            &self.inner.table,
            timing,
            now,
        )
        .await
    }

    /// Run the orphan sweep if the last one is older than the interval.
    ///
    /// The schedule is stamped when the sweep finishes, whatever the
    /// per-switch outcome.
    pub async fn sweep_if_due(&self, now: DateTime<Utc>) -> Option<Vec<SweepResult>> {
        if !self.inner.sweep.lock().await.due(now) {
            return None;
        }

        let started = Instant::now();
        let timing = &self.inner.config.timing;
        let results = sweep_orphans(
            &self.inner.switches,
            self.inner.services.driver.as_ref(),
            &self.inner.table,
            timing.session,
            timing.pulse,
        )
        .await;

        let elapsed = chrono::Duration::from_std(started.elapsed()).unwrap_or_default();
        self.inner.sweep.lock().await.record(now + elapsed);
        Some(results)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Spawn `task` and log it if it panics.
fn supervise<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = tokio::spawn(task);
    tokio::spawn(async move {
        if let Err(e) = inner.await {
            if e.is_panic() {
                error!(task = name, error = %e, "background task panicked");
            }
        }
    })
}

/// Feed heartbeat replies into the camera table.
///
/// The table update happens inline; registry writes run on their own
/// tasks so a slow registry never holds up the next datagram.
async fn heartbeat_task(controller: Controller, replies: ReplyListener, cancel: CancellationToken) {
    let registry = Arc::clone(&controller.inner.services.registry);
    let mut pending = JoinSet::new();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(joined) = pending.join_next(), if !pending.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!(error = %e, "registry update panicked");
                    }
                }
            }
            received = replies.recv() => match received {
                Ok(datagram) => {
                    let Some(heartbeat) = record_reply(&controller.inner.table, &datagram, Utc::now()) else {
                        continue;
                    };
                    if heartbeat.needs_persisting() {
                        let registry = Arc::clone(&registry);
                        pending.spawn(async move {
                            if let Err(e) = persist(registry.as_ref(), &heartbeat).await {
                                warn!(mac = %heartbeat.mac, error = %e, "registry update failed");
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, "heartbeat receive failed");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Run main loop passes until cancelled, at most one per minimum period.
fn log_pass(joined: Result<IterationReport, JoinError>) {
    match joined {
        Ok(report) => debug!(
            attachments = report.attachments_changed,
            offline = report.recovery.marked_offline,
            rebooted = report.recovery.power_cycled.len(),
            swept = report.sweep.is_some(),
            "main loop pass"
        ),
        Err(e) if e.is_panic() => error!(error = %e, "main loop pass panicked"),
        Err(_) => {}
    }
}

async fn main_loop_task(controller: Controller, cancel: CancellationToken) {
    let timing = controller.inner.config.timing.clone();

    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(timing.settle_delay) => {}
    }
    info!("starting main loop");

    loop {
        let started = Instant::now();

        // Each pass runs in its own task so a panic costs one pass, not
        // the loop.
        let pass = controller.clone();
        let mut handle = tokio::spawn(async move { pass.run_iteration().await });
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // A pass may be mid-pulse with ports dark; let it finish.
                match tokio::time::timeout(timing.shutdown_grace, &mut handle).await {
                    Ok(joined) => log_pass(joined),
                    Err(_) => {
                        warn!(
                            grace = ?timing.shutdown_grace,
                            "main loop pass still running, aborting"
                        );
                        handle.abort();
                    }
                }
                break;
            }
            joined = &mut handle => log_pass(joined),
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(started + timing.loop_min_period) => {}
        }
    }
}
