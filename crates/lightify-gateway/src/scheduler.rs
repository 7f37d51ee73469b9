//! Poll scheduling for one gateway.
//!
//! Devices and groups are enumerated on separate cadences: device state
//! changes all the time, the group table rarely. Each cadence backs off on
//! its own while its scans keep failing, and returns to its interval after
//! the first success.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::GatewayResult;
use crate::gateway::{Gateway, ThingTracker};

/// The two enumerations a gateway is polled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Devices,
    Groups,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Devices => "devices",
            Self::Groups => "groups",
        })
    }
}

/// Something the scheduler can enumerate. Both scans return the number of
/// records seen.
pub trait ScanTarget: Send {
    fn poll_devices(&mut self) -> impl Future<Output = GatewayResult<usize>> + Send;
    fn poll_groups(&mut self) -> impl Future<Output = GatewayResult<usize>> + Send;
}

impl<T: ThingTracker> ScanTarget for Gateway<T> {
    fn poll_devices(&mut self) -> impl Future<Output = GatewayResult<usize>> + Send {
        async move { self.scan_devices().await.map(|records| records.len()) }
    }

    fn poll_groups(&mut self) -> impl Future<Output = GatewayResult<usize>> + Send {
        async move { self.scan_groups().await.map(|records| records.len()) }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub device_interval: Duration,
    pub group_interval: Duration,
    /// Each delay is spread by up to this fraction either way (0.0-1.0).
    pub jitter_fraction: f64,
    /// Delay after the first failed scan; doubles per further failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            device_interval: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            jitter_fraction: 0.1,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl SchedulerConfig {
    pub fn new(device_interval: Duration, group_interval: Duration) -> Self {
        Self {
            device_interval,
            group_interval,
            ..Default::default()
        }
    }

    /// Builder: set jitter fraction.
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Builder: set backoff bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn interval(&self, kind: ScanKind) -> Duration {
        match kind {
            ScanKind::Devices => self.device_interval,
            ScanKind::Groups => self.group_interval,
        }
    }

    /// Delay until the next scan of `kind` after a success, with jitter.
    pub fn next_delay(&self, kind: ScanKind) -> Duration {
        let interval = self.interval(kind);
        let spread = interval.mul_f64(self.jitter_fraction.clamp(0.0, 1.0));
        if spread.is_zero() {
            return interval;
        }
        let offset = spread.mul_f64(rand::random::<f64>() * 2.0);
        interval - spread + offset
    }

    /// Delay after `failures` consecutive failed scans.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let doublings = (failures - 1).min(16);
        self.initial_backoff
            .saturating_mul(1 << doublings)
            .min(self.max_backoff)
    }
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Scan immediately, even while paused.
    ScanNow(ScanKind),
    Pause,
    Resume,
    Stop,
}

/// Progress of one cadence.
#[derive(Debug, Clone, Default)]
pub struct CadenceState {
    /// Successful scans so far.
    pub scans: u64,
    /// Consecutive failed scans.
    pub failures: u32,
    /// Records seen by the last successful scan.
    pub last_count: usize,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl CadenceState {
    fn record_success(&mut self, count: usize) {
        self.scans += 1;
        self.failures = 0;
        self.last_count = count;
        self.last_scan = Some(Utc::now());
        self.last_error = None;
    }

    fn record_failure(&mut self, error: String) {
        self.failures += 1;
        self.last_error = Some(error);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub paused: bool,
    pub devices: CadenceState,
    pub groups: CadenceState,
}

impl SchedulerState {
    pub fn cadence(&self, kind: ScanKind) -> &CadenceState {
        match kind {
            ScanKind::Devices => &self.devices,
            ScanKind::Groups => &self.groups,
        }
    }

    fn cadence_mut(&mut self, kind: ScanKind) -> &mut CadenceState {
        match kind {
            ScanKind::Devices => &mut self.devices,
            ScanKind::Groups => &mut self.groups,
        }
    }
}

pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

#[derive(Debug, Clone, Copy)]
struct Due {
    devices: Instant,
    groups: Instant,
}

impl Due {
    /// Returns the cadence due first; devices win a tie.
    fn next(&self) -> (ScanKind, Instant) {
        if self.devices <= self.groups {
            (ScanKind::Devices, self.devices)
        } else {
            (ScanKind::Groups, self.groups)
        }
    }

    fn set(&mut self, kind: ScanKind, at: Instant) {
        match kind {
            ScanKind::Devices => self.devices = at,
            ScanKind::Groups => self.groups = at,
        }
    }
}

/// Drives the device and group scans of one target.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state: Arc::default(),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Scans `target` until stopped, then hands it back.
    ///
    /// Both enumerations run immediately, devices first.
    pub async fn run<S: ScanTarget>(mut self, mut target: S) -> S {
        info!(
            device_secs = self.config.device_interval.as_secs(),
            group_secs = self.config.group_interval.as_secs(),
            "Scheduler started"
        );

        let mut due = Due {
            devices: self.scan(&mut target, ScanKind::Devices).await,
            groups: self.scan(&mut target, ScanKind::Groups).await,
        };

        loop {
            let (kind, at) = due.next();
            tokio::select! {
                _ = tokio::time::sleep_until(at) => {
                    let next = if self.state.read().await.paused {
                        trace!(%kind, "Scheduler paused, skipping scan");
                        Instant::now() + self.config.interval(kind)
                    } else {
                        self.scan(&mut target, kind).await
                    };
                    due.set(kind, next);
                }
                command = self.command_rx.recv() => match command {
                    Some(SchedulerCommand::ScanNow(kind)) => {
                        debug!(%kind, "Scan requested");
                        let next = self.scan(&mut target, kind).await;
                        due.set(kind, next);
                    }
                    Some(SchedulerCommand::Pause) => {
                        info!("Scheduler paused");
                        self.state.write().await.paused = true;
                    }
                    Some(SchedulerCommand::Resume) => {
                        info!("Scheduler resumed");
                        self.state.write().await.paused = false;
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        info!("Scheduler stopping");
                        break;
                    }
                },
            }
        }

        target
    }

    /// Runs one scan and returns when the next one of that kind is due.
    async fn scan<S: ScanTarget>(&self, target: &mut S, kind: ScanKind) -> Instant {
        let result = match kind {
            ScanKind::Devices => target.poll_devices().await,
            ScanKind::Groups => target.poll_groups().await,
        };

        let mut state = self.state.write().await;
        let cadence = state.cadence_mut(kind);
        let delay = match result {
            Ok(count) => {
                trace!(%kind, count, "Scan completed");
                cadence.record_success(count);
                self.config.next_delay(kind)
            }
            Err(e) => {
                cadence.record_failure(e.to_string());
                let backoff = self.config.backoff_delay(cadence.failures);
                warn!(
                    %kind,
                    failures = cadence.failures,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Scan failed"
                );
                backoff
            }
        };
        Instant::now() + delay
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

type SendResult = Result<(), mpsc::error::SendError<SchedulerCommand>>;

impl SchedulerHandle {
    /// Triggers an immediate scan of `kind`.
    pub async fn scan_now(&self, kind: ScanKind) -> SendResult {
        self.command_tx.send(SchedulerCommand::ScanNow(kind)).await
    }

    pub async fn pause(&self) -> SendResult {
        self.command_tx.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> SendResult {
        self.command_tx.send(SchedulerCommand::Resume).await
    }

    pub async fn stop(&self) -> SendResult {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Returns a copy of the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }
}
