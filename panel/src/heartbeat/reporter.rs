//! The heartbeat reporter and its background loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use panel_common::{Details, Health};
use reqwest::StatusCode;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{DisableReason, Error, Result};

use super::{BeaconTarget, HardExit, HealthSnapshot, HeartbeatSink, KillSwitch, ProcessExit};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);
/// Shortest interval the loop accepts.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a [`Heartbeat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    /// Never started successfully.
    Created,
    /// Background loop is beating.
    Running,
    /// `stop()` was requested.
    Stopped,
    /// The gateway revoked the entry. Terminal.
    Killed,
}

/// How a single beat ended.
#[derive(Debug)]
pub enum BeatOutcome {
    Delivered,
    /// Logged and ignored; the schedule is unaffected.
    Transient(Error),
    /// The entry is gone. Triggers the kill path.
    Fatal(DisableReason),
}

impl BeatOutcome {
    /// Only `503` and `404` are fatal. Every other failure, including other
    /// 4xx answers, is retried on the next interval.
    pub fn classify(result: Result<()>) -> Self {
        match result {
            Ok(()) => BeatOutcome::Delivered,
            Err(Error::Http { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE => {
                BeatOutcome::Fatal(DisableReason::Disabled)
            }
            Err(Error::Http { status, .. }) if status == StatusCode::NOT_FOUND => {
                BeatOutcome::Fatal(DisableReason::NotRegistered)
            }
            Err(e) => BeatOutcome::Transient(e),
        }
    }
}

/// Reads the current health and delivers one beat.
#[derive(Clone)]
struct Beater {
    sink: Arc<dyn HeartbeatSink>,
    target: Arc<BeaconTarget>,
    health: Arc<Mutex<HealthSnapshot>>,
}

impl Beater {
    fn snapshot(&self) -> HealthSnapshot {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn beat(&self) -> BeatOutcome {
        let snapshot = self.snapshot();
        tracing::debug!("Sending heartbeat for {}: {}", self.target, snapshot.health);
        BeatOutcome::classify(self.sink.push_heartbeat(&self.target, &snapshot).await)
    }
}

/// Periodic health reporter with a remote kill-switch.
///
/// ```ignore
/// let heartbeat = Heartbeat::new(client, BeaconTarget::software("python-panel")?);
/// heartbeat.start().await?;                    // first beat + background loop
/// heartbeat.set_health(Health::Warning, Some(details));
/// ```
pub struct Heartbeat {
    beater: Beater,
    kill_switch: KillSwitch,
    interval: Duration,
    grace_period: Duration,
    process_exit: Arc<dyn ProcessExit>,
    stop_tx: watch::Sender<bool>,
    started: AtomicBool,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    pub fn new(sink: Arc<dyn HeartbeatSink>, target: BeaconTarget) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            beater: Beater {
                sink,
                target: Arc::new(target),
                health: Arc::new(Mutex::new(HealthSnapshot::default())),
            },
            kill_switch: KillSwitch::new(),
            interval: DEFAULT_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
            process_exit: Arc::new(HardExit),
            stop_tx,
            started: AtomicBool::new(false),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                "Heartbeat interval {:?} is too short, using {:?}",
                interval,
                MIN_INTERVAL
            );
        }
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Replace the hard process exit used after a fatal beat.
    pub fn with_process_exit(mut self, process_exit: Arc<dyn ProcessExit>) -> Self {
        self.process_exit = process_exit;
        self
    }

    pub fn target(&self) -> &BeaconTarget {
        &self.beater.target
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle the host polls to find out whether it must shut down.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    pub fn is_killed(&self) -> bool {
        self.kill_switch.is_killed()
    }

    pub fn state(&self) -> ReporterState {
        if self.kill_switch.is_killed() {
            ReporterState::Killed
        } else if !self.started.load(Ordering::Acquire) {
            ReporterState::Created
        } else if *self.stop_tx.borrow() {
            ReporterState::Stopped
        } else {
            ReporterState::Running
        }
    }

    /// Health the next beat will send.
    pub fn health(&self) -> HealthSnapshot {
        self.beater.snapshot()
    }

    /// Update health from anywhere; picked up by the next beat.
    ///
    /// `None` keeps the previous details.
    pub fn set_health(&self, health: Health, details: Option<Details>) {
        let mut current = self
            .beater
            .health
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        current.health = health;
        if details.is_some() {
            current.details = details;
        }
    }

    /// [`Heartbeat::set_health`] for a severity given as text.
    pub fn set_health_str(&self, health: &str, details: Option<Details>) -> Result<()> {
        let health: Health = health.parse()?;
        self.set_health(health, details);
        Ok(())
    }

    /// Send the first beat now, then keep beating in the background.
    ///
    /// Fails with [`Error::Disabled`] when the gateway already refuses the
    /// entry; the caller is expected to exit. A failed login on this first
    /// beat is returned as [`Error::Auth`]. Other failures are only logged.
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;

        if let Some(handle) = task.take() {
            if !handle.is_finished() && !*self.stop_tx.borrow() {
                *task = Some(handle);
                return Err(Error::AlreadyRunning);
            }
            // A stopped loop may still be finishing its last beat
            let _ = handle.await;
        }

        if let Some(reason) = self.kill_switch.reason() {
            return Err(self.disabled(reason));
        }

        self.stop_tx.send_replace(false);

        match self.beater.beat().await {
            BeatOutcome::Delivered => {}
            BeatOutcome::Transient(Error::Auth(message)) => {
                // No loop was spawned; a previous run stays reported as stopped
                if self.started.load(Ordering::Acquire) {
                    self.stop_tx.send_replace(true);
                }
                return Err(Error::Auth(message));
            }
            BeatOutcome::Transient(e) => {
                tracing::warn!("First heartbeat for {} failed: {}", self.target(), e);
            }
            BeatOutcome::Fatal(reason) => {
                self.kill_switch.trip(reason);
                tracing::error!("[HEARTBEAT] '{}' is {}. Exiting.", self.target().name(), reason);
                return Err(self.disabled(reason));
            }
        }

        let beat_loop = BeatLoop {
            beater: self.beater.clone(),
            kill_switch: self.kill_switch.clone(),
            interval: self.interval,
            grace_period: self.grace_period,
            process_exit: self.process_exit.clone(),
            stop_rx: self.stop_tx.subscribe(),
        };
        *task = Some(tokio::spawn(beat_loop.run()));
        self.started.store(true, Ordering::Release);

        tracing::info!(
            "[HEARTBEAT] Started, reporting as {} every {:?}",
            self.target(),
            self.interval
        );
        Ok(())
    }

    /// Ask the background loop to exit after its current wait.
    ///
    /// Never blocks; an in-flight beat is allowed to finish.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            tracing::debug!("Heartbeat stop requested for {}", self.target());
        }
    }

    fn disabled(&self, reason: DisableReason) -> Error {
        Error::Disabled {
            name: self.target().name().to_string(),
            reason,
        }
    }
}

struct BeatLoop {
    beater: Beater,
    kill_switch: KillSwitch,
    interval: Duration,
    grace_period: Duration,
    process_exit: Arc<dyn ProcessExit>,
    stop_rx: watch::Receiver<bool>,
}

impl BeatLoop {
    async fn run(mut self) {
        loop {
            if *self.stop_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                changed = self.stop_rx.changed() => {
                    // Sender gone means the Heartbeat was dropped
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.beater.beat().await {
                BeatOutcome::Delivered => {}
                BeatOutcome::Transient(e) => {
                    tracing::warn!(
                        "[HEARTBEAT] warning: beat for {} failed, retrying in {:?}: {}",
                        self.beater.target,
                        self.interval,
                        e
                    );
                }
                BeatOutcome::Fatal(reason) => {
                    self.kill_switch.trip(reason);
                    tracing::error!(
                        "[HEARTBEAT] '{}' is {}, shutting down",
                        self.beater.target.name(),
                        reason
                    );
                    tokio::time::sleep(self.grace_period).await;
                    self.process_exit.exit(1);
                    break;
                }
            }
        }

        tracing::debug!("Heartbeat loop for {} exited", self.beater.target);
    }
}
