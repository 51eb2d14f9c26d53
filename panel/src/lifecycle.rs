//! Host main loop that cooperates with the kill-switch.
//!
//! After a fatal heartbeat the reporter waits one grace period before it
//! terminates the process. A host that checks the latch at least that often
//! gets to leave its loop, restore the terminal and exit normally.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::heartbeat::KillSwitch;

/// Why the host loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostExit {
    /// The gateway revoked this process.
    Killed,
    /// The user interrupted the process (Ctrl-C).
    Interrupted,
}

impl HostExit {
    /// Process exit code for this outcome.
    pub fn code(&self) -> i32 {
        match self {
            HostExit::Killed => 1,
            HostExit::Interrupted => 0,
        }
    }
}

/// Run `on_tick` every `poll_interval` until killed or Ctrl-C.
pub async fn run_host<F>(kill_switch: &KillSwitch, poll_interval: Duration, on_tick: F) -> HostExit
where
    F: FnMut(),
{
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(kill_switch, poll_interval, interrupted, on_tick).await
}

/// Like [`run_host`] with an arbitrary interrupt future.
///
/// The latch is checked before every tick, so `on_tick` never runs once
/// the process has been killed.
pub async fn run_until<F, S>(
    kill_switch: &KillSwitch,
    poll_interval: Duration,
    interrupted: S,
    mut on_tick: F,
) -> HostExit
where
    F: FnMut(),
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if kill_switch.is_killed() {
                    tracing::info!("Kill-switch observed, leaving main loop");
                    return HostExit::Killed;
                }
                on_tick();
            }
            _ = &mut interrupted => {
                return HostExit::Interrupted;
            }
        }
    }
}
