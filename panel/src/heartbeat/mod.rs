//! Kill-switch heartbeat.
//!
//! The [`Heartbeat`] reports this process's health to the gateway registry
//! on a fixed interval. The gateway answers with one of three things:
//!
//! - `2xx`: keep running.
//! - `503` or `404`: the entry was disabled or never registered. The
//!   [`KillSwitch`] latch is set and, after a short grace period for the host
//!   to exit on its own, the process is terminated through [`ProcessExit`].
//! - anything else, or no answer at all: logged and ignored; the next beat
//!   happens on schedule.
//!
//! The reporter only needs [`HeartbeatSink`] from the gateway client, so tests
//! can script the gateway's answers directly.

mod kill;
mod reporter;
mod target;

pub use kill::{HardExit, KillSwitch, ProcessExit};
pub use reporter::{
    BeatOutcome, Heartbeat, ReporterState, DEFAULT_GRACE_PERIOD, DEFAULT_INTERVAL, MIN_INTERVAL,
};
pub use target::BeaconTarget;

use async_trait::async_trait;
use panel_common::{Details, Health};
use serde_json::json;

use crate::error::Result;

/// Health as read by one beat.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub health: Health,
    pub details: Option<Details>,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        let mut details = Details::new();
        details.insert("status".to_string(), json!("running"));
        Self {
            health: Health::Ok,
            details: Some(details),
        }
    }
}

/// Where beats are delivered.
#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    /// Deliver one heartbeat for `target`.
    ///
    /// Fails with [`crate::Error::Http`] for non-2xx answers so the reporter
    /// can tell a revoked entry from a flaky network.
    async fn push_heartbeat(&self, target: &BeaconTarget, snapshot: &HealthSnapshot) -> Result<()>;
}
