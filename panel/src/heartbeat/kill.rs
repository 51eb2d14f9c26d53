//! Kill latch and the process-exit escape hatch.

use std::sync::{Arc, OnceLock};

use crate::error::DisableReason;

/// One-way latch set when the gateway revokes this process's entry.
///
/// Clones share the same latch. Once tripped it stays tripped for the rest
/// of the process; reading it never blocks.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    reason: Arc<OnceLock<DisableReason>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_killed(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Why the entry was revoked, once it has been.
    pub fn reason(&self) -> Option<DisableReason> {
        self.reason.get().copied()
    }

    /// Set the latch. Returns `false` if it was already set; the first
    /// reason wins.
    pub(crate) fn trip(&self, reason: DisableReason) -> bool {
        self.reason.set(reason).is_ok()
    }
}

/// Terminates the process after a kill.
///
/// Invoked only once the grace period has passed without the host exiting.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

/// Ends the process immediately with [`std::process::exit`].
///
/// Destructors of live values do not run and buffered output that is not
/// flushed is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardExit;

impl ProcessExit for HardExit {
    fn exit(&self, code: i32) {
        tracing::error!("Grace period elapsed, terminating process");
        std::process::exit(code);
    }
}
