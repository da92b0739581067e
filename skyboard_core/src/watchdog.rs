//! Heartbeat supervision state machine.
//!
//! ```text
//!            age >= warn              age >= kill
//!   ALIVE ----------------> WARNED ----------------> STOPPED
//!     ^                        |
//!     +------ heartbeat -------+
//! ```
//!
//! Time is passed in by the caller (elapsed since context start), so the
//! monitor can be driven by any clock.

use crate::params::SimParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Watchdog phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogPhase {
    Alive,
    Warned,
    Stopped,
}

/// What the watchdog task must do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Signal the coordinator that heartbeats have stalled
    Warn,
    /// Broadcast termination to every unit and halt
    Terminate,
}

#[derive(Debug, Clone)]
pub struct WatchdogMonitor {
    warn_after: Duration,
    kill_after: Duration,
    last_heartbeat: Duration,
    phase: WatchdogPhase,
    warnings: u32,
}

impl WatchdogMonitor {
    /// Poll interval of the watchdog task.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Starts the clock at `now`, as if a heartbeat had just arrived.
    pub fn new(warn_after: Duration, kill_after: Duration, now: Duration) -> Self {
        Self {
            warn_after,
            kill_after,
            last_heartbeat: now,
            phase: WatchdogPhase::Alive,
            warnings: 0,
        }
    }

    pub fn from_params(params: &SimParams, now: Duration) -> Self {
        Self::new(params.warn_after(), params.kill_after(), now)
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.phase
    }

    /// Number of warnings issued so far.
    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn heartbeat_age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_heartbeat)
    }

    /// Resets the clock. A warned monitor returns to ALIVE; a stopped one
    /// stays stopped.
    pub fn record_heartbeat(&mut self, now: Duration) {
        if self.phase == WatchdogPhase::Stopped {
            return;
        }
        self.last_heartbeat = now;
        self.phase = WatchdogPhase::Alive;
    }

    /// Evaluates the heartbeat age. Termination takes precedence over a
    /// warning when both thresholds have been crossed.
    pub fn poll(&mut self, now: Duration) -> Option<WatchdogAction> {
        let age = self.heartbeat_age(now);
        match self.phase {
            WatchdogPhase::Stopped => None,
            _ if age >= self.kill_after => {
                self.phase = WatchdogPhase::Stopped;
                Some(WatchdogAction::Terminate)
            }
            WatchdogPhase::Alive if age >= self.warn_after => {
                self.phase = WatchdogPhase::Warned;
                self.warnings += 1;
                Some(WatchdogAction::Warn)
            }
            _ => None,
        }
    }
}
