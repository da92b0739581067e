//! Watchdog unit (W): heartbeat supervision and termination broadcast.
//!
//! The launcher hands the watchdog a [`Roster`] exactly once before the
//! heartbeat protocol begins. From then on the watchdog polls every
//! [`WatchdogMonitor::POLL_INTERVAL`], folds in any heartbeats raised by the
//! coordinator, and escalates:
//!
//! 1. heartbeat age >= warn: raise the warning signal to the coordinator (once)
//! 2. heartbeat age >= kill: raise every unit's stop signal, coordinator
//!    first, then halt

use crate::error::SystemError;
use skyboard_core::{SimParams, WatchdogAction, WatchdogMonitor};
use skyboard_env::{ArenaContext, SignalReceiver, SignalSender, UnitId, UnitRole};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// One supervised unit.
#[derive(Clone)]
pub struct UnitEntry {
    pub id: UnitId,
    pub role: UnitRole,
    pub stop: SignalSender,
}

/// Identity of every unit, delivered once at startup.
#[derive(Clone, Default)]
pub struct Roster {
    pub entries: Vec<UnitEntry>,
}

impl Roster {
    pub fn push(&mut self, id: UnitId, role: UnitRole, stop: SignalSender) {
        self.entries.push(UnitEntry { id, role, stop });
    }

    /// Termination order: the coordinator first, then everyone else in
    /// roster order. The watchdog itself is never included.
    pub fn termination_order(&self) -> Vec<&UnitEntry> {
        let coordinator = self
            .entries
            .iter()
            .filter(|e| e.role == UnitRole::Coordinator);
        let others = self
            .entries
            .iter()
            .filter(|e| e.role != UnitRole::Coordinator && e.role != UnitRole::Watchdog);
        coordinator.chain(others).collect()
    }
}

/// How the watchdog finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogExit {
    /// Heartbeat stalled past the kill threshold; termination broadcast sent
    Killed,
    /// Stopped by the launcher after a normal shutdown
    Stopped,
}

/// Channels owned by the watchdog.
pub struct WatchdogLinks {
    pub roster: oneshot::Receiver<Roster>,
    pub heartbeat: SignalReceiver,
    pub warning: SignalSender,
    pub stop: SignalReceiver,
}

/// Result of a watchdog run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogReport {
    pub exit: WatchdogExit,
    pub warnings: u32,

    /// Roles that were sent a stop, in order
    pub terminated: Vec<UnitRole>,
}

/// Runs the watchdog protocol.
pub async fn run_watchdog<C: ArenaContext>(
    ctx: Arc<C>,
    params: SimParams,
    mut links: WatchdogLinks,
) -> Result<WatchdogReport, SystemError> {
    let role = UnitRole::Watchdog;

    let roster = links.roster.await.map_err(|_| SystemError::RosterLost)?;
    for entry in &roster.entries {
        info!(%role, unit = %entry.role, id = %entry.id, "supervising");
    }

    let mut monitor = WatchdogMonitor::from_params(&params, ctx.now());
    info!(%role, warn_sec = params.warn_sec, kill_sec = params.kill_sec, "watchdog started");

    loop {
        tokio::select! {
            biased;
            _ = links.stop.raised() => {
                info!(%role, "stop requested");
                return Ok(WatchdogReport {
                    exit: WatchdogExit::Stopped,
                    warnings: monitor.warnings(),
                    terminated: Vec::new(),
                });
            }
            _ = ctx.sleep(WatchdogMonitor::POLL_INTERVAL) => {}
        }

        let now = ctx.now();
        let beats = links.heartbeat.take_pending();
        if beats > 0 {
            monitor.record_heartbeat(now);
        }

        match monitor.poll(now) {
            Some(WatchdogAction::Warn) => {
                warn!(
                    %role,
                    age_ms = monitor.heartbeat_age(now).as_millis() as u64,
                    "heartbeat stalled, warning coordinator"
                );
                if !links.warning.raise() {
                    debug!(%role, "coordinator no longer listening for warnings");
                }
            }
            Some(WatchdogAction::Terminate) => {
                error!(
                    %role,
                    age_ms = monitor.heartbeat_age(now).as_millis() as u64,
                    "heartbeat lost, terminating all units"
                );
                let mut terminated = Vec::new();
                for entry in roster.termination_order() {
                    entry.stop.raise();
                    info!(%role, unit = %entry.role, id = %entry.id, "stop sent");
                    terminated.push(entry.role);
                }
                return Ok(WatchdogReport {
                    exit: WatchdogExit::Killed,
                    warnings: monitor.warnings(),
                    terminated,
                });
            }
            None => {}
        }
    }
}
