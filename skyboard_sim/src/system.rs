//! System launcher: wires the channels, spawns one task per unit, hands
//! the watchdog its roster and tears everything down.

use crate::coordinator::{run_coordinator, CoordinatorConfig, CoordinatorLinks, CoordinatorReport};
use crate::dynamics::{run_dynamics, DynamicsExit, DynamicsLinks};
use crate::error::SystemError;
use crate::generators::{run_generator, GeneratorConfig};
use crate::keyboard::run_keyboard;
use crate::watchdog::{run_watchdog, Roster, WatchdogLinks, WatchdogReport};
use skyboard_core::{SimParams, Snapshot};
use skyboard_env::{channel, signal, ArenaContext, SignalSender, UnitId, UnitRole};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Configuration for one run of the whole system.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub params: SimParams,

    /// Seconds between obstacle batches
    pub obstacle_interval: Duration,

    /// Seconds between target batches
    pub target_interval: Duration,

    /// Publish a snapshot every this many dynamics ticks
    pub snapshot_every: u64,

    /// Frames buffered per data channel
    pub channel_capacity: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            params: SimParams::default(),
            obstacle_interval: Duration::from_secs(45),
            target_interval: Duration::from_secs(50),
            snapshot_every: 1,
            channel_capacity: 64,
        }
    }
}

/// How each unit finished.
#[derive(Debug)]
pub struct SystemReport {
    pub coordinator: CoordinatorReport,
    pub dynamics: DynamicsExit,
    pub dynamics_ticks: u64,
    pub keys_forwarded: usize,
    pub obstacle_batches: u64,
    pub target_batches: u64,
    pub watchdog: WatchdogReport,
}

async fn join<T>(role: UnitRole, handle: JoinHandle<T>) -> Result<T, SystemError> {
    handle.await.map_err(|e| SystemError::Join {
        role: role.tag(),
        reason: e.to_string(),
    })
}

/// Runs every unit until the coordinator exits, then stops the rest.
///
/// `input` feeds the keyboard source; `snapshots` receives the coordinator's
/// periodic world snapshots.
pub async fn run_system<C, R>(
    ctx: Arc<C>,
    config: SystemConfig,
    input: R,
    snapshots: Option<watch::Sender<Snapshot>>,
) -> Result<SystemReport, SystemError>
where
    C: ArenaContext,
    R: AsyncRead + Unpin + Send + 'static,
{
    let params = config.params;
    let cap = config.channel_capacity.max(1);

    // Data channels
    let (keys_tx, keys_rx) = channel(cap);
    let (force_tx, force_rx) = channel(cap);
    let (state_tx, state_rx) = channel(cap);
    let (obs_tx, obs_rx) = channel(cap);
    let (tgt_tx, tgt_rx) = channel(cap);

    // Signals
    let (heartbeat_tx, heartbeat_rx) = signal();
    let (warning_tx, warning_rx) = signal();
    let (b_stop_tx, b_stop_rx) = signal();
    let (d_stop_tx, d_stop_rx) = signal();
    let (i_stop_tx, i_stop_rx) = signal();
    let (o_stop_tx, o_stop_rx) = signal();
    let (t_stop_tx, t_stop_rx) = signal();
    let (w_stop_tx, w_stop_rx) = signal();
    let (roster_tx, roster_rx) = oneshot::channel();

    info!(seed = ctx.seed(), "launching units");

    let watchdog = tokio::spawn(run_watchdog(
        ctx.clone(),
        params,
        WatchdogLinks {
            roster: roster_rx,
            heartbeat: heartbeat_rx,
            warning: warning_tx,
            stop: w_stop_rx,
        },
    ));

    let coordinator = tokio::spawn(run_coordinator(
        ctx.clone(),
        params,
        CoordinatorConfig { snapshot_every: config.snapshot_every },
        CoordinatorLinks {
            keys: keys_rx,
            states: state_rx,
            obstacles: obs_rx,
            targets: tgt_rx,
            force: force_tx,
            heartbeat: heartbeat_tx,
            warning: warning_rx,
            stop: b_stop_rx,
        },
        snapshots,
    ));

    let dynamics = tokio::spawn(run_dynamics(
        ctx.clone(),
        params,
        DynamicsLinks {
            force: force_rx,
            state: state_tx,
            stop: d_stop_rx,
        },
    ));

    let keyboard = tokio::spawn(run_keyboard(input, keys_tx, i_stop_rx));

    let obstacles = tokio::spawn(run_generator(
        ctx.clone(),
        GeneratorConfig::obstacles(&params).with_interval(config.obstacle_interval),
        obs_tx,
        o_stop_rx,
    ));

    let targets = tokio::spawn(run_generator(
        ctx.clone(),
        GeneratorConfig::targets(&params).with_interval(config.target_interval),
        tgt_tx,
        t_stop_rx,
    ));

    // One-time roster for the watchdog
    let stops: [(UnitRole, &SignalSender); 6] = [
        (UnitRole::Coordinator, &b_stop_tx),
        (UnitRole::Keyboard, &i_stop_tx),
        (UnitRole::Dynamics, &d_stop_tx),
        (UnitRole::Obstacles, &o_stop_tx),
        (UnitRole::Targets, &t_stop_tx),
        (UnitRole::Watchdog, &w_stop_tx),
    ];
    let mut roster = Roster::default();
    for (i, (role, stop)) in stops.iter().enumerate() {
        let id = UnitId::from_seed(ctx.derive_seed(100 + i as u64));
        roster.push(id, *role, (*stop).clone());
    }
    if roster_tx.send(roster).is_err() {
        warn!("watchdog exited before receiving its roster");
    }

    let coordinator = join(UnitRole::Coordinator, coordinator).await?;
    info!(exit = ?coordinator.exit, "coordinator finished, stopping remaining units");

    for (role, stop) in stops.iter().skip(1) {
        if stop.raise() {
            info!(unit = %role, "stop sent");
        }
    }

    let (dynamics, dynamics_ticks) = join(UnitRole::Dynamics, dynamics).await?;
    let keys_forwarded = join(UnitRole::Keyboard, keyboard).await?;
    let obstacle_batches = join(UnitRole::Obstacles, obstacles).await?;
    let target_batches = join(UnitRole::Targets, targets).await?;
    let watchdog = join(UnitRole::Watchdog, watchdog).await??;

    Ok(SystemReport {
        coordinator,
        dynamics,
        dynamics_ticks,
        keys_forwarded,
        obstacle_batches,
        target_batches,
        watchdog,
    })
}
