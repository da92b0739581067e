//! Coordinator unit (B): the blackboard event loop.
//!
//! Fans in keys, dynamics ticks, generator batches and watchdog signals
//! through one `tokio::select!` with a bounded timeout, and is the only
//! unit that talks to the dynamics engine and the watchdog.
//!
//! ```text
//!   keys ------+
//!   states ----+                      +--> force (B -> D)
//!   obstacles -+--> select! --> Blackboard --> heartbeat (B -> W)
//!   targets ---+        |             +--> snapshots (renderer / exporter)
//!   warning ---+     100 ms
//!   stop ------+    timeout
//! ```

use skyboard_core::{
    Blackboard, DroneState, Effects, EntityBatch, EntityKind, ForceCommand, KeyMsg, SimParams,
    Snapshot,
};
use skyboard_env::{
    ArenaContext, BusError, Frame, FrameReceiver, FrameSender, SignalReceiver, SignalSender,
    UnitRole, WireMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Upper bound on one wait of the event loop.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Why the coordinator left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorExit {
    /// `q` pressed
    Quit,
    /// Keyboard source closed its channel
    KeyboardClosed,
    /// Dynamics closed its state channel
    DynamicsClosed,
    /// Watchdog termination
    Terminated,
}

/// Channels owned by the coordinator.
pub struct CoordinatorLinks {
    pub keys: FrameReceiver<KeyMsg>,
    pub states: FrameReceiver<DroneState>,
    pub obstacles: FrameReceiver<EntityBatch>,
    pub targets: FrameReceiver<EntityBatch>,
    pub force: FrameSender<ForceCommand>,
    pub heartbeat: SignalSender,
    pub warning: SignalReceiver,
    pub stop: SignalReceiver,
}

/// Coordinator settings that are not simulation parameters.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Publish a snapshot every this many dynamics ticks (min 1)
    pub snapshot_every: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { snapshot_every: 1 }
    }
}

/// Final state of a coordinator run.
#[derive(Debug, Clone)]
pub struct CoordinatorReport {
    pub exit: CoordinatorExit,
    pub snapshot: Snapshot,
}

async fn recv_optional<M: WireMessage>(rx: &mut Option<FrameReceiver<M>>) -> Frame<M> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_optional(rx: &mut Option<SignalReceiver>) -> Option<()> {
    match rx {
        Some(rx) => rx.wait().await,
        None => std::future::pending().await,
    }
}

/// Forwards a composed force to the dynamics engine without waiting.
///
/// A dropped command is superseded by the next tick's resend; a pending
/// reset stays latched on the blackboard until one is accepted.
fn forward(board: &mut Blackboard, force: &FrameSender<ForceCommand>, cmd: ForceCommand) {
    match force.try_send(&cmd) {
        Ok(()) => board.mark_delivered(&cmd),
        Err(BusError::Full) => warn!(
            role = %UnitRole::Coordinator,
            reset = cmd.reset,
            "force channel full, command dropped"
        ),
        Err(e) => debug!(role = %UnitRole::Coordinator, error = %e, "force not delivered"),
    }
}

/// Runs the blackboard until quit, a required input closes, or the
/// watchdog terminates it.
pub async fn run_coordinator<C: ArenaContext>(
    ctx: Arc<C>,
    params: SimParams,
    config: CoordinatorConfig,
    links: CoordinatorLinks,
    snapshots: Option<watch::Sender<Snapshot>>,
) -> CoordinatorReport {
    let role = UnitRole::Coordinator;
    let snapshot_every = config.snapshot_every.max(1);
    let mut board = Blackboard::new(params);

    let CoordinatorLinks {
        mut keys,
        mut states,
        obstacles,
        targets,
        force,
        heartbeat,
        warning,
        mut stop,
    } = links;
    let mut obstacles = Some(obstacles);
    let mut targets = Some(targets);
    let mut warning = Some(warning);
    let out = CoordinatorLinksOut { force, heartbeat };

    info!(%role, "coordinator started");
    let initial = board.compose_force(false);
    forward(&mut board, &out.force, initial);

    let mut ticks: u64 = 0;
    let exit = loop {
        tokio::select! {
            biased;

            _ = stop.raised() => {
                warn!(%role, "termination signal received");
                break CoordinatorExit::Terminated;
            }

            frame = keys.recv() => match frame {
                Frame::Message(KeyMsg { key }) => {
                    let effects = board.on_key(key);
                    out.apply(&mut board, effects);
                    if effects.quit {
                        break CoordinatorExit::Quit;
                    }
                }
                Frame::Closed => {
                    info!(%role, "keyboard closed");
                    break CoordinatorExit::KeyboardClosed;
                }
                Frame::Discarded(e) => warn!(%role, error = %e, "key frame discarded"),
                Frame::Empty => {}
            },

            frame = states.recv() => match frame {
                Frame::Message(state) => {
                    let effects = board.on_state(state, ctx.now());
                    out.apply(&mut board, effects);
                    ticks += 1;
                    if ticks % snapshot_every == 0 {
                        let snap = board.snapshot(ctx.now());
                        debug!(%role, "{}", snap.summary());
                        if let Some(tx) = &snapshots {
                            tx.send_replace(snap);
                        }
                    }
                }
                Frame::Closed => {
                    info!(%role, "dynamics closed");
                    break CoordinatorExit::DynamicsClosed;
                }
                Frame::Discarded(e) => warn!(%role, error = %e, "state frame discarded"),
                Frame::Empty => {}
            },

            frame = recv_optional(&mut obstacles) => {
                handle_batch(&mut board, EntityKind::Obstacle, frame, &mut obstacles);
            }

            frame = recv_optional(&mut targets) => {
                handle_batch(&mut board, EntityKind::Target, frame, &mut targets);
            }

            signal = wait_optional(&mut warning) => match signal {
                Some(()) => board.on_warning(),
                None => {
                    debug!(%role, "watchdog warning channel closed");
                    warning = None;
                }
            },

            _ = ctx.sleep(IDLE_TIMEOUT) => board.on_idle_timeout(),
        }
    };

    let snapshot = board.snapshot(ctx.now());
    if let Some(tx) = &snapshots {
        tx.send_replace(snapshot.clone());
    }
    info!(%role, ?exit, "{}", snapshot.summary());
    CoordinatorReport { exit, snapshot }
}

/// The outbound half of the links, kept together for `apply`.
struct CoordinatorLinksOut {
    force: FrameSender<ForceCommand>,
    heartbeat: SignalSender,
}

impl CoordinatorLinksOut {
    fn apply(&self, board: &mut Blackboard, effects: Effects) {
        if let Some(cmd) = effects.send {
            forward(board, &self.force, cmd);
        }
        if effects.heartbeat {
            self.heartbeat.raise();
        }
    }
}

fn handle_batch(
    board: &mut Blackboard,
    kind: EntityKind,
    frame: Frame<EntityBatch>,
    rx: &mut Option<FrameReceiver<EntityBatch>>,
) {
    let role = UnitRole::Coordinator;
    match frame {
        Frame::Message(batch) => {
            board.on_batch(kind, &batch);
        }
        Frame::Closed => {
            info!(%role, %kind, "generator closed, no more batches");
            *rx = None;
        }
        Frame::Discarded(e) => warn!(%role, %kind, error = %e, "batch frame discarded"),
        Frame::Empty => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyboard_core::{EntitySpawn, Mode};
    use skyboard_env::{channel, signal, TokioContext};

    struct Harness {
        keys: FrameSender<KeyMsg>,
        states: FrameSender<DroneState>,
        obstacles: FrameSender<EntityBatch>,
        targets: FrameSender<EntityBatch>,
        force: FrameReceiver<ForceCommand>,
        heartbeat: SignalReceiver,
        warning: SignalSender,
        stop: SignalSender,
        task: tokio::task::JoinHandle<CoordinatorReport>,
    }

    fn start() -> Harness {
        let (keys_tx, keys_rx) = channel(16);
        let (states_tx, states_rx) = channel(16);
        let (obs_tx, obs_rx) = channel(4);
        let (tgt_tx, tgt_rx) = channel(4);
        let (force_tx, force_rx) = channel(64);
        let (hb_tx, hb_rx) = signal();
        let (warn_tx, warn_rx) = signal();
        let (stop_tx, stop_rx) = signal();

        let links = CoordinatorLinks {
            keys: keys_rx,
            states: states_rx,
            obstacles: obs_rx,
            targets: tgt_rx,
            force: force_tx,
            heartbeat: hb_tx,
            warning: warn_rx,
            stop: stop_rx,
        };
        let task = tokio::spawn(run_coordinator(
            TokioContext::shared(),
            SimParams::default(),
            CoordinatorConfig::default(),
            links,
            None,
        ));

        Harness {
            keys: keys_tx,
            states: states_tx,
            obstacles: obs_tx,
            targets: tgt_tx,
            force: force_rx,
            heartbeat: hb_rx,
            warning: warn_tx,
            stop: stop_tx,
            task,
        }
    }

    async fn next_force(rx: &mut FrameReceiver<ForceCommand>) -> ForceCommand {
        match rx.recv().await {
            Frame::Message(cmd) => cmd,
            other => panic!("expected a force, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_force_then_keys() {
        let mut h = start();
        assert_eq!(next_force(&mut h.force).await, ForceCommand::new(0.0, 0.0));

        h.keys.send(&KeyMsg { key: b'f' }).await.unwrap();
        assert_eq!(next_force(&mut h.force).await, ForceCommand::new(5.0, 0.0));

        h.keys.send(&KeyMsg { key: b'q' }).await.unwrap();
        let report = h.task.await.unwrap();
        assert_eq!(report.exit, CoordinatorExit::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_resend_force_and_heartbeat() {
        let mut h = start();
        next_force(&mut h.force).await;

        for i in 0..3 {
            h.states.send(&DroneState { x: i as f64, ..Default::default() }).await.unwrap();
            next_force(&mut h.force).await;
        }
        assert_eq!(h.heartbeat.take_pending(), 3);

        drop(h.states);
        let report = h.task.await.unwrap();
        assert_eq!(report.exit, CoordinatorExit::DynamicsClosed);
        assert_eq!(report.snapshot.step, 3);
        assert_eq!(report.snapshot.state.x, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_eof_ends_loop() {
        let h = start();
        drop(h.keys);
        assert_eq!(h.task.await.unwrap().exit, CoordinatorExit::KeyboardClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_eof_is_not_fatal() {
        let mut h = start();
        next_force(&mut h.force).await;
        drop(h.obstacles);

        h.targets
            .send(&EntityBatch::from_spawns(&[EntitySpawn { x: 10.0, y: 10.0, lifetime: 100 }]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        h.states.send(&DroneState::default()).await.unwrap();
        next_force(&mut h.force).await;

        h.stop.raise();
        let report = h.task.await.unwrap();
        assert_eq!(report.exit, CoordinatorExit::Terminated);
        assert_eq!(report.snapshot.targets.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_blinks_until_tick() {
        let mut h = start();
        next_force(&mut h.force).await;

        h.warning.raise();
        // Let several idle timeouts pass
        tokio::time::sleep(Duration::from_millis(1_050)).await;

        h.states.send(&DroneState::default()).await.unwrap();
        next_force(&mut h.force).await;
        h.keys.send(&KeyMsg { key: b'q' }).await.unwrap();

        let report = h.task.await.unwrap();
        assert!(!report.snapshot.warning_active);
        assert_eq!(report.snapshot.mode, Mode::Running);
    }

    /// One dynamics tick as `run_dynamics` does it: take at most one
    /// command, report a state, sleep `dt`.
    async fn dynamics_tick(h: &mut Harness) -> Option<ForceCommand> {
        let cmd = match h.force.try_recv() {
            Frame::Message(cmd) => Some(cmd),
            _ => None,
        };
        h.states.send(&DroneState::default()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cmd
    }

    /// Taps `f` once per tick until the force channel is saturated.
    async fn saturate(h: &mut Harness) {
        for _ in 0..70 {
            h.keys.send(&KeyMsg { key: b'f' }).await.unwrap();
            dynamics_tick(h).await;
        }
    }

    async fn drain(h: &mut Harness, ticks: usize) -> Vec<ForceCommand> {
        let mut seen = Vec::new();
        for _ in 0..ticks {
            seen.extend(dynamics_tick(h).await);
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_reaches_dynamics_through_a_full_channel() {
        let mut h = start();
        saturate(&mut h).await;

        h.keys.send(&KeyMsg { key: b'O' }).await.unwrap();
        let seen = drain(&mut h, 300).await;

        let resets = seen.iter().filter(|c| c.reset).count();
        assert_eq!(resets, 1);
        assert_eq!(seen.last(), Some(&ForceCommand::new(0.0, 0.0)));

        h.keys.send(&KeyMsg { key: b'q' }).await.unwrap();
        assert_eq!(h.task.await.unwrap().exit, CoordinatorExit::Quit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_brake_and_pause_reach_dynamics_through_a_full_channel() {
        let mut h = start();
        saturate(&mut h).await;

        h.keys.send(&KeyMsg { key: b'd' }).await.unwrap();
        let seen = drain(&mut h, 200).await;
        assert_eq!(seen.last(), Some(&ForceCommand::new(0.0, 0.0)));

        saturate(&mut h).await;
        h.keys.send(&KeyMsg { key: b'p' }).await.unwrap();
        let seen = drain(&mut h, 200).await;
        assert_eq!(seen.last(), Some(&ForceCommand::new(0.0, 0.0)));
        assert!(seen.iter().all(|c| !c.reset));

        h.keys.send(&KeyMsg { key: b'q' }).await.unwrap();
        let report = h.task.await.unwrap();
        assert_eq!(report.snapshot.mode, Mode::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_gone_is_not_fatal() {
        let mut h = start();
        next_force(&mut h.force).await;
        drop(h.warning);

        tokio::time::sleep(Duration::from_millis(500)).await;
        h.keys.send(&KeyMsg { key: b'e' }).await.unwrap();
        assert_eq!(next_force(&mut h.force).await, ForceCommand::new(0.0, 5.0));

        h.keys.send(&KeyMsg { key: b'q' }).await.unwrap();
        assert_eq!(h.task.await.unwrap().exit, CoordinatorExit::Quit);
    }
}
