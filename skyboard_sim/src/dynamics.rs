//! Dynamics unit (D): integrates the drone at a fixed timestep.

use skyboard_core::{DroneState, DynamicsEngine, ForceCommand, SimParams};
use skyboard_env::{ArenaContext, Frame, FrameReceiver, FrameSender, SignalReceiver, UnitRole};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the dynamics unit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicsExit {
    /// The coordinator closed the force channel
    ForceClosed,
    /// The coordinator stopped reading states
    StateClosed,
    /// Stop signal
    Stopped,
}

/// Channels owned by the dynamics unit.
pub struct DynamicsLinks {
    pub force: FrameReceiver<ForceCommand>,
    pub state: FrameSender<DroneState>,
    pub stop: SignalReceiver,
}

/// Runs the integrator until the coordinator goes away or a stop arrives.
///
/// Each tick takes at most one pending command without waiting, steps the
/// engine, publishes the new state and sleeps one `dt`.
pub async fn run_dynamics<C: ArenaContext>(
    ctx: Arc<C>,
    params: SimParams,
    mut links: DynamicsLinks,
) -> (DynamicsExit, u64) {
    let role = UnitRole::Dynamics;
    let mut engine = DynamicsEngine::new(params);
    info!(%role, dt = params.dt, "dynamics started");

    let exit = loop {
        match links.force.try_recv() {
            Frame::Message(cmd) => {
                if cmd.reset {
                    info!(%role, "reset received");
                }
                engine.apply_command(cmd);
            }
            Frame::Empty => {}
            Frame::Discarded(e) => warn!(%role, error = %e, "force frame discarded"),
            Frame::Closed => {
                info!(%role, "force channel closed");
                break DynamicsExit::ForceClosed;
            }
        }

        let state = engine.step();
        if engine.ticks() % 100 == 0 {
            debug!(%role, tick = engine.ticks(), x = state.x, y = state.y, vx = state.vx, vy = state.vy, "state");
        }

        tokio::select! {
            biased;
            _ = links.stop.raised() => break DynamicsExit::Stopped,
            sent = links.state.send(&state) => {
                if sent.is_err() {
                    info!(%role, "state channel closed");
                    break DynamicsExit::StateClosed;
                }
            }
        }

        tokio::select! {
            biased;
            _ = links.stop.raised() => break DynamicsExit::Stopped,
            _ = ctx.sleep(params.timestep()) => {}
        }
    };

    links.force.close();
    info!(%role, ?exit, ticks = engine.ticks(), "dynamics stopped");
    (exit, engine.ticks())
}
