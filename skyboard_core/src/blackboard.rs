//! Coordinator state: the blackboard.
//!
//! The blackboard is the single owner of world state. It is a synchronous
//! state machine; each `on_*` handler mutates it and returns the [`Effects`]
//! the coordinator task must carry out (send a force, signal a heartbeat,
//! stop). Keeping it free of channels makes every branch of the event loop
//! testable without a runtime.
//!
//! ```text
//!   {RUNNING, PAUSED} x {no warning, warning}
//!
//!   'p'      RUNNING <-> PAUSED   (entering PAUSED zeroes the user force)
//!   'O'      any     -> RUNNING   (mirror and user force zeroed, reset sent)
//!   warning  no warning -> warning
//!   tick     warning    -> no warning
//! ```

use crate::entities::{BatchOutcome, EntityKind, EntitySlots, SpawnRules};
use crate::keymap::Command;
use crate::messages::{DroneState, EntityBatch, ForceCommand};
use crate::params::SimParams;
use crate::potential::{compose_force, Composition, VirtualKey};
use crate::snapshot::Snapshot;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hit radius as a fraction of `world_half`.
pub const HIT_RADIUS_FACTOR: f64 = 0.08;

/// Idle select timeouts between blink toggles.
pub const BLINK_IDLE_TIMEOUTS: u32 = 5;

/// Simulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Running,
    Paused,
}

/// Score bookkeeping, mutated only on target hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreState {
    pub score: u64,
    pub collected: u64,

    /// Step index of the most recent hit, if any
    pub last_hit_step: Option<u64>,
}

/// Liveness information kept for display. The watchdog owns the
/// authoritative clock; this is only a mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeartbeatRecord {
    pub last_heartbeat: Option<Duration>,
    pub warning_active: bool,
    pub blink_on: bool,
    idle_timeouts: u32,
}

impl HeartbeatRecord {
    /// Time since the last recorded heartbeat, or since startup.
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_heartbeat.unwrap_or_default())
    }

    fn beat(&mut self, now: Duration) -> bool {
        self.last_heartbeat = Some(now);
        let was_warning = self.warning_active;
        self.warning_active = false;
        self.blink_on = false;
        self.idle_timeouts = 0;
        was_warning
    }
}

/// What the coordinator task must do after a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Effects {
    /// Force to forward to the dynamics engine
    pub send: Option<ForceCommand>,

    /// Notify the watchdog
    pub heartbeat: bool,

    /// Leave the event loop
    pub quit: bool,
}

impl Effects {
    fn send(cmd: ForceCommand) -> Self {
        Self { send: Some(cmd), ..Default::default() }
    }

    fn quit() -> Self {
        Self { quit: true, ..Default::default() }
    }
}

/// Authoritative world state owned by the coordinator.
#[derive(Debug, Clone)]
pub struct Blackboard {
    params: SimParams,
    rules: SpawnRules,
    mode: Mode,

    /// Read-only mirror of the dynamics engine's state
    mirror: DroneState,

    /// Persistent user force; never includes repulsion
    user_force: Vector2<f64>,

    /// Last force handed out for sending
    last_sent: ForceCommand,

    /// A reset requested but not yet accepted by the force channel
    reset_pending: bool,
    last_virtual_key: Option<VirtualKey>,

    obstacles: EntitySlots,
    targets: EntitySlots,
    score: ScoreState,
    step: u64,
    last_key: Option<u8>,
    heartbeat: HeartbeatRecord,
}

impl Blackboard {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            rules: SpawnRules::from_params(&params),
            mode: Mode::Running,
            mirror: DroneState::default(),
            user_force: Vector2::zeros(),
            last_sent: ForceCommand::default(),
            reset_pending: false,
            last_virtual_key: None,
            obstacles: EntitySlots::new(EntityKind::Obstacle),
            targets: EntitySlots::new(EntityKind::Target),
            score: ScoreState::default(),
            step: 0,
            last_key: None,
            heartbeat: HeartbeatRecord::default(),
        }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn mirror(&self) -> DroneState {
        self.mirror
    }

    pub fn user_force(&self) -> Vector2<f64> {
        self.user_force
    }

    pub fn last_sent(&self) -> ForceCommand {
        self.last_sent
    }

    pub fn obstacles(&self) -> &EntitySlots {
        &self.obstacles
    }

    pub fn targets(&self) -> &EntitySlots {
        &self.targets
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn heartbeat(&self) -> &HeartbeatRecord {
        &self.heartbeat
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn hit_radius(&self) -> f64 {
        self.params.world_half * HIT_RADIUS_FACTOR
    }

    /// Composes `user_force + virtual_key(obstacle_field)` at the mirror
    /// position and remembers it as the last sent force.
    ///
    /// A requested reset stays latched, and rides on every composed force,
    /// until [`Blackboard::mark_delivered`] confirms one of them was queued.
    pub fn compose_force(&mut self, reset: bool) -> ForceCommand {
        self.reset_pending |= reset;
        let user = ForceCommand {
            fx: self.user_force.x,
            fy: self.user_force.y,
            reset: self.reset_pending,
        };
        let Composition { command, virtual_key, .. } =
            compose_force(user, &self.mirror, &self.params, self.obstacles.slots());

        if let Some(vk) = virtual_key {
            debug!(direction = ?vk.direction, steps = vk.steps, "obstacle virtual key");
        }
        self.last_virtual_key = virtual_key;
        self.last_sent = command;
        command
    }

    /// Records that `cmd` was accepted by the force channel.
    pub fn mark_delivered(&mut self, cmd: &ForceCommand) {
        if cmd.reset && self.reset_pending {
            debug!("reset delivered");
            self.reset_pending = false;
        }
    }

    /// Handles one keystroke.
    pub fn on_key(&mut self, key: u8) -> Effects {
        self.last_key = Some(key);

        match Command::from_key(key) {
            Command::Quit => {
                info!("quit requested");
                Effects::quit()
            }
            Command::PauseToggle => match self.mode {
                Mode::Running => {
                    self.mode = Mode::Paused;
                    self.user_force = Vector2::zeros();
                    info!("pause on");
                    Effects::send(self.compose_force(false))
                }
                Mode::Paused => {
                    self.mode = Mode::Running;
                    info!("pause off");
                    Effects::default()
                }
            },
            Command::Reset => {
                self.mirror = DroneState::default();
                self.user_force = Vector2::zeros();
                self.mode = Mode::Running;
                info!("reset requested");
                Effects::send(self.compose_force(true))
            }
            Command::Brake | Command::Move(_) if self.mode == Mode::Paused => {
                info!(key = %char::from(key), "key ignored while paused");
                Effects::default()
            }
            Command::Brake => {
                self.user_force = Vector2::zeros();
                info!("brake");
                Effects::send(self.compose_force(false))
            }
            Command::Move(dir) => {
                self.user_force += dir.step_vector() * self.params.force_step;
                info!(
                    key = %char::from(key),
                    fx = self.user_force.x,
                    fy = self.user_force.y,
                    "user force updated"
                );
                Effects::send(self.compose_force(false))
            }
            Command::Unknown(code) => {
                debug!(code, "unrecognised key ignored");
                Effects::default()
            }
        }
    }

    /// Handles a dynamics tick received at `now`.
    pub fn on_state(&mut self, state: DroneState, now: Duration) -> Effects {
        self.mirror = state;
        if self.heartbeat.beat(now) {
            info!("heartbeat resumed, warning cleared");
        }

        if self.mode == Mode::Running {
            self.step += 1;

            let hits = self.targets.collect_within(state.position(), self.hit_radius());
            if hits > 0 {
                self.score.score += hits as u64;
                self.score.collected += hits as u64;
                self.score.last_hit_step = Some(self.step);
                info!(hits, score = self.score.score, "targets collected");
            }

            let expired = self.obstacles.age() + self.targets.age();
            if expired > 0 {
                debug!(expired, "entities expired");
            }
        }

        Effects {
            send: Some(self.compose_force(false)),
            heartbeat: true,
            quit: false,
        }
    }

    /// Handles a generator batch. Discarded entirely while paused.
    pub fn on_batch(&mut self, kind: EntityKind, batch: &EntityBatch) -> Option<BatchOutcome> {
        if self.mode == Mode::Paused {
            info!(%kind, "batch received while paused, ignored");
            return None;
        }

        let candidates = batch.candidates();
        let outcome = match kind {
            EntityKind::Obstacle => self.obstacles.accept_batch(candidates, &self.rules, &self.targets),
            EntityKind::Target => self.targets.accept_batch(candidates, &self.rules, &self.obstacles),
        };
        info!(
            %kind,
            requested = batch.count,
            accepted = outcome.accepted,
            rejected = outcome.rejected,
            "batch applied"
        );
        Some(outcome)
    }

    /// Starts the liveness warning.
    pub fn on_warning(&mut self) {
        warn!("watchdog warning: heartbeat stalled");
        self.heartbeat.warning_active = true;
        self.heartbeat.blink_on = true;
        self.heartbeat.idle_timeouts = 0;
    }

    /// Called when the multiplexed wait times out with nothing ready.
    /// Advances the warning blink while running.
    pub fn on_idle_timeout(&mut self) {
        if !self.heartbeat.warning_active || self.mode != Mode::Running {
            return;
        }
        self.heartbeat.idle_timeouts += 1;
        if self.heartbeat.idle_timeouts >= BLINK_IDLE_TIMEOUTS {
            self.heartbeat.idle_timeouts = 0;
            self.heartbeat.blink_on = !self.heartbeat.blink_on;
        }
    }

    /// Renderer-facing view of the world at `now`.
    pub fn snapshot(&self, now: Duration) -> Snapshot {
        let age = self.heartbeat.age(now).as_secs_f64();
        Snapshot {
            step: self.step,
            mode: self.mode,
            state: self.mirror,
            force: self.last_sent,
            user_force: [self.user_force.x, self.user_force.y],
            virtual_key: self.last_virtual_key,
            score: self.score,
            time_since_last_hit: self
                .score
                .last_hit_step
                .map(|s| (self.step - s) as f64 * self.params.dt),
            obstacles: self.obstacles.active_list(),
            targets: self.targets.active_list(),
            last_key: self.last_key.map(char::from),
            warning_active: self.heartbeat.warning_active,
            blink_on: self.heartbeat.warning_active && self.heartbeat.blink_on,
            heartbeat_age: age,
            warn_in: (self.params.warn_sec - age).max(0.0),
            kill_in: (self.params.kill_sec - age).max(0.0),
        }
    }
}
