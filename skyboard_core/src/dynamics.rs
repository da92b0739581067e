//! Fixed-timestep integrator for the damped point mass.
//!
//! Per tick, with `F` the latest force command and `P_wall` the wall field:
//!
//! ```text
//! a  = (F + P_wall - visc * v) / mass
//! v += a * dt
//! x += v * dt        (explicit Euler, uses the updated v)
//! ```
//!
//! The engine is synchronous and owns no channels; the dynamics task feeds
//! it commands and forwards the returned state.

use crate::messages::{DroneState, ForceCommand};
use crate::params::SimParams;
use crate::potential::{repulsive_field, FieldSources};
use nalgebra::Vector2;

/// Owner of the physical drone state.
#[derive(Debug, Clone)]
pub struct DynamicsEngine {
    params: SimParams,
    state: DroneState,

    /// Latest adopted force, retained until a new command arrives
    force: Vector2<f64>,

    /// Set by a reset command, honoured and cleared on the next step
    pending_reset: bool,

    ticks: u64,
}

impl DynamicsEngine {
    pub fn new(params: SimParams) -> Self {
        Self {
            params,
            state: DroneState::default(),
            force: Vector2::zeros(),
            pending_reset: false,
            ticks: 0,
        }
    }

    pub fn state(&self) -> DroneState {
        self.state
    }

    pub fn force(&self) -> Vector2<f64> {
        self.force
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Adopts a new force command. A reset flag is latched for the next step.
    pub fn apply_command(&mut self, cmd: ForceCommand) {
        if cmd.reset {
            self.pending_reset = true;
        }
        self.force = cmd.vector();
    }

    /// Advances one timestep and returns the new state.
    pub fn step(&mut self) -> DroneState {
        if self.pending_reset {
            self.state = DroneState::default();
            self.pending_reset = false;
        }

        let p_wall = repulsive_field(&self.state, &self.params, &[], FieldSources::WALLS);
        let total = self.force + p_wall;

        let dt = self.params.dt;
        let v = self.state.velocity();
        let a = (total - v * self.params.visc) / self.params.mass;
        let v = v + a * dt;
        let x = self.state.position() + v * dt;

        self.state = DroneState {
            x: x.x,
            y: x.y,
            vx: v.x,
            vy: v.y,
        };
        self.ticks += 1;
        self.state
    }
}
