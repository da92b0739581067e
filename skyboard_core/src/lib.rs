//! Skyboard Core - control kernel for the drone arena
//!
//! Pure, synchronous engines that the runtime tasks drive:
//! 1. **Dynamics**: fixed-timestep damped point mass with wall repulsion
//! 2. **Potential field**: wall/obstacle repulsion quantized onto the
//!    same 8-direction key vocabulary a human uses
//! 3. **Blackboard**: the coordinator's world state and mode machine
//! 4. **Watchdog**: heartbeat supervision with warn -> kill escalation

pub mod blackboard;
pub mod dynamics;
pub mod entities;
pub mod error;
pub mod keymap;
pub mod messages;
pub mod params;
pub mod potential;
pub mod snapshot;
pub mod watchdog;

// Re-export key types for convenience
pub use blackboard::{Blackboard, Effects, HeartbeatRecord, Mode, ScoreState};
pub use dynamics::DynamicsEngine;
pub use entities::{Entity, EntityKind, EntitySlots, SpawnRules, DEFAULT_LIFETIME};
pub use error::ParamsError;
pub use keymap::{Command, Direction};
pub use messages::{DroneState, EntityBatch, EntitySpawn, ForceCommand, KeyMsg, BATCH_CAPACITY};
pub use params::SimParams;
pub use potential::{compose_force, quantize, repulsive_field, FieldSources, VirtualKey};
pub use snapshot::Snapshot;
pub use watchdog::{WatchdogAction, WatchdogMonitor, WatchdogPhase};
