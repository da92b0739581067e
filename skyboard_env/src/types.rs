//! Unit identities for the Skyboard process choreography.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one independently running unit.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    /// Creates a new random UnitId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic UnitId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The role a unit plays in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    /// Blackboard (B): owns the world state
    Coordinator,
    /// Keyboard source (I)
    Keyboard,
    /// Dynamics engine (D)
    Dynamics,
    /// Obstacle generator (O)
    Obstacles,
    /// Target generator (T)
    Targets,
    /// Watchdog (W)
    Watchdog,
}

impl UnitRole {
    /// Short tag used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            UnitRole::Coordinator => "B",
            UnitRole::Keyboard => "I",
            UnitRole::Dynamics => "D",
            UnitRole::Obstacles => "O",
            UnitRole::Targets => "T",
            UnitRole::Watchdog => "W",
        }
    }
}

impl std::fmt::Display for UnitRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
