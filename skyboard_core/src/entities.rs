//! Obstacles and targets owned by the coordinator.
//!
//! Each kind lives in a fixed-capacity [`EntitySlots`] array. A generator
//! batch overwrites the array from index 0 with the candidates that pass
//! [`SpawnRules`]; every slot past the accepted count is deactivated, so a
//! short batch never leaves stale entries behind.

use crate::messages::{EntitySpawn, BATCH_CAPACITY};
use crate::params::SimParams;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifetime (coordinator ticks) generators assign by default.
pub const DEFAULT_LIFETIME: i32 = 1000;

/// Obstacle or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Obstacle,
    Target,
}

impl EntityKind {
    /// The kind a candidate must keep clear of.
    pub fn other(&self) -> Self {
        match self {
            EntityKind::Obstacle => EntityKind::Target,
            EntityKind::Target => EntityKind::Obstacle,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Obstacle => write!(f, "obstacle"),
            EntityKind::Target => write!(f, "target"),
        }
    }
}

/// One slot of an entity array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub x: f64,
    pub y: f64,
    pub active: bool,

    /// Remaining coordinator ticks before deactivation
    pub life_steps: i32,
}

impl Entity {
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.life_steps = 0;
    }
}

/// Fixed-capacity array of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySlots {
    kind: EntityKind,
    slots: [Entity; BATCH_CAPACITY],
}

impl EntitySlots {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            slots: [Entity::default(); BATCH_CAPACITY],
        }
    }

    /// Every slot, active or not.
    pub fn slots(&self) -> &[Entity] {
        &self.slots
    }

    pub fn active(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter(|e| e.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Copies of the active entries, for snapshots.
    pub fn active_list(&self) -> Vec<Entity> {
        self.active().copied().collect()
    }

    /// Ages every active entry by one tick; returns how many expired.
    pub fn age(&mut self) -> usize {
        let mut expired = 0;
        for e in self.slots.iter_mut().filter(|e| e.active) {
            e.life_steps -= 1;
            if e.life_steps <= 0 {
                e.deactivate();
                expired += 1;
            }
        }
        expired
    }

    /// Replaces the array contents with the candidates `rules` accepts,
    /// checked against the active entries of the other kind.
    pub fn accept_batch(
        &mut self,
        candidates: &[EntitySpawn],
        rules: &SpawnRules,
        others: &EntitySlots,
    ) -> BatchOutcome {
        let mut accepted = 0;
        let mut rejected = 0;

        for c in candidates.iter().take(BATCH_CAPACITY) {
            match rules.check(c, others) {
                Ok(()) => {
                    self.slots[accepted] = Entity {
                        x: c.x,
                        y: c.y,
                        active: true,
                        life_steps: c.lifetime,
                    };
                    accepted += 1;
                }
                Err(reason) => {
                    tracing::debug!(kind = %self.kind, x = c.x, y = c.y, ?reason, "candidate rejected");
                    rejected += 1;
                }
            }
        }

        for e in self.slots[accepted..].iter_mut() {
            e.deactivate();
        }

        BatchOutcome { accepted, rejected }
    }

    /// Deactivates every active entry within `radius` of `pos` (inclusive)
    /// and returns how many were consumed.
    pub fn collect_within(&mut self, pos: Vector2<f64>, radius: f64) -> usize {
        let r2 = radius * radius;
        let mut hits = 0;
        for e in self.slots.iter_mut() {
            if e.active && (e.position() - pos).norm_squared() <= r2 {
                e.deactivate();
                hits += 1;
            }
        }
        hits
    }
}

/// Counts from one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// Why a candidate was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Lifetime of zero or less
    Lifetime,
    /// Inside the wall margin
    NearWall,
    /// Within clearance of an active entity of the other kind
    NearOtherKind,
}

/// Exclusion rules the coordinator applies to generator candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRules {
    /// Minimum distance from every wall
    pub wall_margin: f64,

    /// Minimum distance from active entities of the other kind
    pub cross_clearance: f64,

    pub world_half: f64,
}

impl SpawnRules {
    pub const WALL_MARGIN_FACTOR: f64 = 0.20;
    pub const CROSS_CLEARANCE_FACTOR: f64 = 0.15;

    pub fn from_params(params: &SimParams) -> Self {
        Self {
            wall_margin: params.world_half * Self::WALL_MARGIN_FACTOR,
            cross_clearance: params.world_half * Self::CROSS_CLEARANCE_FACTOR,
            world_half: params.world_half,
        }
    }

    pub fn check(&self, c: &EntitySpawn, others: &EntitySlots) -> Result<(), Rejection> {
        if c.lifetime <= 0 {
            return Err(Rejection::Lifetime);
        }

        let wall_distance = (self.world_half - c.x.abs()).min(self.world_half - c.y.abs());
        if !(wall_distance >= self.wall_margin) {
            return Err(Rejection::NearWall);
        }

        let pos = Vector2::new(c.x, c.y);
        let r2 = self.cross_clearance * self.cross_clearance;
        if others.active().any(|o| (o.position() - pos).norm_squared() <= r2) {
            return Err(Rejection::NearOtherKind);
        }

        Ok(())
    }
}
