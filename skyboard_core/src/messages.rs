//! Wire messages exchanged between Skyboard units.
//!
//! | Channel         | Direction | Message         | Frame size |
//! |-----------------|-----------|-----------------|-----------:|
//! | keys            | I -> B    | [`KeyMsg`]      | 1          |
//! | force           | B -> D    | [`ForceCommand`]| 17         |
//! | state           | D -> B    | [`DroneState`]  | 32         |
//! | obstacle batch  | O -> B    | [`EntityBatch`] | 244        |
//! | target batch    | T -> B    | [`EntityBatch`] | 244        |
//!
//! All fields are little-endian.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use skyboard_env::{BusError, FrameCursor, WireMessage};

/// Maximum number of entities in one generator batch.
pub const BATCH_CAPACITY: usize = 12;

/// One keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMsg {
    pub key: u8,
}

impl WireMessage for KeyMsg {
    const SIZE: usize = 1;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.key);
    }

    fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        Ok(Self {
            key: FrameCursor::new(bytes).u8()?,
        })
    }
}

/// Force requested from the dynamics engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceCommand {
    pub fx: f64,
    pub fy: f64,

    /// When set, the dynamics engine zeroes its state before adopting this force
    pub reset: bool,
}

impl ForceCommand {
    pub fn new(fx: f64, fy: f64) -> Self {
        Self { fx, fy, reset: false }
    }

    pub fn from_vector(v: Vector2<f64>) -> Self {
        Self::new(v.x, v.y)
    }

    pub fn vector(&self) -> Vector2<f64> {
        Vector2::new(self.fx, self.fy)
    }
}

impl WireMessage for ForceCommand {
    const SIZE: usize = 17;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.fx.to_le_bytes());
        buf.extend_from_slice(&self.fy.to_le_bytes());
        buf.push(u8::from(self.reset));
    }

    fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        let mut cur = FrameCursor::new(bytes);
        let fx = cur.f64()?;
        let fy = cur.f64()?;
        let reset = match cur.u8()? {
            0 => false,
            1 => true,
            other => return Err(BusError::malformed(format!("reset flag {other}"))),
        };
        Ok(Self { fx, fy, reset })
    }
}

/// Position and velocity of the drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DroneState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl DroneState {
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }
}

impl WireMessage for DroneState {
    const SIZE: usize = 32;

    fn encode(&self, buf: &mut Vec<u8>) {
        for v in [self.x, self.y, self.vx, self.vy] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        let mut cur = FrameCursor::new(bytes);
        Ok(Self {
            x: cur.f64()?,
            y: cur.f64()?,
            vx: cur.f64()?,
            vy: cur.f64()?,
        })
    }
}

/// One candidate entity proposed by a generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySpawn {
    pub x: f64,
    pub y: f64,

    /// Lifetime in coordinator ticks
    pub lifetime: i32,
}

/// A batch of candidate obstacles or targets.
///
/// Only the first `count` entries are meaningful; the rest are padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityBatch {
    pub count: i32,
    pub entries: [EntitySpawn; BATCH_CAPACITY],
}

impl EntityBatch {
    /// Builds a batch from up to `BATCH_CAPACITY` spawns (extra spawns are dropped).
    pub fn from_spawns(spawns: &[EntitySpawn]) -> Self {
        let mut entries = [EntitySpawn::default(); BATCH_CAPACITY];
        let n = spawns.len().min(BATCH_CAPACITY);
        entries[..n].copy_from_slice(&spawns[..n]);
        Self {
            count: n as i32,
            entries,
        }
    }

    /// The candidates the generator asked for, clamped to `0..=BATCH_CAPACITY`.
    pub fn candidates(&self) -> &[EntitySpawn] {
        let n = self.count.clamp(0, BATCH_CAPACITY as i32) as usize;
        &self.entries[..n]
    }
}

impl WireMessage for EntityBatch {
    const SIZE: usize = 4 + BATCH_CAPACITY * 20;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.count.to_le_bytes());
        for e in &self.entries {
            buf.extend_from_slice(&e.x.to_le_bytes());
            buf.extend_from_slice(&e.y.to_le_bytes());
            buf.extend_from_slice(&e.lifetime.to_le_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        let mut cur = FrameCursor::new(bytes);
        let count = cur.i32()?;
        let mut entries = [EntitySpawn::default(); BATCH_CAPACITY];
        for e in entries.iter_mut() {
            e.x = cur.f64()?;
            e.y = cur.f64()?;
            e.lifetime = cur.i32()?;
        }
        Ok(Self { count, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(KeyMsg { key: b'f' }.to_frame().len(), KeyMsg::SIZE);
        assert_eq!(ForceCommand::new(1.0, 2.0).to_frame().len(), ForceCommand::SIZE);
        assert_eq!(DroneState::default().to_frame().len(), DroneState::SIZE);
        assert_eq!(EntityBatch::from_spawns(&[]).to_frame().len(), 244);
    }

    #[test]
    fn test_force_reset_flag_survives_the_wire() {
        let cmd = ForceCommand { fx: -3.5, fy: 10.0, reset: true };
        assert_eq!(ForceCommand::decode(&cmd.to_frame()).unwrap(), cmd);
    }

    #[test]
    fn test_force_rejects_bad_reset_byte() {
        let mut frame = ForceCommand::new(0.0, 0.0).to_frame();
        frame[16] = 7;
        assert!(matches!(ForceCommand::decode(&frame), Err(BusError::Malformed(_))));
    }

    #[test]
    fn test_batch_candidates_are_clamped() {
        let spawns = vec![EntitySpawn { x: 1.0, y: 2.0, lifetime: 10 }; 20];
        let batch = EntityBatch::from_spawns(&spawns);
        assert_eq!(batch.count, BATCH_CAPACITY as i32);
        assert_eq!(batch.candidates().len(), BATCH_CAPACITY);

        let mut weird = batch;
        weird.count = -4;
        assert!(weird.candidates().is_empty());
        weird.count = 99;
        assert_eq!(weird.candidates().len(), BATCH_CAPACITY);
    }

    #[test]
    fn test_batch_decode_keeps_entries() {
        let batch = EntityBatch::from_spawns(&[
            EntitySpawn { x: -7.25, y: 3.0, lifetime: 1000 },
            EntitySpawn { x: 0.5, y: -0.5, lifetime: 1 },
        ]);
        let decoded = EntityBatch::decode(&batch.to_frame()).unwrap();
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.candidates(), batch.candidates());
    }
}
