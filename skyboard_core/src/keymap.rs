//! Keyboard command vocabulary.
//!
//! The directional keys form a 3x3 cluster whose centre is the brake:
//!
//! ```text
//!     w e r        up-left    up     up-right
//!     s d f   ->   left      brake   right
//!     x c v        down-left  down   down-right
//! ```
//!
//! The same eight directions are the output alphabet of the potential-field
//! quantizer, so a repulsion "virtual key" and a human keypress add force in
//! identical units.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_1_SQRT_2;

/// One of the eight directional keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    UpLeft,
    Up,
    UpRight,
    Left,
    Right,
    DownLeft,
    Down,
    DownRight,
}

impl Direction {
    /// All directions in cluster order (w e r s f x c v).
    pub const ALL: [Direction; 8] = [
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
        Direction::Left,
        Direction::Right,
        Direction::DownLeft,
        Direction::Down,
        Direction::DownRight,
    ];

    /// Index into [`Direction::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Direction::UpLeft => 0,
            Direction::Up => 1,
            Direction::UpRight => 2,
            Direction::Left => 3,
            Direction::Right => 4,
            Direction::DownLeft => 5,
            Direction::Down => 6,
            Direction::DownRight => 7,
        }
    }

    pub fn key(&self) -> u8 {
        match self {
            Direction::UpLeft => b'w',
            Direction::Up => b'e',
            Direction::UpRight => b'r',
            Direction::Left => b's',
            Direction::Right => b'f',
            Direction::DownLeft => b'x',
            Direction::Down => b'c',
            Direction::DownRight => b'v',
        }
    }

    /// Force increment of one keypress, in units of `force_step`.
    ///
    /// Diagonals are (±1, ±1), not normalised: a diagonal key pushes on
    /// both axes by a full step.
    pub fn step_vector(&self) -> Vector2<f64> {
        let (x, y) = match self {
            Direction::UpLeft => (-1.0, 1.0),
            Direction::Up => (0.0, 1.0),
            Direction::UpRight => (1.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::DownLeft => (-1.0, -1.0),
            Direction::Down => (0.0, -1.0),
            Direction::DownRight => (1.0, -1.0),
        };
        Vector2::new(x, y)
    }

    /// Unit-length heading used for projections.
    pub fn unit(&self) -> Vector2<f64> {
        let (x, y) = match self {
            Direction::UpLeft => (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            Direction::Up => (0.0, 1.0),
            Direction::UpRight => (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::DownLeft => (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            Direction::Down => (0.0, -1.0),
            Direction::DownRight => (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
        };
        Vector2::new(x, y)
    }
}

/// A decoded keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Add one force step in a direction
    Move(Direction),
    /// Zero the user force
    Brake,
    /// Toggle RUNNING / PAUSED
    PauseToggle,
    /// Zero the drone state and the user force
    Reset,
    /// Stop the simulation
    Quit,
    /// Anything else
    Unknown(u8),
}

impl Command {
    pub fn from_key(key: u8) -> Self {
        match key {
            b'd' => Command::Brake,
            b'p' => Command::PauseToggle,
            b'O' => Command::Reset,
            b'q' => Command::Quit,
            other => Direction::ALL
                .iter()
                .find(|d| d.key() == other)
                .map(|d| Command::Move(*d))
                .unwrap_or(Command::Unknown(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cluster_keys_decode() {
        assert_eq!(Command::from_key(b'w'), Command::Move(Direction::UpLeft));
        assert_eq!(Command::from_key(b'f'), Command::Move(Direction::Right));
        assert_eq!(Command::from_key(b'c'), Command::Move(Direction::Down));
        assert_eq!(Command::from_key(b'd'), Command::Brake);
        assert_eq!(Command::from_key(b'p'), Command::PauseToggle);
        assert_eq!(Command::from_key(b'O'), Command::Reset);
        assert_eq!(Command::from_key(b'q'), Command::Quit);
        assert_eq!(Command::from_key(b'o'), Command::Unknown(b'o'));
        assert_eq!(Command::from_key(b'\n'), Command::Unknown(b'\n'));
    }

    #[test]
    fn test_index_matches_table_order() {
        for (i, d) in Direction::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn test_units_are_unit_length_and_aligned() {
        for d in Direction::ALL {
            assert_relative_eq!(d.unit().norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(d.unit().normalize(), d.step_vector().normalize(), epsilon = 1e-12);
        }
    }
}
