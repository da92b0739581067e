//! Potential field navigation assist.
//!
//! Pure functions turning distances to walls and obstacles into a continuous
//! repulsive vector, and quantizing any vector onto the eight directional
//! keys. The dynamics engine evaluates walls only; the coordinator evaluates
//! obstacles only, so no source is counted twice.
//!
//! Magnitude of one source at distance `d` below its clearance `c`:
//!
//! ```text
//! |P| = gain * (1/d - 1/c)      (d floored at EPS, |P| clamped >= 0)
//! ```

use crate::entities::Entity;
use crate::keymap::Direction;
use crate::messages::{DroneState, ForceCommand};
use crate::params::SimParams;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Distance floor against division blow-up.
pub const EPS: f64 = 1e-3;

/// Obstacle clearance as a fraction of `world_half`.
pub const OBSTACLE_CLEARANCE_FACTOR: f64 = 0.30;

/// Fixed obstacle repulsion gain.
pub const OBSTACLE_GAIN: f64 = 120.0;

/// Squared norm below which repulsion is ignored when composing forces.
pub const NEGLIGIBLE_NORM2: f64 = 1e-6;

/// Which sources to include in [`repulsive_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSources {
    pub walls: bool,
    pub obstacles: bool,
}

impl FieldSources {
    /// What the dynamics engine evaluates.
    pub const WALLS: Self = Self { walls: true, obstacles: false };

    /// What the coordinator evaluates.
    pub const OBSTACLES: Self = Self { walls: false, obstacles: true };
}

fn barrier(gain: f64, distance: f64, clearance: f64) -> f64 {
    let d = distance.max(EPS);
    (gain * (1.0 / d - 1.0 / clearance)).max(0.0)
}

/// Repulsion from the four axis-aligned borders at `±world_half`.
pub fn wall_field(state: &DroneState, params: &SimParams) -> Vector2<f64> {
    let mut p = Vector2::zeros();
    let clearance = params.wall_clearance;
    let gain = params.wall_gain;
    if clearance <= 0.0 || gain <= 0.0 {
        return p;
    }
    let half = params.world_half;

    // (distance to wall, push direction)
    let walls = [
        (half - state.x, Vector2::new(-1.0, 0.0)),
        (half + state.x, Vector2::new(1.0, 0.0)),
        (half - state.y, Vector2::new(0.0, -1.0)),
        (half + state.y, Vector2::new(0.0, 1.0)),
    ];
    for (distance, away) in walls {
        if distance < clearance {
            p += away * barrier(gain, distance, clearance);
        }
    }
    p
}

/// Clearance below which an obstacle starts pushing.
pub fn obstacle_clearance(params: &SimParams) -> f64 {
    params.world_half * OBSTACLE_CLEARANCE_FACTOR
}

/// Repulsion from every active obstacle.
pub fn obstacle_field(state: &DroneState, params: &SimParams, obstacles: &[Entity]) -> Vector2<f64> {
    let clearance = obstacle_clearance(params);
    let mut p = Vector2::zeros();
    if clearance <= 0.0 {
        return p;
    }

    for obstacle in obstacles.iter().filter(|o| o.active) {
        let offset = state.position() - obstacle.position();
        let rho = offset.norm().max(EPS);
        if rho < clearance {
            // Exactly on top of an obstacle the direction is undefined; push along +x
            let away = if offset.norm() < EPS {
                Vector2::new(1.0, 0.0)
            } else {
                offset / rho
            };
            p += away * barrier(OBSTACLE_GAIN, rho, clearance);
        }
    }
    p
}

/// Unified field: the sum of the selected sources.
pub fn repulsive_field(
    state: &DroneState,
    params: &SimParams,
    obstacles: &[Entity],
    sources: FieldSources,
) -> Vector2<f64> {
    let mut p = Vector2::zeros();
    if sources.walls {
        p += wall_field(state, params);
    }
    if sources.obstacles {
        p += obstacle_field(state, params, obstacles);
    }
    p
}

/// Direction with the largest strictly positive projection of `v`, together
/// with that projection. `None` when every projection is `<= 0`.
pub fn best_direction(v: Vector2<f64>) -> Option<(Direction, f64)> {
    let mut best: Option<(Direction, f64)> = None;
    for dir in Direction::ALL {
        let dot = v.dot(&dir.unit());
        if dot > best.map_or(0.0, |(_, b)| b) {
            best = Some((dir, dot));
        }
    }
    best
}

/// A repulsive vector re-expressed as a keypress: a direction and a number
/// of force steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualKey {
    pub direction: Direction,

    /// Rounded `projection / force_step`; not clamped, may be 0
    pub steps: i64,

    /// Projection of the field on `direction`
    pub projection: f64,
}

impl VirtualKey {
    /// Force this virtual key adds, in the same units as `steps` keypresses.
    pub fn force(&self, force_step: f64) -> Vector2<f64> {
        self.direction.step_vector() * (self.steps as f64 * force_step)
    }
}

/// Quantizes a continuous vector onto the directional key alphabet.
pub fn quantize(v: Vector2<f64>, force_step: f64) -> Option<VirtualKey> {
    let (direction, projection) = best_direction(v)?;
    Some(VirtualKey {
        direction,
        steps: (projection / force_step).round() as i64,
        projection,
    })
}

/// Result of composing user force with obstacle repulsion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composition {
    /// Force actually sent to the dynamics engine
    pub command: ForceCommand,

    /// Raw obstacle field at the drone
    pub field: Vector2<f64>,

    /// Virtual key applied, if the field was significant and aligned
    pub virtual_key: Option<VirtualKey>,
}

/// Composes `user + virtual_key(obstacle_field)`.
///
/// The user force is taken by value and never modified, so repulsion can
/// not accumulate into it across sends.
pub fn compose_force(
    user: ForceCommand,
    state: &DroneState,
    params: &SimParams,
    obstacles: &[Entity],
) -> Composition {
    let field = repulsive_field(state, params, obstacles, FieldSources::OBSTACLES);
    if field.norm_squared() < NEGLIGIBLE_NORM2 {
        return Composition { command: user, field, virtual_key: None };
    }

    let virtual_key = quantize(field, params.force_step);
    let mut command = user;
    if let Some(vk) = virtual_key {
        let extra = vk.force(params.force_step);
        command.fx += extra.x;
        command.fy += extra.y;
    }
    Composition { command, field, virtual_key }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn at(x: f64, y: f64) -> DroneState {
        DroneState { x, y, vx: 0.0, vy: 0.0 }
    }

    fn obstacle(x: f64, y: f64) -> Entity {
        Entity { x, y, active: true, life_steps: 100 }
    }

    #[test]
    fn test_wall_field_zero_at_centre() {
        let p = wall_field(&at(0.0, 0.0), &SimParams::default());
        assert_eq!(p, Vector2::zeros());
    }

    #[test]
    fn test_wall_field_pushes_away_from_right_wall() {
        let params = SimParams::default();
        // 2 units from the right wall, clearance 5, gain 0.1
        let p = wall_field(&at(48.0, 0.0), &params);
        assert_relative_eq!(p.x, -0.1 * (1.0 / 2.0 - 1.0 / 5.0), epsilon = 1e-12);
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_wall_field_corner_pushes_diagonally_inward() {
        let p = wall_field(&at(-49.0, -49.0), &SimParams::default());
        assert!(p.x > 0.0 && p.y > 0.0);
        assert_relative_eq!(p.x, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_wall_field_is_floored_outside_the_arena() {
        let params = SimParams::default();
        let p = wall_field(&at(60.0, 0.0), &params);
        assert_relative_eq!(p.x, -params.wall_gain * (1.0 / EPS - 1.0 / params.wall_clearance), epsilon = 1e-9);
    }

    #[test]
    fn test_wall_field_disabled_by_zero_gain() {
        let params = SimParams { wall_gain: 0.0, ..Default::default() };
        assert_eq!(wall_field(&at(49.9, 49.9), &params), Vector2::zeros());
    }

    #[test]
    fn test_inactive_obstacles_contribute_nothing() {
        let params = SimParams::default();
        let mut o = obstacle(1.0, 0.0);
        o.active = false;
        assert_eq!(obstacle_field(&at(0.0, 0.0), &params, &[o]), Vector2::zeros());
    }

    #[test]
    fn test_drone_on_top_of_obstacle_is_pushed_along_x() {
        let params = SimParams::default();
        let p = obstacle_field(&at(3.0, -2.0), &params, &[obstacle(3.0, -2.0)]);
        assert!(p.x > 0.0 && p.x.is_finite());
        assert_eq!(p.y, 0.0);
    }

    #[test]
    fn test_obstacle_field_zero_at_clearance() {
        let params = SimParams::default();
        let c = obstacle_clearance(&params);
        let p = obstacle_field(&at(c, 0.0), &params, &[obstacle(0.0, 0.0)]);
        assert_eq!(p, Vector2::zeros());
    }

    #[test]
    fn test_sources_are_selectable() {
        let params = SimParams::default();
        let s = at(48.0, 0.0);
        let obs = [obstacle(44.0, 0.0)];
        let walls = repulsive_field(&s, &params, &obs, FieldSources::WALLS);
        let only_obs = repulsive_field(&s, &params, &obs, FieldSources::OBSTACLES);
        let both = repulsive_field(&s, &params, &obs, FieldSources { walls: true, obstacles: true });

        assert_eq!(walls, wall_field(&s, &params));
        assert_eq!(only_obs, obstacle_field(&s, &params, &obs));
        assert_relative_eq!(both, walls + only_obs, epsilon = 1e-12);
    }

    #[test]
    fn test_quantizer_returns_each_canonical_direction() {
        for dir in Direction::ALL {
            let (found, dot) = best_direction(dir.unit()).unwrap();
            assert_eq!(found, dir);
            assert_relative_eq!(dot, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_quantizer_zero_vector_has_no_direction() {
        assert!(best_direction(Vector2::zeros()).is_none());
        assert!(quantize(Vector2::zeros(), 5.0).is_none());
    }

    #[test]
    fn test_quantizer_rounds_steps() {
        let vk = quantize(Vector2::new(12.6, 0.0), 5.0).unwrap();
        assert_eq!(vk.direction, Direction::Right);
        assert_eq!(vk.steps, 3);
        assert_eq!(vk.force(5.0), Vector2::new(15.0, 0.0));

        let vk = quantize(Vector2::new(0.0, -2.4), 5.0).unwrap();
        assert_eq!(vk.direction, Direction::Down);
        assert_eq!(vk.steps, 0);
    }

    #[test]
    fn test_compose_without_obstacles_passes_user_force() {
        let params = SimParams::default();
        let user = ForceCommand::new(5.0, -10.0);
        let c = compose_force(user, &at(0.0, 0.0), &params, &[]);
        assert_eq!(c.command, user);
        assert!(c.virtual_key.is_none());
    }

    #[test]
    fn test_compose_adds_virtual_key_without_touching_user_force() {
        let params = SimParams::default();
        let user = ForceCommand::new(5.0, 0.0);
        // Obstacle 5 units to the right: field points left
        let obs = [obstacle(5.0, 0.0)];
        let c = compose_force(user, &at(0.0, 0.0), &params, &obs);

        let expected_mag = OBSTACLE_GAIN * (1.0 / 5.0 - 1.0 / 15.0);
        assert_relative_eq!(c.field.x, -expected_mag, epsilon = 1e-9);
        let vk = c.virtual_key.unwrap();
        assert_eq!(vk.direction, Direction::Left);
        assert_eq!(vk.steps, (expected_mag / 5.0).round() as i64);
        assert_relative_eq!(c.command.fx, 5.0 - vk.steps as f64 * 5.0, epsilon = 1e-9);
        assert_eq!(user, ForceCommand::new(5.0, 0.0));
    }

    #[test]
    fn test_virtual_key_is_unclamped_near_an_obstacle() {
        // Very close to an obstacle the step count grows far beyond a
        // couple of keypresses; this is kept on purpose.
        let params = SimParams::default();
        let obs = [obstacle(0.01, 0.0)];
        let c = compose_force(ForceCommand::default(), &at(0.0, 0.0), &params, &obs);
        let vk = c.virtual_key.unwrap();
        assert_eq!(vk.direction, Direction::Left);
        assert!(vk.steps > 1000, "steps = {}", vk.steps);
    }

    proptest! {
        #[test]
        fn prop_wall_field_zero_away_from_walls(x in -45.0f64..=45.0, y in -45.0f64..=45.0) {
            // Default clearance is 5, so |x|, |y| <= 45 is clearance-free
            let p = wall_field(&at(x, y), &SimParams::default());
            prop_assert_eq!(p, Vector2::zeros());
        }

        #[test]
        fn prop_obstacle_magnitude_depends_only_on_distance(
            rho in 0.01f64..20.0,
            a in 0.0f64..std::f64::consts::TAU,
            b in 0.0f64..std::f64::consts::TAU,
        ) {
            let params = SimParams::default();
            let o = [obstacle(0.0, 0.0)];
            let pa = obstacle_field(&at(rho * a.cos(), rho * a.sin()), &params, &o);
            let pb = obstacle_field(&at(rho * b.cos(), rho * b.sin()), &params, &o);
            prop_assert!((pa.norm() - pb.norm()).abs() < 1e-6 * (1.0 + pa.norm()));
        }

        #[test]
        fn prop_obstacle_magnitude_decreases_with_distance(r1 in 0.01f64..15.0, dr in 0.001f64..5.0) {
            let params = SimParams::default();
            let o = [obstacle(0.0, 0.0)];
            let near = obstacle_field(&at(r1, 0.0), &params, &o).norm();
            let far = obstacle_field(&at(r1 + dr, 0.0), &params, &o).norm();
            prop_assert!(far <= near);
        }

        #[test]
        fn prop_quantized_direction_has_positive_projection(x in -100.0f64..100.0, y in -100.0f64..100.0) {
            let v = Vector2::new(x, y);
            match best_direction(v) {
                Some((dir, dot)) => {
                    prop_assert!(dot > 0.0);
                    for other in Direction::ALL {
                        prop_assert!(v.dot(&other.unit()) <= dot + 1e-12);
                    }
                    prop_assert_eq!(dir.unit().dot(&v), dot);
                }
                None => prop_assert!(Direction::ALL.iter().all(|d| v.dot(&d.unit()) <= 0.0)),
            }
        }
    }
}
