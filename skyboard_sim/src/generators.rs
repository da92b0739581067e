//! Obstacle (O) and target (T) generators.
//!
//! Each generator periodically proposes a full batch of candidates. Spacing
//! between candidates of the same batch is the generator's job; wall and
//! cross-kind exclusion is left to the coordinator.

use nalgebra::Vector2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skyboard_core::{EntityBatch, EntityKind, EntitySpawn, SimParams, BATCH_CAPACITY, DEFAULT_LIFETIME};
use skyboard_env::{ArenaContext, FrameSender, SignalReceiver, UnitRole};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Rejection-sampling attempts per candidate before giving up on spacing.
pub const MAX_ATTEMPTS: usize = 50;

/// Region candidates are drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Square `[-half, half]^2`
    Square { half: f64 },
    /// Disk of `radius` centred on the origin, area-uniform
    Disk { radius: f64 },
}

impl Placement {
    fn sample(&self, rng: &mut impl Rng) -> Vector2<f64> {
        match *self {
            Placement::Square { half } => {
                Vector2::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half))
            }
            Placement::Disk { radius } => {
                let r = radius * rng.gen::<f64>().sqrt();
                let theta = rng.gen_range(0.0..std::f64::consts::TAU);
                Vector2::new(r * theta.cos(), r * theta.sin())
            }
        }
    }
}

/// Everything that distinguishes one generator from the other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    pub kind: EntityKind,
    pub placement: Placement,

    /// Minimum distance between candidates of one batch
    pub spacing: f64,

    pub count: usize,
    pub lifetime: i32,
    pub interval: Duration,

    /// Random stream id passed to `derive_seed`
    pub stream: u64,
}

impl GeneratorConfig {
    /// Uniform placement in the inner square, 45 s between batches.
    pub fn obstacles(params: &SimParams) -> Self {
        let half = params.world_half;
        Self {
            kind: EntityKind::Obstacle,
            placement: Placement::Square { half: half - 0.20 * half },
            spacing: 0.15 * half,
            count: BATCH_CAPACITY,
            lifetime: DEFAULT_LIFETIME,
            interval: Duration::from_secs(45),
            stream: 1,
        }
    }

    /// Area-uniform placement in a central disk, 50 s between batches.
    pub fn targets(params: &SimParams) -> Self {
        let half = params.world_half;
        Self {
            kind: EntityKind::Target,
            placement: Placement::Disk { radius: 0.5 * half },
            spacing: 0.12 * half,
            count: BATCH_CAPACITY,
            lifetime: DEFAULT_LIFETIME,
            interval: Duration::from_secs(50),
            stream: 2,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Draws one batch. A candidate that cannot be spaced within
/// [`MAX_ATTEMPTS`] draws is placed unconstrained.
pub fn generate_batch(rng: &mut impl Rng, config: &GeneratorConfig) -> Vec<EntitySpawn> {
    let count = config.count.min(BATCH_CAPACITY);
    let spacing2 = config.spacing * config.spacing;
    let mut points: Vec<Vector2<f64>> = Vec::with_capacity(count);

    for _ in 0..count {
        let spaced = (0..MAX_ATTEMPTS)
            .map(|_| config.placement.sample(rng))
            .find(|p| points.iter().all(|q| (p - q).norm_squared() >= spacing2));
        let p = match spaced {
            Some(p) => p,
            None => {
                debug!(kind = %config.kind, "spacing not satisfied, placing unconstrained");
                config.placement.sample(rng)
            }
        };
        points.push(p);
    }

    points
        .into_iter()
        .map(|p| EntitySpawn { x: p.x, y: p.y, lifetime: config.lifetime })
        .collect()
}

/// Sends a batch immediately and then every `config.interval`. Returns the
/// number of batches sent.
pub async fn run_generator<C: ArenaContext>(
    ctx: Arc<C>,
    config: GeneratorConfig,
    batches: FrameSender<EntityBatch>,
    mut stop: SignalReceiver,
) -> u64 {
    let role = match config.kind {
        EntityKind::Obstacle => UnitRole::Obstacles,
        EntityKind::Target => UnitRole::Targets,
    };
    let seed = ctx.derive_seed(config.stream);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sent = 0;
    info!(%role, seed, interval_s = config.interval.as_secs_f64(), "generator started");

    loop {
        let spawns = generate_batch(&mut rng, &config);
        let batch = EntityBatch::from_spawns(&spawns);

        tokio::select! {
            biased;
            _ = stop.raised() => break,
            result = batches.send(&batch) => {
                if result.is_err() {
                    info!(%role, "coordinator gone");
                    break;
                }
            }
        }
        sent += 1;
        info!(%role, count = batch.count, batch = sent, "batch sent");

        tokio::select! {
            biased;
            _ = stop.raised() => break,
            _ = ctx.sleep(config.interval) => {}
        }
    }

    info!(%role, batches = sent, "generator stopped");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use skyboard_env::{channel, signal, Frame};

    fn assert_spaced(spawns: &[EntitySpawn], spacing: f64) {
        for (i, a) in spawns.iter().enumerate() {
            for b in &spawns[i + 1..] {
                let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(d >= spacing, "({}, {}) and ({}, {}) are {d} apart", a.x, a.y, b.x, b.y);
            }
        }
    }

    #[test]
    fn test_obstacles_stay_in_inner_square() {
        let params = SimParams::default();
        let config = GeneratorConfig::obstacles(&params);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let spawns = generate_batch(&mut rng, &config);
        assert_eq!(spawns.len(), BATCH_CAPACITY);
        for s in &spawns {
            assert!(s.x.abs() <= 40.0 && s.y.abs() <= 40.0);
            assert_eq!(s.lifetime, DEFAULT_LIFETIME);
        }
        assert_spaced(&spawns, config.spacing);
    }

    #[test]
    fn test_targets_stay_in_disk() {
        let params = SimParams::default();
        let config = GeneratorConfig::targets(&params);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let spawns = generate_batch(&mut rng, &config);
        assert_eq!(spawns.len(), BATCH_CAPACITY);
        for s in &spawns {
            assert!((s.x * s.x + s.y * s.y).sqrt() <= 25.0 + 1e-9);
        }
        assert_spaced(&spawns, config.spacing);
    }

    #[test]
    fn test_same_seed_same_batch() {
        let config = GeneratorConfig::targets(&SimParams::default());
        let a = generate_batch(&mut ChaCha8Rng::seed_from_u64(3), &config);
        let b = generate_batch(&mut ChaCha8Rng::seed_from_u64(3), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_impossible_spacing_falls_back() {
        let config = GeneratorConfig {
            spacing: 1_000.0,
            ..GeneratorConfig::obstacles(&SimParams::default())
        };
        let spawns = generate_batch(&mut ChaCha8Rng::seed_from_u64(5), &config);
        assert_eq!(spawns.len(), BATCH_CAPACITY);
    }

    #[tokio::test]
    async fn test_first_batch_is_immediate_and_repeats() {
        let ctx = SimContext::shared(9);
        let (tx, mut rx) = channel::<EntityBatch>(4);
        let (stop_tx, stop_rx) = signal();
        let config = GeneratorConfig::obstacles(&SimParams::default());

        let task = tokio::spawn(run_generator(ctx.clone(), config, tx, stop_rx));

        let Frame::Message(first) = rx.recv().await else {
            panic!("expected a batch");
        };
        assert_eq!(first.count, BATCH_CAPACITY as i32);
        let Frame::Message(second) = rx.recv().await else {
            panic!("expected a batch");
        };
        assert_ne!(first, second);
        assert!(ctx.now() >= config.interval);

        stop_tx.raise();
        while let Frame::Message(_) = rx.recv().await {}
        assert!(task.await.unwrap() >= 2);
    }
}
