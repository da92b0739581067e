//! Core environment context trait for Skyboard units.

use async_trait::async_trait;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the clock and entropy so that every Skyboard unit
/// (dynamics, coordinator, watchdog, generators) can run against the real
/// tokio clock in production and a virtual clock in deterministic tests.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` (in `skyboard_sim`) - manual virtual clock, seeded streams
#[async_trait]
pub trait ArenaContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// All liveness thresholds (heartbeat age, watchdog warn/kill) are
    /// measured against this clock, never against wall-clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Derives a seed for a named random stream.
    ///
    /// Generators use this so that obstacle and target placement is
    /// reproducible in simulation while staying independent of each other.
    ///
    /// # Arguments
    /// * `stream` - A value to combine with the global seed
    fn derive_seed(&self, stream: u64) -> u64;

    /// Returns the context's master seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
