//! Production implementation of ArenaContext using Tokio.

use crate::ArenaContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Production context backed by the Tokio clock and OS entropy.
///
/// Uses `tokio::time::Instant` so that a paused test runtime
/// (`start_paused = true`) drives `now()` and `sleep()` consistently.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Optional fixed seed (0 = draw from OS entropy)
    seed: u64,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            seed: 0,
        }
    }

    /// Creates a context whose random streams derive from `seed`.
    ///
    /// A seed of 0 keeps the production behaviour (fresh entropy per stream).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArenaContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn derive_seed(&self, stream: u64) -> u64 {
        if self.seed == 0 {
            rand::random()
        } else {
            self.seed.wrapping_mul(0x517cc1b727220a95) ^ stream
        }
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_context_follows_paused_clock() {
        let ctx = TokioContext::new();
        ctx.sleep(Duration::from_secs(3)).await;

        // Auto-advance jumps straight to the timer deadline
        assert!(ctx.now() >= Duration::from_secs(3));
        assert!(ctx.now() < Duration::from_secs(4));
    }

    #[test]
    fn test_tokio_context_seeded_streams() {
        let ctx = TokioContext::with_seed(7);
        assert_eq!(ctx.seed(), 7);
        assert_eq!(ctx.derive_seed(1), ctx.derive_seed(1));
        assert_ne!(ctx.derive_seed(1), ctx.derive_seed(2));
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
