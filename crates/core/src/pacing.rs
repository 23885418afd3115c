//! Sleep-based pacing between successive API calls and sheet writes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use crate::config::PacingConfig;

/// Shortest pause the pacer will take for a non-zero base.
pub const MIN_PACING_DELAY: Duration = Duration::from_millis(100);

/// Source of delays. Production code sleeps on the tokio timer; tests record.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays without sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}

/// Jittered pauses of `base × U(0.7, 1.3)`, floored at [`MIN_PACING_DELAY`].
#[derive(Clone)]
pub struct Pacer {
    scale: f64,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer").field("scale", &self.scale).finish_non_exhaustive()
    }
}

impl Pacer {
    #[must_use]
    pub fn new(config: PacingConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            scale: config.scale.max(0.0),
            sleeper,
        }
    }

    /// Sleeps for a jittered version of `base` and returns the delay taken.
    pub async fn sleep_with_jitter(&self, base: Duration) -> Duration {
        let base = base.mul_f64(self.scale);
        if base.is_zero() {
            return Duration::ZERO;
        }
        let unit: f64 = rand::thread_rng().gen();
        let delay = jittered(base, unit);
        self.sleeper.sleep(delay).await;
        delay
    }

    /// Walks `items` in chunks of `size`, pausing between chunks.
    #[must_use]
    pub fn batches<'a, T>(&'a self, items: &'a [T], size: usize, pause: Duration) -> PacedBatches<'a, T> {
        PacedBatches {
            pacer: self,
            chunks: items.chunks(size.max(1)),
            pause,
            started: false,
        }
    }
}

/// Maps `unit ∈ [0, 1)` onto `base × [0.7, 1.3)` with the pacing floor.
#[must_use]
pub fn jittered(base: Duration, unit: f64) -> Duration {
    let factor = 0.7 + 0.6 * unit.clamp(0.0, 1.0);
    base.mul_f64(factor).max(MIN_PACING_DELAY)
}

pub struct PacedBatches<'a, T> {
    pacer: &'a Pacer,
    chunks: std::slice::Chunks<'a, T>,
    pause: Duration,
    started: bool,
}

impl<'a, T> PacedBatches<'a, T> {
    pub async fn next(&mut self) -> Option<&'a [T]> {
        let chunk = self.chunks.next()?;
        if self.started {
            self.pacer.sleep_with_jitter(self.pause).await;
        }
        self.started = true;
        Some(chunk)
    }
}
