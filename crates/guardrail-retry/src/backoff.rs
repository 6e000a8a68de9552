use rand::Rng;
use std::time::Duration;

/// Exponential backoff with optional jitter.
///
/// The delay before retry `n` (1-indexed) is `initial × factor^(n−1)`, capped at
/// `max`. With jitter the capped value is scaled by a uniform factor in
/// `[0.5, 1.5]` and capped at `max` again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Creates a backoff. Factors below 1 (and NaN) are treated as 1, so delays
    /// never shrink between attempts.
    pub fn new(initial: Duration, max: Duration, factor: f64, jitter: bool) -> Self {
        let factor = if factor >= 1.0 { factor } else { 1.0 };
        Self {
            initial,
            max,
            factor,
            jitter,
        }
    }

    /// The delay before retry `attempt` without jitter.
    pub fn unjittered(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let secs = self.initial.as_secs_f64() * self.factor.powi(exponent);
        // `min` also absorbs infinities and the NaN of `0 × ∞`.
        Duration::try_from_secs_f64(secs.min(self.max.as_secs_f64()).max(0.0))
            .map_or(self.max, |d| d.min(self.max))
    }

    /// The delay before retry `attempt`, jittered if enabled.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.unjittered(attempt);
        if !self.jitter {
            return base;
        }
        let scale = rand::rng().random_range(0.5..=1.5);
        Duration::try_from_secs_f64(base.as_secs_f64() * scale)
            .map_or(self.max, |d| d.min(self.max))
    }
}
