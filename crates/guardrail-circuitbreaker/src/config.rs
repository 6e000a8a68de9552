use std::time::Duration;

/// Environment variable for [`PartialBreakerConfig::failure_threshold`].
pub const ENV_FAILURE_THRESHOLD: &str = "CIRCUIT_BREAKER_FAILURE_THRESHOLD";
/// Environment variable for [`PartialBreakerConfig::success_threshold`].
pub const ENV_SUCCESS_THRESHOLD: &str = "CIRCUIT_BREAKER_SUCCESS_THRESHOLD";
/// Environment variable for [`PartialBreakerConfig::open_duration_ms`].
pub const ENV_OPEN_DURATION_MS: &str = "CIRCUIT_BREAKER_OPEN_DURATION_MS";
/// Environment variable for [`PartialBreakerConfig::half_open_max_concurrent`].
pub const ENV_HALF_OPEN_MAX_CONCURRENT: &str = "CIRCUIT_BREAKER_HALF_OPEN_MAX_CONCURRENT";

/// Fully resolved breaker configuration.
///
/// Every field is a positive integer. Values are resolved from process-wide
/// defaults and per-dependency overrides; see [`PartialBreakerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakerConfig {
    /// Consecutive failures while closed that trip the breaker.
    ///
    /// Default: 5
    pub failure_threshold: usize,
    /// Successful probes while half-open that close the breaker.
    ///
    /// Default: 2
    pub success_threshold: usize,
    /// How long the breaker stays open before admitting probes, in milliseconds.
    ///
    /// Default: 30 000
    pub open_duration_ms: u64,
    /// Probe calls allowed in flight while half-open.
    ///
    /// Default: 1
    pub half_open_max_concurrent: usize,
}

impl BreakerConfig {
    /// Built-in defaults used when nothing else is configured.
    pub const BUILT_IN: BreakerConfig = BreakerConfig {
        failure_threshold: 5,
        success_threshold: 2,
        open_duration_ms: 30_000,
        half_open_max_concurrent: 1,
    };

    /// The open period as a [`Duration`].
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// Replaces zero fields with the built-in defaults.
    pub fn normalized(self) -> Self {
        PartialBreakerConfig::from(self).resolve_over(&BreakerConfig::BUILT_IN)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::BUILT_IN
    }
}

/// A partial breaker configuration: process-wide defaults updates or
/// per-dependency overrides.
///
/// Unset fields inherit from the layer below. Zero values are invalid and are
/// ignored at resolution time, so they also inherit.
///
/// # Example
///
/// ```rust
/// use guardrail_circuitbreaker::{BreakerConfig, PartialBreakerConfig};
///
/// let overrides = PartialBreakerConfig::new()
///     .failure_threshold(3)
///     .open_duration_ms(0); // invalid, falls back
///
/// let resolved = overrides.resolve_over(&BreakerConfig::default());
/// assert_eq!(resolved.failure_threshold, 3);
/// assert_eq!(resolved.open_duration_ms, 30_000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PartialBreakerConfig {
    /// See [`BreakerConfig::failure_threshold`].
    pub failure_threshold: Option<usize>,
    /// See [`BreakerConfig::success_threshold`].
    pub success_threshold: Option<usize>,
    /// See [`BreakerConfig::open_duration_ms`].
    pub open_duration_ms: Option<u64>,
    /// See [`BreakerConfig::half_open_max_concurrent`].
    pub half_open_max_concurrent: Option<usize>,
}

impl PartialBreakerConfig {
    /// Creates an empty partial configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.failure_threshold = Some(n);
        self
    }

    /// Sets the success threshold.
    pub fn success_threshold(mut self, n: usize) -> Self {
        self.success_threshold = Some(n);
        self
    }

    /// Sets the open period in milliseconds.
    pub fn open_duration_ms(mut self, ms: u64) -> Self {
        self.open_duration_ms = Some(ms);
        self
    }

    /// Sets the open period.
    pub fn open_duration(self, duration: Duration) -> Self {
        self.open_duration_ms(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    /// Sets the half-open probe cap.
    pub fn half_open_max_concurrent(mut self, n: usize) -> Self {
        self.half_open_max_concurrent = Some(n);
        self
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlays `other` on top of `self`: fields set in `other` win.
    pub fn merge(&mut self, other: &PartialBreakerConfig) {
        if other.failure_threshold.is_some() {
            self.failure_threshold = other.failure_threshold;
        }
        if other.success_threshold.is_some() {
            self.success_threshold = other.success_threshold;
        }
        if other.open_duration_ms.is_some() {
            self.open_duration_ms = other.open_duration_ms;
        }
        if other.half_open_max_concurrent.is_some() {
            self.half_open_max_concurrent = other.half_open_max_concurrent;
        }
    }

    /// Resolves against `base`, keeping the base value for unset or zero fields.
    pub fn resolve_over(&self, base: &BreakerConfig) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: positive(self.failure_threshold, base.failure_threshold),
            success_threshold: positive(self.success_threshold, base.success_threshold),
            open_duration_ms: positive(self.open_duration_ms, base.open_duration_ms),
            half_open_max_concurrent: positive(
                self.half_open_max_concurrent,
                base.half_open_max_concurrent,
            ),
        }
    }

    /// Reads the `CIRCUIT_BREAKER_*` environment variables.
    ///
    /// Missing, non-numeric or non-positive values are left unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the `CIRCUIT_BREAKER_*` keys through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            failure_threshold: parse_positive(lookup(ENV_FAILURE_THRESHOLD)),
            success_threshold: parse_positive(lookup(ENV_SUCCESS_THRESHOLD)),
            open_duration_ms: parse_positive(lookup(ENV_OPEN_DURATION_MS)),
            half_open_max_concurrent: parse_positive(lookup(ENV_HALF_OPEN_MAX_CONCURRENT)),
        }
    }
}

impl From<BreakerConfig> for PartialBreakerConfig {
    fn from(config: BreakerConfig) -> Self {
        Self {
            failure_threshold: Some(config.failure_threshold),
            success_threshold: Some(config.success_threshold),
            open_duration_ms: Some(config.open_duration_ms),
            half_open_max_concurrent: Some(config.half_open_max_concurrent),
        }
    }
}

fn positive<T>(value: Option<T>, fallback: T) -> T
where
    T: PartialOrd + Default,
{
    match value {
        Some(v) if v > T::default() => v,
        _ => fallback,
    }
}

fn parse_positive<T>(raw: Option<String>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.and_then(|s| s.trim().parse::<T>().ok())
        .filter(|v| *v > T::default())
}
