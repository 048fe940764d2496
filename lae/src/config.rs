use std::ops::Range;

use serde::{Deserialize, Serialize};

use lae_api::errors::SchedulingError;

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "lae-worker-";
pub const DEFAULT_MIN_FATIGUE_FACTOR: f64 = 0.5;
pub const DEFAULT_MAX_FATIGUE_FACTOR: f64 = 1.5;

// --- Executor Configuration ---

/// Configuration for the `TiredExecutor` worker pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// The number of worker threads in the pool.
    pub pool_size: usize,

    /// Inclusive lower bound of the per-worker fatigue factor.
    pub min_fatigue_factor: f64,

    /// Exclusive upper bound of the per-worker fatigue factor.
    pub max_fatigue_factor: f64,

    /// Worker threads are named `<prefix><id>`.
    pub thread_name_prefix: String,

    /// Seed for drawing fatigue factors. `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus::get(),
            min_fatigue_factor: DEFAULT_MIN_FATIGUE_FACTOR,
            max_fatigue_factor: DEFAULT_MAX_FATIGUE_FACTOR,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            seed: None,
        }
    }
}

impl ExecutorConfig {
    /// Default configuration with an explicit pool size.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Default::default()
        }
    }

    /// Sets the seed used to draw fatigue factors.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Range fatigue factors are drawn from.
    pub fn fatigue_factor_range(&self) -> Range<f64> {
        self.min_fatigue_factor..self.max_fatigue_factor
    }

    /// Checks that a pool can be built from this configuration.
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.pool_size == 0 {
            return Err(SchedulingError::InvalidConfig(
                "pool size must be at least 1".to_string(),
            ));
        }
        if !(self.min_fatigue_factor.is_finite() && self.max_fatigue_factor.is_finite()) {
            return Err(SchedulingError::InvalidConfig(
                "fatigue factor bounds must be finite".to_string(),
            ));
        }
        if self.min_fatigue_factor <= 0.0 {
            return Err(SchedulingError::InvalidConfig(format!(
                "minimum fatigue factor must be positive, got {}",
                self.min_fatigue_factor
            )));
        }
        if self.min_fatigue_factor >= self.max_fatigue_factor {
            return Err(SchedulingError::InvalidConfig(format!(
                "fatigue factor range [{}, {}) is empty",
                self.min_fatigue_factor, self.max_fatigue_factor
            )));
        }
        Ok(())
    }
}
