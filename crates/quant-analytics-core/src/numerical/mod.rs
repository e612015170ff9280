//! Shared numerical primitives and the `NumericalCore` every engine holds.

pub mod descriptive;
pub mod linalg;
pub mod regression;
pub mod special;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::cache::{CacheKey, CacheStats, MemoCache};
use crate::config::EngineConfig;
use crate::AnalyticsResult;

pub use regression::{ols, Coefficient, RegressionModel};

/// Configuration, rounding, randomness and the memo cache, shared by
/// composition. Engines hold it as `Rc<NumericalCore>`; the cache sits in a
/// `RefCell`, so a core and its engines stay on one thread.
#[derive(Debug)]
pub struct NumericalCore {
    config: EngineConfig,
    cache: RefCell<MemoCache>,
}

impl NumericalCore {
    pub fn new(config: EngineConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        let cache = MemoCache::new(config.cache_capacity, config.cache_ttl());
        Ok(NumericalCore {
            config,
            cache: RefCell::new(cache),
        })
    }

    /// Validated core wrapped for sharing between engines.
    pub fn shared(config: EngineConfig) -> AnalyticsResult<Rc<Self>> {
        Ok(Rc::new(Self::new(config)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a cache key for `method` using the configured key strategy.
    pub fn key(&self, method: &str) -> CacheKey {
        CacheKey::new(method, self.config.key_strategy)
    }

    /// Return the cached value for `key`, or run `compute` and store its
    /// result. Errors are returned as-is and never stored.
    ///
    /// The cache borrow is released before `compute` runs, so computations may
    /// themselves call `memoize`. If the cache is already borrowed the call
    /// behaves as a miss and skips the store.
    pub fn memoize<T, F>(&self, key: CacheKey, compute: F) -> AnalyticsResult<Rc<T>>
    where
        T: Any,
        F: FnOnce() -> AnalyticsResult<T>,
    {
        let hit = match self.cache.try_borrow_mut() {
            Ok(mut cache) => cache.get::<T>(&key),
            Err(_) => None,
        };
        if let Some(value) = hit {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
        debug!(key = %key, "cache miss");

        let value = Rc::new(compute()?);
        if let Ok(mut cache) = self.cache.try_borrow_mut() {
            cache.set(&key, Rc::clone(&value), None);
        }
        Ok(value)
    }

    /// Round to the configured number of decimals, half away from zero.
    /// Non-finite and out-of-range values pass through unchanged.
    pub fn round(&self, value: f64) -> f64 {
        round_dp(value, self.config.precision)
    }

    pub fn round_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.round(*v)).collect()
    }

    /// Fresh generator: seeded from the config when a seed is set.
    pub fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .try_borrow()
            .map(|c| c.stats())
            .unwrap_or_default()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.try_borrow().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.try_borrow_mut() {
            cache.clear();
        }
    }
}

impl Default for NumericalCore {
    fn default() -> Self {
        let config = EngineConfig::default();
        let cache = MemoCache::new(config.cache_capacity, config.cache_ttl());
        NumericalCore {
            config,
            cache: RefCell::new(cache),
        }
    }
}

pub fn round_dp(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Deterministic approximately-normal noise (Irwin-Hall sum of 12 uniforms
/// from a 64-bit LCG), so statistical assertions are reproducible.
#[cfg(test)]
pub(crate) fn test_noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            let mut sum = 0.0;
            for _ in 0..12 {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                sum += (state >> 11) as f64 / (1u64 << 53) as f64;
            }
            sum - 6.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(round_dp(0.123_456_789, 4), 0.1235);
        assert_eq!(round_dp(-0.125, 2), -0.13);
        assert_eq!(round_dp(2.0, 4), 2.0);
        assert!(round_dp(f64::NAN, 2).is_nan());
        assert_eq!(round_dp(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_memoize_returns_identical_reference() {
        let core = NumericalCore::default();
        let calls = Cell::new(0);
        let run = || {
            core.memoize(core.key("square").param("x", 3), || {
                calls.set(calls.get() + 1);
                Ok(9.0_f64)
            })
        };
        let a = run().unwrap();
        let b = run().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
        assert_eq!(core.cache_stats().hits, 1);
    }

    #[test]
    fn test_memoize_does_not_store_errors() {
        let core = NumericalCore::default();
        let key = core.key("fails");
        let first: AnalyticsResult<Rc<f64>> = core.memoize(key.clone(), || {
            Err(AnalyticsError::insufficient("fails", "nothing to see"))
        });
        assert!(first.is_err());
        assert_eq!(core.cache_len(), 0);
        let second = core.memoize(key, || Ok(1.0_f64)).unwrap();
        assert_eq!(*second, 1.0);
    }

    #[test]
    fn test_nested_memoize_is_allowed() {
        let core = NumericalCore::default();
        let outer = core
            .memoize(core.key("outer"), || {
                let inner = core.memoize(core.key("inner"), || Ok(2_i64))?;
                Ok(*inner * 10)
            })
            .unwrap();
        assert_eq!(*outer, 20);
        assert_eq!(core.cache_len(), 2);
    }

    #[test]
    fn test_expired_entry_recomputes() {
        let config = EngineConfig {
            cache_timeout_ms: 5,
            ..Default::default()
        };
        let core = NumericalCore::new(config).unwrap();
        let a = core.memoize(core.key("t"), || Ok(String::from("v"))).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let b = core.memoize(core.key("t"), || Ok(String::from("v"))).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            confidence_level: 1.5,
            ..Default::default()
        };
        assert!(NumericalCore::new(config).is_err());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let core = NumericalCore::new(EngineConfig::default().with_seed(7)).unwrap();
        let a: f64 = core.rng().gen();
        let b: f64 = core.rng().gen();
        assert_eq!(a, b);
    }
}
