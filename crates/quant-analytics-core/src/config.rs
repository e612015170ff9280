use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::KeyStrategy;
use crate::error::AnalyticsError;
use crate::types::ReturnFrequency;
use crate::AnalyticsResult;

/// Constructor-time options shared by every engine built on one core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache entry lifetime in milliseconds
    pub cache_timeout_ms: u64,
    /// Entry ceiling before eviction kicks in
    pub cache_capacity: usize,
    pub key_strategy: KeyStrategy,
    /// Decimal places published results are rounded to
    pub precision: u32,
    /// Default VaR / confidence-band level
    pub confidence_level: f64,
    /// Hypothesis-test alpha
    pub significance_level: f64,
    /// Default number of periods ahead for forecasts
    pub forecast_horizon: usize,
    pub monte_carlo_paths: usize,
    /// Seed for every stochastic routine; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Annualised risk-free rate
    pub risk_free_rate: f64,
    pub frequency: ReturnFrequency,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_timeout_ms: 300_000,
            cache_capacity: 1_000,
            key_strategy: KeyStrategy::ShapeDigest,
            precision: 6,
            confidence_level: 0.95,
            significance_level: 0.05,
            forecast_horizon: 12,
            monte_carlo_paths: 10_000,
            seed: None,
            risk_free_rate: 0.02,
            frequency: ReturnFrequency::Daily,
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "confidence_level",
                "Confidence level must be between 0 and 1 (exclusive)",
            ));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "significance_level",
                "Significance level must be between 0 and 1 (exclusive)",
            ));
        }
        if self.precision > 15 {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "precision",
                "Precision above 15 decimals exceeds f64 resolution",
            ));
        }
        if self.forecast_horizon == 0 {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "forecast_horizon",
                "Forecast horizon must be positive",
            ));
        }
        if self.monte_carlo_paths < 100 {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "monte_carlo_paths",
                "At least 100 Monte Carlo paths required",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "cache_capacity",
                "Cache capacity must be positive",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(AnalyticsError::invalid(
                "EngineConfig",
                "risk_free_rate",
                "Risk-free rate must be finite",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.monte_carlo_paths, 10_000);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"precision": 4, "key_strategy": "content_hash"}"#).unwrap();
        assert_eq!(cfg.precision, 4);
        assert_eq!(cfg.key_strategy, KeyStrategy::ContentHash);
        assert_eq!(cfg.forecast_horizon, 12);
    }

    #[test]
    fn test_reject_confidence_out_of_range() {
        let cfg = EngineConfig {
            confidence_level: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_reject_zero_horizon() {
        let cfg = EngineConfig {
            forecast_horizon: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
