use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::risk::var::box_muller;

/// Recovery horizon ceiling in months.
pub const MAX_RECOVERY_PERIODS: usize = 120;
/// Share of the pre-shock peak that counts as recovered.
pub const RECOVERY_TARGET: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEstimate {
    /// Months until the simulated value reaches the target; the cap if never
    pub time: usize,
    pub capped: bool,
    pub start_value: f64,
    pub target_value: f64,
    pub monthly_drift: f64,
    pub monthly_volatility: f64,
}

/// Monthly random walk from `1 + immediate_loss` toward 95% of the
/// pre-shock value. Drift and volatility are annualised inputs.
pub fn estimate_recovery<R: Rng>(
    rng: &mut R,
    immediate_loss: f64,
    annual_return: f64,
    annual_volatility: f64,
) -> RecoveryEstimate {
    let start_value = 1.0 + immediate_loss;
    let monthly_drift = annual_return / 12.0;
    let monthly_volatility = annual_volatility.max(0.0) / 12.0_f64.sqrt();

    let mut estimate = RecoveryEstimate {
        time: 0,
        capped: false,
        start_value,
        target_value: RECOVERY_TARGET,
        monthly_drift,
        monthly_volatility,
    };
    if start_value >= RECOVERY_TARGET {
        return estimate;
    }

    let mut value = start_value;
    for t in 1..=MAX_RECOVERY_PERIODS {
        if value <= 0.0 {
            break;
        }
        let (z, _) = box_muller(rng);
        value *= 1.0 + monthly_drift + monthly_volatility * z;
        if value >= RECOVERY_TARGET {
            estimate.time = t;
            return estimate;
        }
    }
    estimate.time = MAX_RECOVERY_PERIODS;
    estimate.capped = true;
    estimate
}
