use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::numerical::descriptive::{
    cumulative_returns, drawdown_curve, ensure_finite, max_drawdown, std_dev,
};
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput, ReturnFrequency};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Volatility below this is treated as zero when forming the Sharpe ratio.
pub const ZERO_VOLATILITY: f64 = 1e-12;

/// Performance profile of a price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnsAnalysis {
    pub simple_returns: Vec<f64>,
    pub log_returns: Vec<f64>,
    pub cumulative_returns: Vec<f64>,
    pub drawdown_curve: Vec<f64>,
    pub total_return: f64,
    /// Geometric: (1 + total)^(periods_per_year / n) - 1
    pub annualized_return: f64,
    /// Sample standard deviation scaled by sqrt(periods_per_year)
    pub volatility: f64,
    /// Infinite when volatility is zero and return differs from the risk-free rate
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub omega_ratio: f64,
    pub downside_deviation: f64,
    pub max_drawdown: f64,
    pub best_period: f64,
    pub worst_period: f64,
    pub observations: usize,
    pub frequency: ReturnFrequency,
}

impl ReturnsAnalysis {
    /// All-zero result handed back for inputs that are not numbers at all.
    pub fn neutral(frequency: ReturnFrequency) -> Self {
        ReturnsAnalysis {
            simple_returns: Vec::new(),
            log_returns: Vec::new(),
            cumulative_returns: Vec::new(),
            drawdown_curve: Vec::new(),
            total_return: 0.0,
            annualized_return: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            omega_ratio: 0.0,
            downside_deviation: 0.0,
            max_drawdown: 0.0,
            best_period: 0.0,
            worst_period: 0.0,
            observations: 0,
            frequency,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Analyse a price series.
pub fn compute_returns(
    core: &NumericalCore,
    prices: &[f64],
    frequency: ReturnFrequency,
    risk_free_rate: f64,
) -> AnalyticsResult<ComputationOutput<ReturnsAnalysis>> {
    let start = Instant::now();
    validate_prices(prices)?;

    let analysis = analyze(core, prices, frequency, risk_free_rate);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "compute_returns",
        &serde_json::json!({
            "prices": prices.len(),
            "frequency": frequency.as_str(),
            "periods_per_year": frequency.periods_per_year(),
            "risk_free_rate": risk_free_rate,
            "annualization": "geometric",
        }),
        Vec::new(),
        elapsed,
        core.config().precision,
        analysis,
    ))
}

/// Neutral output for loosely-typed input containing non-numeric entries.
pub fn neutral_returns(
    core: &NumericalCore,
    len: usize,
    bad_index: usize,
    frequency: ReturnFrequency,
) -> ComputationOutput<ReturnsAnalysis> {
    with_metadata(
        "compute_returns",
        &serde_json::json!({
            "prices": len,
            "frequency": frequency.as_str(),
        }),
        vec![format!(
            "Non-numeric price at index {bad_index}; returning neutral zero result"
        )],
        0,
        core.config().precision,
        ReturnsAnalysis::neutral(frequency),
    )
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

fn validate_prices(prices: &[f64]) -> AnalyticsResult<()> {
    if prices.len() < 2 {
        return Err(AnalyticsError::insufficient(
            "compute_returns",
            format!("At least 2 prices required, got {}", prices.len()),
        ));
    }
    ensure_finite("compute_returns", "prices", prices)?;
    if let Some(pos) = prices.iter().position(|p| *p <= 0.0) {
        return Err(AnalyticsError::invalid(
            "compute_returns",
            "prices",
            format!("Price must be positive, got {} at index {pos}", prices[pos]),
        ));
    }
    Ok(())
}

/// Periodic simple returns `p_t / p_{t-1} - 1`.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

/// Sharpe ratio with the zero-volatility convention: the sign of the excess
/// return decides between +inf and -inf, and no excess gives 0.
pub fn sharpe(annualized_return: f64, volatility: f64, risk_free_rate: f64) -> f64 {
    let excess = annualized_return - risk_free_rate;
    if volatility < ZERO_VOLATILITY {
        if excess > 0.0 {
            f64::INFINITY
        } else if excess < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    } else {
        excess / volatility
    }
}

fn safe_ratio(num: f64, den: f64) -> f64 {
    if den.abs() < ZERO_VOLATILITY {
        0.0
    } else {
        num / den
    }
}

fn analyze(
    core: &NumericalCore,
    prices: &[f64],
    frequency: ReturnFrequency,
    risk_free_rate: f64,
) -> ReturnsAnalysis {
    let ppy = frequency.periods_per_year();
    let returns = simple_returns(prices);
    let logs = log_returns(prices);
    let n = returns.len() as f64;

    let total_return = prices[prices.len() - 1] / prices[0] - 1.0;
    let annualized_return = (1.0 + total_return).powf(ppy / n) - 1.0;
    let volatility = std_dev(&returns) * ppy.sqrt();

    let rf_period = risk_free_rate / ppy;
    let downside_sq: f64 = returns
        .iter()
        .map(|r| (r - rf_period).min(0.0).powi(2))
        .sum();
    let downside_deviation = (downside_sq / n).sqrt() * ppy.sqrt();

    let gains: f64 = returns.iter().map(|r| (r - rf_period).max(0.0)).sum();
    let losses: f64 = returns.iter().map(|r| (rf_period - r).max(0.0)).sum();

    let mdd = max_drawdown(&returns);
    let best_period = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let worst_period = returns.iter().copied().fold(f64::INFINITY, f64::min);

    ReturnsAnalysis {
        simple_returns: core.round_all(&returns),
        log_returns: core.round_all(&logs),
        cumulative_returns: core.round_all(&cumulative_returns(&returns)),
        drawdown_curve: core.round_all(&drawdown_curve(&returns)),
        total_return: core.round(total_return),
        annualized_return: core.round(annualized_return),
        volatility: core.round(volatility),
        sharpe_ratio: core.round(sharpe(annualized_return, volatility, risk_free_rate)),
        sortino_ratio: core.round(safe_ratio(
            annualized_return - risk_free_rate,
            downside_deviation,
        )),
        calmar_ratio: core.round(safe_ratio(annualized_return, mdd)),
        omega_ratio: core.round(safe_ratio(gains, losses)),
        downside_deviation: core.round(downside_deviation),
        max_drawdown: core.round(mdd),
        best_period: core.round(best_period),
        worst_period: core.round(worst_period),
        observations: returns.len(),
        frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn core() -> NumericalCore {
        NumericalCore::default()
    }

    #[test]
    fn test_simple_and_log_returns() {
        let out = compute_returns(&core(), &[100.0, 110.0, 99.0], ReturnFrequency::Daily, 0.0)
            .unwrap();
        let r = &out.result;
        assert_eq!(r.simple_returns, vec![0.1, -0.1]);
        assert_abs_diff_eq!(r.log_returns[0], 1.1_f64.ln(), epsilon = 1e-6);
        assert_abs_diff_eq!(r.total_return, -0.01, epsilon = 1e-12);
        assert_eq!(r.observations, 2);
        assert_abs_diff_eq!(r.best_period, 0.1);
        assert_abs_diff_eq!(r.worst_period, -0.1);
    }

    #[test]
    fn test_geometric_annualization_monthly() {
        // Twelve months of +1% compound to 12.68% a year.
        let mut prices = vec![100.0];
        for _ in 0..12 {
            let last = *prices.last().unwrap();
            prices.push(last * 1.01);
        }
        let out = compute_returns(&core(), &prices, ReturnFrequency::Monthly, 0.02).unwrap();
        assert_abs_diff_eq!(out.result.annualized_return, 1.01_f64.powi(12) - 1.0, epsilon = 1e-6);
        // Flat path: no volatility, positive excess return
        assert_eq!(out.result.sharpe_ratio, f64::INFINITY);
        assert_eq!(out.result.max_drawdown, 0.0);
    }

    #[test]
    fn test_zero_volatility_below_risk_free_is_negative_infinity() {
        let prices = [100.0, 100.0, 100.0, 100.0];
        let out = compute_returns(&core(), &prices, ReturnFrequency::Daily, 0.02).unwrap();
        assert_eq!(out.result.volatility, 0.0);
        assert_eq!(out.result.sharpe_ratio, f64::NEG_INFINITY);
        let flat = compute_returns(&core(), &prices, ReturnFrequency::Daily, 0.0).unwrap();
        assert_eq!(flat.result.sharpe_ratio, 0.0);
    }

    #[test]
    fn test_drawdown_tracks_peak() {
        let prices = [100.0, 120.0, 90.0, 110.0];
        let out = compute_returns(&core(), &prices, ReturnFrequency::Daily, 0.0).unwrap();
        assert_abs_diff_eq!(out.result.max_drawdown, 0.25, epsilon = 1e-9);
        assert_eq!(out.result.drawdown_curve.len(), 3);
        assert!(out.result.calmar_ratio != 0.0);
    }

    #[test]
    fn test_fewer_than_two_prices_is_insufficient() {
        let err = compute_returns(&core(), &[100.0], ReturnFrequency::Daily, 0.0).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { .. }));
    }

    #[test]
    fn test_non_finite_and_non_positive_prices_are_invalid() {
        for prices in [[100.0, f64::NAN, 101.0], [100.0, f64::INFINITY, 101.0], [100.0, 0.0, 101.0]] {
            let err = compute_returns(&core(), &prices, ReturnFrequency::Daily, 0.0).unwrap_err();
            assert!(matches!(err, AnalyticsError::InvalidInput { .. }));
        }
    }

    #[test]
    fn test_omega_and_sortino_on_mixed_path() {
        let prices = [100.0, 103.0, 101.0, 105.0, 102.0, 108.0];
        let out = compute_returns(&core(), &prices, ReturnFrequency::Daily, 0.0).unwrap();
        assert!(out.result.omega_ratio > 1.0);
        assert!(out.result.downside_deviation > 0.0);
        assert!(out.result.sortino_ratio > 0.0);
    }
}
