use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_finite, mean, sorted, std_dev};
use crate::numerical::special::normal_inv;
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub const MIN_VAR_OBSERVATIONS: usize = 10;

/// Standard deviations below this short-circuit to a zero VaR.
const DEGENERATE_STD: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    #[default]
    Historical,
    Parametric,
    MonteCarlo,
}

impl VarMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarMethod::Historical => "historical",
            VarMethod::Parametric => "parametric",
            VarMethod::MonteCarlo => "monte_carlo",
        }
    }
}

impl std::str::FromStr for VarMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "historical" => Ok(VarMethod::Historical),
            "parametric" | "variance_covariance" => Ok(VarMethod::Parametric),
            "monte_carlo" | "montecarlo" | "mc" => Ok(VarMethod::MonteCarlo),
            other => Err(format!(
                "Unknown VaR method '{other}'. Use: historical, parametric, monte_carlo"
            )),
        }
    }
}

/// Value at Risk and Expected Shortfall. Positive numbers are losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarResult {
    pub method: VarMethod,
    pub confidence_level: f64,
    /// VaR at `confidence_level`
    pub var: f64,
    pub var95: f64,
    pub var99: f64,
    /// Expected Shortfall at `confidence_level`
    pub expected_shortfall: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub observations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulations: Option<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn compute_var(
    core: &NumericalCore,
    returns: &[f64],
    confidence: f64,
    method: VarMethod,
) -> AnalyticsResult<ComputationOutput<VarResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if returns.len() < MIN_VAR_OBSERVATIONS {
        return Err(AnalyticsError::insufficient(
            "compute_var",
            format!(
                "At least {MIN_VAR_OBSERVATIONS} observations required, got {}",
                returns.len()
            ),
        ));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalyticsError::invalid(
            "compute_var",
            "confidence_level",
            format!("Confidence level must be in (0, 1), got {confidence}"),
        ));
    }
    ensure_finite("compute_var", "returns", returns)?;

    let mu = mean(returns);
    let sigma = std_dev(returns);
    let paths = core.config().monte_carlo_paths;

    let raw = if sigma < DEGENERATE_STD {
        warn!(observations = returns.len(), "near-zero variance; VaR set to 0");
        warnings.push("Near-zero variance: VaR and Expected Shortfall reported as 0".into());
        VarResult {
            method,
            confidence_level: confidence,
            var: 0.0,
            var95: 0.0,
            var99: 0.0,
            expected_shortfall: 0.0,
            mean: mu,
            std_dev: sigma,
            observations: returns.len(),
            simulations: None,
        }
    } else {
        match method {
            VarMethod::Historical => empirical(method, returns, confidence, mu, sigma, None),
            VarMethod::Parametric => parametric(returns.len(), confidence, mu, sigma)?,
            VarMethod::MonteCarlo => {
                let mut rng = core.rng();
                let sample = gaussian_sample(&mut rng, mu, sigma, paths);
                let mut result = empirical(method, &sample, confidence, mu, sigma, Some(paths));
                result.observations = returns.len();
                result
            }
        }
    };

    if method == VarMethod::Parametric && raw.var < 0.0 {
        warnings.push(
            "Parametric VaR is negative (the mean outweighs the tail quantile); \
             ES = VaR / (1 - c) is then a larger gain, so compare the two by magnitude"
                .into(),
        );
    }

    let result = VarResult {
        var: core.round(raw.var),
        var95: core.round(raw.var95),
        var99: core.round(raw.var99),
        expected_shortfall: core.round(raw.expected_shortfall),
        mean: core.round(raw.mean),
        std_dev: core.round(raw.std_dev),
        ..raw
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "compute_var",
        &serde_json::json!({
            "method": method.as_str(),
            "confidence_level": confidence,
            "observations": returns.len(),
            "monte_carlo_paths": (method == VarMethod::MonteCarlo).then_some(paths),
            "seed": core.config().seed,
            "sign_convention": "positive = loss",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

/// Index of the VaR observation in an ascending sample: floor((1 - c) n).
fn tail_index(n: usize, confidence: f64) -> usize {
    (((1.0 - confidence) * n as f64).floor() as usize).min(n - 1)
}

/// VaR and tail-average ES from an ascending sample.
fn tail_stats(sorted_sample: &[f64], confidence: f64) -> (f64, f64) {
    let idx = tail_index(sorted_sample.len(), confidence);
    let var = -sorted_sample[idx];
    let es = -mean(&sorted_sample[..=idx]);
    (var, es)
}

fn empirical(
    method: VarMethod,
    sample: &[f64],
    confidence: f64,
    mu: f64,
    sigma: f64,
    simulations: Option<usize>,
) -> VarResult {
    let s = sorted(sample);
    let (var, expected_shortfall) = tail_stats(&s, confidence);
    let (var95, _) = tail_stats(&s, 0.95);
    let (var99, _) = tail_stats(&s, 0.99);
    VarResult {
        method,
        confidence_level: confidence,
        var,
        var95,
        var99,
        expected_shortfall,
        mean: mu,
        std_dev: sigma,
        observations: sample.len(),
        simulations,
    }
}

/// Gaussian VaR `z_c sigma - mu`, with ES taken as VaR / (1 - c).
fn parametric(n: usize, confidence: f64, mu: f64, sigma: f64) -> AnalyticsResult<VarResult> {
    let var_at = |c: f64| -> AnalyticsResult<f64> { Ok(normal_inv(c)? * sigma - mu) };
    let var = var_at(confidence)?;
    Ok(VarResult {
        method: VarMethod::Parametric,
        confidence_level: confidence,
        var,
        var95: var_at(0.95)?,
        var99: var_at(0.99)?,
        expected_shortfall: var / (1.0 - confidence),
        mean: mu,
        std_dev: sigma,
        observations: n,
        simulations: None,
    })
}

/// Box-Muller draws from N(mu, sigma^2).
pub(crate) fn gaussian_sample<R: Rng>(rng: &mut R, mu: f64, sigma: f64, n: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let (z0, z1) = box_muller(rng);
        out.push(mu + sigma * z0);
        if out.len() < n {
            out.push(mu + sigma * z1);
        }
    }
    out
}

pub(crate) fn box_muller<R: Rng>(rng: &mut R) -> (f64, f64) {
    // gen() is in [0, 1); shift to (0, 1] so the log stays finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    let radius = (-2.0 * u1.ln()).sqrt();
    let theta = 2.0 * std::f64::consts::PI * u2;
    (radius * theta.cos(), radius * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use approx::assert_abs_diff_eq;

    fn sample_returns() -> Vec<f64> {
        (0..100)
            .map(|i| ((i * 37 % 101) as f64 / 101.0 - 0.5) * 0.04)
            .collect()
    }

    fn seeded() -> NumericalCore {
        NumericalCore::new(EngineConfig::default().with_seed(42)).unwrap()
    }

    #[test]
    fn test_historical_var_quantile_and_tail() {
        // Returns -0.10, -0.09, ..., -0.01 and ninety zeros: index floor(0.05 * 100) = 5
        let mut r: Vec<f64> = (1..=10).map(|i| -(i as f64) / 100.0).collect();
        r.extend(std::iter::repeat(0.0).take(90));
        let out = compute_var(&seeded(), &r, 0.95, VarMethod::Historical).unwrap();
        let v = &out.result;
        assert_abs_diff_eq!(v.var95, 0.05, epsilon = 1e-12);
        // Tail of six: 0.10 .. 0.05
        assert_abs_diff_eq!(v.expected_shortfall, 0.075, epsilon = 1e-12);
        assert_abs_diff_eq!(v.var99, 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_parametric_matches_normal_quantile() {
        let r = sample_returns();
        let out = compute_var(&seeded(), &r, 0.95, VarMethod::Parametric).unwrap();
        let sigma = std_dev(&r);
        let mu = mean(&r);
        assert_abs_diff_eq!(out.result.var95, 1.644_853_626_951_472 * sigma - mu, epsilon = 1e-6);
        assert_abs_diff_eq!(out.result.expected_shortfall, out.result.var / 0.05, epsilon = 2e-5);
        assert!(out.result.var99 > out.result.var95);
    }

    #[test]
    fn test_monte_carlo_near_parametric() {
        let r = sample_returns();
        let mc = compute_var(&seeded(), &r, 0.95, VarMethod::MonteCarlo).unwrap();
        let pa = compute_var(&seeded(), &r, 0.95, VarMethod::Parametric).unwrap();
        assert_eq!(mc.result.simulations, Some(10_000));
        assert_abs_diff_eq!(mc.result.var95, pa.result.var95, epsilon = 0.003);
        assert!(mc.result.expected_shortfall >= mc.result.var95);
    }

    #[test]
    fn test_monte_carlo_is_reproducible_with_seed() {
        let r = sample_returns();
        let a = compute_var(&seeded(), &r, 0.99, VarMethod::MonteCarlo).unwrap();
        let b = compute_var(&seeded(), &r, 0.99, VarMethod::MonteCarlo).unwrap();
        assert_eq!(a.result.var, b.result.var);
    }

    #[test]
    fn test_constant_series_is_zero_var() {
        let r = vec![0.001; 50];
        for method in [VarMethod::Historical, VarMethod::Parametric, VarMethod::MonteCarlo] {
            let out = compute_var(&seeded(), &r, 0.95, method).unwrap();
            assert_eq!(out.result.var95, 0.0);
            assert_eq!(out.result.var99, 0.0);
            assert_eq!(out.result.expected_shortfall, 0.0);
            assert_eq!(out.warnings.len(), 1);
        }
    }

    #[test]
    fn test_input_validation() {
        let short = vec![0.01; 9];
        assert!(matches!(
            compute_var(&seeded(), &short, 0.95, VarMethod::Historical),
            Err(AnalyticsError::InsufficientData { .. })
        ));
        let r = sample_returns();
        for c in [0.0, 1.0, -0.5, 1.5] {
            assert!(matches!(
                compute_var(&seeded(), &r, c, VarMethod::Historical),
                Err(AnalyticsError::InvalidInput { .. })
            ));
        }
        let mut bad = r.clone();
        bad[3] = f64::NAN;
        assert!(compute_var(&seeded(), &bad, 0.95, VarMethod::Historical).is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("monte-carlo".parse::<VarMethod>().unwrap(), VarMethod::MonteCarlo);
        assert_eq!("Parametric".parse::<VarMethod>().unwrap(), VarMethod::Parametric);
        assert!("garch".parse::<VarMethod>().is_err());
    }
}
