use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::warn;

use super::{significance, TestDecision};
use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_finite, ensure_same_length, variance, VARIANCE_EPSILON};
use crate::numerical::special::f_upper_tail;
use crate::numerical::{ols, NumericalCore};
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

pub const DEFAULT_GRANGER_LAGS: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrangerResult {
    pub f_statistic: f64,
    pub p_value: f64,
    pub lags: usize,
    pub df_numerator: usize,
    pub df_denominator: usize,
    pub restricted_ssr: f64,
    pub unrestricted_ssr: f64,
    pub observations: usize,
    pub decision: TestDecision,
}

/// Does `cause` Granger-cause `effect`? Compares
/// `effect_t ~ const + effect_{t-1..t-p}` against the same regression with
/// `cause_{t-1..t-p}` added, via an F-test on the extra terms.
pub fn granger(
    core: &NumericalCore,
    cause: &[f64],
    effect: &[f64],
    lags: Option<usize>,
) -> AnalyticsResult<ComputationOutput<GrangerResult>> {
    const METHOD: &str = "granger_causality";
    let start = Instant::now();
    let n = effect.len();
    ensure_same_length(METHOD, "cause", n, cause.len())?;
    ensure_finite(METHOD, "cause", cause)?;
    ensure_finite(METHOD, "effect", effect)?;

    let p = lags.unwrap_or(DEFAULT_GRANGER_LAGS);
    if p == 0 {
        return Err(AnalyticsError::invalid(METHOD, "lags", "Lags must be at least 1"));
    }
    let rows = n.saturating_sub(p);
    let unrestricted_params = 2 * p + 1;
    if rows <= unrestricted_params {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!(
                "{n} observations cannot support {p} lags; need more than {}",
                unrestricted_params + p
            ),
        ));
    }

    let target = effect[p..].to_vec();
    let lagged = |series: &[f64], i: usize| series[p - i..n - i].to_vec();
    let own: Vec<Vec<f64>> = (1..=p).map(|i| lagged(effect, i)).collect();
    let mut full = own.clone();
    full.extend((1..=p).map(|i| lagged(cause, i)));
    let df_den = rows - unrestricted_params;

    // Constant series make the lag columns collinear with the intercept
    let mut warnings = Vec::new();
    let constant_effect = variance(effect) <= VARIANCE_EPSILON;
    let constant_cause = variance(cause) <= VARIANCE_EPSILON;
    let (ssr_r, ssr_u) = if constant_effect {
        (0.0, 0.0)
    } else {
        let ssr_r = ols(&target, &own, &[], true)?.sum_squared_residuals;
        if constant_cause {
            (ssr_r, ssr_r)
        } else {
            (ssr_r, ols(&target, &full, &[], true)?.sum_squared_residuals)
        }
    };
    if constant_effect || constant_cause {
        let which = if constant_effect { "effect" } else { "cause" };
        warn!(series = which, "constant series in Granger test; no causal evidence");
        warnings.push(format!(
            "The {which} series is constant: lagged cause terms carry no information, F set to 0 and p-value to 1"
        ));
    }

    let (f, p_value) = if constant_effect || constant_cause {
        (0.0, 1.0)
    } else if ssr_u <= f64::MIN_POSITIVE {
        if ssr_r <= f64::MIN_POSITIVE {
            (0.0, 1.0)
        } else {
            (f64::INFINITY, 0.0)
        }
    } else {
        let f = ((ssr_r - ssr_u).max(0.0) / p as f64) / (ssr_u / df_den as f64);
        (f, f_upper_tail(f, p as f64, df_den as f64)?)
    };

    let result = GrangerResult {
        f_statistic: core.round(f),
        p_value,
        lags: p,
        df_numerator: p,
        df_denominator: df_den,
        restricted_ssr: core.round(ssr_r),
        unrestricted_ssr: core.round(ssr_u),
        observations: rows,
        decision: TestDecision::new(
            p_value,
            significance(core),
            "Lagged values of the cause improve the forecast: Granger causality",
            "No Granger causality detected",
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHOD,
        &serde_json::json!({
            "null_hypothesis": "cause does not Granger-cause effect",
            "lags": p,
            "test": "F on restricted vs unrestricted SSR",
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}
