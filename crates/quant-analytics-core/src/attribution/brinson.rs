use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::AnalyticsError;
use crate::numerical::descriptive::{ensure_finite, ensure_same_length};
use crate::numerical::NumericalCore;
use crate::types::{with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parallel per-segment weight and return vectors for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrinsonInput {
    pub portfolio_weights: Vec<f64>,
    pub benchmark_weights: Vec<f64>,
    pub portfolio_returns: Vec<f64>,
    pub benchmark_returns: Vec<f64>,
    /// Segment names; defaults to `segment_1..n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAttribution {
    pub segment: String,
    pub allocation_effect: f64,
    pub selection_effect: f64,
    pub interaction_effect: f64,
    pub total_effect: f64,
    pub portfolio_contribution: f64,
    pub benchmark_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrinsonResult {
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub active_return: f64,
    pub total_allocation: f64,
    pub total_selection: f64,
    pub total_interaction: f64,
    /// allocation + selection + interaction; equals `active_return`
    pub total_effect: f64,
    pub segments: Vec<SegmentAttribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAttribution {
    pub period: String,
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub active_return: f64,
    /// Carino scaling applied to this period's effects
    pub linking_coefficient: f64,
    pub allocation: f64,
    pub selection: f64,
    pub interaction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAttribution {
    pub periods: Vec<PeriodAttribution>,
    /// Compounded over all periods
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub active_return: f64,
    pub total_allocation: f64,
    pub total_selection: f64,
    pub total_interaction: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Brinson-Hood-Beebower single-period attribution.
///
/// Per segment: allocation `(wP - wB) rB`, selection `wB (rP - rB)`,
/// interaction `(wP - wB)(rP - rB)`. Their sum over all segments is exactly
/// `sum wP rP - sum wB rB`.
pub fn brinson(
    core: &NumericalCore,
    input: &BrinsonInput,
) -> AnalyticsResult<ComputationOutput<BrinsonResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate(input, &mut warnings)?;

    let raw = single_period(input);
    let result = BrinsonResult {
        portfolio_return: core.round(raw.portfolio_return),
        benchmark_return: core.round(raw.benchmark_return),
        active_return: core.round(raw.active_return),
        total_allocation: core.round(raw.total_allocation),
        total_selection: core.round(raw.total_selection),
        total_interaction: core.round(raw.total_interaction),
        total_effect: core.round(raw.total_effect),
        segments: raw
            .segments
            .into_iter()
            .map(|s| SegmentAttribution {
                allocation_effect: core.round(s.allocation_effect),
                selection_effect: core.round(s.selection_effect),
                interaction_effect: core.round(s.interaction_effect),
                total_effect: core.round(s.total_effect),
                portfolio_contribution: core.round(s.portfolio_contribution),
                benchmark_contribution: core.round(s.benchmark_contribution),
                ..s
            })
            .collect(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "brinson_attribution",
        &serde_json::json!({
            "model": "Brinson-Hood-Beebower",
            "segments": input.portfolio_weights.len(),
            "period": input.period,
        }),
        warnings,
        elapsed,
        core.config().precision,
        result,
    ))
}

/// Carino-linked multi-period attribution. Linked effects add up to the
/// compounded active return.
pub fn brinson_linked(
    core: &NumericalCore,
    periods: &[BrinsonInput],
) -> AnalyticsResult<ComputationOutput<LinkedAttribution>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    if periods.is_empty() {
        return Err(AnalyticsError::insufficient(
            "brinson_linked",
            "At least one period required",
        ));
    }
    for p in periods {
        validate(p, &mut warnings)?;
    }

    let singles: Vec<BrinsonResult> = periods.iter().map(single_period).collect();
    let total_p = singles
        .iter()
        .fold(1.0, |acc, s| acc * (1.0 + s.portfolio_return))
        - 1.0;
    let total_b = singles
        .iter()
        .fold(1.0, |acc, s| acc * (1.0 + s.benchmark_return))
        - 1.0;
    let k_total = carino_coefficient(total_p, total_b)?;

    let mut linked = Vec::with_capacity(periods.len());
    let (mut alloc, mut sel, mut inter) = (0.0, 0.0, 0.0);
    for (i, (p, s)) in periods.iter().zip(&singles).enumerate() {
        let k = carino_coefficient(s.portfolio_return, s.benchmark_return)? / k_total;
        let a = s.total_allocation * k;
        let se = s.total_selection * k;
        let it = s.total_interaction * k;
        alloc += a;
        sel += se;
        inter += it;
        linked.push(PeriodAttribution {
            period: p.period.clone().unwrap_or_else(|| format!("period_{}", i + 1)),
            portfolio_return: core.round(s.portfolio_return),
            benchmark_return: core.round(s.benchmark_return),
            active_return: core.round(s.active_return),
            linking_coefficient: core.round(k),
            allocation: core.round(a),
            selection: core.round(se),
            interaction: core.round(it),
        });
    }

    let result = LinkedAttribution {
        periods: linked,
        portfolio_return: core.round(total_p),
        benchmark_return: core.round(total_b),
        active_return: core.round(total_p - total_b),
        total_allocation: core.round(alloc),
        total_selection: core.round(sel),
        total_interaction: core.round(inter),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "brinson_linked",
        &serde_json::json!({
            "model": "Brinson-Hood-Beebower",
            "linking_method": "Carino",
            "periods": periods.len(),
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

fn validate(input: &BrinsonInput, warnings: &mut Vec<String>) -> AnalyticsResult<()> {
    const METHOD: &str = "brinson_attribution";
    let n = input.portfolio_weights.len();
    if n == 0 {
        return Err(AnalyticsError::invalid(
            METHOD,
            "portfolio_weights",
            "At least one segment is required",
        ));
    }
    ensure_same_length(METHOD, "benchmark_weights", n, input.benchmark_weights.len())?;
    ensure_same_length(METHOD, "portfolio_returns", n, input.portfolio_returns.len())?;
    ensure_same_length(METHOD, "benchmark_returns", n, input.benchmark_returns.len())?;
    if let Some(labels) = &input.labels {
        ensure_same_length(METHOD, "labels", n, labels.len())?;
    }
    ensure_finite(METHOD, "portfolio_weights", &input.portfolio_weights)?;
    ensure_finite(METHOD, "benchmark_weights", &input.benchmark_weights)?;
    ensure_finite(METHOD, "portfolio_returns", &input.portfolio_returns)?;
    ensure_finite(METHOD, "benchmark_returns", &input.benchmark_returns)?;

    for (which, weights) in [
        ("portfolio", &input.portfolio_weights),
        ("benchmark", &input.benchmark_weights),
    ] {
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 0.02 {
            warnings.push(format!("{which} weights sum to {sum:.4}, not 1"));
        }
    }
    Ok(())
}

fn single_period(input: &BrinsonInput) -> BrinsonResult {
    let mut segments = Vec::with_capacity(input.portfolio_weights.len());
    let (mut alloc, mut sel, mut inter) = (0.0, 0.0, 0.0);
    let (mut rp, mut rb) = (0.0, 0.0);

    for i in 0..input.portfolio_weights.len() {
        let wp = input.portfolio_weights[i];
        let wb = input.benchmark_weights[i];
        let r_p = input.portfolio_returns[i];
        let r_b = input.benchmark_returns[i];

        let allocation_effect = (wp - wb) * r_b;
        let selection_effect = wb * (r_p - r_b);
        let interaction_effect = (wp - wb) * (r_p - r_b);
        alloc += allocation_effect;
        sel += selection_effect;
        inter += interaction_effect;
        rp += wp * r_p;
        rb += wb * r_b;

        segments.push(SegmentAttribution {
            segment: input
                .labels
                .as_ref()
                .map(|l| l[i].clone())
                .unwrap_or_else(|| format!("segment_{}", i + 1)),
            allocation_effect,
            selection_effect,
            interaction_effect,
            total_effect: allocation_effect + selection_effect + interaction_effect,
            portfolio_contribution: wp * r_p,
            benchmark_contribution: wb * r_b,
        });
    }

    BrinsonResult {
        portfolio_return: rp,
        benchmark_return: rb,
        active_return: rp - rb,
        total_allocation: alloc,
        total_selection: sel,
        total_interaction: inter,
        total_effect: alloc + sel + inter,
        segments,
    }
}

/// `[ln(1 + R) - ln(1 + B)] / (R - B)`, or `1 / (1 + R)` when R = B.
fn carino_coefficient(r: f64, b: f64) -> AnalyticsResult<f64> {
    if r <= -1.0 || b <= -1.0 {
        return Err(AnalyticsError::degenerate(
            "carino_linking",
            format!("Period return at or below -100% (portfolio {r}, benchmark {b})"),
        ));
    }
    if (r - b).abs() < 1e-12 {
        Ok(1.0 / (1.0 + r))
    } else {
        Ok(((1.0 + r).ln() - (1.0 + b).ln()) / (r - b))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
