use serde::{Deserialize, Serialize};

use super::descriptive::{ensure_finite, ensure_same_length, mean};
use super::linalg::{invert, quadratic_form, solve, Matrix};
use super::special::{f_upper_tail, t_two_tailed_p};
use crate::error::AnalyticsError;
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub value: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
}

/// Ordinary least squares fit. Built once per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionModel {
    pub coefficients: Vec<Coefficient>,
    pub residuals: Vec<f64>,
    pub fitted_values: Vec<f64>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub aic: f64,
    pub bic: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub residual_std_error: f64,
    pub observations: usize,
    pub degrees_of_freedom: usize,
    pub sum_squared_residuals: f64,
    pub has_intercept: bool,
    /// (X'X)^-1, kept for prediction intervals
    #[serde(default, skip_serializing)]
    pub xtx_inverse: Matrix,
}

impl RegressionModel {
    pub fn coefficient_values(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.value).collect()
    }

    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn intercept(&self) -> f64 {
        if self.has_intercept {
            self.coefficients.first().map_or(0.0, |c| c.value)
        } else {
            0.0
        }
    }

    /// Slope coefficients, excluding the intercept.
    pub fn slopes(&self) -> &[Coefficient] {
        if self.has_intercept {
            &self.coefficients[1..]
        } else {
            &self.coefficients
        }
    }

    fn design_row(&self, regressors: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(regressors.len() + 1);
        if self.has_intercept {
            row.push(1.0);
        }
        row.extend_from_slice(regressors);
        row
    }

    /// Point prediction for one row of regressor values (no intercept column).
    pub fn predict(&self, regressors: &[f64]) -> AnalyticsResult<f64> {
        let row = self.design_row(regressors);
        ensure_same_length(
            "RegressionModel::predict",
            "regressors",
            self.coefficients.len(),
            row.len(),
        )?;
        Ok(row
            .iter()
            .zip(&self.coefficients)
            .map(|(x, c)| x * c.value)
            .sum())
    }

    /// Variance of a new observation at `regressors`: s^2 (1 + x'(X'X)^-1 x).
    pub fn prediction_variance(&self, regressors: &[f64]) -> AnalyticsResult<f64> {
        let row = self.design_row(regressors);
        ensure_same_length(
            "RegressionModel::prediction_variance",
            "regressors",
            self.xtx_inverse.len(),
            row.len(),
        )?;
        let s2 = self.residual_std_error.powi(2);
        Ok(s2 * (1.0 + quadratic_form(&self.xtx_inverse, &row).max(0.0)))
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Fit `y = X b + e` by solving the normal equations.
///
/// `regressors` holds one column per explanatory variable, each the same
/// length as `y`. `names` labels the columns; missing labels become `x1..xk`.
/// With `intercept` a constant column named `intercept` is prepended.
///
/// R² uses the centred total sum of squares and is clamped to [0, 1], so a
/// no-intercept fit that does worse than the mean reports 0.
pub fn ols(
    y: &[f64],
    regressors: &[Vec<f64>],
    names: &[&str],
    intercept: bool,
) -> AnalyticsResult<RegressionModel> {
    const METHOD: &str = "ols";
    let n = y.len();
    let k = regressors.len() + usize::from(intercept);
    if k == 0 {
        return Err(AnalyticsError::invalid(
            METHOD,
            "regressors",
            "At least one regressor or an intercept is required",
        ));
    }
    ensure_finite(METHOD, "y", y)?;
    for (j, col) in regressors.iter().enumerate() {
        ensure_same_length(METHOD, &format!("regressors[{j}]"), n, col.len())?;
        ensure_finite(METHOD, &format!("regressors[{j}]"), col)?;
    }
    if n <= k {
        return Err(AnalyticsError::insufficient(
            METHOD,
            format!("{n} observations for {k} parameters; need more observations than parameters"),
        ));
    }

    let design: Matrix = (0..n)
        .map(|i| {
            let mut row = Vec::with_capacity(k);
            if intercept {
                row.push(1.0);
            }
            row.extend(regressors.iter().map(|col| col[i]));
            row
        })
        .collect();

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in design.iter().zip(y) {
        for a in 0..k {
            xty[a] += row[a] * yi;
            for b in 0..k {
                xtx[a][b] += row[a] * row[b];
            }
        }
    }

    let beta = solve(&xtx, &xty)?;
    let xtx_inverse = invert(&xtx)?;

    let fitted_values: Vec<f64> = design
        .iter()
        .map(|row| row.iter().zip(&beta).map(|(x, b)| x * b).sum())
        .collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted_values).map(|(a, f)| a - f).collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let y_bar = mean(y);
    let tss: f64 = y.iter().map(|v| (v - y_bar).powi(2)).sum();

    let dof = n - k;
    let r_squared = if tss > 0.0 {
        (1.0 - ssr / tss).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let adjusted_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / dof as f64;

    let sigma2 = ssr / dof as f64;
    let residual_std_error = sigma2.sqrt();

    let mut coefficients = Vec::with_capacity(k);
    for (j, &value) in beta.iter().enumerate() {
        let name = if intercept && j == 0 {
            "intercept".to_string()
        } else {
            let idx = if intercept { j - 1 } else { j };
            names
                .get(idx)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("x{}", idx + 1))
        };
        let std_error = (sigma2 * xtx_inverse[j][j]).max(0.0).sqrt();
        let t_statistic = if std_error > 1e-15 {
            value / std_error
        } else if value.abs() < 1e-15 {
            0.0
        } else {
            value.signum() * f64::INFINITY
        };
        let p_value = t_two_tailed_p(t_statistic, dof as f64)?;
        coefficients.push(Coefficient {
            name,
            value,
            std_error,
            t_statistic,
            p_value,
        });
    }

    let n_f = n as f64;
    let log_lik_term = n_f * (ssr.max(f64::MIN_POSITIVE) / n_f).ln();
    let aic = log_lik_term + 2.0 * k as f64;
    let bic = log_lik_term + k as f64 * n_f.ln();

    let slopes = regressors.len();
    let (f_statistic, f_p_value) = if slopes == 0 {
        (0.0, 1.0)
    } else if 1.0 - r_squared <= 1e-15 {
        (f64::INFINITY, 0.0)
    } else {
        let f = (r_squared / slopes as f64) / ((1.0 - r_squared) / dof as f64);
        (f, f_upper_tail(f, slopes as f64, dof as f64)?)
    };

    Ok(RegressionModel {
        coefficients,
        residuals,
        fitted_values,
        r_squared,
        adjusted_r_squared,
        aic,
        bic,
        f_statistic,
        f_p_value,
        residual_std_error,
        observations: n,
        degrees_of_freedom: dof,
        sum_squared_residuals: ssr,
        has_intercept: intercept,
        xtx_inverse,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn noise(i: usize) -> f64 {
        // Deterministic zero-mean-ish wiggle
        ((i * 7919 % 97) as f64 / 97.0 - 0.5) * 0.1
    }

    #[test]
    fn test_recovers_known_coefficients() {
        let x1: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..50).map(|i| ((i * 13) % 17) as f64).collect();
        let y: Vec<f64> = (0..50)
            .map(|i| 1.5 + 2.0 * x1[i] - 0.75 * x2[i] + noise(i))
            .collect();
        let model = ols(&y, &[x1, x2], &["trend", "cycle"], true).unwrap();
        assert_abs_diff_eq!(model.intercept(), 1.5, epsilon = 0.1);
        assert_abs_diff_eq!(model.coefficient("trend").unwrap().value, 2.0, epsilon = 0.01);
        assert_abs_diff_eq!(model.coefficient("cycle").unwrap().value, -0.75, epsilon = 0.01);
        assert!(model.r_squared > 0.99);
        assert!(model.adjusted_r_squared <= model.r_squared);
        assert_eq!(model.degrees_of_freedom, 47);
        assert!(model.coefficient("trend").unwrap().p_value < 1e-6);
    }

    #[test]
    fn test_exact_fit_has_unit_r_squared() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let model = ols(&y, &[x], &[], true).unwrap();
        assert_abs_diff_eq!(model.r_squared, 1.0, epsilon = 1e-12);
        assert!(model.aic.is_finite());
        assert_eq!(model.coefficients[1].name, "x1");
    }

    #[test]
    fn test_collinear_columns_are_degenerate() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let twice: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        let y: Vec<f64> = x.iter().map(|v| v + 1.0).collect();
        match ols(&y, &[x, twice], &[], true) {
            Err(AnalyticsError::ComputationDegenerate { .. }) => {}
            other => panic!("expected singular design, got {other:?}"),
        }
    }

    #[test]
    fn test_requires_more_rows_than_parameters() {
        let y = [1.0, 2.0];
        let x = vec![vec![0.0, 1.0]];
        assert!(matches!(
            ols(&y, &x, &[], true),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_ragged_regressor_rejected() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let x = vec![vec![0.0, 1.0, 2.0]];
        assert!(matches!(
            ols(&y, &x, &[], true),
            Err(AnalyticsError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_prediction_and_interval_width() {
        let x: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..30).map(|i| 0.5 * i as f64 + noise(i)).collect();
        let model = ols(&y, &[x], &["x"], true).unwrap();
        let pred = model.predict(&[40.0]).unwrap();
        assert_abs_diff_eq!(pred, 20.0, epsilon = 0.2);
        // Extrapolating further out widens the interval.
        let near = model.prediction_variance(&[15.0]).unwrap();
        let far = model.prediction_variance(&[60.0]).unwrap();
        assert!(far > near);
        assert!(model.predict(&[1.0, 2.0]).is_err());
    }
}
