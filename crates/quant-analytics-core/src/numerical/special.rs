//! Special functions behind every p-value in the crate.
//!
//! The t, F and chi-square tails all reduce to the regularized incomplete
//! beta `I_x(a, b)` or the regularized incomplete gamma `P(a, x)` / `Q(a, x)`,
//! so there is exactly one continued-fraction implementation of each.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

const MAX_ITERATIONS: u32 = 1_000;
const EPS: f64 = 3.0e-16;
const FPMIN: f64 = 1.0e-300;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function (Lanczos, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Gamma(x) Gamma(1 - x) = pi / sin(pi x)
        let s = (std::f64::consts::PI * x).sin().abs();
        return (std::f64::consts::PI / s).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = LANCZOS_COEFFICIENTS[0];
    for (i, c) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Continued fraction for the incomplete beta, evaluated by modified Lentz.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> AnalyticsResult<f64> {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    let mut delta = f64::INFINITY;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        delta = (del - 1.0).abs();
        if delta < EPS {
            return Ok(h);
        }
    }
    Err(AnalyticsError::ConvergenceFailure {
        function: "beta_continued_fraction".into(),
        iterations: MAX_ITERATIONS,
        last_delta: delta,
    })
}

/// Regularized incomplete beta `I_x(a, b)`.
pub fn beta_reg(x: f64, a: f64, b: f64) -> AnalyticsResult<f64> {
    if !(a > 0.0 && b > 0.0) {
        return Err(AnalyticsError::invalid(
            "beta_reg",
            "shape",
            format!("Shape parameters must be positive (a={a}, b={b})"),
        ));
    }
    if x.is_nan() {
        return Err(AnalyticsError::invalid("beta_reg", "x", "x is NaN"));
    }
    if x <= 0.0 {
        return Ok(0.0);
    }
    if x >= 1.0 {
        return Ok(1.0);
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The fraction converges fastest below the mean; use symmetry above it.
    if x < (a + 1.0) / (a + b + 2.0) {
        Ok(front * beta_continued_fraction(x, a, b)? / a)
    } else {
        Ok(1.0 - front * beta_continued_fraction(1.0 - x, b, a)? / b)
    }
}

fn check_gamma_args(function: &str, a: f64, x: f64) -> AnalyticsResult<()> {
    if !(a > 0.0) {
        return Err(AnalyticsError::invalid(
            function,
            "a",
            format!("Shape must be positive, got {a}"),
        ));
    }
    if x.is_nan() || x < 0.0 {
        return Err(AnalyticsError::invalid(
            function,
            "x",
            format!("x must be non-negative, got {x}"),
        ));
    }
    Ok(())
}

/// Series expansion of `P(a, x)`, valid for `x < a + 1`.
fn gamma_series(a: f64, x: f64) -> AnalyticsResult<f64> {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            return Ok(sum * (-x + a * x.ln() - ln_gamma(a)).exp());
        }
    }
    Err(AnalyticsError::ConvergenceFailure {
        function: "gamma_series".into(),
        iterations: MAX_ITERATIONS,
        last_delta: (del / sum).abs(),
    })
}

/// Continued fraction for `Q(a, x)`, valid for `x >= a + 1`.
fn gamma_continued_fraction(a: f64, x: f64) -> AnalyticsResult<f64> {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    let mut delta = f64::INFINITY;
    for i in 1..=MAX_ITERATIONS {
        let i = i as f64;
        let an = -i * (i - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        delta = (del - 1.0).abs();
        if delta < EPS {
            return Ok((-x + a * x.ln() - ln_gamma(a)).exp() * h);
        }
    }
    Err(AnalyticsError::ConvergenceFailure {
        function: "gamma_continued_fraction".into(),
        iterations: MAX_ITERATIONS,
        last_delta: delta,
    })
}

/// Regularized lower incomplete gamma `P(a, x)`.
pub fn gamma_p(a: f64, x: f64) -> AnalyticsResult<f64> {
    check_gamma_args("gamma_p", a, x)?;
    if x == 0.0 {
        return Ok(0.0);
    }
    if x.is_infinite() {
        return Ok(1.0);
    }
    if x < a + 1.0 {
        gamma_series(a, x)
    } else {
        Ok(1.0 - gamma_continued_fraction(a, x)?)
    }
}

/// Regularized upper incomplete gamma `Q(a, x) = 1 - P(a, x)`.
pub fn gamma_q(a: f64, x: f64) -> AnalyticsResult<f64> {
    check_gamma_args("gamma_q", a, x)?;
    if x == 0.0 {
        return Ok(1.0);
    }
    if x.is_infinite() {
        return Ok(0.0);
    }
    if x < a + 1.0 {
        Ok(1.0 - gamma_series(a, x)?)
    } else {
        gamma_continued_fraction(a, x)
    }
}

/// Standard normal CDF via `erf(z / sqrt 2) = P(1/2, z^2 / 2)`.
pub fn normal_cdf(z: f64) -> AnalyticsResult<f64> {
    if z.is_nan() {
        return Err(AnalyticsError::invalid("normal_cdf", "z", "z is NaN"));
    }
    let half_q = 0.5 * gamma_q(0.5, 0.5 * z * z)?;
    Ok(if z < 0.0 { half_q } else { 1.0 - half_q })
}

/// Standard normal quantile.
pub fn normal_inv(p: f64) -> AnalyticsResult<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AnalyticsError::invalid(
            "normal_inv",
            "p",
            format!("Probability must be in (0, 1), got {p}"),
        ));
    }
    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| AnalyticsError::degenerate("normal_inv", e.to_string()))?;
    Ok(standard.inverse_cdf(p))
}

fn check_df(function: &str, df: f64) -> AnalyticsResult<()> {
    if !(df > 0.0) || df.is_infinite() {
        return Err(AnalyticsError::invalid(
            function,
            "degrees_of_freedom",
            format!("Degrees of freedom must be positive and finite, got {df}"),
        ));
    }
    Ok(())
}

/// Two-tailed p-value of a Student-t statistic: `I_{df/(df+t^2)}(df/2, 1/2)`.
pub fn t_two_tailed_p(t: f64, df: f64) -> AnalyticsResult<f64> {
    check_df("t_two_tailed_p", df)?;
    if t.is_nan() {
        return Err(AnalyticsError::invalid("t_two_tailed_p", "t", "t is NaN"));
    }
    if t.is_infinite() {
        return Ok(0.0);
    }
    beta_reg(df / (df + t * t), 0.5 * df, 0.5)
}

pub fn student_t_cdf(t: f64, df: f64) -> AnalyticsResult<f64> {
    let tail = 0.5 * t_two_tailed_p(t, df)?;
    Ok(if t > 0.0 { 1.0 - tail } else { tail })
}

/// Student-t quantile by bracketing then bisection on the CDF.
pub fn student_t_inv(p: f64, df: f64) -> AnalyticsResult<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AnalyticsError::invalid(
            "student_t_inv",
            "p",
            format!("Probability must be in (0, 1), got {p}"),
        ));
    }
    check_df("student_t_inv", df)?;

    let mut lo = -1.0;
    let mut hi = 1.0;
    let mut expansions = 0;
    while student_t_cdf(lo, df)? > p || student_t_cdf(hi, df)? < p {
        lo *= 2.0;
        hi *= 2.0;
        expansions += 1;
        if expansions > 60 {
            return Err(AnalyticsError::ConvergenceFailure {
                function: "student_t_inv".into(),
                iterations: expansions,
                last_delta: hi - lo,
            });
        }
    }

    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df)? < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Upper tail `P(F > f)` for an F(d1, d2) statistic.
pub fn f_upper_tail(f: f64, d1: f64, d2: f64) -> AnalyticsResult<f64> {
    check_df("f_upper_tail", d1)?;
    check_df("f_upper_tail", d2)?;
    if f.is_nan() {
        return Err(AnalyticsError::invalid("f_upper_tail", "f", "F is NaN"));
    }
    if f <= 0.0 {
        return Ok(1.0);
    }
    if f.is_infinite() {
        return Ok(0.0);
    }
    beta_reg(d2 / (d2 + d1 * f), 0.5 * d2, 0.5 * d1)
}

/// Upper tail `P(X > x)` for a chi-square variable with `k` degrees of freedom.
pub fn chi_square_upper_tail(x: f64, k: f64) -> AnalyticsResult<f64> {
    check_df("chi_square_upper_tail", k)?;
    if x.is_nan() {
        return Err(AnalyticsError::invalid("chi_square_upper_tail", "x", "x is NaN"));
    }
    if x <= 0.0 {
        return Ok(1.0);
    }
    gamma_q(0.5 * k, 0.5 * x)
}
