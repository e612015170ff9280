//! Dense linear algebra on row-major `Vec<Vec<f64>>` matrices.

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

pub type Matrix = Vec<Vec<f64>>;

/// Pivots smaller than this mark the system as singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

pub fn identity(n: usize) -> Matrix {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

pub fn transpose(a: &Matrix) -> Matrix {
    if a.is_empty() {
        return Vec::new();
    }
    let cols = a[0].len();
    (0..cols)
        .map(|j| a.iter().map(|row| row[j]).collect())
        .collect()
}

pub fn mat_mul(a: &Matrix, b: &Matrix) -> Matrix {
    let inner = b.len();
    let cols = b.first().map_or(0, |r| r.len());
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| (0..inner).map(|k| row[k] * b[k][j]).sum())
                .collect()
        })
        .collect()
}

pub fn mat_vec(a: &Matrix, v: &[f64]) -> Vec<f64> {
    a.iter()
        .map(|row| row.iter().zip(v).map(|(x, y)| x * y).sum())
        .collect()
}

pub fn quadratic_form(a: &Matrix, v: &[f64]) -> f64 {
    mat_vec(a, v).iter().zip(v).map(|(x, y)| x * y).sum()
}

fn check_square(a: &Matrix, context: &str) -> AnalyticsResult<usize> {
    let n = a.len();
    if n == 0 {
        return Err(AnalyticsError::invalid(context, "matrix", "Matrix is empty"));
    }
    if a.iter().any(|row| row.len() != n) {
        return Err(AnalyticsError::invalid(
            context,
            "matrix",
            "Matrix must be square",
        ));
    }
    Ok(n)
}

/// Row index of the largest absolute entry in column `col` at or below `col`.
fn pivot_row(m: &Matrix, col: usize) -> usize {
    let mut best = col;
    let mut best_abs = m[col][col].abs();
    for (r, row) in m.iter().enumerate().skip(col + 1) {
        if row[col].abs() > best_abs {
            best_abs = row[col].abs();
            best = r;
        }
    }
    best
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
pub fn solve(a: &Matrix, b: &[f64]) -> AnalyticsResult<Vec<f64>> {
    let n = check_square(a, "gaussian_elimination")?;
    if b.len() != n {
        return Err(AnalyticsError::invalid(
            "gaussian_elimination",
            "rhs",
            format!("Right-hand side has {} rows, matrix has {n}", b.len()),
        ));
    }

    // Augmented matrix [A | b]
    let mut m: Matrix = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();

    for col in 0..n {
        let p = pivot_row(&m, col);
        if m[p][col].abs() < PIVOT_TOLERANCE {
            return Err(AnalyticsError::degenerate(
                "gaussian_elimination",
                format!("Singular matrix (pivot {:.3e} in column {col})", m[p][col]),
            ));
        }
        m.swap(col, p);
        for r in (col + 1)..n {
            let factor = m[r][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..=n {
                m[r][c] -= factor * m[col][c];
            }
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|j| m[i][j] * x[j]).sum();
        x[i] = (m[i][n] - tail) / m[i][i];
    }
    Ok(x)
}

/// Matrix inverse by Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &Matrix) -> AnalyticsResult<Matrix> {
    let n = check_square(a, "matrix_inverse")?;
    let mut m: Matrix = a.clone();
    let mut inv = identity(n);

    for col in 0..n {
        let p = pivot_row(&m, col);
        if m[p][col].abs() < PIVOT_TOLERANCE {
            return Err(AnalyticsError::degenerate(
                "matrix_inverse",
                format!("Singular matrix (pivot {:.3e} in column {col})", m[p][col]),
            ));
        }
        m.swap(col, p);
        inv.swap(col, p);

        let pivot = m[col][col];
        for c in 0..n {
            m[col][c] /= pivot;
            inv[col][c] /= pivot;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..n {
                m[r][c] -= factor * m[col][c];
                inv[r][c] -= factor * inv[col][c];
            }
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_3x3() {
        // 2x + y - z = 8 ; -3x - y + 2z = -11 ; -2x + y + 2z = -3  => (2, 3, -1)
        let a = vec![
            vec![2.0, 1.0, -1.0],
            vec![-3.0, -1.0, 2.0],
            vec![-2.0, 1.0, 2.0],
        ];
        let x = solve(&a, &[8.0, -11.0, -3.0]).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-10);
        assert_relative_eq!(x[2], -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero in the leading position would break naive elimination.
        let a = vec![vec![0.0, 1.0], vec![1.0, 1.0]];
        let x = solve(&a, &[2.0, 3.0]).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_is_degenerate() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        match solve(&a, &[1.0, 2.0]) {
            Err(AnalyticsError::ComputationDegenerate { .. }) => {}
            other => panic!("expected degenerate error, got {other:?}"),
        }
        assert!(invert(&a).is_err());
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let a = vec![
            vec![4.0, 7.0, 2.0],
            vec![3.0, 6.0, 1.0],
            vec![2.0, 5.0, 3.0],
        ];
        let inv = invert(&a).unwrap();
        let prod = mat_mul(&a, &inv);
        for (i, row) in prod.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(*v, expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_non_square_rejected() {
        let a = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        assert!(invert(&a).is_err());
    }

    #[test]
    fn test_transpose_and_quadratic_form() {
        let a = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(transpose(&a), vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        // [1 1] A [1 1]^T = 10
        assert_relative_eq!(quadratic_form(&a, &[1.0, 1.0]), 10.0);
    }
}
