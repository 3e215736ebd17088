//! Least-squares solvers
//!
//! Design matrices are passed row-major as `&[Vec<f64>]`, one row per
//! observation. The systems solved here are small (tens of columns), so a
//! dense Gauss-Jordan elimination with partial pivoting is sufficient.

use crate::{MathError, Result};

/// Relative pivot size below which a matrix is treated as singular
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Result of an ordinary least squares regression
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients, in design column order
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients
    pub std_errors: Vec<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Number of observations used
    pub nobs: usize,
}

impl OlsFit {
    /// t-statistics of the coefficients
    pub fn t_values(&self) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.std_errors)
            .map(|(c, se)| c / se)
            .collect()
    }

    /// Gaussian log-likelihood evaluated at the estimates
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting every design column as a parameter
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.coefficients.len() as f64
    }
}

/// Fit `target = design * beta + e` by ordinary least squares
pub fn ols(design: &[Vec<f64>], target: &[f64]) -> Result<OlsFit> {
    let k = check_design(design, target)?;
    let n = design.len();
    if n <= k {
        return Err(MathError::InsufficientData(format!(
            "OLS with {} regressors needs more than {} observations, got {}",
            k, k, n
        )));
    }

    let (xtx, xty) = normal_equations(design, target, k);
    let inverse = invert(&xtx)?;
    let coefficients: Vec<f64> = inverse
        .iter()
        .map(|row| row.iter().zip(&xty).map(|(a, b)| a * b).sum())
        .collect();

    let ssr = residual_sum_of_squares(design, target, &coefficients);
    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * inverse[i][i]).sqrt()).collect();

    Ok(OlsFit {
        coefficients,
        std_errors,
        ssr,
        nobs: n,
    })
}

/// Penalized least squares: minimizes `|y - X b|^2 + sum(penalty_i * b_i^2)`
///
/// A positive penalty on every column keeps the system solvable even when
/// there are more columns than rows.
pub fn ridge(design: &[Vec<f64>], target: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    let k = check_design(design, target)?;
    if penalties.len() != k {
        return Err(MathError::InvalidInput(format!(
            "Expected {} penalties, got {}",
            k,
            penalties.len()
        )));
    }
    if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(MathError::InvalidInput(
            "Penalties must be finite and non-negative".to_string(),
        ));
    }

    let (mut xtx, xty) = normal_equations(design, target, k);
    for (i, penalty) in penalties.iter().enumerate() {
        xtx[i][i] += penalty;
    }
    solve(&xtx, &xty)
}

/// Sum of squared residuals of `target - design * coefficients`
pub fn residual_sum_of_squares(design: &[Vec<f64>], target: &[f64], coefficients: &[f64]) -> f64 {
    design
        .iter()
        .zip(target)
        .map(|(row, y)| {
            let fitted: f64 = row.iter().zip(coefficients).map(|(x, b)| x * b).sum();
            (y - fitted).powi(2)
        })
        .sum()
}

/// Solve the square system `a * x = b`
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
    let n = a.len();
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "System must be square and match the right-hand side".to_string(),
        ));
    }

    let mut augmented: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, rhs)| {
            let mut r = row.clone();
            r.push(*rhs);
            r
        })
        .collect();
    gauss_jordan(&mut augmented, n)?;
    Ok(augmented.iter().map(|row| row[n]).collect())
}

/// Invert a square matrix
pub fn invert(a: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let n = a.len();
    if a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput("Matrix must be square".to_string()));
    }

    let mut augmented: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();
    gauss_jordan(&mut augmented, n)?;
    Ok(augmented.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Reduce the left `n x n` block of `m` to the identity in place
fn gauss_jordan(m: &mut [Vec<f64>], n: usize) -> Result<()> {
    let scale = (0..n)
        .map(|i| m[i][i].abs())
        .fold(0.0_f64, f64::max)
        .max(f64::MIN_POSITIVE);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        let pivot = m[pivot_row][col];
        if !pivot.is_finite() || pivot.abs() <= SINGULAR_TOLERANCE * scale {
            return Err(MathError::SingularMatrix(format!(
                "pivot {} is {:e}",
                col, pivot
            )));
        }
        m.swap(col, pivot_row);

        let width = m[col].len();
        for j in col..width {
            m[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..width {
                let delta = factor * m[col][j];
                m[row][j] -= delta;
            }
        }
    }

    Ok(())
}

fn check_design(design: &[Vec<f64>], target: &[f64]) -> Result<usize> {
    if design.is_empty() {
        return Err(MathError::InsufficientData("Empty design matrix".to_string()));
    }
    if design.len() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            design.len(),
            target.len()
        )));
    }
    let k = design[0].len();
    if k == 0 || design.iter().any(|row| row.len() != k) {
        return Err(MathError::InvalidInput(
            "Design rows must share a non-zero width".to_string(),
        ));
    }
    if design.iter().flatten().chain(target).any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Design and target must be finite".to_string(),
        ));
    }
    Ok(k)
}

fn normal_equations(design: &[Vec<f64>], target: &[f64], k: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, y) in design.iter().zip(target) {
        for i in 0..k {
            xty[i] += row[i] * y;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }
    (xtx, xty)
}
