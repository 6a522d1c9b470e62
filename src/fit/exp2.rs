//! Biexponential curve fitting.
//!
//! Model: `f(x) = a·e^{bx} + c·e^{dx} + e`, with `x` spaced linearly over
//! `[0, 1]` across the trace.
//!
//! The fit is a damped Gauss-Newton (Levenberg-Marquardt) trust-region
//! iteration with Marquardt diagonal scaling and an analytic Jacobian.
//! Termination follows the usual `ftol` / `xtol` / `gtol` rules; the
//! number of model evaluations is capped at `max_nfev`.
use ndarray::{Array1, Array2};
use thiserror::Error;

pub const N_PARAMS: usize = 5;

/// `[a, b, c, d, e]`.
pub type Exp2Params = [f64; N_PARAMS];

/// Samples at each end of the trace used for the initial guess.
pub const GUESS_SPAN: usize = 50;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("need at least {N_PARAMS} samples, got {0}")]
    TooFewSamples(usize),
    #[error("trace contains non-finite values")]
    NonFinite,
    #[error("x and y lengths differ ({0} vs {1})")]
    LengthMismatch(usize, usize),
    #[error("no convergence after {0} function evaluations")]
    MaxEvaluations(usize),
    #[error("parameters diverged to non-finite values")]
    Diverged,
}

/// Solver tolerances.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Stop when a step reduces the cost by less than `ftol · cost`.
    pub ftol: f64,
    /// Stop when `‖Δp‖ < xtol · (xtol + ‖p‖)`.
    pub xtol: f64,
    /// Stop when the largest gradient component falls below `gtol`.
    pub gtol: f64,
    pub max_nfev: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-6,
            xtol: 1e-8,
            gtol: 1e-8,
            max_nfev: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitStatus {
    Converged { nfev: usize },
    /// Fit failed; `params` holds the initial guess.
    Failed(FitError),
}

/// Parameters plus fitted trace. Always populated, even on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Exp2Fit {
    pub params: Exp2Params,
    pub fitted: Vec<f64>,
    pub status: FitStatus,
}

impl Exp2Fit {
    pub fn converged(&self) -> bool {
        matches!(self.status, FitStatus::Converged { .. })
    }
}

#[inline]
pub fn exp2(x: f64, p: &Exp2Params) -> f64 {
    p[0] * (p[1] * x).exp() + p[2] * (p[3] * x).exp() + p[4]
}

pub fn exp2_curve(x: &[f64], p: &Exp2Params) -> Vec<f64> {
    x.iter().map(|&v| exp2(v, p)).collect()
}

/// `n` points evenly spaced over `[0, 1]` (a single point sits at 0).
pub fn linspace01(n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![0.0],
        _ => {
            let step = 1.0 / (n - 1) as f64;
            (0..n).map(|i| i as f64 * step).collect()
        }
    }
}

/// Median ignoring `NaN`; `NaN` if nothing is left.
pub fn nan_median(v: &[f64]) -> f64 {
    let mut s: Vec<f64> = v.iter().copied().filter(|x| !x.is_nan()).collect();
    if s.is_empty() {
        return f64::NAN;
    }
    s.sort_by(f64::total_cmp);
    let m = s.len() / 2;
    if s.len() % 2 == 1 {
        s[m]
    } else {
        0.5 * (s[m - 1] + s[m])
    }
}

/// Initial guess from the head and tail medians of the trace:
/// `(r, -10, r, 0.1, d_min - r)` with `r = d_max - d_min`.
pub fn initial_guess(y: &[f64]) -> Exp2Params {
    let head = &y[..y.len().min(GUESS_SPAN)];
    let tail = &y[y.len().saturating_sub(GUESS_SPAN)..];
    let d_max = nan_median(head);
    let d_min = nan_median(tail);
    let r = d_max - d_min;
    [r, -10.0, r, 0.1, d_min - r]
}

/// Fit with default tolerances from [`initial_guess`]. On failure the
/// initial-guess curve is returned with [`FitStatus::Failed`].
pub fn fit_exp2(y: &[f64], x: &[f64]) -> Exp2Fit {
    let p0 = initial_guess(y);
    match fit_exp2_from(y, x, p0, &FitOptions::default()) {
        Ok(fit) => fit,
        Err(e) => Exp2Fit {
            params: p0,
            fitted: exp2_curve(x, &p0),
            status: FitStatus::Failed(e),
        },
    }
}

fn residuals(y: &[f64], x: &[f64], p: &Exp2Params) -> Array1<f64> {
    Array1::from_iter(y.iter().zip(x).map(|(&yi, &xi)| yi - exp2(xi, p)))
}

fn jacobian(x: &[f64], p: &Exp2Params) -> Array2<f64> {
    let mut j = Array2::<f64>::zeros((x.len(), N_PARAMS));
    for (i, &xi) in x.iter().enumerate() {
        let eb = (p[1] * xi).exp();
        let ed = (p[3] * xi).exp();
        j[[i, 0]] = eb;
        j[[i, 1]] = p[0] * xi * eb;
        j[[i, 2]] = ed;
        j[[i, 3]] = p[2] * xi * ed;
        j[[i, 4]] = 1.0;
    }
    j
}

/// Solve the 5×5 system `a·δ = b` by Gaussian elimination with partial
/// pivoting. `None` if singular.
fn solve5(mut a: [[f64; N_PARAMS]; N_PARAMS], mut b: [f64; N_PARAMS]) -> Option<[f64; N_PARAMS]> {
    for col in 0..N_PARAMS {
        let piv = (col..N_PARAMS).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[piv][col].abs() < 1e-300 || !a[piv][col].is_finite() {
            return None;
        }
        a.swap(col, piv);
        b.swap(col, piv);
        for row in col + 1..N_PARAMS {
            let f = a[row][col] / a[col][col];
            for k in col..N_PARAMS {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }
    let mut out = [0.0; N_PARAMS];
    for row in (0..N_PARAMS).rev() {
        let mut s = b[row];
        for k in row + 1..N_PARAMS {
            s -= a[row][k] * out[k];
        }
        out[row] = s / a[row][row];
    }
    out.iter().all(|v| v.is_finite()).then_some(out)
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Levenberg-Marquardt fit from an explicit starting point.
pub fn fit_exp2_from(
    y: &[f64],
    x: &[f64],
    p0: Exp2Params,
    opts: &FitOptions,
) -> Result<Exp2Fit, FitError> {
    if y.len() != x.len() {
        return Err(FitError::LengthMismatch(x.len(), y.len()));
    }
    if y.len() < N_PARAMS {
        return Err(FitError::TooFewSamples(y.len()));
    }
    if y.iter().chain(x).any(|v| !v.is_finite()) || p0.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mut p = p0;
    let mut r = residuals(y, x, &p);
    let mut cost = 0.5 * r.dot(&r);
    let mut nfev = 1usize;
    let mut lambda = 1e-3;

    loop {
        let j = jacobian(x, &p);
        let jtj = j.t().dot(&j);
        let g = j.t().dot(&r);

        if g.iter().fold(0.0_f64, |m, v| m.max(v.abs())) < opts.gtol || cost == 0.0 {
            break;
        }

        // Inner loop: grow the damping until a step lowers the cost.
        loop {
            let mut a = [[0.0; N_PARAMS]; N_PARAMS];
            let mut b = [0.0; N_PARAMS];
            for i in 0..N_PARAMS {
                for k in 0..N_PARAMS {
                    a[i][k] = jtj[[i, k]];
                }
                a[i][i] += lambda * jtj[[i, i]].max(1e-12);
                b[i] = g[i];
            }

            let Some(step) = solve5(a, b) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    return finish(x, p, nfev);
                }
                continue;
            };

            let mut p_new = p;
            for i in 0..N_PARAMS {
                p_new[i] += step[i];
            }
            let r_new = residuals(y, x, &p_new);
            let cost_new = 0.5 * r_new.dot(&r_new);
            nfev += 1;

            if cost_new.is_finite() && cost_new < cost {
                let reduction = cost - cost_new;
                let small_step = norm(&step) < opts.xtol * (opts.xtol + norm(&p));
                p = p_new;
                r = r_new;
                let prev = cost;
                cost = cost_new;
                lambda = (lambda / 10.0).max(1e-12);
                if reduction < opts.ftol * prev || small_step {
                    return finish(x, p, nfev);
                }
                break;
            }

            if nfev >= opts.max_nfev {
                return Err(FitError::MaxEvaluations(nfev));
            }
            lambda *= 10.0;
            if lambda > 1e16 {
                // No descent direction left at machine precision.
                return finish(x, p, nfev);
            }
        }

        if nfev >= opts.max_nfev {
            return Err(FitError::MaxEvaluations(nfev));
        }
    }

    finish(x, p, nfev)
}

fn finish(x: &[f64], p: Exp2Params, nfev: usize) -> Result<Exp2Fit, FitError> {
    if p.iter().any(|v| !v.is_finite()) {
        return Err(FitError::Diverged);
    }
    Ok(Exp2Fit {
        params: p,
        fitted: exp2_curve(x, &p),
        status: FitStatus::Converged { nfev },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_endpoints() {
        let x = linspace01(5);
        assert_eq!(x, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace01(1), vec![0.0]);
        assert!(linspace01(0).is_empty());
    }

    #[test]
    fn guess_uses_head_and_tail_medians() {
        let mut y = vec![10.0; 60];
        y.extend(vec![4.0; 60]);
        let p = initial_guess(&y);
        assert_eq!(p, [6.0, -10.0, 6.0, 0.1, -2.0]);
    }

    #[test]
    fn median_skips_nan() {
        assert_eq!(nan_median(&[3.0, f64::NAN, 1.0, 2.0]), 2.0);
        assert!(nan_median(&[f64::NAN]).is_nan());
    }

    #[test]
    fn solve5_identity() {
        let mut a = [[0.0; 5]; 5];
        for (i, row) in a.iter_mut().enumerate() {
            row[i] = 2.0;
        }
        let out = solve5(a, [2.0, 4.0, 6.0, 8.0, 10.0]).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(solve5([[0.0; 5]; 5], [1.0; 5]).is_none());
    }

    #[test]
    fn short_trace_falls_back_to_guess() {
        let y = [1.0, 2.0, 3.0];
        let x = linspace01(3);
        let fit = fit_exp2(&y, &x);
        assert!(!fit.converged());
        assert_eq!(fit.params, initial_guess(&y));
        assert_eq!(fit.fitted.len(), 3);
    }

    #[test]
    fn nan_trace_falls_back_to_guess() {
        let mut y = vec![1.0; 100];
        y[40] = f64::NAN;
        let fit = fit_exp2(&y, &linspace01(100));
        assert_eq!(fit.status, FitStatus::Failed(FitError::NonFinite));
    }
}
