//! Perrin-style spherical spline interpolation
//!
//! Kernel expansion `g_m(u) = sum_{n=1..N} (2n+1) / (n(n+1))^m * P_n(u)`
//! with Legendre polynomials from the three-term recurrence. Fitting solves
//! the augmented (K+1)x(K+1) system
//!
//! ```text
//! [ G + lambda*I | 1 ] [c]   [v]
//! [      1^T     | 0 ] [d] = [0]
//! ```
//!
//! by Gaussian elimination with partial pivoting, which enforces
//! `sum(c_i) = 0`. Evaluation: `f(q) = sum_i c_i g(q . p_i) + d`.

use qeeg_core::{QeegError, QeegResult};

use crate::geometry::Vec3;

/// Spline kernel and solver configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SplineConfig {
    /// Number of Legendre terms in the kernel expansion. The default of 50
    /// suits standard 10-20 geometries; high-density montages (>= 64
    /// channels) may need more terms to resolve nearby electrodes.
    pub n_terms: usize,
    /// Spline order; Perrin uses m = 4 for scalp potentials.
    pub m: usize,
    /// Tikhonov-style diagonal regularization (>= 0).
    pub lambda: f64,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            n_terms: 50,
            m: 4,
            lambda: 1e-5,
        }
    }
}

impl SplineConfig {
    fn validate(&self) -> QeegResult<()> {
        if self.n_terms < 1 {
            return Err(QeegError::InvalidConfig("spline n_terms must be >= 1".into()));
        }
        if self.m < 1 {
            return Err(QeegError::InvalidConfig("spline order m must be >= 1".into()));
        }
        if !(self.lambda >= 0.0) {
            return Err(QeegError::InvalidConfig("spline lambda must be >= 0".into()));
        }
        Ok(())
    }
}

/// Kernel `g_m(u)` with `u = cos(angle)` clamped to [-1, 1].
pub fn kernel_g(u: f64, n_terms: usize, m: usize) -> f64 {
    let x = u.clamp(-1.0, 1.0);
    let mut sum = 0.0;

    // Legendre three-term recurrence: P_0 = 1, P_1 = x,
    // n P_n = (2n-1) x P_{n-1} - (n-1) P_{n-2}.
    let mut p_nm2 = 1.0;
    let mut p_nm1 = x;
    for n in 1..=n_terms {
        let p_n = if n == 1 {
            p_nm1
        } else {
            let n_f = n as f64;
            let p = ((2.0 * n_f - 1.0) * x * p_nm1 - (n_f - 1.0) * p_nm2) / n_f;
            p_nm2 = p_nm1;
            p_nm1 = p;
            p
        };

        let nn1 = n as f64 * (n + 1) as f64;
        sum += (2.0 * n as f64 + 1.0) / nn1.powi(m as i32) * p_n;
    }
    sum
}

/// Solve `A x = b` (row-major, n x n) by Gaussian elimination with partial
/// pivoting. Fails when the best pivot magnitude drops below 1e-14.
fn solve_linear_system(mut a: Vec<f64>, mut b: Vec<f64>, n: usize) -> QeegResult<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    for i in 0..n {
        // Pivot selection.
        let mut pivot_row = i;
        let mut best = a[i * n + i].abs();
        for r in i + 1..n {
            let v = a[r * n + i].abs();
            if v > best {
                best = v;
                pivot_row = r;
            }
        }
        if best < 1e-14 {
            return Err(QeegError::Numerical(
                "spline system is singular or ill-conditioned".into(),
            ));
        }
        if pivot_row != i {
            for c in i..n {
                a.swap(i * n + c, pivot_row * n + c);
            }
            b.swap(i, pivot_row);
        }

        let diag = a[i * n + i];
        for r in i + 1..n {
            let f = a[r * n + i] / diag;
            if f == 0.0 {
                continue;
            }
            a[r * n + i] = 0.0;
            for c in i + 1..n {
                a[r * n + c] -= f * a[i * n + c];
            }
            b[r] -= f * b[i];
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut s = b[i];
        for c in i + 1..n {
            s -= a[i * n + c] * x[c];
        }
        x[i] = s / a[i * n + i];
    }
    Ok(x)
}

/// Normalize fit/query positions, rejecting zero-length vectors.
fn normalize_positions(positions: &[Vec3]) -> QeegResult<Vec<Vec3>> {
    let mut out = Vec::with_capacity(positions.len());
    for p in positions {
        let u = p.normalized();
        if u.is_zero() {
            return Err(QeegError::InvalidConfig(
                "spline position has zero length".into(),
            ));
        }
        out.push(u);
    }
    Ok(out)
}

/// Build the augmented kernel matrix `M = [G + lambda*I, 1; 1^T, 0]`.
fn build_kernel_matrix(pos: &[Vec3], cfg: &SplineConfig) -> Vec<f64> {
    let k = pos.len();
    let n = k + 1;
    let mut m = vec![0.0f64; n * n];
    for i in 0..k {
        for j in 0..k {
            let mut g = kernel_g(pos[i].dot(pos[j]), cfg.n_terms, cfg.m);
            if i == j {
                g += cfg.lambda;
            }
            m[i * n + j] = g;
        }
        m[i * n + k] = 1.0;
        m[k * n + i] = 1.0;
    }
    m
}

/// A fitted spherical-spline evaluator.
#[derive(Debug, Clone)]
pub struct SphericalSpline {
    cfg: SplineConfig,
    positions: Vec<Vec3>,
    coeffs: Vec<f64>,
    constant: f64,
}

impl SphericalSpline {
    /// Fit a spline through `values` at `positions` (normalized to unit
    /// length). Needs at least 3 points.
    pub fn fit(positions: &[Vec3], values: &[f64], cfg: &SplineConfig) -> QeegResult<Self> {
        if positions.len() != values.len() {
            return Err(QeegError::Structural(format!(
                "{} positions for {} values",
                positions.len(),
                values.len()
            )));
        }
        if positions.len() < 3 {
            return Err(QeegError::InsufficientData(
                "spline fit needs at least 3 points".into(),
            ));
        }
        cfg.validate()?;

        let pos = normalize_positions(positions)?;
        let k = pos.len();
        let n = k + 1;

        let a = build_kernel_matrix(&pos, cfg);
        let mut b = vec![0.0f64; n];
        b[..k].copy_from_slice(values);

        let mut x = solve_linear_system(a, b, n)?;
        let constant = x[k];
        x.truncate(k);
        Ok(Self {
            cfg: cfg.clone(),
            positions: pos,
            coeffs: x,
            constant,
        })
    }

    /// Evaluate at a query point (normalized to unit length).
    pub fn evaluate(&self, q: Vec3) -> f64 {
        if self.positions.is_empty() {
            return f64::NAN;
        }
        let q = q.normalized();
        let mut s = self.constant;
        for (p, c) in self.positions.iter().zip(&self.coeffs) {
            s += c * kernel_g(q.dot(*p), self.cfg.n_terms, self.cfg.m);
        }
        s
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.positions.len()
    }

    pub fn config(&self) -> &SplineConfig {
        &self.cfg
    }

    /// Spline coefficients `c_i` (their sum is ~0 by the constraint row).
    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }
}

/// Interpolation weights for a fixed sensor geometry.
///
/// Returns `w` such that `f(q) = sum_i w_i v_i` for any value vector `v`,
/// obtained by solving `M^T x = [g(q . p_i); 1]` and truncating to the
/// first K components. This is the fast path for interpolating many time
/// samples at once.
pub fn spline_weights(positions: &[Vec3], q: Vec3, cfg: &SplineConfig) -> QeegResult<Vec<f64>> {
    if positions.len() < 3 {
        return Err(QeegError::InsufficientData(
            "spline weights need at least 3 points".into(),
        ));
    }
    cfg.validate()?;

    let pos = normalize_positions(positions)?;
    let q = q.normalized();
    if q.is_zero() {
        return Err(QeegError::InvalidConfig("query vector has zero length".into()));
    }

    let k = pos.len();
    let n = k + 1;
    let m = build_kernel_matrix(&pos, cfg);

    // A = M^T
    let mut a = vec![0.0f64; n * n];
    for r in 0..n {
        for c in 0..n {
            a[r * n + c] = m[c * n + r];
        }
    }

    let mut rhs = vec![0.0f64; n];
    for (i, p) in pos.iter().enumerate() {
        rhs[i] = kernel_g(q.dot(*p), cfg.n_terms, cfg.m);
    }
    rhs[k] = 1.0;

    let mut x = solve_linear_system(a, rhs, n)?;
    x.truncate(k);
    Ok(x)
}
