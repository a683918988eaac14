//! Spectral summary features
//!
//! Scalar descriptors of a one-sided PSD over a frequency range: total
//! power, normalized spectral entropy, mean frequency, spectral edge
//! frequency and peak frequency. All integrals treat the PSD as piecewise
//! linear between bins, with the range clipped to the PSD support.

use qeeg_core::{QeegError, QeegResult};

use crate::bandpower::integrate_bandpower;
use crate::welch::PsdResult;

/// Denominator floor shared by the ratio-style features.
const EPS: f64 = 1e-20;

/// One linear piece of the PSD clipped to the analysis range.
#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    pa: f64,
    pb: f64,
}

impl Segment {
    #[inline]
    fn area(&self) -> f64 {
        0.5 * (self.pa + self.pb) * (self.b - self.a)
    }

    /// Closed-form `integral of f * P(f) df` with P linear on [a, b].
    fn integral_f_times_p(&self) -> f64 {
        let len = self.b - self.a;
        if !(len > 0.0) {
            return 0.0;
        }
        let slope = (self.pb - self.pa) / len;
        let alpha = self.pa - slope * self.a;
        let a2 = self.a * self.a;
        let b2 = self.b * self.b;
        alpha * 0.5 * (b2 - a2) + slope * (b2 * self.b - a2 * self.a) / 3.0
    }

    /// Frequency x in [a, b] with `integral a..x of P = area_target`, using the
    /// numerically stable quadratic branch.
    fn freq_at_area(&self, area_target: f64) -> f64 {
        let len = self.b - self.a;
        if !(len > 0.0) {
            return self.a;
        }
        let slope = (self.pb - self.pa) / len;
        let pa = self.pa.max(0.0);
        let rem = area_target.max(0.0);

        if slope.abs() < 1e-15 {
            let dx = (rem / pa.max(EPS)).clamp(0.0, len);
            return self.a + dx;
        }

        // 0.5*slope*dx^2 + pa*dx - rem = 0
        let disc = (pa * pa + 2.0 * slope * rem).max(0.0);
        let sqrt_disc = disc.sqrt();
        let dx1 = (-pa + sqrt_disc) / slope;
        let dx2 = (-pa - sqrt_disc) / slope;

        let in_range = |dx: f64| (-1e-12..=len + 1e-12).contains(&dx);
        let dx = if in_range(dx1) {
            dx1
        } else if in_range(dx2) {
            dx2
        } else {
            dx1
        };
        self.a + dx.clamp(0.0, len)
    }
}

fn validate_psd(psd: &PsdResult) -> QeegResult<()> {
    if psd.freqs_hz.len() != psd.psd.len() || psd.freqs_hz.len() < 2 {
        return Err(QeegError::InvalidConfig("invalid PSD input".into()));
    }
    for pair in psd.freqs_hz.windows(2) {
        if !(pair[1] > pair[0]) {
            return Err(QeegError::InvalidConfig(
                "PSD frequencies must be strictly increasing".into(),
            ));
        }
    }
    Ok(())
}

#[inline]
fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) / (x1 - x0) * (y1 - y0)
}

/// Visit the linear PSD segments overlapping [fmin, fmax] clipped to the PSD
/// support. Negative or non-finite interpolated endpoints are clamped to 0.
fn for_each_segment(
    psd: &PsdResult,
    fmin_hz: f64,
    fmax_hz: f64,
    mut f: impl FnMut(Segment),
) -> QeegResult<()> {
    validate_psd(psd)?;
    if !(fmax_hz > fmin_hz) {
        return Err(QeegError::InvalidConfig("fmax must be > fmin".into()));
    }

    let f_lo = fmin_hz.max(psd.freqs_hz[0]);
    let f_hi = fmax_hz.min(*psd.freqs_hz.last().unwrap());
    if !(f_hi > f_lo) {
        return Ok(()); // empty overlap
    }

    for i in 0..psd.freqs_hz.len() - 1 {
        let f0 = psd.freqs_hz[i];
        let f1 = psd.freqs_hz[i + 1];
        let a = f0.max(f_lo);
        let b = f1.min(f_hi);
        if b <= a {
            continue;
        }
        let mut pa = lerp(f0, psd.psd[i], f1, psd.psd[i + 1], a);
        let mut pb = lerp(f0, psd.psd[i], f1, psd.psd[i + 1], b);
        if !pa.is_finite() || pa < 0.0 {
            pa = 0.0;
        }
        if !pb.is_finite() || pb < 0.0 {
            pb = 0.0;
        }
        f(Segment { a, b, pa, pb });
    }
    Ok(())
}

/// Total power in [fmin, fmax]: the PSD integral.
pub fn spectral_total_power(psd: &PsdResult, fmin_hz: f64, fmax_hz: f64) -> f64 {
    integrate_bandpower(psd, fmin_hz, fmax_hz)
}

/// Normalized spectral entropy in [fmin, fmax].
///
/// Each segment's area becomes a probability; `H = -sum(p ln p)`, divided by
/// `ln(count)` when `normalize` so a flat spectrum scores 1. Returns 0 when
/// the range holds effectively no power.
pub fn spectral_entropy(
    psd: &PsdResult,
    fmin_hz: f64,
    fmax_hz: f64,
    normalize: bool,
) -> QeegResult<f64> {
    let mut areas = Vec::new();
    let mut total = 0.0;
    for_each_segment(psd, fmin_hz, fmax_hz, |s| {
        let a = s.area();
        if a > 0.0 {
            areas.push(a);
            total += a;
        }
    })?;

    if !(total > EPS) || areas.is_empty() {
        return Ok(0.0);
    }

    let mut h = 0.0;
    for a in &areas {
        let p = a / total;
        if p > 0.0 {
            h -= p * p.ln();
        }
    }

    if !normalize {
        return Ok(h);
    }
    if areas.len() <= 1 {
        return Ok(0.0);
    }
    let denom = (areas.len() as f64).ln();
    if !(denom > 0.0) {
        return Ok(0.0);
    }
    Ok((h / denom).clamp(0.0, 1.0))
}

/// Power-weighted mean frequency (spectral centroid) in [fmin, fmax].
/// Returns 0 when the range holds effectively no power.
pub fn spectral_mean_frequency(psd: &PsdResult, fmin_hz: f64, fmax_hz: f64) -> QeegResult<f64> {
    let mut total = 0.0;
    let mut mom1 = 0.0;
    for_each_segment(psd, fmin_hz, fmax_hz, |s| {
        total += s.area();
        mom1 += s.integral_f_times_p();
    })?;
    if !(total > EPS) {
        return Ok(0.0);
    }
    Ok(mom1 / total)
}

/// Frequency at which the cumulative power reaches `edge` of the range total
/// (e.g. 0.95 for SEF95). `edge` must be in (0, 1]. Returns the range start
/// for a degenerate PSD.
pub fn spectral_edge_frequency(
    psd: &PsdResult,
    fmin_hz: f64,
    fmax_hz: f64,
    edge: f64,
) -> QeegResult<f64> {
    if !(edge > 0.0 && edge <= 1.0) {
        return Err(QeegError::InvalidConfig(format!(
            "edge must be in (0,1] (got {edge})"
        )));
    }

    let total = spectral_total_power(psd, fmin_hz, fmax_hz);
    validate_psd(psd)?;
    let range_start = fmin_hz.max(psd.freqs_hz[0]);
    if !(total > EPS) {
        return Ok(range_start);
    }

    let target = edge * total;
    let mut cum = 0.0;
    let mut out_f = range_start;

    for_each_segment(psd, fmin_hz, fmax_hz, |s| {
        if cum >= target {
            return;
        }
        let a = s.area();
        if cum + a >= target {
            out_f = s.freq_at_area(target - cum);
            cum = target;
        } else {
            cum += a;
            out_f = s.b;
        }
    })?;

    Ok(out_f)
}

/// Frequency of the PSD maximum in [fmin, fmax], considering the exact range
/// endpoints via linear interpolation.
pub fn spectral_peak_frequency(psd: &PsdResult, fmin_hz: f64, fmax_hz: f64) -> QeegResult<f64> {
    validate_psd(psd)?;
    if !(fmax_hz > fmin_hz) {
        return Err(QeegError::InvalidConfig("fmax must be > fmin".into()));
    }

    let f_lo = fmin_hz.max(psd.freqs_hz[0]);
    let f_hi = fmax_hz.min(*psd.freqs_hz.last().unwrap());
    if !(f_hi > f_lo) {
        return Ok(f_lo);
    }

    let mut best_f = f_lo;
    let mut best_p = f64::NEG_INFINITY;

    // Interpolated boundary values first.
    for i in 0..psd.freqs_hz.len() - 1 {
        let f0 = psd.freqs_hz[i];
        let f1 = psd.freqs_hz[i + 1];
        for edge in [f_lo, f_hi] {
            if f0 <= edge && edge <= f1 {
                let p = lerp(f0, psd.psd[i], f1, psd.psd[i + 1], edge);
                if p > best_p {
                    best_p = p;
                    best_f = edge;
                }
            }
        }
    }

    for (f, p) in psd.freqs_hz.iter().zip(&psd.psd) {
        if *f < f_lo || *f > f_hi {
            continue;
        }
        if *p > best_p {
            best_p = *p;
            best_f = *f;
        }
    }

    Ok(best_f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp_psd() -> PsdResult {
        // PSD(f) = f on [0, 10].
        PsdResult {
            freqs_hz: (0..11).map(|i| i as f64).collect(),
            psd: (0..11).map(|i| i as f64).collect(),
        }
    }

    fn flat_psd() -> PsdResult {
        PsdResult {
            freqs_hz: (0..101).map(|i| i as f64 * 0.5).collect(),
            psd: vec![1.0; 101],
        }
    }

    #[test]
    fn test_entropy_flat_is_one() {
        let h = spectral_entropy(&flat_psd(), 0.0, 50.0, true).unwrap();
        assert_abs_diff_eq!(h, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_entropy_impulse_approaches_zero() {
        let mut psd = flat_psd();
        for p in &mut psd.psd {
            *p = 1e-12;
        }
        psd.psd[40] = 1.0e6;
        let h = spectral_entropy(&psd, 0.0, 50.0, true).unwrap();
        // An impulse straddles two linear segments, so the floor is
        // ln(2)/ln(n_segments) rather than exactly 0.
        assert!(h < 0.2, "h = {h}");
    }

    #[test]
    fn test_entropy_zero_power() {
        let mut psd = flat_psd();
        for p in &mut psd.psd {
            *p = 0.0;
        }
        assert_abs_diff_eq!(spectral_entropy(&psd, 0.0, 50.0, true).unwrap(), 0.0);
    }

    #[test]
    fn test_mean_frequency_flat() {
        // Flat PSD: centroid is the range midpoint.
        let m = spectral_mean_frequency(&flat_psd(), 10.0, 30.0).unwrap();
        assert_abs_diff_eq!(m, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_median_frequency_of_ramp() {
        // PSD(f) = f on [0, 10]: total = 50, half-area at sqrt(50).
        let f = spectral_edge_frequency(&ramp_psd(), 0.0, 10.0, 0.5).unwrap();
        assert_abs_diff_eq!(f, 50.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_edge_full_fraction_hits_range_end() {
        let f = spectral_edge_frequency(&flat_psd(), 0.0, 50.0, 1.0).unwrap();
        assert_abs_diff_eq!(f, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_edge_rejects_bad_fraction() {
        assert!(spectral_edge_frequency(&flat_psd(), 0.0, 50.0, 0.0).is_err());
        assert!(spectral_edge_frequency(&flat_psd(), 0.0, 50.0, 1.5).is_err());
    }

    #[test]
    fn test_peak_frequency_interior_and_boundary() {
        let mut psd = flat_psd();
        psd.psd[20] = 5.0; // f = 10
        assert_abs_diff_eq!(spectral_peak_frequency(&psd, 0.0, 50.0).unwrap(), 10.0);
        // Range excludes the bump: the ramp boundary wins.
        let f = spectral_peak_frequency(&ramp_psd(), 2.25, 7.75).unwrap();
        assert_abs_diff_eq!(f, 7.75);
    }

    #[test]
    fn test_total_power_matches_integral() {
        assert_abs_diff_eq!(spectral_total_power(&ramp_psd(), 0.0, 10.0), 50.0, epsilon = 1e-9);
    }
}
