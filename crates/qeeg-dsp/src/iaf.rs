//! Individual alpha frequency (IAF) estimation
//!
//! Searches a Welch PSD for the dominant alpha peak. The pipeline: dB
//! conversion, optional 1/f detrend (least-squares line in log10 frequency,
//! fitted outside the alpha band), optional moving-average smoothing, argmax
//! with prominence and local-max checks, parabolic sub-bin refinement, and a
//! center-of-gravity estimate over the above-median part of the alpha band.

use qeeg_core::{QeegResult, Sample};

use crate::welch::{welch_psd, PsdResult, WelchConfig};

/// IAF search configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IafConfig {
    /// Alpha search range in Hz.
    pub alpha_min_hz: f64,
    pub alpha_max_hz: f64,

    /// Remove a 1/f trend (line in log10 f) fitted over
    /// [detrend_min_hz, detrend_max_hz] excluding the alpha range.
    pub detrend_1f: bool,
    pub detrend_min_hz: f64,
    pub detrend_max_hz: f64,

    /// Moving-average smoothing width in Hz. 0 disables.
    pub smooth_hz: f64,

    /// Minimum peak prominence (dB) over the in-band median. <= 0 disables.
    pub min_prominence_db: f64,

    /// Require the peak bin to be >= both neighbors.
    pub require_local_max: bool,
}

impl Default for IafConfig {
    fn default() -> Self {
        Self {
            alpha_min_hz: 7.0,
            alpha_max_hz: 13.0,
            detrend_1f: true,
            detrend_min_hz: 2.0,
            detrend_max_hz: 40.0,
            smooth_hz: 1.0,
            min_prominence_db: 0.5,
            require_local_max: true,
        }
    }
}

/// IAF estimation result. `found == false` leaves the frequency fields NaN.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IafEstimate {
    pub found: bool,
    /// Refined peak alpha frequency in Hz.
    pub iaf_hz: f64,
    /// Alpha-band center of gravity in Hz (above-median power only).
    pub cog_hz: f64,
    /// Spectrum value at the peak (dB, or detrended dB residual).
    pub peak_value_db: f64,
    /// Peak minus the in-band median (same units as `peak_value_db`).
    pub prominence_db: f64,
    /// Index of the peak bin in the input PSD.
    pub peak_bin: Option<usize>,
}

impl Default for IafEstimate {
    fn default() -> Self {
        Self {
            found: false,
            iaf_hz: f64::NAN,
            cog_hz: f64::NAN,
            peak_value_db: f64::NAN,
            prominence_db: f64::NAN,
            peak_bin: None,
        }
    }
}

/// Least-squares line fit y = a + b*x over finite pairs. None when fewer
/// than two points remain or the x spread is zero.
fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let mut mx = 0.0;
    let mut my = 0.0;
    let mut n = 0usize;
    for (&xi, &yi) in x.iter().zip(y) {
        if xi.is_finite() && yi.is_finite() {
            mx += xi;
            my += yi;
            n += 1;
        }
    }
    if n < 2 {
        return None;
    }
    mx /= n as f64;
    my /= n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        if xi.is_finite() && yi.is_finite() {
            let dx = xi - mx;
            sxx += dx * dx;
            sxy += dx * (yi - my);
        }
    }
    if !(sxx > 0.0) {
        return None;
    }
    let b = sxy / sxx;
    Some((my - b * mx, b))
}

/// Moving-average smoothing with edge clamping; NaN bins are skipped.
fn smooth_moving_average(y: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 || y.len() < 3 {
        return y.to_vec();
    }
    let win = if win % 2 == 0 { win + 1 } else { win };
    let r = (win / 2) as isize;
    let n = y.len() as isize;

    let mut out = vec![0.0; y.len()];
    for i in 0..n {
        let mut sum = 0.0;
        let mut count = 0usize;
        for k in (i - r)..=(i + r) {
            let kk = k.clamp(0, n - 1) as usize;
            let v = y[kk];
            if v.is_finite() {
                sum += v;
                count += 1;
            }
        }
        out[i as usize] = if count == 0 { f64::NAN } else { sum / count as f64 };
    }
    out
}

fn median_copy(mut v: Vec<f64>) -> f64 {
    if v.is_empty() {
        return f64::NAN;
    }
    qeeg_core::median_inplace(&mut v)
}

/// Parabolic sub-bin refinement around bin `i`; falls back to the bin center
/// when the neighbors are degenerate or the offset exceeds one bin.
fn parabolic_refine_hz(freqs: &[f64], y: &[f64], i: usize) -> f64 {
    if i == 0 || i + 1 >= y.len() {
        return freqs[i];
    }
    let y1 = y[i - 1];
    let y2 = y[i];
    let y3 = y[i + 1];
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return freqs[i];
    }
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() < 1e-12 {
        return freqs[i];
    }
    let delta = 0.5 * (y1 - y3) / denom; // in bins
    if !delta.is_finite() || delta.abs() > 1.0 {
        return freqs[i];
    }
    let df = 0.5 * (freqs[i + 1] - freqs[i - 1]);
    freqs[i] + delta * df
}

/// Estimate the IAF from a pre-computed PSD.
///
/// Degenerate inputs (shape mismatch, empty alpha range, no candidate peak)
/// return `found == false` rather than an error so callers can treat "no
/// alpha peak" as an ordinary outcome.
pub fn estimate_iaf(psd: &PsdResult, cfg: &IafConfig) -> IafEstimate {
    let out = IafEstimate::default();

    if psd.freqs_hz.is_empty() || psd.freqs_hz.len() != psd.psd.len() {
        return out;
    }
    if !(cfg.alpha_max_hz > cfg.alpha_min_hz) || cfg.alpha_min_hz <= 0.0 {
        return out;
    }

    // dB spectrum; non-positive power stays NaN.
    let y_db: Vec<f64> = psd
        .psd
        .iter()
        .map(|&p| if p.is_finite() && p > 0.0 { 10.0 * p.log10() } else { f64::NAN })
        .collect();

    // Optional 1/f detrend: fit y = a + b*log10(f) outside the alpha band.
    let mut y_work = y_db.clone();
    if cfg.detrend_1f {
        let mut x_fit = Vec::new();
        let mut y_fit = Vec::new();
        for (i, &f) in psd.freqs_hz.iter().enumerate() {
            if !f.is_finite() || f <= 0.0 {
                continue;
            }
            if f < cfg.detrend_min_hz || f > cfg.detrend_max_hz {
                continue;
            }
            if f >= cfg.alpha_min_hz && f <= cfg.alpha_max_hz {
                continue;
            }
            if !y_db[i].is_finite() {
                continue;
            }
            x_fit.push(f.log10());
            y_fit.push(y_db[i]);
        }
        if let Some((a, b)) = fit_line(&x_fit, &y_fit) {
            for (i, &f) in psd.freqs_hz.iter().enumerate() {
                if f.is_finite() && f > 0.0 && y_db[i].is_finite() {
                    y_work[i] = y_db[i] - (a + b * f.log10());
                }
            }
        } else {
            log::debug!("estimate_iaf: 1/f detrend fit ill-conditioned, skipping");
        }
    }

    // Smoothing kernel from the median bin spacing.
    let mut win = 1usize;
    if cfg.smooth_hz > 0.0 && psd.freqs_hz.len() >= 3 {
        let dfs: Vec<f64> = psd
            .freqs_hz
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|df| df.is_finite() && *df > 0.0)
            .collect();
        let df_med = median_copy(dfs);
        if df_med.is_finite() && df_med > 0.0 {
            let radius = (cfg.smooth_hz / df_med).round().max(0.0) as usize;
            win = 2 * radius + 1;
        }
    }
    let y_smooth = smooth_moving_average(&y_work, win);

    // Alpha band indices.
    let i0 = psd.freqs_hz.iter().position(|&f| f >= cfg.alpha_min_hz);
    let i1 = psd.freqs_hz.iter().rposition(|&f| f <= cfg.alpha_max_hz);
    let (i0, i1) = match (i0, i1) {
        (Some(i0), Some(i1)) if i1 >= i0 + 2 => (i0, i1),
        _ => return out,
    };

    let band_vals: Vec<f64> = y_smooth[i0..=i1].iter().copied().filter(|v| v.is_finite()).collect();
    let band_med = median_copy(band_vals);

    // Argmax in band.
    let mut i_peak = None;
    let mut best = f64::NEG_INFINITY;
    for i in i0..=i1 {
        let v = y_smooth[i];
        if v.is_finite() && v > best {
            best = v;
            i_peak = Some(i);
        }
    }
    let Some(i_peak) = i_peak else { return out };

    if cfg.require_local_max {
        if i_peak == 0 || i_peak + 1 >= y_smooth.len() {
            return out;
        }
        let (yl, yc, yr) = (y_smooth[i_peak - 1], y_smooth[i_peak], y_smooth[i_peak + 1]);
        if !yl.is_finite() || !yc.is_finite() || !yr.is_finite() {
            return out;
        }
        if !(yc >= yl && yc >= yr) {
            return out;
        }
    }

    let prominence = best - band_med;
    if cfg.min_prominence_db > 0.0 && prominence.is_finite() && prominence < cfg.min_prominence_db {
        return out;
    }

    // Center of gravity over the above-median portion, back in linear units.
    let mut num = 0.0;
    let mut den = 0.0;
    for i in i0..=i1 {
        let v = y_smooth[i];
        if !v.is_finite() || !(v > band_med) {
            continue;
        }
        let p = 10.0f64.powf(v / 10.0);
        num += psd.freqs_hz[i] * p;
        den += p;
    }
    let cog_hz = if den > 0.0 { num / den } else { f64::NAN };

    let iaf_hz = parabolic_refine_hz(&psd.freqs_hz, &y_smooth, i_peak)
        .clamp(cfg.alpha_min_hz, cfg.alpha_max_hz);

    IafEstimate {
        found: true,
        iaf_hz,
        cog_hz,
        peak_value_db: best,
        prominence_db: prominence,
        peak_bin: Some(i_peak),
    }
}

/// Convenience: Welch PSD then IAF estimation.
pub fn estimate_iaf_from_signal(
    x: &[Sample],
    fs_hz: f64,
    welch: &WelchConfig,
    cfg: &IafConfig,
) -> QeegResult<IafEstimate> {
    let psd = welch_psd(x, fs_hz, welch)?;
    Ok(estimate_iaf(&psd, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_signal(peak_hz: f64, fs: f64, seconds: f64) -> Vec<Sample> {
        let n = (fs * seconds) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let alpha = (2.0 * std::f64::consts::PI * peak_hz * t).sin();
                // Broadband floor from summed low-frequency tones.
                let floor = 0.05 * (2.0 * std::f64::consts::PI * 3.0 * t).sin()
                    + 0.05 * (2.0 * std::f64::consts::PI * 21.0 * t).sin();
                (alpha + floor) as Sample
            })
            .collect()
    }

    #[test]
    fn test_finds_dominant_alpha_peak() {
        let fs = 250.0;
        let x = alpha_signal(10.0, fs, 30.0);
        let est = estimate_iaf_from_signal(
            &x,
            fs,
            &WelchConfig { nperseg: 1024, overlap: 0.5 },
            &IafConfig::default(),
        )
        .unwrap();
        assert!(est.found);
        assert!((est.iaf_hz - 10.0).abs() < 0.5, "iaf = {}", est.iaf_hz);
        assert!(est.peak_bin.is_some());
        assert!(est.prominence_db > 0.5);
    }

    #[test]
    fn test_cog_near_peak_for_symmetric_spectrum() {
        let fs = 250.0;
        let x = alpha_signal(10.0, fs, 30.0);
        let est = estimate_iaf_from_signal(
            &x,
            fs,
            &WelchConfig { nperseg: 1024, overlap: 0.5 },
            &IafConfig::default(),
        )
        .unwrap();
        assert!(est.cog_hz.is_finite());
        assert!((est.cog_hz - 10.0).abs() < 1.0, "cog = {}", est.cog_hz);
    }

    #[test]
    fn test_no_peak_in_flat_spectrum() {
        // White-ish deterministic signal: no prominent alpha peak.
        let fs = 250.0;
        let x: Vec<Sample> = (0..(fs as usize * 60))
            .map(|i| {
                let h = i.wrapping_mul(2654435761) as u32;
                (h as f64 / u32::MAX as f64 - 0.5) as Sample
            })
            .collect();
        let cfg = IafConfig { min_prominence_db: 6.0, ..Default::default() };
        let est = estimate_iaf_from_signal(
            &x,
            fs,
            &WelchConfig { nperseg: 512, overlap: 0.5 },
            &cfg,
        )
        .unwrap();
        assert!(!est.found);
        assert!(est.iaf_hz.is_nan());
    }

    #[test]
    fn test_degenerate_psd() {
        let psd = PsdResult::default();
        let est = estimate_iaf(&psd, &IafConfig::default());
        assert!(!est.found);
    }

    #[test]
    fn test_refined_peak_clamped_to_range() {
        let fs = 250.0;
        // Peak just inside the upper edge; the refinement must not escape.
        let x = alpha_signal(12.9, fs, 30.0);
        let est = estimate_iaf_from_signal(
            &x,
            fs,
            &WelchConfig { nperseg: 1024, overlap: 0.5 },
            &IafConfig::default(),
        )
        .unwrap();
        if est.found {
            assert!(est.iaf_hz <= 13.0 + 1e-12);
            assert!(est.iaf_hz >= 7.0);
        }
    }
}
