//! Welch power spectral density estimation
//!
//! Segment-averaged one-sided PSD with a Hann window, constant detrend and
//! zero-padding to a power-of-two FFT size. The density scaling follows the
//! common Welch definition `Pxx = |X|^2 / (fs * U)` with `U = sum(w^2)`,
//! doubling all bins except DC and Nyquist.

use qeeg_core::{QeegError, QeegResult, Sample};
use realfft::RealFftPlanner;
use rustfft::num_complex::Complex;

/// Welch estimator configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WelchConfig {
    /// Segment length in samples. Clamped to [8, len(input)].
    pub nperseg: usize,
    /// Overlap fraction between consecutive segments, in [0, 1).
    pub overlap: f64,
}

impl Default for WelchConfig {
    fn default() -> Self {
        Self {
            nperseg: 1024,
            overlap: 0.5,
        }
    }
}

/// One-sided PSD: `freqs_hz` strictly increasing from 0, `psd` the same
/// length with non-negative density values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsdResult {
    pub freqs_hz: Vec<f64>,
    pub psd: Vec<f64>,
}

impl PsdResult {
    /// Frequency resolution (bin spacing) in Hz; 0 for degenerate PSDs.
    pub fn bin_hz(&self) -> f64 {
        if self.freqs_hz.len() >= 2 {
            self.freqs_hz[1] - self.freqs_hz[0]
        } else {
            0.0
        }
    }
}

/// Hann window coefficients, `0.5 - 0.5*cos(2*pi*i/(n-1))`.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Estimate the one-sided PSD of `x` via Welch's method.
///
/// Errors on empty input, non-positive sampling rate, overlap outside
/// [0, 1), or input shorter than one segment.
pub fn welch_psd(x: &[Sample], fs_hz: f64, cfg: &WelchConfig) -> QeegResult<PsdResult> {
    if !(fs_hz > 0.0) {
        return Err(QeegError::InvalidConfig(format!(
            "welch_psd: fs_hz must be > 0 (got {fs_hz})"
        )));
    }
    if x.is_empty() {
        return Err(QeegError::InsufficientData("welch_psd: input signal is empty".into()));
    }
    if !(0.0..1.0).contains(&cfg.overlap) {
        return Err(QeegError::InvalidConfig(format!(
            "welch_psd: overlap must be in [0,1) (got {})",
            cfg.overlap
        )));
    }

    let nperseg = cfg.nperseg.max(8).min(x.len());
    let noverlap = (nperseg as f64 * cfg.overlap).floor() as usize;
    let hop = nperseg.saturating_sub(noverlap).max(1);

    // FFT size: power of two >= nperseg.
    let nfft = nperseg.next_power_of_two();
    let nfreq = nfft / 2 + 1;

    let window = hann_window(nperseg);
    let u: f64 = window.iter().map(|w| w * w).sum();
    if !(u > 0.0) {
        return Err(QeegError::Numerical("welch_psd: invalid window normalization".into()));
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nfft);
    let mut time_buf = fft.make_input_vec();
    let mut spectrum: Vec<Complex<f64>> = fft.make_output_vec();

    let scale = 1.0 / (fs_hz * u);
    let mut pxx_acc = vec![0.0f64; nfreq];
    let mut n_segments = 0usize;

    let mut start = 0usize;
    while start + nperseg <= x.len() {
        let segment = &x[start..start + nperseg];
        let mean =
            segment.iter().map(|&v| v as f64).sum::<f64>() / nperseg as f64;

        for (i, (&v, w)) in segment.iter().zip(&window).enumerate() {
            time_buf[i] = (v as f64 - mean) * w;
        }
        time_buf[nperseg..].fill(0.0);

        fft.process(&mut time_buf, &mut spectrum)
            .map_err(|e| QeegError::Numerical(format!("welch_psd: FFT failed: {e}")))?;

        for (k, c) in spectrum.iter().enumerate() {
            let mut p = c.norm_sqr() * scale;
            // One-sided PSD: double everything except DC and Nyquist.
            if k != 0 && k != nfft / 2 {
                p *= 2.0;
            }
            pxx_acc[k] += p;
        }

        n_segments += 1;
        start += hop;
    }

    if n_segments == 0 {
        return Err(QeegError::InsufficientData(
            "welch_psd: input shorter than one segment".into(),
        ));
    }

    for v in &mut pxx_acc {
        *v /= n_segments as f64;
    }

    let freqs_hz = (0..nfreq).map(|k| k as f64 * fs_hz / nfft as f64).collect();
    Ok(PsdResult {
        freqs_hz,
        psd: pxx_acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f64, fs: f64, seconds: f64) -> Vec<Sample> {
        let n = (fs * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin() as Sample)
            .collect()
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let cfg = WelchConfig::default();
        assert!(welch_psd(&[], 100.0, &cfg).is_err());
        assert!(welch_psd(&[0.0; 32], 0.0, &cfg).is_err());
        let bad = WelchConfig { overlap: 1.0, ..Default::default() };
        assert!(welch_psd(&[0.0; 32], 100.0, &bad).is_err());
    }

    #[test]
    fn test_output_shape() {
        let x = sine(10.0, 250.0, 4.0);
        let cfg = WelchConfig { nperseg: 200, overlap: 0.5 };
        let psd = welch_psd(&x, 250.0, &cfg).unwrap();
        // nfft = 256 (next power of two above 200)
        assert_eq!(psd.freqs_hz.len(), 129);
        assert_eq!(psd.psd.len(), 129);
        assert_abs_diff_eq!(psd.freqs_hz[0], 0.0);
        assert_abs_diff_eq!(psd.bin_hz(), 250.0 / 256.0, epsilon = 1e-12);
        assert!(psd.psd.iter().all(|&p| p >= 0.0 && p.is_finite()));
    }

    #[test]
    fn test_peak_at_sine_frequency() {
        let fs = 250.0;
        let x = sine(10.0, fs, 8.0);
        let cfg = WelchConfig { nperseg: 256, overlap: 0.5 };
        let psd = welch_psd(&x, fs, &cfg).unwrap();
        let peak_bin = psd
            .psd
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let peak_freq = psd.freqs_hz[peak_bin];
        assert!((peak_freq - 10.0).abs() < psd.bin_hz() * 1.5);
    }

    #[test]
    fn test_sine_total_power_scale() {
        // A unit sine has average power 0.5; the PSD integral around its
        // frequency should recover that within a few percent.
        let fs = 250.0;
        let x = sine(10.0, fs, 8.0);
        let cfg = WelchConfig { nperseg: 256, overlap: 0.5 };
        let psd = welch_psd(&x, fs, &cfg).unwrap();

        let df = psd.bin_hz();
        let total: f64 = psd
            .freqs_hz
            .iter()
            .zip(&psd.psd)
            .filter(|(f, _)| (**f - 10.0).abs() < 3.0)
            .map(|(_, p)| p * df)
            .sum();
        assert!((total - 0.5).abs() < 0.025, "total = {total}");
    }

    #[test]
    fn test_short_input_clamps_segment() {
        // Shorter than the default nperseg: clamps and still yields a PSD.
        let x = sine(5.0, 100.0, 0.5);
        let psd = welch_psd(&x, 100.0, &WelchConfig::default()).unwrap();
        assert!(!psd.psd.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let x = sine(12.0, 200.0, 3.0);
        let cfg = WelchConfig { nperseg: 128, overlap: 0.25 };
        let a = welch_psd(&x, 200.0, &cfg).unwrap();
        let b = welch_psd(&x, 200.0, &cfg).unwrap();
        assert_eq!(a, b);
    }
}
