//! Bandpower integration over one-sided PSDs
//!
//! Band values are trapezoid-rule integrals of the piecewise-linear PSD,
//! restricted to the requested range. The clipped endpoints are linearly
//! interpolated from the enclosing bins so the result is continuous in the
//! range edges. Optional transforms: relative power (divide by the power in
//! a reference range) and log10.

use qeeg_core::{BandDefinition, QeegError, QeegResult, Recording};

use crate::welch::{welch_psd, PsdResult, WelchConfig};

/// Floor used for log10 and relative-power denominators.
pub const LOG_EPS: f64 = 1e-20;

#[inline]
fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) / (x1 - x0) * (y1 - y0)
}

/// Integrate the PSD over `[fmin_hz, fmax_hz]` (clamped to the PSD support)
/// using the trapezoid rule on the piecewise-linear density.
///
/// Returns 0 for an empty overlap. Negative or non-finite interpolated
/// endpoint values are clamped to 0.
pub fn integrate_bandpower(psd: &PsdResult, fmin_hz: f64, fmax_hz: f64) -> f64 {
    if psd.freqs_hz.len() != psd.psd.len() || psd.freqs_hz.len() < 2 {
        return 0.0;
    }

    let f_lo = fmin_hz.max(psd.freqs_hz[0]);
    let f_hi = fmax_hz.min(*psd.freqs_hz.last().unwrap());
    if !(f_hi > f_lo) {
        return 0.0;
    }

    let mut total = 0.0;
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
        total += 0.5 * (pa + pb) * (b - a);
    }
    total
}

/// Bandpower computation options shared by the offline matrix and the online
/// engine.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BandpowerConfig {
    /// Welch PSD parameters.
    pub welch: WelchConfig,

    /// Output `band_power / total_power`, with total integrated over the
    /// relative range below.
    pub relative_power: bool,

    /// Total-power range for relative mode. (0, 0) means "unspecified":
    /// the span of the requested bands is used.
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,

    /// Apply `log10(max(1e-20, v))` to output values.
    pub log10_power: bool,
}

impl BandpowerConfig {
    /// Validate the relative range when one was given explicitly.
    pub fn validate(&self) -> QeegResult<()> {
        if self.relative_power && self.relative_range_specified() {
            if self.relative_fmin_hz < 0.0 {
                return Err(QeegError::InvalidConfig(
                    "relative_fmin_hz must be >= 0".into(),
                ));
            }
            if !(self.relative_fmax_hz > self.relative_fmin_hz) {
                return Err(QeegError::InvalidConfig(
                    "relative range must satisfy fmin < fmax".into(),
                ));
            }
        }
        Ok(())
    }

    /// (0, 0) is the "unspecified" sentinel for the relative range.
    pub fn relative_range_specified(&self) -> bool {
        self.relative_fmin_hz != 0.0 || self.relative_fmax_hz != 0.0
    }

    /// The effective relative-integration range for a band list.
    pub fn resolve_relative_range(&self, bands: &[BandDefinition]) -> (f64, f64) {
        if self.relative_range_specified() {
            return (self.relative_fmin_hz, self.relative_fmax_hz);
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for band in bands {
            lo = lo.min(band.fmin_hz);
            hi = hi.max(band.fmax_hz);
        }
        if lo.is_finite() && hi.is_finite() {
            (lo, hi)
        } else {
            (0.0, 0.0)
        }
    }
}

/// Bandpower matrix indexed `powers[band][channel]`, with the transform
/// options mirrored so downstream code can interpret the values.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BandpowerMatrix {
    pub channel_names: Vec<String>,
    pub bands: Vec<BandDefinition>,
    pub powers: Vec<Vec<f64>>,

    pub relative_power: bool,
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,
    pub log10_power: bool,
}

/// Apply the relative/log transforms to one raw band integral.
#[inline]
pub(crate) fn transform_band_value(
    raw: f64,
    total_power: f64,
    relative: bool,
    log10: bool,
) -> f64 {
    let mut v = raw;
    if relative {
        v /= total_power.max(LOG_EPS);
    }
    if log10 {
        v = v.max(LOG_EPS).log10();
    }
    v
}

/// Compute a per-(band, channel) bandpower matrix for a whole recording.
pub fn compute_bandpower_matrix(
    rec: &Recording,
    bands: &[BandDefinition],
    cfg: &BandpowerConfig,
) -> QeegResult<BandpowerMatrix> {
    if bands.is_empty() {
        return Err(QeegError::InvalidConfig("band list is empty".into()));
    }
    if rec.n_channels() == 0 || rec.n_samples() == 0 {
        return Err(QeegError::InsufficientData("empty recording".into()));
    }
    cfg.validate()?;

    let (rel_lo, rel_hi) = cfg.resolve_relative_range(bands);
    let mut powers = vec![vec![0.0f64; rec.n_channels()]; bands.len()];

    for (ch, samples) in rec.data.iter().enumerate() {
        let psd = welch_psd(samples, rec.fs_hz, &cfg.welch)?;

        let total = if cfg.relative_power {
            integrate_bandpower(&psd, rel_lo, rel_hi)
        } else {
            1.0
        };

        for (b, band) in bands.iter().enumerate() {
            let raw = integrate_bandpower(&psd, band.fmin_hz, band.fmax_hz);
            powers[b][ch] =
                transform_band_value(raw, total, cfg.relative_power, cfg.log10_power);
        }
    }

    Ok(BandpowerMatrix {
        channel_names: rec.channel_names.clone(),
        bands: bands.to_vec(),
        powers,
        relative_power: cfg.relative_power,
        relative_fmin_hz: if cfg.relative_power { rel_lo } else { 0.0 },
        relative_fmax_hz: if cfg.relative_power { rel_hi } else { 0.0 },
        log10_power: cfg.log10_power,
    })
}
