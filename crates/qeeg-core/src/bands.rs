//! Frequency band definitions and band-spec strings
//!
//! Bands are exchanged between tools as compact spec strings, e.g.
//! `delta:0.5-4,theta:4-8,alpha:8-13`. The parser also accepts `iaf=NUM`,
//! which synthesizes individualized bands anchored to a numeric individual
//! alpha frequency.

use crate::error::{QeegError, QeegResult};

/// A named frequency range with 0 <= fmin < fmax.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandDefinition {
    pub name: String,
    pub fmin_hz: f64,
    pub fmax_hz: f64,
}

impl BandDefinition {
    /// Create a band, validating the range.
    pub fn new(name: impl Into<String>, fmin_hz: f64, fmax_hz: f64) -> QeegResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(QeegError::InvalidConfig("band name must not be empty".into()));
        }
        if !(fmin_hz >= 0.0 && fmax_hz > fmin_hz) {
            return Err(QeegError::InvalidConfig(format!(
                "band \"{name}\" range must satisfy 0 <= fmin < fmax (got {fmin_hz}-{fmax_hz})"
            )));
        }
        Ok(Self { name, fmin_hz, fmax_hz })
    }
}

/// The classic five EEG bands.
pub fn default_eeg_bands() -> Vec<BandDefinition> {
    vec![
        BandDefinition { name: "delta".into(), fmin_hz: 0.5, fmax_hz: 4.0 },
        BandDefinition { name: "theta".into(), fmin_hz: 4.0, fmax_hz: 8.0 },
        BandDefinition { name: "alpha".into(), fmin_hz: 8.0, fmax_hz: 13.0 },
        BandDefinition { name: "beta".into(), fmin_hz: 13.0, fmax_hz: 30.0 },
        BandDefinition { name: "gamma".into(), fmin_hz: 30.0, fmax_hz: 80.0 },
    ]
}

/// Configuration for [`individualized_bands_from_iaf`].
///
/// The default layout follows the common IAF-relative scheme:
/// delta [0.5, IAF-6], theta [IAF-6, IAF-2], alpha [IAF-2, IAF+2],
/// beta [IAF+2, 30], gamma [30, 80].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndividualizedBandsConfig {
    pub delta_min_hz: f64,
    pub beta_max_hz: f64,
    pub gamma_max_hz: f64,
    /// delta/theta split at IAF minus this offset.
    pub delta_theta_split_below_iaf: f64,
    /// theta/alpha split at IAF minus this offset.
    pub theta_alpha_split_below_iaf: f64,
    /// alpha/beta split at IAF plus this offset.
    pub alpha_beta_split_above_iaf: f64,
}

impl Default for IndividualizedBandsConfig {
    fn default() -> Self {
        Self {
            delta_min_hz: 0.5,
            beta_max_hz: 30.0,
            gamma_max_hz: 80.0,
            delta_theta_split_below_iaf: 6.0,
            theta_alpha_split_below_iaf: 2.0,
            alpha_beta_split_above_iaf: 2.0,
        }
    }
}

/// Derive the five IAF-relative bands from a numeric IAF estimate.
///
/// Split points are clamped so the bands stay monotonically ordered even for
/// implausibly low IAF values. Returns an empty list for non-finite or
/// non-positive IAF.
pub fn individualized_bands_from_iaf(
    iaf_hz: f64,
    cfg: &IndividualizedBandsConfig,
) -> Vec<BandDefinition> {
    if !iaf_hz.is_finite() || iaf_hz <= 0.0 {
        return Vec::new();
    }

    let dmin = cfg.delta_min_hz;
    let dmax = dmin.max(iaf_hz - cfg.delta_theta_split_below_iaf);
    let tmax = dmax.max(iaf_hz - cfg.theta_alpha_split_below_iaf);
    let amax = tmax.max(iaf_hz + cfg.alpha_beta_split_above_iaf);
    let bmax = amax.max(cfg.beta_max_hz);
    let gmax = bmax.max(cfg.gamma_max_hz);

    vec![
        BandDefinition { name: "delta".into(), fmin_hz: dmin, fmax_hz: dmax },
        BandDefinition { name: "theta".into(), fmin_hz: dmax, fmax_hz: tmax },
        BandDefinition { name: "alpha".into(), fmin_hz: tmax, fmax_hz: amax },
        BandDefinition { name: "beta".into(), fmin_hz: amax, fmax_hz: bmax },
        BandDefinition { name: "gamma".into(), fmin_hz: bmax, fmax_hz: gmax },
    ]
}

/// Parse a band spec string: comma-separated `name:min-max` entries, or
/// `iaf=NUM` to synthesize individualized bands.
///
/// The `iaf:PATH` form (read an IAF estimate from a file or run directory)
/// needs filesystem access and is resolved by `qeeg-io`.
pub fn parse_bands_spec(spec: &str) -> QeegResult<Vec<BandDefinition>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(QeegError::InvalidConfig("empty band spec".into()));
    }

    if let Some(value) = spec.strip_prefix("iaf=") {
        let iaf: f64 = value
            .trim()
            .parse()
            .map_err(|_| QeegError::Parse(format!("invalid IAF value in band spec: \"{value}\"")))?;
        let bands = individualized_bands_from_iaf(iaf, &IndividualizedBandsConfig::default());
        if bands.is_empty() {
            return Err(QeegError::InvalidConfig(format!(
                "iaf={iaf} does not yield a valid band layout"
            )));
        }
        return Ok(bands);
    }

    let mut bands = Vec::new();
    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, range) = entry.split_once(':').ok_or_else(|| {
            QeegError::Parse(format!("band entry \"{entry}\" is not name:min-max"))
        })?;
        let (lo, hi) = range.split_once('-').ok_or_else(|| {
            QeegError::Parse(format!("band entry \"{entry}\" is not name:min-max"))
        })?;
        let fmin: f64 = lo
            .trim()
            .parse()
            .map_err(|_| QeegError::Parse(format!("invalid band min in \"{entry}\"")))?;
        let fmax: f64 = hi
            .trim()
            .parse()
            .map_err(|_| QeegError::Parse(format!("invalid band max in \"{entry}\"")))?;
        bands.push(BandDefinition::new(name.trim(), fmin, fmax)?);
    }

    if bands.is_empty() {
        return Err(QeegError::InvalidConfig("band spec contains no bands".into()));
    }
    Ok(bands)
}

/// Serialize bands to the parseable spec form, `name:min-max,...`.
pub fn bands_to_spec_string(bands: &[BandDefinition]) -> String {
    let mut out = String::new();
    for band in bands {
        if band.name.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&format!("{}:{}-{}", band.name, band.fmin_hz, band.fmax_hz));
    }
    out
}
