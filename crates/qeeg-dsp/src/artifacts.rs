//! Offline artifact detection
//!
//! Two-pass sliding-window detector: windowed time-domain features
//! (peak-to-peak, RMS, excess kurtosis) are reduced to per-channel robust
//! z-scores against a baseline period, then thresholded into per-channel and
//! per-window flags. Bad windows merge into contiguous segments for
//! reporting and epoch rejection.

use qeeg_core::{robust_location_scale, QeegError, QeegResult, Recording};

/// Detector configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactConfig {
    /// Sliding window length in seconds.
    pub window_seconds: f64,
    /// Window step in seconds (<= window).
    pub step_seconds: f64,

    /// Baseline period for robust thresholds. <= 0 uses the entire
    /// recording.
    pub baseline_seconds: f64,

    /// Robust z-score thresholds; <= 0 disables that feature.
    pub ptp_z: f64,
    pub rms_z: f64,
    pub kurtosis_z: f64,

    /// A window is bad when at least this many channels are flagged.
    pub min_bad_channels: usize,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            window_seconds: 1.0,
            step_seconds: 0.5,
            baseline_seconds: 10.0,
            ptp_z: 6.0,
            rms_z: 6.0,
            kurtosis_z: 6.0,
            min_bad_channels: 1,
        }
    }
}

/// Raw time-domain features of one window of one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeDomainFeatures {
    /// Peak-to-peak amplitude (max - min).
    pub ptp: f64,
    /// Root-mean-square energy.
    pub rms: f64,
    /// Excess kurtosis; 0 when the window variance is <= 1e-24.
    pub kurtosis: f64,
}

/// Compute ptp/RMS/excess kurtosis from a sample iterator in one pass.
///
/// Kurtosis uses raw moments:
/// `mu4 = E[x^4] - 4 m E[x^3] + 6 m^2 E[x^2] - 3 m^4`.
pub fn time_domain_features(values: impl Iterator<Item = f64>) -> TimeDomainFeatures {
    let mut mn = f64::INFINITY;
    let mut mx = f64::NEG_INFINITY;
    let mut s1 = 0.0;
    let mut s2 = 0.0;
    let mut s3 = 0.0;
    let mut s4 = 0.0;
    let mut n = 0usize;

    for v in values {
        mn = mn.min(v);
        mx = mx.max(v);
        s1 += v;
        let v2 = v * v;
        s2 += v2;
        s3 += v2 * v;
        s4 += v2 * v2;
        n += 1;
    }

    if n == 0 {
        return TimeDomainFeatures::default();
    }

    let n = n as f64;
    let mean = s1 / n;
    let ex2 = s2 / n;
    let ex3 = s3 / n;
    let ex4 = s4 / n;
    let var = (ex2 - mean * mean).max(0.0);

    let mu4 = ex4 - 4.0 * mean * ex3 + 6.0 * mean * mean * ex2 - 3.0 * mean.powi(4);
    let kurtosis = if var > 1e-24 { mu4 / (var * var) - 3.0 } else { 0.0 };

    TimeDomainFeatures {
        ptp: mx - mn,
        rms: ex2.max(0.0).sqrt(),
        kurtosis,
    }
}

/// Per-channel robust baseline statistics (median and MAD-derived scale with
/// a std fallback) for each feature.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChannelBaselineStats {
    pub ptp_median: f64,
    pub ptp_scale: f64,
    pub rms_median: f64,
    pub rms_scale: f64,
    pub kurtosis_median: f64,
    pub kurtosis_scale: f64,
}

impl Default for ChannelBaselineStats {
    fn default() -> Self {
        Self {
            ptp_median: 0.0,
            ptp_scale: 1.0,
            rms_median: 0.0,
            rms_scale: 1.0,
            kurtosis_median: 0.0,
            kurtosis_scale: 1.0,
        }
    }
}

/// One channel's metrics within one window.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ChannelWindowMetrics {
    pub ptp: f64,
    pub rms: f64,
    pub kurtosis: f64,

    pub ptp_z: f64,
    pub rms_z: f64,
    pub kurtosis_z: f64,

    pub bad: bool,
}

/// One analysis window across all channels.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactWindow {
    pub t_start_sec: f64,
    pub t_end_sec: f64,
    pub channels: Vec<ChannelWindowMetrics>,
    pub bad: bool,
    pub bad_channel_count: usize,
}

/// Full detection result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactDetection {
    pub config: ArtifactConfig,
    pub channel_names: Vec<String>,
    pub baseline_stats: Vec<ChannelBaselineStats>,
    pub windows: Vec<ArtifactWindow>,
    pub total_bad_windows: usize,
    /// True when the configured baseline selected no windows and the whole
    /// recording was used instead.
    pub baseline_fallback: bool,
}

/// A merged run of bad windows.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactSegment {
    pub t_start_sec: f64,
    pub t_end_sec: f64,

    /// Indices into `ArtifactDetection::windows` of the first/last merged
    /// bad window.
    pub first_window: usize,
    pub last_window: usize,

    /// Number of bad windows merged into the segment.
    pub window_count: usize,
    /// Maximum per-window bad-channel count within the segment.
    pub max_bad_channels: usize,
    /// Per channel: bad windows contributed to this segment.
    pub bad_windows_per_channel: Vec<usize>,
}

struct WindowRaw {
    t_start_sec: f64,
    t_end_sec: f64,
    features: Vec<TimeDomainFeatures>,
}

/// Detect artifact windows via robust z-score thresholding.
pub fn detect_artifacts(rec: &Recording, cfg: &ArtifactConfig) -> QeegResult<ArtifactDetection> {
    if !(rec.fs_hz > 0.0) {
        return Err(QeegError::InvalidConfig("invalid sampling rate".into()));
    }
    if rec.n_channels() == 0 || rec.n_samples() == 0 {
        return Err(QeegError::InsufficientData("empty recording".into()));
    }
    if !(cfg.window_seconds > 0.0) || !(cfg.step_seconds > 0.0) {
        return Err(QeegError::InvalidConfig(
            "window_seconds and step_seconds must be > 0".into(),
        ));
    }
    if cfg.min_bad_channels < 1 {
        return Err(QeegError::InvalidConfig("min_bad_channels must be >= 1".into()));
    }

    let fs = rec.fs_hz;
    let win_n = (cfg.window_seconds * fs).round() as usize;
    let step_n = (cfg.step_seconds * fs).round() as usize;
    if win_n < 2 {
        return Err(QeegError::InvalidConfig("window too small (< 2 samples)".into()));
    }
    if step_n < 1 {
        return Err(QeegError::InvalidConfig("step too small".into()));
    }
    if step_n > win_n {
        return Err(QeegError::InvalidConfig(
            "step_seconds must be <= window_seconds".into(),
        ));
    }

    let n_ch = rec.n_channels();
    let n_samp = rec.n_samples();
    let baseline_end = if cfg.baseline_seconds > 0.0 {
        ((cfg.baseline_seconds * fs).round() as usize).min(n_samp)
    } else {
        n_samp
    };

    // Pass 1: raw features for every window.
    let mut raw = Vec::new();
    let mut start = 0usize;
    while start + win_n <= n_samp {
        let mut features = Vec::with_capacity(n_ch);
        for samples in &rec.data {
            features.push(time_domain_features(
                samples[start..start + win_n].iter().map(|&v| v as f64),
            ));
        }
        raw.push(WindowRaw {
            t_start_sec: start as f64 / fs,
            t_end_sec: (start + win_n) as f64 / fs,
            features,
        });
        start += step_n;
    }

    if raw.is_empty() {
        return Err(QeegError::InsufficientData(
            "no windows (recording shorter than window)".into(),
        ));
    }

    // Baseline pools per channel.
    let mut base_ptp = vec![Vec::new(); n_ch];
    let mut base_rms = vec![Vec::new(); n_ch];
    let mut base_kurt = vec![Vec::new(); n_ch];
    for w in &raw {
        let end_sample = (w.t_end_sec * fs).round() as usize;
        if end_sample > baseline_end {
            break;
        }
        for (ch, f) in w.features.iter().enumerate() {
            base_ptp[ch].push(f.ptp);
            base_rms[ch].push(f.rms);
            base_kurt[ch].push(f.kurtosis);
        }
    }

    // Baseline selection can come up empty for short recordings; use every
    // window instead.
    let baseline_fallback = base_ptp.iter().all(Vec::is_empty);
    if baseline_fallback {
        log::warn!(
            "artifact baseline ({} s) selected no windows; using the whole recording",
            cfg.baseline_seconds
        );
        for w in &raw {
            for (ch, f) in w.features.iter().enumerate() {
                base_ptp[ch].push(f.ptp);
                base_rms[ch].push(f.rms);
                base_kurt[ch].push(f.kurtosis);
            }
        }
    }

    let mut baseline_stats = Vec::with_capacity(n_ch);
    for ch in 0..n_ch {
        let (ptp_median, ptp_scale) = robust_location_scale(&base_ptp[ch]);
        let (rms_median, rms_scale) = robust_location_scale(&base_rms[ch]);
        let (kurtosis_median, kurtosis_scale) = robust_location_scale(&base_kurt[ch]);
        baseline_stats.push(ChannelBaselineStats {
            ptp_median,
            ptp_scale,
            rms_median,
            rms_scale,
            kurtosis_median,
            kurtosis_scale,
        });
    }

    // Pass 2: z-scores and flags.
    let mut windows = Vec::with_capacity(raw.len());
    let mut total_bad_windows = 0usize;

    for w in &raw {
        let mut channels = Vec::with_capacity(n_ch);
        let mut bad_channel_count = 0usize;

        for (ch, f) in w.features.iter().enumerate() {
            let st = &baseline_stats[ch];
            let ptp_z = (f.ptp - st.ptp_median) / st.ptp_scale;
            let rms_z = (f.rms - st.rms_median) / st.rms_scale;
            let kurtosis_z = (f.kurtosis - st.kurtosis_median) / st.kurtosis_scale;

            let bad = (cfg.ptp_z > 0.0 && ptp_z > cfg.ptp_z)
                || (cfg.rms_z > 0.0 && rms_z > cfg.rms_z)
                || (cfg.kurtosis_z > 0.0 && kurtosis_z > cfg.kurtosis_z);
            if bad {
                bad_channel_count += 1;
            }

            channels.push(ChannelWindowMetrics {
                ptp: f.ptp,
                rms: f.rms,
                kurtosis: f.kurtosis,
                ptp_z,
                rms_z,
                kurtosis_z,
                bad,
            });
        }

        let bad = bad_channel_count >= cfg.min_bad_channels;
        if bad {
            total_bad_windows += 1;
        }
        windows.push(ArtifactWindow {
            t_start_sec: w.t_start_sec,
            t_end_sec: w.t_end_sec,
            channels,
            bad,
            bad_channel_count,
        });
    }

    Ok(ArtifactDetection {
        config: cfg.clone(),
        channel_names: rec.channel_names.clone(),
        baseline_stats,
        windows,
        total_bad_windows,
        baseline_fallback,
    })
}

/// Count how many windows flagged each channel, regardless of the window-
/// level flag.
pub fn bad_counts_per_channel(detection: &ArtifactDetection) -> Vec<usize> {
    let n_ch = detection.channel_names.len();
    let mut counts = vec![0usize; n_ch];
    for w in &detection.windows {
        for (ch, m) in w.channels.iter().enumerate() {
            if m.bad {
                counts[ch] += 1;
            }
        }
    }
    counts
}

/// Merge overlapping/adjacent bad windows into contiguous segments. Segments
/// separated by a gap <= `merge_gap_seconds` are also merged.
pub fn merge_bad_segments(
    detection: &ArtifactDetection,
    merge_gap_seconds: f64,
) -> Vec<ArtifactSegment> {
    let n_ch = detection.channel_names.len();
    let gap = merge_gap_seconds.max(0.0);

    let mut bad: Vec<(usize, &ArtifactWindow)> = detection
        .windows
        .iter()
        .enumerate()
        .filter(|(_, w)| w.bad)
        .collect();
    bad.sort_by(|a, b| {
        a.1.t_start_sec
            .partial_cmp(&b.1.t_start_sec)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut segments: Vec<ArtifactSegment> = Vec::new();
    for (wi, w) in bad {
        match segments.last_mut() {
            Some(seg) if seg.t_end_sec + gap >= w.t_start_sec => {
                seg.t_end_sec = seg.t_end_sec.max(w.t_end_sec);
                seg.last_window = wi;
                seg.window_count += 1;
                seg.max_bad_channels = seg.max_bad_channels.max(w.bad_channel_count);
                for (ch, m) in w.channels.iter().enumerate() {
                    if m.bad {
                        seg.bad_windows_per_channel[ch] += 1;
                    }
                }
            }
            _ => {
                let mut per_channel = vec![0usize; n_ch];
                for (ch, m) in w.channels.iter().enumerate() {
                    if m.bad {
                        per_channel[ch] += 1;
                    }
                }
                segments.push(ArtifactSegment {
                    t_start_sec: w.t_start_sec,
                    t_end_sec: w.t_end_sec,
                    first_window: wi,
                    last_window: wi,
                    window_count: 1,
                    max_bad_channels: w.bad_channel_count,
                    bad_windows_per_channel: per_channel,
                });
            }
        }
    }

    segments
}
