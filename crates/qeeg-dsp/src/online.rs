//! Online sliding-window engines
//!
//! Fixed-latency ring-buffer framework for streaming analysis. Each engine
//! owns one fixed-capacity ring per channel, counts samples since
//! construction, and emits a frame every `update_samples` once the rings are
//! full. The update counter is decremented rather than reset on emission so
//! frame timing stays stable for arbitrary chunk boundaries: feeding the
//! same samples in any block pattern yields the identical frame sequence.

use qeeg_core::{
    robust_location_scale, BandDefinition, QeegError, QeegResult, Sample, default_eeg_bands,
};

use crate::artifacts::{time_domain_features, ChannelBaselineStats, TimeDomainFeatures};
use crate::bandpower::{integrate_bandpower, transform_band_value, BandpowerConfig};
use crate::welch::{welch_psd, WelchConfig};

/// Fixed-capacity per-channel sample ring.
#[derive(Debug, Clone)]
struct Ring {
    buf: Vec<Sample>,
    head: usize,
    count: usize,
}

impl Ring {
    fn new(cap: usize) -> Self {
        debug_assert!(cap > 0);
        Self {
            buf: vec![0.0; cap],
            head: 0,
            count: 0,
        }
    }

    #[inline]
    fn push(&mut self, x: Sample) {
        self.buf[self.head] = x;
        self.head = (self.head + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.count == self.buf.len()
    }

    /// Copy the contents oldest-to-newest into `out`.
    fn extract_into(&self, out: &mut Vec<Sample>) {
        out.clear();
        let cap = self.buf.len();
        let start = if self.count == cap { self.head } else { 0 };
        out.extend((0..self.count).map(|i| self.buf[(start + i) % cap]));
    }

    /// Iterate oldest-to-newest without copying.
    fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        let cap = self.buf.len();
        let start = if self.count == cap { self.head } else { 0 };
        (0..self.count).map(move |i| self.buf[(start + i) % cap])
    }
}

fn sec_to_samples(sec: f64, fs_hz: f64) -> usize {
    if fs_hz <= 0.0 || sec <= 0.0 {
        0
    } else {
        (sec * fs_hz).round() as usize
    }
}

fn validate_block(block: &[&[Sample]], n_channels: usize) -> QeegResult<usize> {
    if block.len() != n_channels {
        return Err(QeegError::ChannelMismatch {
            expected: n_channels,
            actual: block.len(),
        });
    }
    let n = block[0].len();
    for row in block.iter().skip(1) {
        if row.len() != n {
            return Err(QeegError::Structural(
                "all channels in a block must have the same length".into(),
            ));
        }
    }
    Ok(n)
}

// ============ Online bandpower ============

/// Online bandpower engine configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OnlineBandpowerConfig {
    /// Sliding analysis window length in seconds.
    pub window_seconds: f64,
    /// Frame emission interval in seconds (clamped to the window length).
    pub update_seconds: f64,
    /// Welch PSD parameters used per frame.
    pub welch: WelchConfig,

    /// Relative bandpower: divide by the total over the range below.
    pub relative_power: bool,
    /// (0, 0) means "use the span of the configured bands".
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,

    /// Apply `log10(max(1e-20, v))` to output values.
    pub log10_power: bool,
}

impl Default for OnlineBandpowerConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            welch: WelchConfig::default(),
            relative_power: false,
            relative_fmin_hz: 0.0,
            relative_fmax_hz: 0.0,
            log10_power: false,
        }
    }
}

/// One emitted bandpower frame. Carries a configuration mirror so frames can
/// be interpreted without the engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OnlineBandpowerFrame {
    /// Window-end time in sample-counted seconds since stream start.
    pub t_end_sec: f64,

    pub channel_names: Vec<String>,
    pub bands: Vec<BandDefinition>,

    pub relative_power: bool,
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,
    pub log10_power: bool,

    /// powers[band][channel]
    pub powers: Vec<Vec<f64>>,
}

/// Streaming Welch bandpower estimator over per-channel rings.
#[derive(Debug)]
pub struct OnlineBandpower {
    channel_names: Vec<String>,
    fs_hz: f64,
    bands: Vec<BandDefinition>,
    cfg: OnlineBandpowerConfig,

    window_samples: usize,
    update_samples: usize,
    rel_range: (f64, f64),

    rings: Vec<Ring>,
    total_samples: u64,
    since_last_update: usize,
    scratch: Vec<Sample>,
}

impl OnlineBandpower {
    /// Create an engine. An empty `bands` list selects the default EEG
    /// bands.
    pub fn new(
        channel_names: Vec<String>,
        fs_hz: f64,
        bands: Vec<BandDefinition>,
        cfg: OnlineBandpowerConfig,
    ) -> QeegResult<Self> {
        if channel_names.is_empty() {
            return Err(QeegError::InvalidConfig("need at least 1 channel".into()));
        }
        if !(fs_hz > 0.0) {
            return Err(QeegError::InvalidConfig(format!("fs_hz must be > 0 (got {fs_hz})")));
        }
        if !(cfg.window_seconds > 0.0) {
            return Err(QeegError::InvalidConfig("window_seconds must be > 0".into()));
        }
        if !(cfg.update_seconds > 0.0) {
            return Err(QeegError::InvalidConfig("update_seconds must be > 0".into()));
        }
        let bands = if bands.is_empty() { default_eeg_bands() } else { bands };

        let bp = BandpowerConfig {
            welch: cfg.welch.clone(),
            relative_power: cfg.relative_power,
            relative_fmin_hz: cfg.relative_fmin_hz,
            relative_fmax_hz: cfg.relative_fmax_hz,
            log10_power: cfg.log10_power,
        };
        bp.validate()?;
        let rel_range = bp.resolve_relative_range(&bands);

        let window_samples = sec_to_samples(cfg.window_seconds, fs_hz).max(8);
        let update_samples = sec_to_samples(cfg.update_seconds, fs_hz)
            .max(1)
            .min(window_samples);

        let rings = (0..channel_names.len()).map(|_| Ring::new(window_samples)).collect();

        Ok(Self {
            channel_names,
            fs_hz,
            bands,
            cfg,
            window_samples,
            update_samples,
            rel_range,
            rings,
            total_samples: 0,
            since_last_update: 0,
            scratch: Vec::with_capacity(window_samples),
        })
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channel_names.len()
    }

    #[inline]
    pub fn fs_hz(&self) -> f64 {
        self.fs_hz
    }

    #[inline]
    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    #[inline]
    pub fn update_samples(&self) -> usize {
        self.update_samples
    }

    /// Push one block, `block[ch][i]`, and collect the frames emitted while
    /// consuming it (in time order).
    pub fn push_block(&mut self, block: &[&[Sample]]) -> QeegResult<Vec<OnlineBandpowerFrame>> {
        if block.is_empty() {
            return Ok(Vec::new());
        }
        let n = validate_block(block, self.channel_names.len())?;

        let mut frames = Vec::new();
        for i in 0..n {
            for (ring, row) in self.rings.iter_mut().zip(block) {
                ring.push(row[i]);
            }
            self.total_samples += 1;
            self.since_last_update += 1;

            if !self.rings[0].is_full() {
                continue;
            }
            if self.since_last_update >= self.update_samples {
                // Keep the remainder so timing stays stable when the update
                // interval does not divide the block size.
                self.since_last_update -= self.update_samples;
                frames.push(self.compute_frame()?);
            }
        }
        Ok(frames)
    }

    fn compute_frame(&mut self) -> QeegResult<OnlineBandpowerFrame> {
        let n_ch = self.channel_names.len();
        let (rel_lo, rel_hi) = self.rel_range;
        let mut powers = vec![vec![0.0f64; n_ch]; self.bands.len()];

        for ch in 0..n_ch {
            let mut scratch = std::mem::take(&mut self.scratch);
            self.rings[ch].extract_into(&mut scratch);
            let psd = welch_psd(&scratch, self.fs_hz, &self.cfg.welch);
            self.scratch = scratch;
            let psd = psd?;

            let total = if self.cfg.relative_power {
                integrate_bandpower(&psd, rel_lo, rel_hi)
            } else {
                1.0
            };

            for (b, band) in self.bands.iter().enumerate() {
                let raw = integrate_bandpower(&psd, band.fmin_hz, band.fmax_hz);
                powers[b][ch] = transform_band_value(
                    raw,
                    total,
                    self.cfg.relative_power,
                    self.cfg.log10_power,
                );
            }
        }

        Ok(OnlineBandpowerFrame {
            t_end_sec: self.total_samples as f64 / self.fs_hz,
            channel_names: self.channel_names.clone(),
            bands: self.bands.clone(),
            relative_power: self.cfg.relative_power,
            relative_fmin_hz: if self.cfg.relative_power { rel_lo } else { 0.0 },
            relative_fmax_hz: if self.cfg.relative_power { rel_hi } else { 0.0 },
            log10_power: self.cfg.log10_power,
            powers,
        })
    }
}

// ============ Online artifact gate ============

/// Online artifact gate configuration. Window/update should match the
/// bandpower engine so frames align.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OnlineArtifactConfig {
    pub window_seconds: f64,
    pub update_seconds: f64,

    /// Baseline period for robust per-channel thresholds. <= 0 disables the
    /// baseline (the gate reports ready immediately with neutral stats).
    pub baseline_seconds: f64,

    /// Robust z thresholds; <= 0 disables that feature.
    pub ptp_z: f64,
    pub rms_z: f64,
    pub kurtosis_z: f64,

    /// Frame is bad when at least this many channels are flagged.
    pub min_bad_channels: usize,
}

impl Default for OnlineArtifactConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            update_seconds: 0.25,
            baseline_seconds: 10.0,
            ptp_z: 6.0,
            rms_z: 6.0,
            kurtosis_z: 6.0,
            min_bad_channels: 1,
        }
    }
}

/// One emitted artifact-gate frame.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OnlineArtifactFrame {
    pub t_end_sec: f64,
    /// Whether baseline stats were available for this frame.
    pub baseline_ready: bool,

    pub bad: bool,
    pub bad_channel_count: usize,

    /// Max z-score across channels per feature.
    pub max_ptp_z: f64,
    pub max_rms_z: f64,
    pub max_kurtosis_z: f64,
}

#[derive(Debug, Default)]
struct BaselinePools {
    ptp: Vec<Vec<f64>>,
    rms: Vec<Vec<f64>>,
    kurtosis: Vec<Vec<f64>>,
}

/// Streaming artifact gate: windowed time-domain features against robust
/// baseline statistics, used to veto neurofeedback reward frames.
#[derive(Debug)]
pub struct OnlineArtifactGate {
    channel_names: Vec<String>,
    fs_hz: f64,
    cfg: OnlineArtifactConfig,

    window_samples: usize,
    update_samples: usize,
    baseline_end_samples: u64,

    rings: Vec<Ring>,
    total_samples: u64,
    since_last_update: usize,

    baseline_ready: bool,
    /// Present only while accumulating; freed once stats are built.
    pools: Option<BaselinePools>,
    baseline_stats: Vec<ChannelBaselineStats>,
}

impl OnlineArtifactGate {
    pub fn new(
        channel_names: Vec<String>,
        fs_hz: f64,
        cfg: OnlineArtifactConfig,
    ) -> QeegResult<Self> {
        if channel_names.is_empty() {
            return Err(QeegError::InvalidConfig("need at least 1 channel".into()));
        }
        if !(fs_hz > 0.0) {
            return Err(QeegError::InvalidConfig(format!("fs_hz must be > 0 (got {fs_hz})")));
        }
        if !(cfg.window_seconds > 0.0) {
            return Err(QeegError::InvalidConfig("window_seconds must be > 0".into()));
        }
        if !(cfg.update_seconds > 0.0) {
            return Err(QeegError::InvalidConfig("update_seconds must be > 0".into()));
        }
        if cfg.update_seconds > cfg.window_seconds {
            return Err(QeegError::InvalidConfig(
                "update_seconds must be <= window_seconds".into(),
            ));
        }
        if cfg.min_bad_channels < 1 {
            return Err(QeegError::InvalidConfig("min_bad_channels must be >= 1".into()));
        }

        let n_ch = channel_names.len();
        let window_samples = sec_to_samples(cfg.window_seconds, fs_hz).max(8);
        let update_samples = sec_to_samples(cfg.update_seconds, fs_hz)
            .max(1)
            .min(window_samples);
        let baseline_end_samples = sec_to_samples(cfg.baseline_seconds, fs_hz) as u64;

        Ok(Self {
            channel_names,
            fs_hz,
            cfg,
            window_samples,
            update_samples,
            baseline_end_samples,
            rings: (0..n_ch).map(|_| Ring::new(window_samples)).collect(),
            total_samples: 0,
            since_last_update: 0,
            baseline_ready: false,
            pools: Some(BaselinePools {
                ptp: vec![Vec::new(); n_ch],
                rms: vec![Vec::new(); n_ch],
                kurtosis: vec![Vec::new(); n_ch],
            }),
            baseline_stats: vec![ChannelBaselineStats::default(); n_ch],
        })
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channel_names.len()
    }

    #[inline]
    pub fn baseline_ready(&self) -> bool {
        self.baseline_ready
    }

    pub fn baseline_stats(&self) -> &[ChannelBaselineStats] {
        &self.baseline_stats
    }

    /// Push one block, `block[ch][i]`, and collect emitted frames.
    pub fn push_block(&mut self, block: &[&[Sample]]) -> QeegResult<Vec<OnlineArtifactFrame>> {
        if block.is_empty() {
            return Ok(Vec::new());
        }
        let n = validate_block(block, self.channel_names.len())?;

        let mut frames = Vec::new();
        for i in 0..n {
            for (ring, row) in self.rings.iter_mut().zip(block) {
                ring.push(row[i]);
            }
            self.total_samples += 1;
            self.since_last_update += 1;

            if !self.rings[0].is_full() {
                continue;
            }
            if self.since_last_update >= self.update_samples {
                self.since_last_update -= self.update_samples;
                frames.push(self.emit_frame());
            }
        }
        Ok(frames)
    }

    fn emit_frame(&mut self) -> OnlineArtifactFrame {
        let t_end_sec = self.total_samples as f64 / self.fs_hz;
        let features: Vec<TimeDomainFeatures> = self
            .rings
            .iter()
            .map(|r| time_domain_features(r.iter().map(|v| v as f64)))
            .collect();

        // Accumulate baseline distributions until the baseline period ends.
        if self.cfg.baseline_seconds > 0.0 && self.total_samples <= self.baseline_end_samples {
            if let Some(pools) = self.pools.as_mut() {
                for (ch, f) in features.iter().enumerate() {
                    pools.ptp[ch].push(f.ptp);
                    pools.rms[ch].push(f.rms);
                    pools.kurtosis[ch].push(f.kurtosis);
                }
            }
        }

        self.ensure_baseline_stats(t_end_sec);

        let mut frame = OnlineArtifactFrame {
            t_end_sec,
            baseline_ready: self.baseline_ready,
            ..Default::default()
        };

        if self.baseline_ready {
            let mut bad_channels = 0usize;
            for (f, st) in features.iter().zip(&self.baseline_stats) {
                let ptp_z = (f.ptp - st.ptp_median) / st.ptp_scale;
                let rms_z = (f.rms - st.rms_median) / st.rms_scale;
                let kurtosis_z = (f.kurtosis - st.kurtosis_median) / st.kurtosis_scale;

                frame.max_ptp_z = frame.max_ptp_z.max(ptp_z);
                frame.max_rms_z = frame.max_rms_z.max(rms_z);
                frame.max_kurtosis_z = frame.max_kurtosis_z.max(kurtosis_z);

                let bad = (self.cfg.ptp_z > 0.0 && ptp_z > self.cfg.ptp_z)
                    || (self.cfg.rms_z > 0.0 && rms_z > self.cfg.rms_z)
                    || (self.cfg.kurtosis_z > 0.0 && kurtosis_z > self.cfg.kurtosis_z);
                if bad {
                    bad_channels += 1;
                }
            }
            frame.bad_channel_count = bad_channels;
            frame.bad = bad_channels >= self.cfg.min_bad_channels;
        }

        frame
    }

    /// Build baseline statistics exactly once, the first time the baseline
    /// period has passed. Pools are freed afterwards.
    fn ensure_baseline_stats(&mut self, t_end_sec: f64) {
        if self.baseline_ready {
            return;
        }
        if self.cfg.baseline_seconds > 0.0 && t_end_sec <= self.cfg.baseline_seconds {
            return;
        }

        if self.cfg.baseline_seconds > 0.0 {
            if let Some(pools) = self.pools.take() {
                // Short streams can reach here with empty pools; keep the
                // neutral stats in that case.
                if pools.ptp.iter().any(|v| !v.is_empty()) {
                    for ch in 0..self.channel_names.len() {
                        let (ptp_median, ptp_scale) = robust_location_scale(&pools.ptp[ch]);
                        let (rms_median, rms_scale) = robust_location_scale(&pools.rms[ch]);
                        let (kurtosis_median, kurtosis_scale) =
                            robust_location_scale(&pools.kurtosis[ch]);
                        self.baseline_stats[ch] = ChannelBaselineStats {
                            ptp_median,
                            ptp_scale,
                            rms_median,
                            rms_scale,
                            kurtosis_median,
                            kurtosis_scale,
                        };
                    }
                }
            }
        } else {
            self.pools = None;
        }

        self.baseline_ready = true;
        log::debug!("artifact gate baseline ready at t = {t_end_sec:.3} s");
    }
}
