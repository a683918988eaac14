//! Bandpower reference accumulation
//!
//! Builds per-(channel, band) statistics across a dataset of recordings,
//! either as Welford mean/std or as a robust median/scale computed from a
//! reservoir-capped sample pool. Windowed mode drives the online bandpower
//! engine with fixed-size chunks so the reference matches the distribution
//! seen at online-inference time.

use std::collections::HashMap;

use qeeg_core::{
    normalize_channel_name, BandDefinition, QeegError, QeegResult, Recording, ReservoirSampler,
    RunningStats, robust_location_scale,
};

use crate::bandpower::{compute_bandpower_matrix, BandpowerConfig};
use crate::online::{OnlineBandpower, OnlineBandpowerConfig};
use crate::welch::WelchConfig;

/// Reference builder configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReferenceConfig {
    /// Welch PSD parameters.
    pub welch: WelchConfig,

    /// Relative power preprocessing (see `BandpowerConfig`).
    pub relative_power: bool,
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,

    /// log10 preprocessing.
    pub log10_power: bool,

    /// Robust aggregation (median + MAD scale) instead of mean/std.
    pub robust: bool,
    /// Reservoir cap per (channel, band) key in robust mode.
    pub robust_max_samples_per_key: usize,

    /// Windowed mode: when both are > 0, accumulate one value per online
    /// frame instead of one value per recording.
    pub window_seconds: f64,
    pub update_seconds: f64,
    /// Chunk size used to feed the online engine in windowed mode.
    pub chunk_seconds: f64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            welch: WelchConfig::default(),
            relative_power: false,
            relative_fmin_hz: 0.0,
            relative_fmax_hz: 0.0,
            log10_power: false,
            robust: false,
            robust_max_samples_per_key: 20_000,
            window_seconds: 0.0,
            update_seconds: 0.0,
            chunk_seconds: 0.10,
        }
    }
}

impl ReferenceConfig {
    /// Windowed mode requires both window and update to be set.
    pub fn windowed(&self) -> bool {
        self.window_seconds > 0.0 && self.update_seconds > 0.0
    }

    fn validate(&self) -> QeegResult<()> {
        if (self.window_seconds > 0.0) != (self.update_seconds > 0.0) {
            return Err(QeegError::InvalidConfig(
                "windowed reference mode needs both window_seconds and update_seconds > 0".into(),
            ));
        }
        if self.windowed() && !(self.chunk_seconds > 0.0) {
            return Err(QeegError::InvalidConfig(
                "chunk_seconds must be > 0 in windowed mode".into(),
            ));
        }
        if self.robust && self.robust_max_samples_per_key == 0 {
            return Err(QeegError::InvalidConfig(
                "robust_max_samples_per_key must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// One (channel, band) row of a finished reference.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReferenceEntry {
    /// Normalized channel name.
    pub channel: String,
    /// Lowercased band name.
    pub band: String,
    /// Mean (or median in robust mode).
    pub location: f64,
    /// Sample std (or robust scale).
    pub scale: f64,
    /// Number of accumulated values.
    pub n: usize,
}

/// Finished reference statistics plus the preprocessing metadata needed to
/// apply them safely downstream.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ReferenceStatistics {
    pub robust: bool,
    pub relative_power: bool,
    pub relative_fmin_hz: f64,
    pub relative_fmax_hz: f64,
    pub log10_power: bool,

    pub n_inputs: usize,
    pub welch_nperseg: usize,
    pub welch_overlap: f64,
    pub windowed: bool,

    /// Sorted by (channel, band).
    pub entries: Vec<ReferenceEntry>,
}

impl ReferenceStatistics {
    /// Look up a row by raw channel/band names (normalized internally).
    pub fn lookup(&self, channel: &str, band: &str) -> Option<&ReferenceEntry> {
        let channel = normalize_channel_name(channel);
        let band = band.trim().to_lowercase();
        self.entries
            .iter()
            .find(|e| e.channel == channel && e.band == band)
    }

    /// z-score a value against a row, if present.
    pub fn zscore(&self, channel: &str, band: &str, value: f64) -> Option<f64> {
        let entry = self.lookup(channel, band)?;
        if entry.scale > 0.0 {
            Some((value - entry.location) / entry.scale)
        } else {
            None
        }
    }
}

enum KeyAccumulator {
    Mean(RunningStats),
    Robust(ReservoirSampler),
}

/// Accumulates bandpower values across recordings into per-key statistics.
pub struct ReferenceBuilder {
    cfg: ReferenceConfig,
    bands: Vec<BandDefinition>,
    accumulators: HashMap<(String, String), KeyAccumulator>,
    n_inputs: usize,
}

impl ReferenceBuilder {
    pub fn new(bands: Vec<BandDefinition>, cfg: ReferenceConfig) -> QeegResult<Self> {
        if bands.is_empty() {
            return Err(QeegError::InvalidConfig("band list is empty".into()));
        }
        cfg.validate()?;
        Ok(Self {
            cfg,
            bands,
            accumulators: HashMap::new(),
            n_inputs: 0,
        })
    }

    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    fn accumulate(&mut self, channel: &str, band: &str, value: f64) {
        if !value.is_finite() {
            return;
        }
        let key = (normalize_channel_name(channel), band.trim().to_lowercase());
        let robust = self.cfg.robust;
        let cap = self.cfg.robust_max_samples_per_key;
        let acc = self.accumulators.entry(key).or_insert_with(|| {
            if robust {
                KeyAccumulator::Robust(ReservoirSampler::new(cap))
            } else {
                KeyAccumulator::Mean(RunningStats::new())
            }
        });
        match acc {
            KeyAccumulator::Mean(rs) => rs.add(value),
            KeyAccumulator::Robust(rs) => rs.add(value),
        }
    }

    /// Add one recording: either one bandpower matrix per input, or every
    /// online frame in windowed mode.
    pub fn add_recording(&mut self, rec: &Recording) -> QeegResult<()> {
        if self.cfg.windowed() {
            self.add_recording_windowed(rec)?;
        } else {
            let bp = BandpowerConfig {
                welch: self.cfg.welch.clone(),
                relative_power: self.cfg.relative_power,
                relative_fmin_hz: self.cfg.relative_fmin_hz,
                relative_fmax_hz: self.cfg.relative_fmax_hz,
                log10_power: self.cfg.log10_power,
            };
            let matrix = compute_bandpower_matrix(rec, &self.bands, &bp)?;
            for (b, band) in matrix.bands.iter().enumerate() {
                for (c, channel) in matrix.channel_names.iter().enumerate() {
                    self.accumulate(channel, &band.name, matrix.powers[b][c]);
                }
            }
        }
        self.n_inputs += 1;
        log::info!(
            "reference: accumulated {} ({} channels, {} samples)",
            self.n_inputs,
            rec.n_channels(),
            rec.n_samples()
        );
        Ok(())
    }

    fn add_recording_windowed(&mut self, rec: &Recording) -> QeegResult<()> {
        let cfg = OnlineBandpowerConfig {
            window_seconds: self.cfg.window_seconds,
            update_seconds: self.cfg.update_seconds,
            welch: self.cfg.welch.clone(),
            relative_power: self.cfg.relative_power,
            relative_fmin_hz: self.cfg.relative_fmin_hz,
            relative_fmax_hz: self.cfg.relative_fmax_hz,
            log10_power: self.cfg.log10_power,
        };
        let mut engine = OnlineBandpower::new(
            rec.channel_names.clone(),
            rec.fs_hz,
            self.bands.clone(),
            cfg,
        )?;

        let chunk = ((self.cfg.chunk_seconds * rec.fs_hz).round() as usize).max(1);
        let n = rec.n_samples();
        let mut pos = 0usize;
        while pos < n {
            let end = (pos + chunk).min(n);
            let block: Vec<&[qeeg_core::Sample]> =
                rec.data.iter().map(|ch| &ch[pos..end]).collect();
            for frame in engine.push_block(&block)? {
                for (b, band) in frame.bands.iter().enumerate() {
                    for (c, channel) in frame.channel_names.iter().enumerate() {
                        self.accumulate(channel, &band.name, frame.powers[b][c]);
                    }
                }
            }
            pos = end;
        }
        Ok(())
    }

    /// Finalize into sorted reference statistics. Keys with fewer than two
    /// values or a degenerate scale are dropped.
    pub fn finish(&self) -> ReferenceStatistics {
        let mut entries = Vec::with_capacity(self.accumulators.len());
        for ((channel, band), acc) in &self.accumulators {
            let (location, scale, n) = match acc {
                KeyAccumulator::Mean(rs) => (rs.mean(), rs.stddev_sample(), rs.n()),
                KeyAccumulator::Robust(rs) => {
                    let (med, scale) = robust_location_scale(rs.values());
                    (med, scale, rs.len())
                }
            };
            if n < 2 || !location.is_finite() || !scale.is_finite() || !(scale > 0.0) {
                continue;
            }
            entries.push(ReferenceEntry {
                channel: channel.clone(),
                band: band.clone(),
                location,
                scale,
                n,
            });
        }
        entries.sort_by(|a, b| (a.channel.as_str(), a.band.as_str()).cmp(&(b.channel.as_str(), b.band.as_str())));

        ReferenceStatistics {
            robust: self.cfg.robust,
            relative_power: self.cfg.relative_power,
            relative_fmin_hz: self.cfg.relative_fmin_hz,
            relative_fmax_hz: self.cfg.relative_fmax_hz,
            log10_power: self.cfg.log10_power,
            n_inputs: self.n_inputs,
            welch_nperseg: self.cfg.welch.nperseg,
            welch_overlap: self.cfg.welch.overlap,
            windowed: self.cfg.windowed(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qeeg_core::default_eeg_bands;

    fn recording(fs: f64, seconds: f64, freq: f64, gain: f64) -> Recording {
        let n = (fs * seconds) as usize;
        let x: Vec<f32> = (0..n)
            .map(|i| (gain * (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin()) as f32)
            .collect();
        Recording::new(fs, vec!["o1".into()], vec![x]).unwrap()
    }

    #[test]
    fn test_mean_reference_across_inputs() {
        let cfg = ReferenceConfig {
            welch: WelchConfig { nperseg: 256, overlap: 0.5 },
            ..Default::default()
        };
        let mut builder = ReferenceBuilder::new(default_eeg_bands(), cfg).unwrap();
        for gain in [0.8, 1.0, 1.2, 0.9, 1.1] {
            builder.add_recording(&recording(250.0, 8.0, 10.0, gain)).unwrap();
        }
        let stats = builder.finish();
        assert_eq!(stats.n_inputs, 5);
        assert!(!stats.robust);

        let alpha = stats.lookup("O1", "alpha").unwrap();
        assert_eq!(alpha.n, 5);
        assert!(alpha.location > 0.0);
        assert!(alpha.scale > 0.0);
        // Normalized lookup must match too.
        assert!(stats.lookup("EEG O1-REF", "Alpha").is_some());
    }

    #[test]
    fn test_zscore_direction() {
        let cfg = ReferenceConfig {
            welch: WelchConfig { nperseg: 256, overlap: 0.5 },
            ..Default::default()
        };
        let mut builder = ReferenceBuilder::new(default_eeg_bands(), cfg).unwrap();
        for gain in [0.9, 1.0, 1.1] {
            builder.add_recording(&recording(250.0, 8.0, 10.0, gain)).unwrap();
        }
        let stats = builder.finish();
        let entry = stats.lookup("o1", "alpha").unwrap();
        let high = stats.zscore("o1", "alpha", entry.location + 2.0 * entry.scale).unwrap();
        assert!((high - 2.0).abs() < 1e-9);
        assert!(stats.zscore("o1", "nosuchband", 0.0).is_none());
    }

    #[test]
    fn test_robust_reference() {
        let cfg = ReferenceConfig {
            welch: WelchConfig { nperseg: 256, overlap: 0.5 },
            robust: true,
            robust_max_samples_per_key: 100,
            window_seconds: 2.0,
            update_seconds: 0.5,
            chunk_seconds: 0.1,
            ..Default::default()
        };
        let mut builder = ReferenceBuilder::new(default_eeg_bands(), cfg).unwrap();
        builder.add_recording(&recording(250.0, 20.0, 10.0, 1.0)).unwrap();
        let stats = builder.finish();
        assert!(stats.robust);
        assert!(stats.windowed);

        let alpha = stats.lookup("o1", "alpha").unwrap();
        // 20 s at 0.5 s updates: 4 backlog frames when the ring fills at
        // 2 s, one at 2.5 s, then every 0.5 s to 20 s. All kept (below the
        // reservoir cap).
        assert_eq!(alpha.n, 40);
        assert!(alpha.location > 0.0);
    }

    #[test]
    fn test_windowed_mode_validation() {
        let cfg = ReferenceConfig {
            window_seconds: 2.0,
            update_seconds: 0.0,
            ..Default::default()
        };
        assert!(ReferenceBuilder::new(default_eeg_bands(), cfg).is_err());
    }
}
