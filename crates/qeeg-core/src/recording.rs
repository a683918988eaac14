//! In-memory EEG recordings
//!
//! A [`Recording`] is the dense matrix every analysis in this workspace
//! operates on: N channels of equal-length sample arrays at one sampling
//! rate, with optional annotation events. Readers (CSV, trigger extraction)
//! produce it; analysis code treats it as immutable except for the explicit
//! in-place bad-channel interpolation in `qeeg-map`.

use crate::channels::normalize_channel_name;
use crate::error::{QeegError, QeegResult};
use crate::Sample;

/// A single annotation event (EDF+-style onset/duration/label).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotationEvent {
    /// Onset in seconds from the start of the recording.
    pub onset_sec: f64,
    /// Duration in seconds (>= 0).
    pub duration_sec: f64,
    /// Event label (trigger code, stimulus name, ...).
    pub label: String,
}

/// Multi-channel EEG recording at a single sampling rate.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// Sampling frequency in Hz (> 0).
    pub fs_hz: f64,
    /// One name per channel.
    pub channel_names: Vec<String>,
    /// data[ch][i] is sample i of channel ch; all channels have equal length.
    pub data: Vec<Vec<Sample>>,
    /// Optional annotation events.
    pub events: Vec<AnnotationEvent>,
}

impl Recording {
    /// Create a recording, validating the shape invariants.
    pub fn new(fs_hz: f64, channel_names: Vec<String>, data: Vec<Vec<Sample>>) -> QeegResult<Self> {
        let rec = Self {
            fs_hz,
            channel_names,
            data,
            events: Vec::new(),
        };
        rec.validate()?;
        Ok(rec)
    }

    /// Number of channels.
    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    /// Number of samples per channel (0 for an empty recording).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    /// Recording duration in seconds.
    #[inline]
    pub fn duration_sec(&self) -> f64 {
        if self.fs_hz > 0.0 {
            self.n_samples() as f64 / self.fs_hz
        } else {
            0.0
        }
    }

    /// Find a channel by name (compared after normalization).
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        let want = normalize_channel_name(name);
        self.channel_names
            .iter()
            .position(|n| normalize_channel_name(n) == want)
    }

    /// Check the shape invariants: positive sampling rate, name/data
    /// agreement, equal channel lengths, non-negative event durations.
    pub fn validate(&self) -> QeegResult<()> {
        if !(self.fs_hz > 0.0) {
            return Err(QeegError::InvalidConfig(format!(
                "sampling rate must be > 0 (got {})",
                self.fs_hz
            )));
        }
        if self.channel_names.len() != self.data.len() {
            return Err(QeegError::Structural(format!(
                "{} channel names for {} data channels",
                self.channel_names.len(),
                self.data.len()
            )));
        }
        let n = self.n_samples();
        for (ch, samples) in self.data.iter().enumerate() {
            if samples.len() != n {
                return Err(QeegError::Structural(format!(
                    "channel {} has {} samples, expected {}",
                    ch,
                    samples.len(),
                    n
                )));
            }
        }
        for ev in &self.events {
            if ev.duration_sec < 0.0 {
                return Err(QeegError::InvalidConfig(format!(
                    "event \"{}\" has negative duration {}",
                    ev.label, ev.duration_sec
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_channel() -> Recording {
        Recording::new(
            100.0,
            vec!["Fp1".into(), "T3".into()],
            vec![vec![0.0; 200], vec![0.0; 200]],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_accessors() {
        let rec = two_channel();
        assert_eq!(rec.n_channels(), 2);
        assert_eq!(rec.n_samples(), 200);
        assert!((rec.duration_sec() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_channel_index_normalized() {
        let rec = two_channel();
        assert_eq!(rec.channel_index("EEG Fp1-REF"), Some(0));
        // T3 is stored; the modern alias T7 must find it.
        assert_eq!(rec.channel_index("T7"), Some(1));
        assert_eq!(rec.channel_index("Oz"), None);
    }

    #[test]
    fn test_unequal_lengths_rejected() {
        let res = Recording::new(
            100.0,
            vec!["a".into(), "b".into()],
            vec![vec![0.0; 10], vec![0.0; 11]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_bad_fs_rejected() {
        let res = Recording::new(0.0, vec!["a".into()], vec![vec![0.0; 10]]);
        assert!(res.is_err());
    }
}
