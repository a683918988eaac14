//! Bad-channel replacement via spherical-spline weights
//!
//! Replaces flagged channels in-place with a weighted combination of the
//! good channels, using precomputed spline weights so the per-sample cost is
//! one dot product. Must not run concurrently with other uses of the
//! recording.

use std::collections::HashSet;

use qeeg_core::{QeegError, QeegResult, Recording};

use crate::geometry::project_to_unit_sphere;
use crate::montage::Montage;
use crate::spline::{spline_weights, SplineConfig};

/// What happened to each requested channel.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct InterpolateReport {
    /// Channel indices that were replaced.
    pub interpolated: Vec<usize>,
    /// Requested channels skipped because the montage has no position.
    pub skipped_no_position: Vec<usize>,
    /// Requested channels skipped because fewer than 3 good channels with
    /// positions were available.
    pub skipped_not_enough_good: Vec<usize>,
    /// Good channel indices used as interpolation sources.
    pub good_used: Vec<usize>,
}

/// Interpolate the channels in `bad_indices` in-place from the remaining
/// good channels that have montage positions.
///
/// With fewer than 3 usable good channels nothing is mutated and all
/// requested channels land in `skipped_not_enough_good`.
pub fn interpolate_bad_channels(
    rec: &mut Recording,
    montage: &Montage,
    bad_indices: &[usize],
    cfg: &SplineConfig,
) -> QeegResult<InterpolateReport> {
    if !(rec.fs_hz > 0.0) {
        return Err(QeegError::InvalidConfig("invalid sampling rate".into()));
    }
    if rec.n_channels() == 0 || rec.n_samples() == 0 {
        return Err(QeegError::InsufficientData("empty recording".into()));
    }

    let n_ch = rec.n_channels();
    let n_samp = rec.n_samples();
    let bad: HashSet<usize> = bad_indices.iter().copied().collect();

    let mut report = InterpolateReport::default();

    // Good channels with montage positions.
    let mut good_idx = Vec::new();
    let mut good_pos = Vec::new();
    for ch in 0..n_ch {
        if bad.contains(&ch) {
            continue;
        }
        let Some(p) = montage.get(&rec.channel_names[ch]) else {
            continue;
        };
        good_idx.push(ch);
        good_pos.push(project_to_unit_sphere(p));
    }
    report.good_used = good_idx.clone();

    if good_idx.len() < 3 {
        log::warn!(
            "bad-channel interpolation skipped: only {} good channels with positions",
            good_idx.len()
        );
        report.skipped_not_enough_good =
            bad_indices.iter().copied().filter(|&ch| ch < n_ch).collect();
        report.skipped_not_enough_good.sort_unstable();
        report.skipped_not_enough_good.dedup();
        return Ok(report);
    }

    for &bch in bad_indices {
        if bch >= n_ch {
            continue;
        }
        let Some(q2) = montage.get(&rec.channel_names[bch]) else {
            report.skipped_no_position.push(bch);
            continue;
        };
        let q = project_to_unit_sphere(q2);

        let weights = spline_weights(&good_pos, q, cfg)?;
        debug_assert_eq!(weights.len(), good_idx.len());

        // One weighted sum per time sample.
        let mut replacement = vec![0.0f32; n_samp];
        for (w, &gch) in weights.iter().zip(&good_idx) {
            for (out, &v) in replacement.iter_mut().zip(&rec.data[gch]) {
                *out += (w * v as f64) as f32;
            }
        }
        rec.data[bch] = replacement;
        report.interpolated.push(bch);
    }

    report.interpolated.sort_unstable();
    report.interpolated.dedup();
    report.skipped_no_position.sort_unstable();
    report.skipped_no_position.dedup();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_recording() -> Recording {
        let montage = Montage::builtin_standard_1020_19();
        let names: Vec<String> = montage.channel_names();
        let n = 200usize;
        let data: Vec<Vec<f32>> = (0..names.len())
            .map(|ch| {
                (0..n)
                    .map(|i| ((ch + 1) as f32) * (i as f32 * 0.05).sin())
                    .collect()
            })
            .collect();
        Recording::new(100.0, names, data).unwrap()
    }

    #[test]
    fn test_interpolates_constant_field_exactly() {
        // All good channels carry the constant 4.0; the interpolated
        // channel must land on it (weights sum to 1 for a constant field).
        let montage = Montage::builtin_standard_1020_19();
        let names = montage.channel_names();
        let n_ch = names.len();
        let data: Vec<Vec<f32>> = (0..n_ch).map(|_| vec![4.0; 50]).collect();
        let mut rec = Recording::new(100.0, names, data).unwrap();
        rec.data[3] = vec![999.0; 50];

        let report =
            interpolate_bad_channels(&mut rec, &montage, &[3], &SplineConfig::default()).unwrap();
        assert_eq!(report.interpolated, vec![3]);
        for &v in &rec.data[3] {
            assert!((v - 4.0).abs() < 1e-2, "v = {v}");
        }
    }

    #[test]
    fn test_report_skips_unknown_position() {
        let mut rec = test_recording();
        rec.channel_names[5] = "EXT1".into();
        let montage = Montage::builtin_standard_1020_19();
        let before = rec.data[5].clone();
        let report =
            interpolate_bad_channels(&mut rec, &montage, &[5], &SplineConfig::default()).unwrap();
        assert_eq!(report.skipped_no_position, vec![5]);
        assert!(report.interpolated.is_empty());
        assert_eq!(rec.data[5], before);
    }

    #[test]
    fn test_not_enough_good_channels_no_mutation() {
        let mut rec = test_recording();
        let montage = Montage::builtin_standard_1020_19();
        // Flag all but two channels bad.
        let bad: Vec<usize> = (0..rec.n_channels() - 2).collect();
        let before = rec.data.clone();
        let report =
            interpolate_bad_channels(&mut rec, &montage, &bad, &SplineConfig::default()).unwrap();
        assert_eq!(report.skipped_not_enough_good, bad);
        assert!(report.interpolated.is_empty());
        assert_eq!(rec.data, before);
    }

    #[test]
    fn test_good_channels_untouched() {
        let mut rec = test_recording();
        let montage = Montage::builtin_standard_1020_19();
        let good_before = rec.data[0].clone();
        interpolate_bad_channels(&mut rec, &montage, &[7], &SplineConfig::default()).unwrap();
        assert_eq!(rec.data[0], good_before);
    }
}
