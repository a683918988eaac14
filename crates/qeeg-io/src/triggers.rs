//! Trigger-channel event extraction
//!
//! Many exports store stimulus codes in a numeric channel (TRIG, STATUS,
//! STI 014, ...) instead of annotation records. This module finds such a
//! channel and converts its constant-code runs into annotation events, so
//! downstream epoching works regardless of how the recording was exported.
//!
//! Auto-detection ranks every trigger-like channel by how "code-like" its
//! samples look (integer-valued, sparse, few unique codes) and falls back
//! to a conservative scan of aux/misc channels when no name hint matches.

use std::collections::HashSet;

use qeeg_core::{normalize_channel_name, AnnotationEvent, QeegError, QeegResult, Recording, Sample};

/// Sample cap for candidate statistics; longer channels are strided.
const STATS_MAX_SAMPLES: usize = 20_000;

/// Bounded memory for the per-code debounce history.
const DEBOUNCE_HISTORY: usize = 32;

/// Trigger extraction options.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TriggerConfig {
    /// Force a specific channel (matched after normalization). Empty picks
    /// the best trigger-like channel automatically.
    pub channel_name: String,

    /// Bitmask applied to the rounded integer code before edge detection.
    /// 0 means no mask.
    pub mask: u32,

    /// When no mask is set, channels whose name looks like "status" default
    /// to the lower 16 bits (BioSemi Status words).
    pub auto_status_mask_16bit: bool,

    /// Integer codes with absolute value at or below this count as 0.
    pub zero_epsilon: f64,

    /// Only non-zero codes produce events.
    pub ignore_zero: bool,

    /// Suppress repeated events with the same code within this window.
    /// 0 disables.
    pub min_event_interval_sec: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            channel_name: String::new(),
            mask: 0,
            auto_status_mask_16bit: true,
            zero_epsilon: 1e-6,
            ignore_zero: true,
            min_event_interval_sec: 0.0,
        }
    }
}

/// Extraction result: the channel used (if any) and the decoded events.
#[derive(Debug, Clone, Default)]
pub struct TriggerExtraction {
    pub used_channel: Option<String>,
    pub events: Vec<AnnotationEvent>,
}

/// `name_key` is normalized (lowercase, alnum-only) channel-name output.
fn is_trigger_like_name(name_key: &str) -> bool {
    if name_key.is_empty() {
        return false;
    }
    const PREFIXES: [&str; 10] = [
        "trigger", "trig", "stim", "sti", "marker", "event", "status", "din", "digital", "stimulus",
    ];
    PREFIXES.iter().any(|p| name_key.starts_with(p))
}

fn is_status_like_name(name_key: &str) -> bool {
    name_key.starts_with("status")
}

fn default_mask_for_channel(name_key: &str, cfg: &TriggerConfig) -> u32 {
    if cfg.mask != 0 {
        return cfg.mask;
    }
    if cfg.auto_status_mask_16bit && is_status_like_name(name_key) {
        // Many BDF recordings (e.g. BioSemi) carry trigger codes in the
        // lower 16 bits of a 24-bit Status word.
        return 0xFFFF;
    }
    0
}

#[inline]
fn decode_code(v: f64, mask: u32, zero_epsilon: f64) -> i64 {
    if !v.is_finite() {
        return 0;
    }
    let mut code = v.round() as i64;
    if mask != 0 {
        code &= mask as i64;
    }
    if (code as f64).abs() <= zero_epsilon {
        return 0;
    }
    code
}

/// How "code-like" a channel's samples look.
#[derive(Debug, Clone, Copy, Default)]
struct DiscreteStats {
    near_integer_frac: f64,
    nonzero_frac: f64,
    unique_count: usize,
    min_code: i64,
    max_code: i64,
}

fn compute_discrete_stats(
    x: &[Sample],
    mask: u32,
    zero_epsilon: f64,
    max_samples: usize,
) -> DiscreteStats {
    let mut s = DiscreteStats::default();
    if x.is_empty() {
        return s;
    }

    let step = (x.len() / max_samples.max(1)).max(1);

    let mut n_finite = 0usize;
    let mut n_near_int = 0usize;
    let mut n_nonzero = 0usize;
    let mut unique: HashSet<i64> = HashSet::new();
    let mut min_code = i64::MAX;
    let mut max_code = i64::MIN;

    for &fv in x.iter().step_by(step) {
        let v = fv as f64;
        if !v.is_finite() {
            continue;
        }
        n_finite += 1;

        let r = v.round();
        // Integer-valued channels are exactly representable for common
        // 16-bit and 24-bit ranges.
        if (v - r).abs() <= 1e-3 {
            n_near_int += 1;
        }

        let mut code = r as i64;
        if mask != 0 {
            code &= mask as i64;
        }
        if (code as f64).abs() > zero_epsilon {
            n_nonzero += 1;
        }

        min_code = min_code.min(code);
        max_code = max_code.max(code);
        if unique.len() <= 2048 {
            unique.insert(code);
        }
    }

    if n_finite == 0 {
        return s;
    }

    s.near_integer_frac = n_near_int as f64 / n_finite as f64;
    s.nonzero_frac = n_nonzero as f64 / n_finite as f64;
    s.unique_count = unique.len();
    if min_code == i64::MAX {
        min_code = 0;
        max_code = 0;
    }
    s.min_code = min_code;
    s.max_code = max_code;
    s
}

/// Higher is better: integer-like values, sparse non-zero codes, few
/// unique codes, non-trivial range.
fn score_trigger_candidate(s: &DiscreteStats) -> f64 {
    let range = (s.max_code - s.min_code) as f64;
    if range <= 0.0 {
        return 0.0;
    }
    if s.near_integer_frac < 0.98 {
        return 0.0;
    }
    if s.unique_count > 1024 || s.unique_count < 2 {
        return 0.0;
    }

    let sparsity = 1.0 - s.nonzero_frac.min(1.0);
    let unique_penalty = (s.unique_count as f64 + 2.0).ln();
    s.near_integer_frac * sparsity * (range + 1.0).ln() / unique_penalty
}

/// Convert constant-code runs into events.
///
/// The segment that starts at sample 0 never produces an event: only
/// transitions count, not the initial state of the channel.
fn extract_segments(
    x: &[Sample],
    fs_hz: f64,
    mask: u32,
    cfg: &TriggerConfig,
) -> Vec<AnnotationEvent> {
    let mut out = Vec::new();
    if x.is_empty() || fs_hz <= 0.0 {
        return out;
    }

    // Per-code debounce over a bounded history.
    let mut recent: Vec<(i64, f64)> = Vec::new();
    let seen_recent = |recent: &[(i64, f64)], code: i64, t: f64| {
        cfg.min_event_interval_sec > 0.0
            && recent
                .iter()
                .any(|&(c, rt)| c == code && t - rt < cfg.min_event_interval_sec)
    };
    let push_recent = |recent: &mut Vec<(i64, f64)>, code: i64, t: f64| {
        if cfg.min_event_interval_sec <= 0.0 {
            return;
        }
        if recent.len() < DEBOUNCE_HISTORY {
            recent.push((code, t));
            return;
        }
        // Replace the oldest entry.
        let mut oldest = 0;
        for i in 1..recent.len() {
            if recent[i].1 < recent[oldest].1 {
                oldest = i;
            }
        }
        recent[oldest] = (code, t);
    };

    let push_segment_event =
        |recent: &mut Vec<(i64, f64)>, code: i64, start: usize, end: usize, out: &mut Vec<AnnotationEvent>| {
            if start == 0 {
                return; // only emit on transitions (not initial state)
            }
            if cfg.ignore_zero && code == 0 {
                return;
            }
            if end <= start {
                return;
            }

            let t = start as f64 / fs_hz;
            if seen_recent(recent, code, t) {
                return;
            }
            push_recent(recent, code, t);

            out.push(AnnotationEvent {
                onset_sec: t,
                duration_sec: (end - start) as f64 / fs_hz,
                label: code.to_string(),
            });
        };

    let mut prev = decode_code(x[0] as f64, mask, cfg.zero_epsilon);
    let mut seg_start = 0usize;

    for (i, &fv) in x.iter().enumerate().skip(1) {
        let cur = decode_code(fv as f64, mask, cfg.zero_epsilon);
        if cur == prev {
            continue;
        }
        // Close the previous segment [seg_start, i).
        push_segment_event(&mut recent, prev, seg_start, i, &mut out);
        prev = cur;
        seg_start = i;
    }
    push_segment_event(&mut recent, prev, seg_start, x.len(), &mut out);

    out
}

/// Best-scoring trigger candidate: (index, mask), or None.
fn pick_trigger_channel(rec: &Recording, cfg: &TriggerConfig) -> Option<(usize, u32)> {
    let mut best_score = 0.0f64;
    let mut best: Option<(usize, u32)> = None;

    for (i, name) in rec.channel_names.iter().enumerate() {
        let key = normalize_channel_name(name);
        if !is_trigger_like_name(&key) {
            continue;
        }
        let mask = default_mask_for_channel(&key, cfg);
        let stats = compute_discrete_stats(&rec.data[i], mask, cfg.zero_epsilon, STATS_MAX_SAMPLES);
        let score = score_trigger_candidate(&stats);
        if score > best_score {
            best_score = score;
            best = Some((i, mask));
        }
    }

    // No trigger-like name qualified: conservative fallback over channels
    // whose names strongly suggest non-EEG (aux/misc), so discrete sparse
    // channels are still found.
    if best.is_none() {
        for (i, name) in rec.channel_names.iter().enumerate() {
            let key = normalize_channel_name(name);
            if key.is_empty() {
                continue;
            }
            if !(key.starts_with("aux") || key.starts_with("misc")) {
                continue;
            }
            let stats = compute_discrete_stats(&rec.data[i], 0, cfg.zero_epsilon, STATS_MAX_SAMPLES);
            let score = score_trigger_candidate(&stats);
            if score > best_score {
                best_score = score;
                best = Some((i, default_mask_for_channel(&key, cfg)));
            }
        }
    }

    if best_score <= 0.0 {
        return None;
    }
    best
}

/// Extract events from a trigger channel.
///
/// With a non-empty `channel_name`, that channel is used (error when it
/// does not exist). Otherwise the best-scoring trigger-like channel is
/// chosen; an empty result means no channel qualified.
pub fn extract_trigger_events(rec: &Recording, cfg: &TriggerConfig) -> QeegResult<TriggerExtraction> {
    let (idx, mask) = if cfg.channel_name.is_empty() {
        match pick_trigger_channel(rec, cfg) {
            Some(found) => found,
            None => return Ok(TriggerExtraction::default()),
        }
    } else {
        let idx = rec.channel_index(&cfg.channel_name).ok_or_else(|| {
            QeegError::InvalidConfig(format!(
                "trigger channel \"{}\" not found",
                cfg.channel_name
            ))
        })?;
        let key = normalize_channel_name(&rec.channel_names[idx]);
        (idx, default_mask_for_channel(&key, cfg))
    };

    Ok(TriggerExtraction {
        used_channel: Some(rec.channel_names[idx].clone()),
        events: extract_segments(&rec.data[idx], rec.fs_hz, mask, cfg),
    })
}

/// Auto-detect a trigger-like channel and extract its events. An empty
/// result means no suitable channel exists.
pub fn extract_trigger_events_auto(rec: &Recording, cfg: &TriggerConfig) -> TriggerExtraction {
    let mut cfg = cfg.clone();
    cfg.channel_name.clear();
    extract_trigger_events(rec, &cfg).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qeeg_core::resample_hold;

    fn trigger_recording(fs: f64, trig: Vec<f32>) -> Recording {
        let eeg = vec![0.0f32; trig.len()];
        Recording::new(fs, vec!["Cz".into(), "TRIG".into()], vec![eeg, trig]).unwrap()
    }

    #[test]
    fn test_single_pulse_onset_and_duration() {
        // 10 Hz trigger [0,0,7,7,7,0,...] resampled to 100 Hz via
        // sample-and-hold: one event at 0.20 s lasting 0.30 s.
        let coarse = vec![0.0, 0.0, 7.0, 7.0, 7.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let fine = resample_hold(&coarse, 100);
        let rec = trigger_recording(100.0, fine);

        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.used_channel.as_deref(), Some("TRIG"));
        assert_eq!(out.events.len(), 1);
        let ev = &out.events[0];
        assert!((ev.onset_sec - 0.20).abs() < 1e-9);
        assert!((ev.duration_sec - 0.30).abs() < 1e-9);
        assert_eq!(ev.label, "7");
    }

    #[test]
    fn test_initial_state_emits_no_event() {
        // Channel already high at sample 0: the initial segment is state,
        // not a transition, and produces nothing.
        let trig = vec![5.0, 5.0, 5.0, 0.0, 0.0, 7.0, 7.0, 0.0];
        let rec = trigger_recording(10.0, trig);
        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].label, "7");
        assert!((out.events[0].onset_sec - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_code_change_without_zero_gap() {
        let trig = vec![0.0, 1.0, 1.0, 2.0, 2.0, 0.0];
        let rec = trigger_recording(10.0, trig);
        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].label, "1");
        assert!((out.events[0].duration_sec - 0.2).abs() < 1e-9);
        assert_eq!(out.events[1].label, "2");
    }

    #[test]
    fn test_status_channel_masking() {
        // Status word with junk in the high bits; the auto mask keeps the
        // low 16.
        let high = (1u32 << 17) as f32;
        let trig = vec![high, high, high + 9.0, high + 9.0, high, high];
        let mut rec = trigger_recording(10.0, trig);
        rec.channel_names[1] = "Status".into();

        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].label, "9");
    }

    #[test]
    fn test_scoring_prefers_code_like_channel() {
        // Two trigger-like names: one flat (score 0), one carrying codes.
        let flat = vec![0.0f32; 40];
        let mut codes = vec![0.0f32; 40];
        for v in &mut codes[10..14] {
            *v = 3.0;
        }
        let rec = Recording::new(
            10.0,
            vec!["TRIG1".into(), "STI 014".into()],
            vec![flat, codes],
        )
        .unwrap();

        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.used_channel.as_deref(), Some("STI 014"));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].label, "3");
    }

    #[test]
    fn test_aux_fallback_scan() {
        // No trigger-like name, but an AUX channel carries discrete codes.
        let eeg: Vec<f32> = (0..200).map(|i| (i as f32 * 0.13).sin()).collect();
        let mut aux = vec![0.0f32; 200];
        for v in &mut aux[50..60] {
            *v = 4.0;
        }
        let rec = Recording::new(100.0, vec!["Cz".into(), "AUX1".into()], vec![eeg, aux]).unwrap();

        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert_eq!(out.used_channel.as_deref(), Some("AUX1"));
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].label, "4");
        assert!((out.events[0].onset_sec - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_debounce_suppresses_repeats() {
        let trig = vec![0.0, 3.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0];
        let rec = trigger_recording(10.0, trig);
        let cfg = TriggerConfig {
            min_event_interval_sec: 0.5,
            ..Default::default()
        };
        let out = extract_trigger_events_auto(&rec, &cfg);
        // The second pulse at 0.3 s is within 0.5 s of the first; the third
        // at 1.0 s is not.
        assert_eq!(out.events.len(), 2);
        assert!((out.events[0].onset_sec - 0.1).abs() < 1e-9);
        assert!((out.events[1].onset_sec - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_channel_not_found() {
        let rec = trigger_recording(10.0, vec![0.0; 5]);
        let cfg = TriggerConfig {
            channel_name: "STI 014".into(),
            ..Default::default()
        };
        assert!(extract_trigger_events(&rec, &cfg).is_err());
    }

    #[test]
    fn test_explicit_channel_skips_scoring() {
        // A flat explicit channel is honored even though it would never
        // win auto-selection.
        let rec = trigger_recording(10.0, vec![0.0; 20]);
        let cfg = TriggerConfig {
            channel_name: "TRIG".into(),
            ..Default::default()
        };
        let out = extract_trigger_events(&rec, &cfg).unwrap();
        assert_eq!(out.used_channel.as_deref(), Some("TRIG"));
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_no_trigger_channel_is_empty_result() {
        let rec = Recording::new(
            10.0,
            vec!["Cz".into(), "Pz".into()],
            vec![vec![0.0; 5], vec![0.0; 5]],
        )
        .unwrap();
        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert!(out.used_channel.is_none());
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_continuous_channel_scores_zero() {
        // A trigger-like name with continuous (non-integer) samples must
        // not be selected.
        let wave: Vec<f32> = (0..500).map(|i| (i as f32 * 0.037).sin() * 3.7).collect();
        let rec = Recording::new(100.0, vec!["Trigger".into()], vec![wave]).unwrap();
        let out = extract_trigger_events_auto(&rec, &TriggerConfig::default());
        assert!(out.used_channel.is_none());
        assert!(out.events.is_empty());
    }
}
