//! DSP integration tests
//!
//! Tests complete signal flow through the analysis engines:
//! - online bandpower frames from streaming pushes
//! - artifact gating against injected bursts
//! - spectral features on Welch PSDs
//! - reward shaping driven by frame cadence

use qeeg_core::{default_eeg_bands, Recording, RewardShaper};
use qeeg_dsp::artifacts::{detect_artifacts, merge_bad_segments, ArtifactConfig};
use qeeg_dsp::online::{
    OnlineArtifactConfig, OnlineArtifactGate, OnlineBandpower, OnlineBandpowerConfig,
};
use qeeg_dsp::welch::{welch_psd, WelchConfig};
use qeeg_dsp::{spectral_edge_frequency, spectral_entropy};

const FS: f64 = 250.0;

/// Generate a test sine wave at `freq` Hz.
fn generate_sine(samples: usize, freq: f64) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / FS;
            (2.0 * std::f64::consts::PI * freq * t).sin() as f32
        })
        .collect()
}

/// Sine with a small deterministic amplitude wobble (keeps window features
/// spread without randomness).
fn generate_wobbly_sine(samples: usize, freq: f64, phase: f64) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / FS;
            let envelope = 1.0 + 0.05 * (2.0 * std::f64::consts::PI * 0.4 * t).sin();
            (envelope * (2.0 * std::f64::consts::PI * freq * t + phase).sin()) as f32
        })
        .collect()
}

#[test]
fn test_sinusoid_dominates_alpha_band() {
    // 4 s of sin(2*pi*10*t) at fs = 250, nperseg = 256: the online frame
    // must put more power in alpha than in theta, beta or gamma.
    let x = generate_sine(1000, 10.0);
    let mut engine = OnlineBandpower::new(
        vec!["oz".into()],
        FS,
        default_eeg_bands(),
        OnlineBandpowerConfig {
            window_seconds: 2.0,
            update_seconds: 0.5,
            welch: WelchConfig { nperseg: 256, overlap: 0.5 },
            ..Default::default()
        },
    )
    .unwrap();

    let frames = engine.push_block(&[&x]).unwrap();
    assert!(!frames.is_empty());

    let frame = frames.last().unwrap();
    let power = |band: &str| {
        let b = frame.bands.iter().position(|bd| bd.name == band).unwrap();
        frame.powers[b][0]
    };
    assert!(power("alpha") > power("theta"));
    assert!(power("alpha") > power("beta"));
    assert!(power("alpha") > power("gamma"));
}

#[test]
fn test_online_frames_match_any_chunking() {
    let ch0 = generate_wobbly_sine(2000, 10.0, 0.0);
    let ch1 = generate_wobbly_sine(2000, 7.0, 1.3);

    let run = |chunks: &[usize]| {
        let mut engine = OnlineBandpower::new(
            vec!["o1".into(), "o2".into()],
            FS,
            default_eeg_bands(),
            OnlineBandpowerConfig {
                window_seconds: 2.0,
                update_seconds: 0.25,
                welch: WelchConfig { nperseg: 256, overlap: 0.5 },
                relative_power: true,
                log10_power: true,
                ..Default::default()
            },
        )
        .unwrap();
        let mut frames = Vec::new();
        let mut pos = 0;
        for &len in chunks {
            frames.extend(engine.push_block(&[&ch0[pos..pos + len], &ch1[pos..pos + len]]).unwrap());
            pos += len;
        }
        assert_eq!(pos, 2000);
        frames
    };

    let whole = run(&[2000]);
    let ragged = run(&[3, 511, 1, 1, 640, 844]);

    assert!(!whole.is_empty());
    assert_eq!(whole.len(), ragged.len());
    for (a, b) in whole.iter().zip(&ragged) {
        assert_eq!(a.t_end_sec.to_bits(), b.t_end_sec.to_bits());
        for (ra, rb) in a.powers.iter().zip(&b.powers) {
            for (va, vb) in ra.iter().zip(rb) {
                assert_eq!(va.to_bits(), vb.to_bits(), "frames differ between chunkings");
            }
        }
    }
}

#[test]
fn test_baseline_vs_spike_detection() {
    // 10 s, 2 channels, 10 Hz sine with deterministic wobble; +100 burst on
    // channel 0 for 10 samples starting at t = 5 s.
    let n = (10.0 * FS) as usize;
    let mut ch0 = generate_wobbly_sine(n, 10.0, 0.0);
    let ch1 = generate_wobbly_sine(n, 10.0, 0.4);
    let spike_start = (5.0 * FS) as usize;
    for v in &mut ch0[spike_start..spike_start + 10] {
        *v += 100.0;
    }
    let rec = Recording::new(FS, vec!["fp1".into(), "fp2".into()], vec![ch0, ch1]).unwrap();

    let cfg = ArtifactConfig {
        window_seconds: 1.0,
        step_seconds: 0.5,
        baseline_seconds: 2.0,
        ptp_z: 6.0,
        rms_z: 6.0,
        kurtosis_z: 6.0,
        min_bad_channels: 1,
    };
    let detection = detect_artifacts(&rec, &cfg).unwrap();
    assert!(detection.total_bad_windows > 0);

    let segments = merge_bad_segments(&detection, 0.0);
    assert!(!segments.is_empty());
    let first = &segments[0];
    assert!(first.t_start_sec <= 5.0 && 5.0 <= first.t_end_sec);
    assert!(first.bad_windows_per_channel[0] >= first.bad_windows_per_channel[1]);
}

#[test]
fn test_artifact_gate_vetoes_reward_frames() {
    // Bandpower engine and artifact gate in lockstep; the reward shaper is
    // frozen on bad frames.
    let n = (20.0 * FS) as usize;
    let mut signal = generate_wobbly_sine(n, 10.0, 0.0);
    let burst_start = (15.0 * FS) as usize;
    for v in &mut signal[burst_start..burst_start + 25] {
        *v += 80.0;
    }

    let mut bandpower = OnlineBandpower::new(
        vec!["oz".into()],
        FS,
        default_eeg_bands(),
        OnlineBandpowerConfig {
            window_seconds: 2.0,
            update_seconds: 0.25,
            welch: WelchConfig { nperseg: 256, overlap: 0.5 },
            relative_power: true,
            ..Default::default()
        },
    )
    .unwrap();
    let mut gate = OnlineArtifactGate::new(
        vec!["oz".into()],
        FS,
        OnlineArtifactConfig {
            window_seconds: 2.0,
            update_seconds: 0.25,
            baseline_seconds: 10.0,
            ..Default::default()
        },
    )
    .unwrap();
    let mut shaper = RewardShaper::new(0.0, 0.0);

    let bp_frames = bandpower.push_block(&[&signal]).unwrap();
    let gate_frames = gate.push_block(&[&signal]).unwrap();
    assert_eq!(bp_frames.len(), gate_frames.len());

    let alpha_idx = bp_frames[0].bands.iter().position(|b| b.name == "alpha").unwrap();
    let mut rewarded = 0usize;
    let mut vetoed = 0usize;
    let mut last_t = 0.0f64;
    for (bp, gf) in bp_frames.iter().zip(&gate_frames) {
        assert_eq!(bp.t_end_sec.to_bits(), gf.t_end_sec.to_bits());
        let dt = bp.t_end_sec - last_t;
        last_t = bp.t_end_sec;

        let raw = bp.powers[alpha_idx][0] > 0.3;
        let out = shaper.update(raw, dt, bp.t_end_sec, gf.bad);
        if out {
            rewarded += 1;
        }
        if gf.bad {
            vetoed += 1;
            assert!(!out, "reward must be off on artifact frames");
        }
    }
    assert!(rewarded > 0, "clean alpha frames should reward");
    assert!(vetoed > 0, "burst frames should be vetoed");
}

#[test]
fn test_reward_shaper_dwell_cadence() {
    // dwell = 0.5 s at a 0.25 s frame cadence: first true is off, second on.
    let mut shaper = RewardShaper::new(0.5, 0.0);
    assert!(!shaper.update(true, 0.25, 0.25, false));
    assert!(shaper.update(true, 0.25, 0.5, false));
}

#[test]
fn test_reward_shaper_refractory_cadence() {
    let mut shaper = RewardShaper::new(0.0, 0.5);
    assert!(shaper.update(true, 0.25, 0.25, false));
    assert!(!shaper.update(false, 0.25, 0.5, false));
    assert!(!shaper.update(true, 0.25, 0.75, false));
    assert!(shaper.update(true, 0.25, 1.0, false));
}

#[test]
fn test_welch_features_on_mixed_signal() {
    // 10 Hz + weaker 40 Hz: entropy is low-ish, and SEF95 lies between them.
    let x: Vec<f32> = (0..4096)
        .map(|i| {
            let t = i as f64 / FS;
            ((2.0 * std::f64::consts::PI * 10.0 * t).sin()
                + 0.3 * (2.0 * std::f64::consts::PI * 40.0 * t).sin()) as f32
        })
        .collect();
    let psd = welch_psd(&x, FS, &WelchConfig { nperseg: 1024, overlap: 0.5 }).unwrap();

    let entropy = spectral_entropy(&psd, 1.0, 80.0, true).unwrap();
    assert!(entropy > 0.0 && entropy < 0.5, "entropy = {entropy}");

    let sef95 = spectral_edge_frequency(&psd, 1.0, 80.0, 0.95).unwrap();
    assert!(sef95 > 10.0 && sef95 < 45.0, "sef95 = {sef95}");
}
