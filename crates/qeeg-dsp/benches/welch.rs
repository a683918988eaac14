//! Welch PSD and band-integration benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qeeg_core::default_eeg_bands;
use qeeg_dsp::bandpower::integrate_bandpower;
use qeeg_dsp::welch::{welch_psd, WelchConfig};

fn bench_welch_psd(c: &mut Criterion) {
    let fs = 250.0;
    let signal: Vec<f32> = (0..(fs as usize * 10))
        .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin() as f32)
        .collect();
    let cfg = WelchConfig { nperseg: 1024, overlap: 0.5 };

    c.bench_function("welch_psd_10s_250hz", |b| {
        b.iter(|| welch_psd(black_box(&signal), fs, &cfg).unwrap())
    });
}

fn bench_band_integration(c: &mut Criterion) {
    let fs = 250.0;
    let signal: Vec<f32> = (0..(fs as usize * 10))
        .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin() as f32)
        .collect();
    let psd = welch_psd(&signal, fs, &WelchConfig::default()).unwrap();
    let bands = default_eeg_bands();

    c.bench_function("integrate_five_bands", |b| {
        b.iter(|| {
            bands
                .iter()
                .map(|band| integrate_bandpower(black_box(&psd), band.fmin_hz, band.fmax_hz))
                .sum::<f64>()
        })
    });
}

criterion_group!(benches, bench_welch_psd, bench_band_integration);
criterion_main!(benches);
