//! Robust statistics and streaming accumulators
//!
//! Shared by the artifact detectors, the reference builder and the IAF
//! estimator:
//! - median / MAD-derived robust scale with a std-deviation fallback
//! - Welford running mean/variance
//! - bounded-memory reservoir sampling (Algorithm R)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 1 / Phi^-1(0.75): makes the MAD consistent with the standard deviation
/// under Gaussian data.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Median via selection, averaging with the lower middle for even sizes.
/// Reorders the slice. Returns 0.0 for an empty slice.
pub fn median_inplace(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    values.select_nth_unstable_by(mid, |a, b| {
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    });
    let upper = values[mid];
    if values.len() % 2 == 0 {
        let lower = values[..mid].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (upper + lower)
    } else {
        upper
    }
}

/// Robust scale estimate: 1.4826 * MAD around `median`, falling back to the
/// sample standard deviation when the MAD is ~0 (constant-ish data), then to
/// 1.0. Never returns a value <= 0.
pub fn robust_scale(values: &[f64], median: f64) -> f64 {
    if values.is_empty() {
        return 1.0;
    }

    let mut absdev: Vec<f64> = values.iter().map(|x| (x - median).abs()).collect();
    let mad = median_inplace(&mut absdev);
    let mut scale = mad * MAD_TO_SIGMA;

    if !(scale > 1e-12) && values.len() >= 2 {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let acc: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
        let var = acc / (values.len() - 1) as f64;
        scale = var.max(0.0).sqrt();
    }

    if !(scale > 1e-12) {
        scale = 1.0;
    }
    scale
}

/// Convenience: median and robust scale of a sample set in one call.
pub fn robust_location_scale(values: &[f64]) -> (f64, f64) {
    let mut tmp = values.to_vec();
    let med = median_inplace(&mut tmp);
    (med, robust_scale(values, med))
}

/// Numerically-stable running mean/variance accumulator (Welford).
///
/// `add` ignores non-finite values; sample variance uses (n-1) and is NaN
/// below two samples.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    n: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn add(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    pub fn variance_population(&self) -> f64 {
        if self.n < 1 {
            f64::NAN
        } else {
            self.m2 / self.n as f64
        }
    }

    pub fn variance_sample(&self) -> f64 {
        if self.n < 2 {
            f64::NAN
        } else {
            self.m2 / (self.n - 1) as f64
        }
    }

    pub fn stddev_population(&self) -> f64 {
        let v = self.variance_population();
        if v.is_finite() {
            v.sqrt()
        } else {
            v
        }
    }

    pub fn stddev_sample(&self) -> f64 {
        let v = self.variance_sample();
        if v.is_finite() {
            v.sqrt()
        } else {
            v
        }
    }
}

/// Classic Algorithm R reservoir sampler with capacity K.
///
/// Keeps a uniform sample of everything it has seen in O(K) memory; used to
/// bound per-key storage when building robust references over long
/// recordings. Seeded deterministically so reference builds are
/// reproducible.
#[derive(Debug, Clone)]
pub struct ReservoirSampler {
    cap: usize,
    seen: usize,
    values: Vec<f64>,
    rng: StdRng,
}

impl ReservoirSampler {
    const DEFAULT_SEED: u64 = 0x5eed_9eeb;

    pub fn new(cap: usize) -> Self {
        Self::with_seed(cap, Self::DEFAULT_SEED)
    }

    pub fn with_seed(cap: usize, seed: u64) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            seen: 0,
            values: Vec::with_capacity(cap.min(1024)),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Offer one value to the reservoir.
    pub fn add(&mut self, x: f64) {
        self.seen += 1;
        if self.values.len() < self.cap {
            self.values.push(x);
            return;
        }
        // Replace an existing slot with probability cap/seen.
        let j = self.rng.random_range(0..self.seen);
        if j < self.cap {
            self.values[j] = x;
        }
    }

    /// Total number of values offered.
    #[inline]
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Number of values currently held (<= capacity).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sampled values (unordered).
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
