//! qeeg-dsp: spectral estimation and streaming analysis engines
//!
//! ## Core Modules
//! - `welch` - Welch PSD (Hann window, constant detrend, one-sided density)
//! - `bandpower` - trapezoid band integration, bandpower matrix, transforms
//! - `features` - spectral entropy, mean/edge/peak frequency
//! - `iaf` - individual alpha frequency (peak + center of gravity)
//!
//! ## Streaming
//! - `online` - ring-buffer bandpower engine and artifact gate
//! - `artifacts` - offline windowed artifact detection and segment merging
//! - `reference` - per-(channel, band) reference statistics accumulation

pub mod artifacts;
pub mod bandpower;
pub mod features;
pub mod iaf;
pub mod online;
pub mod reference;
pub mod welch;

pub use artifacts::{
    bad_counts_per_channel, detect_artifacts, merge_bad_segments, ArtifactConfig,
    ArtifactDetection, ArtifactSegment, ArtifactWindow, ChannelBaselineStats,
    ChannelWindowMetrics, TimeDomainFeatures,
};
pub use bandpower::{
    compute_bandpower_matrix, integrate_bandpower, BandpowerConfig, BandpowerMatrix, LOG_EPS,
};
pub use features::{
    spectral_edge_frequency, spectral_entropy, spectral_mean_frequency, spectral_peak_frequency,
    spectral_total_power,
};
pub use iaf::{estimate_iaf, estimate_iaf_from_signal, IafConfig, IafEstimate};
pub use online::{
    OnlineArtifactConfig, OnlineArtifactFrame, OnlineArtifactGate, OnlineBandpower,
    OnlineBandpowerConfig, OnlineBandpowerFrame,
};
pub use reference::{
    ReferenceBuilder, ReferenceConfig, ReferenceEntry, ReferenceStatistics,
};
pub use welch::{hann_window, welch_psd, PsdResult, WelchConfig};
