//! qeeg-map: scalp-space interpolation and topography
//!
//! ## Modules
//! - `geometry` - unit-disk / unit-sphere coordinates and projection
//! - `montage` - named electrode positions, built-in 10-20 set, CSV loading
//! - `spline` - Perrin-style spherical spline fit, evaluation and weights
//! - `topomap` - head-mask grid sampling (IDW and spline)
//! - `interpolate` - in-place bad-channel replacement
//! - `connectivity` - edge-list graph metrics and lobe/hemisphere regions

pub mod connectivity;
pub mod geometry;
pub mod interpolate;
pub mod montage;
pub mod spline;
pub mod topomap;

pub use connectivity::{
    compute_graph_metrics, infer_hemisphere, infer_lobe, region_label, ConnectivityEdge,
    GraphMetrics, Hemisphere, Lobe, NodeMetrics, RegionPairMetrics,
};
pub use geometry::{project_to_unit_sphere, Vec2, Vec3};
pub use interpolate::{interpolate_bad_channels, InterpolateReport};
pub use montage::Montage;
pub use spline::{kernel_g, spline_weights, SphericalSpline, SplineConfig};
pub use topomap::{make_topomap, Grid2D, TopomapConfig, TopomapMethod};
