//! Topographic scalp maps
//!
//! Samples interpolated channel values over a size x size grid covering the
//! unit disk. Pixels outside the head circle are NaN and left to the
//! renderer as background. The interpolation method is selected once before
//! the pixel loop, so the per-pixel path stays monomorphic.

use qeeg_core::{QeegError, QeegResult};

use crate::geometry::{project_to_unit_sphere, Vec2, Vec3};
use crate::montage::Montage;
use crate::spline::{SphericalSpline, SplineConfig};

/// Row-major square grid of interpolated values; NaN marks background.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Grid2D {
    pub size: usize,
    pub values: Vec<f32>,
}

impl Grid2D {
    fn filled(size: usize) -> Self {
        Self {
            size,
            values: vec![f32::NAN; size * size],
        }
    }

    /// Value at column i, row j (row 0 is the top of the head).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[j * self.size + i]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: f32) {
        self.values[j * self.size + i] = v;
    }
}

/// Interpolation method for [`make_topomap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TopomapMethod {
    /// Inverse-distance weighting on the disk (fast).
    #[default]
    Idw,
    /// Perrin spherical spline on the projected hemisphere.
    SphericalSpline,
}

/// Topomap options.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopomapConfig {
    /// Output grid edge length in pixels.
    pub grid_size: usize,
    pub method: TopomapMethod,

    /// IDW exponent (weight = 1 / d^power).
    pub idw_power: f64,
    /// Distance at which a pixel snaps to a sample value exactly.
    pub idw_eps: f64,

    /// Spline parameters for [`TopomapMethod::SphericalSpline`].
    pub spline: SplineConfig,
}

impl Default for TopomapConfig {
    fn default() -> Self {
        Self {
            grid_size: 256,
            method: TopomapMethod::Idw,
            idw_power: 2.0,
            idw_eps: 1e-6,
            spline: SplineConfig::default(),
        }
    }
}

#[inline]
fn inside_head(x: f64, y: f64) -> bool {
    x * x + y * y <= 1.0
}

/// Collect the usable (position, value) pairs: finite values with montage
/// positions. Fails below 3 usable channels.
fn gather_points(
    montage: &Montage,
    channel_names: &[String],
    channel_values: &[f64],
) -> QeegResult<(Vec<Vec2>, Vec<f64>)> {
    if channel_names.len() != channel_values.len() {
        return Err(QeegError::Structural(format!(
            "{} channel names for {} values",
            channel_names.len(),
            channel_values.len()
        )));
    }

    let mut pos = Vec::with_capacity(channel_names.len());
    let mut val = Vec::with_capacity(channel_names.len());
    for (name, &v) in channel_names.iter().zip(channel_values) {
        if !v.is_finite() {
            continue; // callers mask channels with NaN
        }
        let Some(p) = montage.get(name) else {
            log::debug!("topomap: no montage position for channel \"{name}\"");
            continue;
        };
        pos.push(p);
        val.push(v);
    }

    if pos.len() < 3 {
        return Err(QeegError::InsufficientData(format!(
            "topomap needs at least 3 usable channels (got {})",
            pos.len()
        )));
    }
    Ok((pos, val))
}

fn fill_idw(grid: &mut Grid2D, pos: &[Vec2], val: &[f64], cfg: &TopomapConfig) {
    let n = grid.size;
    let eps2 = cfg.idw_eps * cfg.idw_eps;

    for j in 0..n {
        let y = 1.0 - 2.0 * j as f64 / (n - 1) as f64;
        for i in 0..n {
            let x = -1.0 + 2.0 * i as f64 / (n - 1) as f64;
            if !inside_head(x, y) {
                continue;
            }

            let mut num = 0.0;
            let mut den = 0.0;
            let mut snapped = None;
            for (p, &v) in pos.iter().zip(val) {
                let dx = x - p.x;
                let dy = y - p.y;
                let d2 = dx * dx + dy * dy;
                if d2 <= eps2 {
                    snapped = Some(v);
                    break;
                }
                let w = 1.0 / d2.sqrt().powf(cfg.idw_power);
                num += w * v;
                den += w;
            }

            let out = match snapped {
                Some(v) => v as f32,
                None if den > 0.0 => (num / den) as f32,
                None => f32::NAN,
            };
            grid.set(i, j, out);
        }
    }
}

fn fill_spline(grid: &mut Grid2D, spline: &SphericalSpline) {
    let n = grid.size;
    for j in 0..n {
        let y = 1.0 - 2.0 * j as f64 / (n - 1) as f64;
        for i in 0..n {
            let x = -1.0 + 2.0 * i as f64 / (n - 1) as f64;
            if !inside_head(x, y) {
                continue;
            }
            let q = project_to_unit_sphere(Vec2 { x, y });
            grid.set(i, j, spline.evaluate(q) as f32);
        }
    }
}

/// Build a topographic grid from per-channel values at montage positions.
///
/// Channels whose value is non-finite or whose name has no montage position
/// are excluded from the interpolation.
pub fn make_topomap(
    montage: &Montage,
    channel_names: &[String],
    channel_values: &[f64],
    cfg: &TopomapConfig,
) -> QeegResult<Grid2D> {
    if cfg.grid_size < 8 {
        return Err(QeegError::InvalidConfig(format!(
            "grid_size too small ({})",
            cfg.grid_size
        )));
    }

    let (pos, val) = gather_points(montage, channel_names, channel_values)?;
    let mut grid = Grid2D::filled(cfg.grid_size);

    match cfg.method {
        TopomapMethod::Idw => fill_idw(&mut grid, &pos, &val, cfg),
        TopomapMethod::SphericalSpline => {
            let sphere_pos: Vec<Vec3> =
                pos.iter().map(|&p| project_to_unit_sphere(p)).collect();
            let spline = SphericalSpline::fit(&sphere_pos, &val, &cfg.spline)?;
            fill_spline(&mut grid, &spline);
        }
    }

    Ok(grid)
}
