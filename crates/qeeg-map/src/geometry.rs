//! Head-model geometry: unit-disk montage coordinates and unit-sphere points

/// 2D montage coordinate on the unit disk (|x|^2 + |y|^2 <= 1).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// 3D point, usually on the unit sphere.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Normalize to unit length; a zero vector stays zero.
    pub fn normalized(self) -> Self {
        let n2 = self.dot(self);
        if n2 <= 0.0 {
            return Self::ZERO;
        }
        let inv = 1.0 / n2.sqrt();
        Self {
            x: self.x * inv,
            y: self.y * inv,
            z: self.z * inv,
        }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

/// Project a unit-disk montage point to the upper unit hemisphere via
/// `z = sqrt(1 - x^2 - y^2)`. Points outside the disk are clamped to the
/// unit circle first.
pub fn project_to_unit_sphere(p: Vec2) -> Vec3 {
    let mut x = p.x;
    let mut y = p.y;
    let mut r2 = x * x + y * y;
    if r2 > 1.0 {
        let r = r2.sqrt();
        x /= r;
        y /= r;
        r2 = 1.0;
    }
    let z = (1.0 - r2).max(0.0).sqrt();
    Vec3 { x, y, z }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_projection_is_unit_length() {
        for p in [
            Vec2 { x: 0.0, y: 0.0 },
            Vec2 { x: 0.5, y: -0.3 },
            Vec2 { x: 1.0, y: 0.0 },
            Vec2 { x: 2.0, y: 2.0 }, // outside: clamped
        ] {
            let q = project_to_unit_sphere(p);
            assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 1e-12);
            assert!(q.z >= 0.0);
        }
    }

    #[test]
    fn test_center_maps_to_vertex() {
        let q = project_to_unit_sphere(Vec2 { x: 0.0, y: 0.0 });
        assert_abs_diff_eq!(q.z, 1.0);
    }

    #[test]
    fn test_normalized_zero_stays_zero() {
        assert!(Vec3::ZERO.normalized().is_zero());
        let v = Vec3 { x: 3.0, y: 0.0, z: 4.0 }.normalized();
        assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-12);
    }
}
