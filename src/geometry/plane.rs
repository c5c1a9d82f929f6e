//! Oriented planes with precomputed axial classification.

use glam::Vec3;

use super::epsilon::EPS_PLANE;

/// Which axis (if any) a plane's normal is aligned to. Axis-aligned planes
/// take a fast path in BSP descent and raycasting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxialType {
    X,
    Y,
    Z,
    NonAxial,
}

/// Result of classifying a point or hull against a plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneSide {
    Front,
    Back,
    On,
    Cross,
}

/// `n·p + d = 0`.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
    axial: AxialType,
    /// Sign bit per component of `normal` (1 if negative), used to pick the
    /// AABB corner that is "most negative" along this plane.
    sign_bits: u8,
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let axial = if normal.x == 1.0 || normal.x == -1.0 {
            AxialType::X
        } else if normal.y == 1.0 || normal.y == -1.0 {
            AxialType::Y
        } else if normal.z == 1.0 || normal.z == -1.0 {
            AxialType::Z
        } else {
            AxialType::NonAxial
        };

        let sign_bits = (normal.x < 0.0) as u8 | ((normal.y < 0.0) as u8) << 1 | ((normal.z < 0.0) as u8) << 2;

        Self { normal, dist, axial, sign_bits }
    }

    /// Plane through three CCW points (as seen from the front half-space).
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a).cross(c - a).normalize_or_zero();
        let dist = -normal.dot(a);
        Self::new(normal, dist)
    }

    #[inline(always)]
    pub fn axial(&self) -> AxialType {
        self.axial
    }

    #[inline(always)]
    pub fn sign_bits(&self) -> u8 {
        self.sign_bits
    }

    #[inline(always)]
    pub fn distance_to_point(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.dist
    }

    #[inline(always)]
    pub fn negated(&self) -> Plane {
        Plane::new(-self.normal, -self.dist)
    }

    pub fn classify_point(&self, p: Vec3, eps: f32) -> PlaneSide {
        let d = self.distance_to_point(p);
        if d > eps {
            PlaneSide::Front
        } else if d < -eps {
            PlaneSide::Back
        } else {
            PlaneSide::On
        }
    }

    /// Axis-aligned corner offsets per sign-bit triplet (0..=7), used by the
    /// AABB-vs-frustum cull to pick the "negative" and "positive" corners in
    /// one table lookup instead of branching on each axis.
    pub fn corner_for_sign_bits(sign_bits: u8, mins: Vec3, maxs: Vec3) -> Vec3 {
        Vec3::new(
            if sign_bits & 1 != 0 { mins.x } else { maxs.x },
            if sign_bits & 2 != 0 { mins.y } else { maxs.y },
            if sign_bits & 4 != 0 { mins.z } else { maxs.z },
        )
    }
}

impl Default for Plane {
    fn default() -> Self {
        Plane::new(Vec3::Z, 0.0)
    }
}

/// Classify an AABB against a plane using its precomputed sign bits: returns
/// `Front` if the whole box is in front, `Back` if entirely behind, `Cross`
/// if it straddles. Used by `QueryOverlappingAreas` and frustum culling.
pub fn classify_aabb(plane: &Plane, mins: Vec3, maxs: Vec3) -> PlaneSide {
    let neg = Plane::corner_for_sign_bits(plane.sign_bits(), mins, maxs);
    let pos = Plane::corner_for_sign_bits(!plane.sign_bits() & 0b111, mins, maxs);

    let d_neg = plane.distance_to_point(neg);
    let d_pos = plane.distance_to_point(pos);

    if d_neg > EPS_PLANE && d_pos > EPS_PLANE {
        PlaneSide::Front
    } else if d_neg < -EPS_PLANE && d_pos < -EPS_PLANE {
        PlaneSide::Back
    } else {
        PlaneSide::Cross
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axial_detection() {
        let p = Plane::new(Vec3::X, 0.0);
        assert_eq!(p.axial(), AxialType::X);
        let p = Plane::new(Vec3::new(0.707, 0.707, 0.0), 0.0);
        assert_eq!(p.axial(), AxialType::NonAxial);
    }

    #[test]
    fn aabb_classification() {
        let p = Plane::new(Vec3::X, 0.0);
        assert_eq!(
            classify_aabb(&p, Vec3::new(1.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0)),
            PlaneSide::Front
        );
        assert_eq!(
            classify_aabb(&p, Vec3::new(-2.0, -1.0, -1.0), Vec3::new(-1.0, 1.0, 1.0)),
            PlaneSide::Back
        );
        assert_eq!(
            classify_aabb(&p, Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
            PlaneSide::Cross
        );
    }
}
