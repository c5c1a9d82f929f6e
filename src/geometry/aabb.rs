//! Axis-aligned bounding boxes.

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        mins: Vec3::splat(f32::MAX),
        maxs: Vec3::splat(f32::MIN),
    };

    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut b = Aabb::EMPTY;
        for &p in points {
            b.add_point(p);
        }
        b
    }

    pub fn add_point(&mut self, p: Vec3) {
        self.mins = self.mins.min(p);
        self.maxs = self.maxs.max(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.mins.min(other.mins), self.maxs.max(other.maxs))
    }

    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        (self.maxs - self.mins) * 0.5
    }

    /// Closed-interval overlap test: `[mins, maxs]` on both sides, per the
    /// redesign decision to use closed overlap uniformly (§4.2).
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.mins.x <= other.maxs.x
            && self.maxs.x >= other.mins.x
            && self.mins.y <= other.maxs.y
            && self.maxs.y >= other.mins.y
            && self.mins.z <= other.maxs.z
            && self.maxs.z >= other.mins.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.mins.x
            && p.x <= self.maxs.x
            && p.y >= self.mins.y
            && p.y <= self.maxs.y
            && p.z >= self.mins.z
            && p.z <= self.maxs.z
    }

    pub fn expand(&self, amount: f32) -> Aabb {
        Aabb::new(self.mins - Vec3::splat(amount), self.maxs + Vec3::splat(amount))
    }

    pub fn expand_xz(&self, amount: f32) -> Aabb {
        Aabb::new(
            self.mins - Vec3::new(amount, 0.0, amount),
            self.maxs + Vec3::new(amount, 0.0, amount),
        )
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_overlap_touches_at_boundary() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::ONE, Vec3::splat(2.0));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn union_grows_to_include_both() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(0.5));
        let u = a.union(&b);
        assert_eq!(u.mins, Vec3::splat(-1.0));
        assert_eq!(u.maxs, Vec3::ONE);
    }
}
