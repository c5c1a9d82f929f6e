//! Ray / segment primitives and intersection predicates: Möller–Trumbore
//! triangle intersection and the inverse-direction slab test against an
//! AABB.

use glam::Vec3;
use log::warn;

use super::aabb::Aabb;
use super::epsilon::{EPS_RAY_PARALLEL, EPS_SEGMENT_MIN, EPS_TRI_DET};
use super::sphere::Sphere;
use crate::error::RayError;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: Vec3,
    pub end: Vec3,
    pub dir: Vec3,
    pub inv_dir: Vec3,
    pub length: f32,
}

impl Ray {
    /// Returns `None` for a degenerate (near-zero-length) segment, per the
    /// "degenerate ray" contract in §4.4.
    pub fn new(start: Vec3, end: Vec3) -> Option<Ray> {
        let delta = end - start;
        let length = delta.length();
        if length < EPS_SEGMENT_MIN {
            warn!("{}", RayError::DegenerateRay);
            return None;
        }
        let dir = delta / length;
        let inv_dir = Vec3::new(
            if dir.x != 0.0 { 1.0 / dir.x } else { f32::INFINITY },
            if dir.y != 0.0 { 1.0 / dir.y } else { f32::INFINITY },
            if dir.z != 0.0 { 1.0 / dir.z } else { f32::INFINITY },
        );
        Some(Ray { start, end, dir, inv_dir, length })
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.start + self.dir * distance
    }

    /// Slab test against an AABB using the precomputed inverse direction.
    /// Returns the entry/exit distances along the ray if they overlap
    /// `[0, self.length]`.
    pub fn intersect_aabb(&self, bounds: &Aabb) -> Option<(f32, f32)> {
        let t1 = (bounds.mins - self.start) * self.inv_dir;
        let t2 = (bounds.maxs - self.start) * self.inv_dir;

        let tmin = t1.min(t2);
        let tmax = t1.max(t2);

        let t_near = tmin.x.max(tmin.y).max(tmin.z).max(0.0);
        let t_far = tmax.x.min(tmax.y).min(tmax.z).min(self.length);

        if t_near <= t_far { Some((t_near, t_far)) } else { None }
    }

    /// Ray-sphere intersection via the standard quadratic in `t`. A ray
    /// starting inside the sphere reports `t_near = 0`.
    pub fn intersect_sphere(&self, sphere: &Sphere) -> Option<(f32, f32)> {
        let oc = self.start - sphere.center;
        let b = oc.dot(self.dir);
        let c = oc.length_squared() - sphere.radius * sphere.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t_near = (-b - sqrt_disc).max(0.0);
        let t_far = (-b + sqrt_disc).min(self.length);
        if t_near <= t_far { Some((t_near, t_far)) } else { None }
    }
}

/// Result of a ray-triangle intersection: barycentric `(u, v)` and the
/// distance along the ray.
#[derive(Clone, Copy, Debug)]
pub struct TriHit {
    pub distance: f32,
    pub u: f32,
    pub v: f32,
}

/// Möller–Trumbore ray-triangle intersection. `cull_backface` rejects hits
/// where the ray approaches the triangle's back (per non-planar, non-two-sided
/// surfaces in §4.4).
pub fn intersect_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3, cull_backface: bool) -> Option<TriHit> {
    let e1 = b - a;
    let e2 = c - a;
    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);

    if cull_backface {
        if det < EPS_TRI_DET {
            return None;
        }
    } else if det.abs() < EPS_TRI_DET {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.start - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(e1);
    let v = ray.dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let distance = e2.dot(qvec) * inv_det;
    if distance < 0.0 || distance > ray.length {
        return None;
    }

    Some(TriHit { distance, u, v })
}

/// `true` if `|dir . normal|` is large enough to not be considered parallel
/// to a plane with the given normal.
pub fn is_not_parallel(dir: Vec3, normal: Vec3) -> bool {
    dir.dot(normal).abs() >= EPS_RAY_PARALLEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn degenerate_ray_rejected() {
        assert!(Ray::new(Vec3::ZERO, Vec3::ZERO).is_none());
    }

    #[test]
    fn triangle_hit_in_front() {
        let ray = Ray::new(vec3(0.0, 0.0, 2.0), vec3(0.0, 0.0, -2.0)).unwrap();
        let hit = intersect_triangle(&ray, vec3(-1.0, -1.0, 0.0), vec3(1.0, -1.0, 0.0), vec3(0.0, 1.0, 0.0), false);
        let hit = hit.unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-4);
    }

    #[test]
    fn slab_test_overlap() {
        let ray = Ray::new(vec3(-2.0, 0.0, 0.0), vec3(2.0, 0.0, 0.0)).unwrap();
        let bounds = Aabb::new(vec3(-1.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0));
        let (near, far) = ray.intersect_aabb(&bounds).unwrap();
        assert!((near - 1.0).abs() < 1e-4);
        assert!((far - 3.0).abs() < 1e-4);
    }
}
