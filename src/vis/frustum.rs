//! AABB/sphere-vs-frustum culling with an incremental per-plane bitmask.
//!
//! A frustum is at most five planes (four sides + far, or fewer while a
//! portal's clipped aperture only contributes that many sides). `cull_bits`
//! carries one bit per still-active plane down the recursion: once a
//! subtree's AABB is fully inside a plane's half-space, that plane's bit is
//! cleared so deeper calls skip testing it again (§4.3).

use glam::Vec3;

use crate::geometry::Plane;

/// Up to five frustum planes, in a fixed order (sides..., far last).
pub type FrustumPlanes = smallvec::SmallVec<[Plane; 5]>;

/// Every bit set for `count` active planes (`count <= 32`).
pub fn full_mask(count: usize) -> u32 {
    if count >= 32 { u32::MAX } else { (1u32 << count) - 1 }
}

/// Cull an AABB against `frustum`, only testing planes whose bit is set in
/// `cull_mask`. Returns `None` if the box is fully outside any active
/// plane; otherwise `Some(new_mask)` with bits cleared for planes the box
/// is now known to be fully inside (so child calls can skip them).
pub fn cull_aabb(frustum: &[Plane], mins: Vec3, maxs: Vec3, cull_mask: u32) -> Option<u32> {
    let mut mask = cull_mask;
    for (i, plane) in frustum.iter().enumerate() {
        let bit = 1u32 << i;
        if mask & bit == 0 {
            continue;
        }

        let neg_corner = Plane::corner_for_sign_bits(plane.sign_bits(), mins, maxs);
        if plane.distance_to_point(neg_corner) < 0.0 {
            return None;
        }

        let pos_corner = Plane::corner_for_sign_bits(!plane.sign_bits() & 0b111, mins, maxs);
        if plane.distance_to_point(pos_corner) >= 0.0 {
            mask &= !bit;
        }
    }
    Some(mask)
}

/// Same incremental-bitmask cull for a sphere.
pub fn cull_sphere(frustum: &[Plane], center: Vec3, radius: f32, cull_mask: u32) -> Option<u32> {
    let mut mask = cull_mask;
    for (i, plane) in frustum.iter().enumerate() {
        let bit = 1u32 << i;
        if mask & bit == 0 {
            continue;
        }
        let d = plane.distance_to_point(center);
        if d < -radius {
            return None;
        }
        if d > radius {
            mask &= !bit;
        }
    }
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn box_frustum() -> FrustumPlanes {
        // Inward-facing planes of a unit box centered at the origin.
        smallvec::smallvec![
            Plane::new(Vec3::X, 1.0),
            Plane::new(-Vec3::X, 1.0),
            Plane::new(Vec3::Y, 1.0),
            Plane::new(-Vec3::Y, 1.0),
            Plane::new(Vec3::Z, 1.0),
        ]
    }

    #[test]
    fn aabb_fully_inside_clears_all_bits() {
        let frustum = box_frustum();
        let mask = cull_aabb(&frustum, vec3(-0.1, -0.1, -0.1), vec3(0.1, 0.1, 0.1), full_mask(5));
        assert_eq!(mask, Some(0));
    }

    #[test]
    fn aabb_fully_outside_culled() {
        let frustum = box_frustum();
        let mask = cull_aabb(&frustum, vec3(5.0, 5.0, 5.0), vec3(6.0, 6.0, 6.0), full_mask(5));
        assert_eq!(mask, None);
    }

    #[test]
    fn sphere_partial_overlap_keeps_bit_set() {
        let frustum = box_frustum();
        // Sphere sits near the x=1 boundary (plane index 1, `-X, 1.0`):
        // that plane can't be fully satisfied yet, so its bit survives.
        let mask = cull_sphere(&frustum, vec3(0.9, 0.0, 0.0), 0.5, full_mask(5));
        assert!(mask.is_some());
        assert_ne!(mask.unwrap() & (1 << 1), 0);
    }
}
