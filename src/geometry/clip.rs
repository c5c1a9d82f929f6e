//! Allocation-free polygon clipping against a single plane, used by the
//! portal-flood narrowing (§4.3) and the ray-portal clip (§4.4). This is the
//! single hottest geometric routine in the crate, so both traversal paths
//! share one implementation operating on caller-owned fixed-capacity
//! buffers instead of allocating a `Vec` per clip.

use glam::Vec3;

use super::plane::Plane;

/// Hard cap on points carried through a single clip. The source used 128;
/// kept identical since it also bounds the portal stack's per-frame buffers.
pub const MAX_HULL_POINTS: usize = 128;

/// Scratch state reused across clip calls within one traversal (never a
/// process-wide static — see DESIGN.md "Global visibility marker").
#[derive(Default)]
pub struct ClipScratch {
    sides: [ClipSide; MAX_HULL_POINTS],
    dists: [f32; MAX_HULL_POINTS],
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum ClipSide {
    #[default]
    On,
    Front,
    Back,
}

/// Fixed-capacity output buffer for a clipped hull.
pub struct ClipBuffer {
    pub points: [Vec3; MAX_HULL_POINTS],
    pub count: usize,
}

impl Default for ClipBuffer {
    fn default() -> Self {
        Self { points: [Vec3::ZERO; MAX_HULL_POINTS], count: 0 }
    }
}

impl ClipBuffer {
    pub fn as_slice(&self) -> &[Vec3] {
        &self.points[..self.count]
    }

    pub fn copy_from(&mut self, points: &[Vec3]) {
        debug_assert!(points.len() <= MAX_HULL_POINTS);
        self.points[..points.len()].copy_from_slice(points);
        self.count = points.len();
    }
}

/// Clip `input` by `plane`.
///
/// Contract (preserved deliberately from the source, documented rather than
/// silently "fixed" — see DESIGN.md open questions):
/// - if every point is behind the plane: writes an empty hull to `out` and
///   returns `Some(())` (fully clipped away).
/// - if every point is in front of the plane (nothing to clip): returns
///   `None` and leaves `out` untouched — **the caller must treat `None` as
///   "use the input hull unchanged"** and copy it into its own destination
///   buffer itself. This crate's call sites always do so unconditionally,
///   closing the stale-buffer hazard the source left latent.
/// - otherwise performs a Sutherland–Hodgman pass into `out` and returns
///   `Some(())`.
pub fn clip_polygon_fast(
    scratch: &mut ClipScratch,
    input: &[Vec3],
    out: &mut ClipBuffer,
    plane: &Plane,
    eps: f32,
) -> Option<()> {
    let n = input.len();
    debug_assert!(n + 4 <= MAX_HULL_POINTS);

    let mut front = 0usize;
    let mut back = 0usize;

    for i in 0..n {
        let d = plane.distance_to_point(input[i]);
        scratch.dists[i] = d;
        scratch.sides[i] = if d > eps {
            front += 1;
            ClipSide::Front
        } else if d < -eps {
            back += 1;
            ClipSide::Back
        } else {
            ClipSide::On
        };
    }

    if front == 0 {
        out.count = 0;
        return Some(());
    }

    if back == 0 {
        return None;
    }

    out.count = 0;
    scratch.sides[n] = scratch.sides[0];
    scratch.dists[n] = scratch.dists[0];

    for i in 0..n {
        let v = input[i];

        if scratch.sides[i] == ClipSide::On {
            out.points[out.count] = v;
            out.count += 1;
            continue;
        }

        if scratch.sides[i] == ClipSide::Front {
            out.points[out.count] = v;
            out.count += 1;
        }

        let next_side = scratch.sides[i + 1];
        if next_side == ClipSide::On || next_side == scratch.sides[i] {
            continue;
        }

        let next_vertex = input[(i + 1) % n];
        let d = scratch.dists[i] / (scratch.dists[i] - scratch.dists[i + 1]);

        out.points[out.count] = v + d * (next_vertex - v);
        out.count += 1;
    }

    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn all_front_returns_none_meaning_unchanged() {
        let mut scratch = ClipScratch::default();
        let mut out = ClipBuffer::default();
        let square = [vec3(1.0, -1.0, 0.0), vec3(2.0, -1.0, 0.0), vec3(2.0, 1.0, 0.0), vec3(1.0, 1.0, 0.0)];
        let plane = Plane::new(glam::Vec3::X, 0.0);
        assert!(clip_polygon_fast(&mut scratch, &square, &mut out, &plane, 0.0).is_none());
    }

    #[test]
    fn all_back_yields_empty_hull() {
        let mut scratch = ClipScratch::default();
        let mut out = ClipBuffer::default();
        let square = [vec3(-2.0, -1.0, 0.0), vec3(-1.0, -1.0, 0.0), vec3(-1.0, 1.0, 0.0), vec3(-2.0, 1.0, 0.0)];
        let plane = Plane::new(glam::Vec3::X, 0.0);
        let r = clip_polygon_fast(&mut scratch, &square, &mut out, &plane, 0.0);
        assert!(r.is_some());
        assert_eq!(out.count, 0);
    }

    #[test]
    fn straddling_plane_clips_to_front_half() {
        let mut scratch = ClipScratch::default();
        let mut out = ClipBuffer::default();
        let square = [vec3(-1.0, -1.0, 0.0), vec3(1.0, -1.0, 0.0), vec3(1.0, 1.0, 0.0), vec3(-1.0, 1.0, 0.0)];
        let plane = Plane::new(glam::Vec3::X, 0.0);
        let r = clip_polygon_fast(&mut scratch, &square, &mut out, &plane, 0.0);
        assert!(r.is_some());
        assert!(out.count >= 3);
        for p in out.as_slice() {
            assert!(p.x >= -1e-6);
        }
    }
}
