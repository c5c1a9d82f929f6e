//! Convex polygon hulls: ordered CCW points coplanar with an implicit plane.
//!
//! Winding is fixed at CCW (viewed from the plane's front half-space) for
//! this whole crate — the source toggled this at compile time via a
//! `CONVEX_HULL_CW` macro; we don't expose that knob.

use glam::Vec3;
use smallvec::SmallVec;

use super::epsilon::{EPS_PLANE, HULL_BOUND, MIN_EDGE};
use super::plane::{Plane, PlaneSide};

/// Most hulls in practice are small (quads, portal polygons); inline storage
/// avoids a heap allocation for the common case.
pub type HullPoints = SmallVec<[Vec3; 8]>;

#[derive(Clone, Debug)]
pub struct ConvexHull {
    points: HullPoints,
}

impl ConvexHull {
    pub fn new(points: HullPoints) -> Self {
        Self { points }
    }

    pub fn from_slice(points: &[Vec3]) -> Self {
        Self { points: points.iter().copied().collect() }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Plane of the hull, assuming CCW winding viewed from the front.
    pub fn plane(&self) -> Option<Plane> {
        if self.points.len() < 3 {
            return None;
        }
        Some(Plane::from_points(self.points[0], self.points[1], self.points[2]))
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    pub fn reversed(&self) -> ConvexHull {
        let mut h = self.clone();
        h.reverse();
        h
    }

    /// Number of edges whose length is `>= MIN_EDGE`.
    fn long_edge_count(&self) -> usize {
        let n = self.points.len();
        if n < 2 {
            return 0;
        }
        (0..n)
            .filter(|&i| self.points[i].distance(self.points[(i + 1) % n]) >= MIN_EDGE)
            .count()
    }

    /// A hull with fewer than three edges longer than `MIN_EDGE` is
    /// degenerate in practice even if it nominally has >=3 points.
    pub fn is_tiny(&self) -> bool {
        self.points.len() < 3 || self.long_edge_count() < 3
    }

    /// Any coordinate escaping `±HULL_BOUND` flags the hull as ill-formed.
    pub fn is_huge(&self) -> bool {
        self.points
            .iter()
            .any(|p| p.x.abs() > HULL_BOUND || p.y.abs() > HULL_BOUND || p.z.abs() > HULL_BOUND)
    }

    /// Classify the whole hull against `plane`: `Cross` the instant two
    /// different sides are observed among the vertices.
    pub fn classify(&self, plane: &Plane, eps: f32) -> PlaneSide {
        let mut saw_front = false;
        let mut saw_back = false;

        for &p in &self.points {
            match plane.classify_point(p, eps) {
                PlaneSide::Front => saw_front = true,
                PlaneSide::Back => saw_back = true,
                PlaneSide::On => {}
            }
            if saw_front && saw_back {
                return PlaneSide::Cross;
            }
        }

        match (saw_front, saw_back) {
            (true, false) => PlaneSide::Front,
            (false, true) => PlaneSide::Back,
            (false, false) => PlaneSide::On,
            (true, true) => unreachable!("short-circuited above"),
        }
    }

    /// Split by `plane`. Returns `(front, back, side)`. `front`/`back` are
    /// `None` when that half is empty. `side` mirrors `classify` except that
    /// a fully-on hull is attributed to whichever side its own plane normal
    /// agrees with.
    pub fn split(&self, plane: &Plane, eps: f32) -> (Option<ConvexHull>, Option<ConvexHull>, PlaneSide) {
        let side = self.classify(plane, eps);

        match side {
            PlaneSide::On => {
                // Fully coplanar: attribute to front if our own plane's
                // normal agrees with the splitter, else back.
                let agrees = self.plane().map(|p| p.normal.dot(plane.normal) > 0.0).unwrap_or(true);
                if agrees {
                    (Some(self.clone()), None, PlaneSide::Front)
                } else {
                    (None, Some(self.clone()), PlaneSide::Back)
                }
            }
            PlaneSide::Front => (Some(self.clone()), None, PlaneSide::Front),
            PlaneSide::Back => (None, Some(self.clone()), PlaneSide::Back),
            PlaneSide::Cross => {
                let n = self.points.len();
                let mut front: HullPoints = SmallVec::new();
                let mut back: HullPoints = SmallVec::new();

                let dists: SmallVec<[f32; 8]> = self.points.iter().map(|&p| plane.distance_to_point(p)).collect();

                for i in 0..n {
                    let d_i = dists[i];
                    let p_i = self.points[i];

                    if d_i >= -eps {
                        front.push(p_i);
                    }
                    if d_i <= eps {
                        back.push(p_i);
                    }

                    let j = (i + 1) % n;
                    let d_j = dists[j];

                    let opposite_sides = (d_i > eps && d_j < -eps) || (d_i < -eps && d_j > eps);
                    if opposite_sides {
                        let t = d_i / (d_i - d_j);
                        let mut cut = p_i + t * (self.points[j] - p_i);
                        snap_axial(&mut cut, plane);
                        front.push(cut);
                        back.push(cut);
                    }
                }

                let front_hull = (front.len() >= 3).then(|| ConvexHull::new(front));
                let back_hull = (back.len() >= 3).then(|| ConvexHull::new(back));
                (front_hull, back_hull, PlaneSide::Cross)
            }
        }
    }

    /// `split` reduced to keeping only the front half.
    pub fn clip(&self, plane: &Plane, eps: f32) -> Option<ConvexHull> {
        self.split(plane, eps).0
    }
}

/// On an axis-aligned splitting plane, snap the cut point's corresponding
/// component to exactly `∓plane.dist` to eliminate interpolation drift.
fn snap_axial(point: &mut Vec3, plane: &Plane) {
    use super::plane::AxialType;
    match plane.axial() {
        AxialType::X => point.x = -plane.dist * plane.normal.x.signum(),
        AxialType::Y => point.y = -plane.dist * plane.normal.y.signum(),
        AxialType::Z => point.z = -plane.dist * plane.normal.z.signum(),
        AxialType::NonAxial => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn quad() -> ConvexHull {
        ConvexHull::from_slice(&[
            vec3(-1.0, -1.0, 0.0),
            vec3(1.0, -1.0, 0.0),
            vec3(1.0, 1.0, 0.0),
            vec3(-1.0, 1.0, 0.0),
        ])
    }

    #[test]
    fn reverse_is_involution() {
        let h = quad();
        let back = h.reversed().reversed();
        assert_eq!(h.points(), back.points());
    }

    #[test]
    fn split_across_axial_plane_snaps_cut_points() {
        let h = quad();
        let plane = Plane::new(vec3(1.0, 0.0, 0.0), 0.0);
        let (front, back, side) = h.split(&plane, EPS_PLANE);
        assert_eq!(side, PlaneSide::Cross);
        let front = front.unwrap();
        let back = back.unwrap();

        for p in front.points() {
            assert!(p.x >= -1e-6);
        }
        for p in back.points() {
            assert!(p.x <= 1e-6);
        }

        // Cut points land exactly on x=0.
        let cuts_on_plane = front.points().iter().filter(|p| p.x.abs() < 1e-7).count();
        assert_eq!(cuts_on_plane, 2);
    }

    #[test]
    fn classify_front_or_back_gives_copy_invariant() {
        let h = quad();
        let plane = Plane::new(vec3(1.0, 0.0, 0.0), 10.0); // hull entirely in front
        let (front, back, side) = h.split(&plane, EPS_PLANE);
        assert_eq!(side, PlaneSide::Front);
        assert!(back.is_none());
        assert_eq!(front.unwrap().points(), h.points());
    }

    #[test]
    fn clip_twice_by_same_plane_is_idempotent() {
        let h = quad();
        let plane = Plane::new(vec3(1.0, 0.0, 0.0), 0.0);
        let once = h.clip(&plane, EPS_PLANE).unwrap();
        let twice = once.clip(&plane, EPS_PLANE).unwrap();
        assert_eq!(once.points().len(), twice.points().len());
        for (a, b) in once.points().iter().zip(twice.points()) {
            assert!(a.distance(*b) < 1e-5);
        }
    }

    #[test]
    fn tiny_hull_flagged() {
        let degenerate = ConvexHull::from_slice(&[vec3(0.0, 0.0, 0.0), vec3(0.001, 0.0, 0.0), vec3(0.0, 0.001, 0.0)]);
        assert!(degenerate.is_tiny());
    }
}
