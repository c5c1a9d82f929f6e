//! Tangent-space derivation for mesh construction. Not a hot path; used by
//! the navmesh detail-mesh normal shading and test fixtures rather than any
//! per-frame query.

use glam::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, Default)]
pub struct TangentBasis {
    pub tangent: Vec3,
    pub binormal: Vec3,
}

/// Accumulates per-vertex tangent/binormal contributions from triangles
/// before a final Gram-Schmidt orthogonalization pass.
#[derive(Default)]
pub struct TangentAccumulator {
    tangents: Vec<Vec3>,
    binormals: Vec<Vec3>,
}

impl TangentAccumulator {
    pub fn new(vertex_count: usize) -> Self {
        Self { tangents: vec![Vec3::ZERO; vertex_count], binormals: vec![Vec3::ZERO; vertex_count] }
    }

    /// Accumulate the tangent/binormal contribution of one triangle onto its
    /// three vertices, given position edges `(e1, e2)` and texture-space
    /// deltas `(et1, et2)`.
    pub fn accumulate_triangle(&mut self, indices: [usize; 3], e1: Vec3, e2: Vec3, et1: Vec2, et2: Vec2) {
        let denom = et1.x * et2.y - et1.y * et2.x;
        if denom.abs() < 1e-12 {
            return;
        }
        let r = 1.0 / denom;
        let tangent = (e1 * et2.y - e2 * et1.y) * r;
        let binormal = (e2 * et1.x - e1 * et2.x) * r;

        for &i in &indices {
            self.tangents[i] += tangent;
            self.binormals[i] += binormal;
        }
    }

    /// Gram-Schmidt each accumulated tangent against the vertex normal and
    /// derive handedness from `sign((n x t) . b)`.
    pub fn finish(self, normals: &[Vec3]) -> Vec<TangentBasis> {
        debug_assert_eq!(normals.len(), self.tangents.len());
        normals
            .iter()
            .zip(self.tangents.iter().zip(self.binormals.iter()))
            .map(|(&n, (&t, &b))| {
                let ortho_t = (t - n * n.dot(t)).normalize_or_zero();
                let handedness = if n.cross(ortho_t).dot(b) < 0.0 { -1.0 } else { 1.0 };
                TangentBasis { tangent: ortho_t, binormal: n.cross(ortho_t) * handedness }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn orthogonal_tangent_stays_unit_length() {
        let mut acc = TangentAccumulator::new(3);
        acc.accumulate_triangle(
            [0, 1, 2],
            vec3(1.0, 0.0, 0.0),
            vec3(0.0, 1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        );
        let normals = vec![Vec3::Z; 3];
        let bases = acc.finish(&normals);
        for basis in bases {
            assert!((basis.tangent.length() - 1.0).abs() < 1e-4 || basis.tangent == Vec3::ZERO);
        }
    }
}
