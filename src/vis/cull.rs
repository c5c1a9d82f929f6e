//! `CullPrimitives`: per-area surface and primitive culling shared by both
//! the PVS and portal-flood topologies (§4.3).

use glam::Vec3;

use crate::world::types::{AreaId, PrimitiveId, SurfaceId};
use crate::world::primitive::PrimitiveShape;
use crate::world::World;

use super::frustum::{cull_aabb, cull_sphere, full_mask};

/// Query/visibility masks shared by every element tested this query.
#[derive(Clone, Copy, Debug)]
pub struct VisMasks {
    pub query_group: u32,
    pub vis_group: u32,
}

impl VisMasks {
    /// The query-group mask must be a superset of the element's own group.
    fn query_group_passes(&self, element_group: u32) -> bool {
        self.query_group & element_group == element_group
    }

    fn vis_group_passes(&self, element_group: u32) -> bool {
        self.vis_group & element_group != 0
    }
}

/// Append-only output of one top-level visibility query.
#[derive(Default, Debug)]
pub struct VisResult {
    pub surfaces: Vec<SurfaceId>,
    pub primitives: Vec<PrimitiveId>,
}

impl VisResult {
    pub fn clear(&mut self) {
        self.surfaces.clear();
        self.primitives.clear();
    }
}

/// Cull every surface and primitive of `area` against `frustum`, appending
/// survivors to `result`. `marker` is the current top-level query's vis
/// marker; `cull_mask` is the incremental frustum-plane bitmask inherited
/// from the ancestor that last pruned a plane fully.
pub fn cull_area(
    world: &World,
    area: AreaId,
    frustum: &[crate::geometry::Plane],
    cull_mask: u32,
    marker: u32,
    view_pos: Vec3,
    masks: VisMasks,
    result: &mut VisResult,
) {
    let area_ref = &world.areas[area.0 as usize];

    for surface_idx in area_ref.surface_range() {
        let surface_id = SurfaceId(surface_idx);
        let surface = &world.surfaces[surface_idx as usize];

        if surface.vis_mark.get() == marker {
            continue;
        }
        surface.vis_mark.set(marker);

        if !masks.query_group_passes(surface.query_group) {
            continue;
        }
        if !masks.vis_group_passes(surface.vis_group) {
            continue;
        }
        if surface.is_planar() && !surface.is_two_sided() {
            if let Some(plane) = surface.face_plane {
                if plane.distance_to_point(view_pos) < 0.0 {
                    continue;
                }
            }
        }
        if cull_aabb(frustum, surface.aabb.mins, surface.aabb.maxs, cull_mask).is_none() {
            continue;
        }

        surface.vis_pass.set(marker);
        result.surfaces.push(surface_id);
    }

    for primitive_id in world.area_primitives(area) {
        let Some(primitive) = world.get_primitive(primitive_id) else { continue };

        if primitive.vis_mark.get() == marker {
            continue;
        }
        // Stamp first so a straddling primitive visited again through
        // another area in the same query short-circuits immediately.
        primitive.vis_mark.set(marker);

        if !masks.query_group_passes(primitive.query_group) {
            continue;
        }
        if !masks.vis_group_passes(primitive.vis_group) {
            continue;
        }
        if primitive.is_planar() && !primitive.is_two_sided() {
            if let Some(plane) = primitive.face_plane {
                if plane.distance_to_point(view_pos) < 0.0 {
                    continue;
                }
            }
        }

        let passed = match primitive.shape {
            PrimitiveShape::Box(b) => cull_aabb(frustum, b.mins, b.maxs, cull_mask).is_some(),
            PrimitiveShape::Sphere(s) => cull_sphere(frustum, s.center, s.radius, cull_mask).is_some(),
        };
        if !passed {
            continue;
        }

        primitive.vis_pass.set(marker);
        result.primitives.push(primitive_id);
    }
}

/// Full-plane-count mask for a frustum whose side count is `frustum.len()`.
pub fn initial_mask(frustum: &[crate::geometry::Plane]) -> u32 {
    full_mask(frustum.len())
}
