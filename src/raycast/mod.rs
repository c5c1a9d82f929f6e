//! Ray engine (C4): stabbing traversal of the BSP for PVS-topology levels,
//! portal flood for portal-topology levels, triangle/AABB/sphere
//! intersection, and closest/all-hits/bounds-only result aggregation.

pub mod area;
pub mod bounds;
pub mod bsp_walk;
pub mod filter;
pub mod portal_flood;
pub mod primitive;
pub mod result;
pub mod surface;

use crate::geometry::Ray;
use crate::world::{Topology, World};

pub use filter::RaycastFilter;
pub use result::{AllHitsResult, BoundsResult, ClosestHit};

use area::RaycastAccumulator;

/// Caches the marker value its own most recently completed query used. The
/// marker itself comes from `World::next_vis_marker`, the single counter on
/// the visibility level (§5) also driven by `vis::VisSystem` — both systems
/// stamp the same `Surface`/`Primitive` `vis_mark`/`vis_pass` cells, so they
/// must (and do) share one sequence rather than keeping independent ones.
#[derive(Default)]
pub struct RayEngine {
    last_marker: u32,
}

impl RayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closest-hit query (§4.4, §6 "Closest" result record). Returns
    /// `None` for a degenerate ray (length below `EPS_SEGMENT_MIN`) rather
    /// than an error, per §7.
    pub fn raycast_closest(&mut self, world: &World, start: glam::Vec3, end: glam::Vec3, filter: Option<&RaycastFilter>) -> Option<ClosestHit> {
        let ray = Ray::new(start, end)?;
        let marker = world.next_vis_marker();
        self.last_marker = marker;
        let default_filter = RaycastFilter::default();
        let filter = filter.unwrap_or(&default_filter);

        let mut out: Option<ClosestHit> = None;
        let mut acc = RaycastAccumulator::Closest { closest: ray.length, out: &mut out };
        self.dispatch(world, &ray, marker, filter, &mut acc);
        out
    }

    /// All-triangle-hits query (§4.4, §6 "All triangles" result record).
    /// `result` is cleared and repopulated; callers that want a sorted
    /// result should set `filter.sort_by_distance` (or call
    /// `AllHitsResult::sort_by_distance` themselves).
    pub fn raycast_all(&mut self, world: &World, start: glam::Vec3, end: glam::Vec3, filter: Option<&RaycastFilter>, result: &mut AllHitsResult) {
        result.clear();
        let Some(ray) = Ray::new(start, end) else { return };
        let marker = world.next_vis_marker();
        self.last_marker = marker;
        let default_filter = RaycastFilter::default();
        let filter = filter.unwrap_or(&default_filter);

        let mut acc = RaycastAccumulator::All(result);
        self.dispatch(world, &ray, marker, filter, &mut acc);

        if filter.sort_by_distance {
            result.sort_by_distance();
        }
    }

    /// Bounds-only query (§4.4, §6 "Bounds" result record): no triangle
    /// work, just AABB/sphere intersection.
    pub fn raycast_bounds(&mut self, world: &World, start: glam::Vec3, end: glam::Vec3, filter: Option<&RaycastFilter>, result: &mut BoundsResult) {
        result.clear();
        let Some(ray) = Ray::new(start, end) else { return };
        let marker = world.next_vis_marker();
        self.last_marker = marker;
        let default_filter = RaycastFilter::default();
        let filter = filter.unwrap_or(&default_filter);

        let mut acc = RaycastAccumulator::Bounds(result);
        self.dispatch(world, &ray, marker, filter, &mut acc);

        if filter.sort_by_distance {
            result.sort_by_distance();
        }
    }

    fn dispatch(&self, world: &World, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) {
        match world.topology() {
            Topology::Pvs => bsp_walk::query(world, ray, marker, filter, acc),
            Topology::Portal => portal_flood::query(world, ray, marker, filter, acc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Aabb, ConvexHull, Plane};
    use crate::world::level::{LevelDef, PortalDef};
    use crate::world::types::{AreaId, SurfaceId};
    use crate::world::{Area, Surface, SurfaceFlags, World};
    use glam::{vec3, Vec3};

    fn two_cube_world_with_far_wall() -> World {
        // Area A: x in [-1,0]; Area B: x in [0,1], with an opaque surface
        // at x=1 (B's far wall) that a ray from inside A, through the
        // portal, should be able to hit.
        let hull = ConvexHull::from_slice(&[
            vec3(0.0, -1.0, -1.0),
            vec3(0.0, -1.0, 1.0),
            vec3(0.0, 1.0, 1.0),
            vec3(0.0, 1.0, -1.0),
        ]);

        let vertices = vec![vec3(1.0, -1.0, -1.0), vec3(1.0, -1.0, 1.0), vec3(1.0, 1.0, 1.0), vec3(1.0, 1.0, -1.0)];
        let indices = vec![0, 1, 2, 0, 2, 3];

        let surfaces = vec![Surface {
            flags: SurfaceFlags::PLANAR,
            face_plane: Some(Plane::new(-Vec3::X, 1.0)),
            aabb: Aabb::new(vec3(1.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0)),
            query_group: 1,
            vis_group: 1,
            first_vertex: 0,
            num_vertices: 4,
            first_index: 0,
            num_indices: 6,
            material: 0,
            lightmap: None,
            vis_mark: Default::default(),
            vis_pass: Default::default(),
        }];

        let areas = vec![
            Area {
                aabb: Aabb::new(vec3(-1.0, -1.0, -1.0), vec3(0.0, 1.0, 1.0)),
                first_surface: SurfaceId(0),
                num_surfaces: 0,
                portal_list: None,
                primitive_list_link: None,
            },
            Area {
                aabb: Aabb::new(vec3(0.0, -1.0, -1.0), vec3(1.0, 1.0, 1.0)),
                first_surface: SurfaceId(0),
                num_surfaces: 1,
                portal_list: None,
                primitive_list_link: None,
            },
        ];

        let def = LevelDef {
            planes: vec![],
            bsp: Default::default(),
            areas,
            portals: vec![PortalDef { area_a: AreaId(0), area_b: AreaId(1), hull }],
            surfaces,
            vertices,
            indices,
            pvs: None,
            outdoor_area: AreaId(0),
            max_primitive_links: None,
        };
        World::build(def)
    }

    #[test]
    fn ray_crosses_portal_and_hits_far_wall() {
        let world = two_cube_world_with_far_wall();
        let mut engine = RayEngine::new();
        let hit = engine.raycast_closest(&world, vec3(-0.5, 0.0, 0.0), vec3(2.0, 0.0, 0.0), None);
        let hit = hit.expect("ray should cross the portal and hit the far wall");
        assert!((hit.distance - 1.5).abs() < 1e-3);
    }

    #[test]
    fn degenerate_ray_yields_no_hit() {
        let world = two_cube_world_with_far_wall();
        let mut engine = RayEngine::new();
        let hit = engine.raycast_closest(&world, vec3(0.0, 0.0, 0.0), vec3(0.0, 0.0, 0.0), None);
        assert!(hit.is_none());
    }
}
