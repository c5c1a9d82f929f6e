//! Per-area raycast: walk one area's surfaces then its primitive links,
//! dispatching to the triangle or bounds-only routines per the active
//! `RaycastMode` (§4.4). Shared by the segment-BSP walk and the portal
//! flood for rays, exactly as `vis::cull::cull_area` is shared by both
//! visibility topologies.

use crate::geometry::Ray;
use crate::world::types::AreaId;
use crate::world::World;

use super::bounds::{raycast_primitive_bounds, raycast_surface_bounds};
use super::filter::RaycastFilter;
use super::primitive::{raycast_primitive_all, raycast_primitive_closest};
use super::result::{AllHitsResult, BoundsResult, ClosestHit};
use super::surface::{raycast_surface_all, raycast_surface_closest};

/// Which result mode a top-level ray query runs in; determines which
/// per-element routine `raycast_area` dispatches to.
pub enum RaycastAccumulator<'a> {
    Closest { closest: f32, out: &'a mut Option<ClosestHit> },
    All(&'a mut AllHitsResult),
    Bounds(&'a mut BoundsResult),
}

impl RaycastAccumulator<'_> {
    /// Current closest-distance horizon used to prune further traversal
    /// (only meaningful in `Closest` mode; the other modes never stop
    /// early since they must collect every intersection).
    pub fn closest_distance(&self) -> f32 {
        match self {
            RaycastAccumulator::Closest { closest, .. } => *closest,
            _ => f32::INFINITY,
        }
    }
}

/// Raycast every surface then every primitive of `area`, updating the
/// accumulator in place.
pub fn raycast_area(world: &World, area: AreaId, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) {
    let area_ref = &world.areas[area.0 as usize];

    for surface_idx in area_ref.surface_range() {
        let surface_id = crate::world::types::SurfaceId(surface_idx);
        let surface = &world.surfaces[surface_idx as usize];
        if surface.vis_mark.get() == marker {
            continue;
        }
        surface.vis_mark.set(marker);

        match acc {
            RaycastAccumulator::Closest { closest, out } => {
                *closest = raycast_surface_closest(world, surface_id, surface, ray, filter, *closest, marker, out);
            }
            RaycastAccumulator::All(out) => raycast_surface_all(world, surface_id, surface, ray, filter, out),
            RaycastAccumulator::Bounds(out) => raycast_surface_bounds(surface_id, surface, ray, filter, out),
        }
    }

    for primitive_id in world.area_primitives(area) {
        let Some(primitive) = world.get_primitive(primitive_id) else { continue };
        if primitive.vis_mark.get() == marker {
            continue;
        }
        primitive.vis_mark.set(marker);

        match acc {
            RaycastAccumulator::Closest { closest, out } => {
                *closest = raycast_primitive_closest(primitive_id, primitive, ray, filter, *closest, out);
            }
            RaycastAccumulator::All(out) => raycast_primitive_all(primitive_id, primitive, ray, filter, out),
            RaycastAccumulator::Bounds(out) => raycast_primitive_bounds(primitive_id, primitive, ray, filter, out),
        }
    }
}
