//! Portal flood for rays (§4.4): recursive area-to-area ray traversal,
//! budgeted to the same stack depth as the visibility flood
//! (`vis::portal_flood::MAX_PORTAL_DEPTH`).

use glam::Vec3;
use log::warn;

use crate::geometry::Ray;
use crate::world::types::AreaId;
use crate::world::World;

use super::area::{raycast_area, RaycastAccumulator};
use super::filter::RaycastFilter;

pub const MAX_PORTAL_DEPTH: usize = crate::vis::portal_flood::MAX_PORTAL_DEPTH;

/// 2-D point-in-convex-polygon test for a point already known to lie in the
/// portal's plane: every consecutive edge must see the point on its left
/// (CCW winding), checked via the edge-cross-vector's sign against the
/// plane normal.
fn point_in_hull(points: &[Vec3], normal: Vec3, p: Vec3) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let edge = b - a;
        let to_point = p - a;
        if edge.cross(to_point).dot(normal) < 0.0 {
            return false;
        }
    }
    true
}

pub fn query(world: &World, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) {
    let start_area = world.find_area(ray.start);
    let overflow_reported = std::cell::Cell::new(false);
    flood(world, start_area, 0, ray, marker, filter, acc, &overflow_reported);
}

#[allow(clippy::too_many_arguments)]
fn flood(
    world: &World,
    area: AreaId,
    depth: usize,
    ray: &Ray,
    marker: u32,
    filter: &RaycastFilter,
    acc: &mut RaycastAccumulator,
    overflow_reported: &std::cell::Cell<bool>,
) {
    if depth >= MAX_PORTAL_DEPTH {
        if !overflow_reported.replace(true) {
            warn!("{}; aborting this branch", crate::error::WorldError::PortalStackOverflow(MAX_PORTAL_DEPTH));
        }
        return;
    }

    raycast_area(world, area, ray, marker, filter, acc);

    let mut cur = world.areas[area.0 as usize].portal_list;
    while let Some(link_id) = cur {
        let link = &world.portal_links[link_id.0 as usize];
        let portal = &world.portals[link.portal.0 as usize];
        cur = link.next;

        if portal.is_blocked() || link.vis_mark.get() == marker {
            continue;
        }

        let d_origin = link.plane.distance_to_point(ray.start);
        if d_origin <= 0.0 {
            continue;
        }
        let d_dir = ray.dir.dot(link.plane.normal);
        if d_dir >= 0.0 {
            continue;
        }

        let t = -d_origin / d_dir;
        if t < 0.0 || t > acc.closest_distance().min(ray.length) {
            continue;
        }

        let hit_point = ray.point_at(t);
        if !point_in_hull(link.hull.points(), link.plane.normal, hit_point) {
            continue;
        }

        link.vis_mark.set(marker);
        flood(world, link.dest_area, depth + 1, ray, marker, filter, acc, overflow_reported);
    }
}
