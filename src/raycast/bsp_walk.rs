//! Segment-BSP walk (§4.4): recursive ray traversal of the BSP tree,
//! splitting the segment at each interior node's plane and visiting the
//! front half before the back half so a closest-mode hit in front can
//! short-circuit the back recursion entirely.

use glam::Vec3;

use crate::geometry::plane::AxialType;
use crate::geometry::{Plane, Ray};
use crate::world::bsp::Terminal;
use crate::world::types::LeafId;
use crate::world::World;

use super::area::{raycast_area, RaycastAccumulator};
use super::filter::RaycastFilter;

fn terminal_of(child: i32) -> Option<Terminal> {
    if child == 0 {
        Some(Terminal::Solid)
    } else if child < 0 {
        Some(Terminal::Leaf(LeafId((-1 - child) as u32)))
    } else {
        None
    }
}

/// Signed distance of a point to `plane`, short-circuiting to a coordinate
/// lookup on axis-aligned planes per §4.4.
fn axial_distance(plane: &Plane, p: Vec3) -> f32 {
    match plane.axial() {
        AxialType::X => p.x * plane.normal.x + plane.dist,
        AxialType::Y => p.y * plane.normal.y + plane.dist,
        AxialType::Z => p.z * plane.normal.z + plane.dist,
        AxialType::NonAxial => plane.distance_to_point(p),
    }
}

pub fn query(world: &World, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) {
    if world.bsp.is_empty() {
        return;
    }
    walk(world, 0, ray.start, ray.end, ray, marker, filter, acc);
}

/// Returns `true` ("stop") when the accumulated closest distance has
/// fallen below the remaining ray length covered by `seg_start..seg_end`,
/// letting the caller skip the sibling recursion entirely.
#[allow(clippy::too_many_arguments)]
fn walk(world: &World, node_idx: usize, seg_start: Vec3, seg_end: Vec3, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) -> bool {
    let node = &world.bsp.nodes[node_idx];
    let plane = &world.planes[node.plane.0 as usize];

    let d1 = axial_distance(plane, seg_start);
    let d2 = axial_distance(plane, seg_end);

    let side = d1 < 0.0;

    if (d2 < 0.0) == side {
        return recurse_child(world, node.children[side as usize], seg_start, seg_end, ray, marker, filter, acc);
    }

    let t = (d1 / (d1 - d2)).clamp(0.0, 1.0);
    let split = seg_start + (seg_end - seg_start) * t;

    if recurse_child(world, node.children[side as usize], seg_start, split, ray, marker, filter, acc) {
        return true;
    }
    recurse_child(world, node.children[!side as usize], split, seg_end, ray, marker, filter, acc)
}

#[allow(clippy::too_many_arguments)]
fn recurse_child(world: &World, child: i32, seg_start: Vec3, seg_end: Vec3, ray: &Ray, marker: u32, filter: &RaycastFilter, acc: &mut RaycastAccumulator) -> bool {
    match terminal_of(child) {
        Some(Terminal::Solid) => false,
        Some(Terminal::Leaf(leaf_id)) => {
            let area = world.leaf_area(leaf_id);
            raycast_area(world, area, ray, marker, filter, acc);
            let start_dist = seg_start.distance(ray.start);
            acc.closest_distance() < start_dist
        }
        None => walk(world, child as usize, seg_start, seg_end, ray, marker, filter, acc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Aabb;
    use crate::raycast::filter::RaycastFilter;
    use crate::raycast::result::ClosestHit;
    use crate::world::level::LevelDef;
    use crate::world::types::AreaId;
    use crate::world::Area;
    use glam::vec3;

    fn single_leaf_world() -> World {
        let def = LevelDef {
            planes: vec![],
            bsp: Default::default(),
            areas: vec![Area {
                aabb: Aabb::new(vec3(-10.0, -10.0, -10.0), vec3(10.0, 10.0, 10.0)),
                first_surface: crate::world::types::SurfaceId(0),
                num_surfaces: 0,
                portal_list: None,
                primitive_list_link: None,
            }],
            portals: vec![],
            surfaces: vec![],
            vertices: vec![],
            indices: vec![],
            pvs: None,
            outdoor_area: AreaId(0),
            max_primitive_links: None,
        };
        World::build(def)
    }

    #[test]
    fn ray_inside_empty_area_hits_nothing() {
        let world = single_leaf_world();
        let ray = Ray::new(vec3(-5.0, 0.0, 0.0), vec3(5.0, 0.0, 0.0)).unwrap();
        let mut out: Option<ClosestHit> = None;
        let filter = RaycastFilter::default();
        let mut acc = RaycastAccumulator::Closest { closest: f32::INFINITY, out: &mut out };
        // No BSP tree present -> bsp_walk::query is a no-op; the portal
        // flood path (exercised in raycast/mod.rs integration tests) is
        // what a real (area-only) world without a tree would use instead.
        query(&world, &ray, 1, &filter, &mut acc);
        assert!(out.is_none());
    }
}
