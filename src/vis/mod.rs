//! Visibility engine (C3): per-frame PVS traversal or portal flood with
//! frustum/scissor narrowing, producing the visible surface/primitive sets.

pub mod cull;
pub mod frustum;
pub mod portal_flood;
pub mod pvs;

use glam::Vec3;

use crate::geometry::Plane;
use crate::world::World;

pub use cull::{VisMasks, VisResult};
pub use frustum::FrustumPlanes;
pub use portal_flood::{Scissor, ViewParams};

/// Five frustum planes in a fixed order: four sides, then far.
#[derive(Clone, Copy, Debug)]
pub struct VisQuery {
    pub view: ViewParams,
    pub frustum: [Plane; 5],
    pub masks: VisMasks,
}

/// Owns the PVS-marking cache for one `World`. Per-query dedup itself is
/// stamped with `World::next_vis_marker`, a single counter shared with
/// `raycast::RayEngine` (§5) — `VisSystem` only caches the marker value its
/// own most recent query used, it never keeps an independent sequence.
pub struct VisSystem {
    last_marker: u32,
    tree_mark: u32,
    last_pvs_cluster: i32,
}

impl Default for VisSystem {
    fn default() -> Self {
        VisSystem { last_marker: 0, tree_mark: 0, last_pvs_cluster: i32::MIN }
    }
}

impl VisSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The marker stamped by the most recently completed query; useful for
    /// tests/debug tooling inspecting `VisMark`/`VisPass` after a query.
    pub fn current_marker(&self) -> u32 {
        self.last_marker
    }

    /// Run one top-level visibility query against `world`, appending to
    /// (not clearing) `result` — callers clear per top-level query as §4.3
    /// specifies, which lets multiple levels share one marker and result.
    pub fn query(&mut self, world: &World, query: &VisQuery, result: &mut VisResult) {
        let marker = world.next_vis_marker();
        self.last_marker = marker;
        let frustum: FrustumPlanes = query.frustum.iter().copied().collect();

        match world.topology() {
            crate::world::Topology::Pvs => self.query_pvs(world, query, &frustum, marker, result),
            crate::world::Topology::Portal => self.query_portal(world, query, frustum, marker, result),
        }
    }

    fn query_pvs(&mut self, world: &World, query: &VisQuery, frustum: &FrustumPlanes, marker: u32, result: &mut VisResult) {
        let Some(leaf) = world.bsp.find_leaf(query.view.position, &world.planes) else {
            return;
        };
        let cluster = world.bsp.leafs[leaf.0 as usize].pvs_cluster;

        if cluster != self.last_pvs_cluster {
            self.tree_mark = self.tree_mark.wrapping_add(1);
            pvs::mark_visible_tree(world, leaf, self.tree_mark);
            self.last_pvs_cluster = cluster;
        }

        pvs::descend_and_cull(world, self.tree_mark, frustum, marker, query.view.position, query.masks, result);
    }

    fn query_portal(&mut self, world: &World, query: &VisQuery, frustum: FrustumPlanes, marker: u32, result: &mut VisResult) {
        portal_flood::query(world, query.view, frustum, marker, query.masks, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Aabb, ConvexHull, Plane as Pl};
    use crate::world::level::{LevelDef, PortalDef};
    use crate::world::types::{AreaId, SurfaceId};
    use crate::world::{Area, World};
    use glam::vec3;

    /// Two unit cubes sharing a portal at x=0, CCW from area A (x<0).
    fn two_cube_world() -> World {
        let hull = ConvexHull::from_slice(&[
            vec3(0.0, -1.0, -1.0),
            vec3(0.0, -1.0, 1.0),
            vec3(0.0, 1.0, 1.0),
            vec3(0.0, 1.0, -1.0),
        ]);

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
                num_surfaces: 0,
                portal_list: None,
                primitive_list_link: None,
            },
        ];

        let def = LevelDef {
            planes: vec![],
            bsp: Default::default(),
            areas,
            portals: vec![PortalDef { area_a: AreaId(0), area_b: AreaId(1), hull }],
            surfaces: vec![],
            pvs: None,
            outdoor_area: AreaId(0),
            max_primitive_links: None,
        };
        World::build(def)
    }

    fn masks() -> VisMasks {
        VisMasks { query_group: u32::MAX, vis_group: u32::MAX }
    }

    fn frustum_facing(forward: Vec3) -> [Pl; 5] {
        // A deliberately permissive 5-plane frustum (everything in front
        // of the viewer passes); only the portal front-face test matters
        // for this scenario.
        let right = if forward.x.abs() < 0.9 { Vec3::X } else { Vec3::Y }.cross(forward).normalize();
        let up = forward.cross(right).normalize();
        [
            Pl::new(right, 100.0),
            Pl::new(-right, 100.0),
            Pl::new(up, 100.0),
            Pl::new(-up, 100.0),
            Pl::new(forward, 100.0),
        ]
    }

    #[test]
    fn blocked_portal_is_never_crossed() {
        let world = two_cube_world();
        world.portals[0].set_blocked(true);
        let mut vis = VisSystem::new();
        let mut result = VisResult::default();

        let view = ViewParams { position: vec3(-0.5, 0.5, 0.5), right: -Vec3::X, up: Vec3::Y, forward: Vec3::X, near_dist: 0.01 };
        let query = VisQuery { view, frustum: frustum_facing(Vec3::X), masks: masks() };
        vis.query(&world, &query, &mut result);

        // A blocked portal is skipped outright regardless of the
        // front-facing test, so neither link is ever stamped.
        let a_to_b = world.portals[0].link_a_to_b;
        assert_ne!(world.portal_links[a_to_b.0 as usize].vis_mark.get(), vis.current_marker());
    }

    #[test]
    fn viewer_in_area_a_crosses_into_area_b() {
        let world = two_cube_world();
        let mut vis = VisSystem::new();
        let mut result = VisResult::default();

        let view = ViewParams { position: vec3(-0.5, 0.5, 0.5), right: -Vec3::X, up: Vec3::Y, forward: Vec3::X, near_dist: 0.01 };
        let query = VisQuery { view, frustum: frustum_facing(Vec3::X), masks: masks() };
        vis.query(&world, &query, &mut result);

        // Area A's own outgoing link has area A in front, so a viewer
        // standing inside A always passes the front-facing test on it.
        let a_to_b = world.portals[0].link_a_to_b;
        assert_eq!(world.portal_links[a_to_b.0 as usize].vis_mark.get(), vis.current_marker());
    }

    #[test]
    fn viewer_in_area_b_crosses_into_area_a() {
        let world = two_cube_world();
        let mut vis = VisSystem::new();
        let mut result = VisResult::default();

        let view = ViewParams { position: vec3(0.5, 0.5, 0.5), right: Vec3::X, up: Vec3::Y, forward: -Vec3::X, near_dist: 0.01 };
        let query = VisQuery { view, frustum: frustum_facing(-Vec3::X), masks: masks() };
        vis.query(&world, &query, &mut result);

        // Symmetric case: area B's own outgoing link has area B in front.
        let b_to_a = world.portals[0].link_b_to_a;
        assert_eq!(world.portal_links[b_to_a.0 as usize].vis_mark.get(), vis.current_marker());
    }
}
