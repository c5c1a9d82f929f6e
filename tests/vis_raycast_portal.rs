//! Cross-module integration test: a portal-topology world queried through
//! both the visibility engine and the ray engine, confirming the two
//! traversals agree on what's reachable through the same portal and never
//! stomp each other's dedup marker (§5's shared vis-query marker).

use glam::{vec3, Vec3};
use worldcore::geometry::{Aabb, ConvexHull, Plane};
use worldcore::raycast::RayEngine;
use worldcore::vis::{VisMasks, VisQuery, VisResult, VisSystem, ViewParams};
use worldcore::world::level::{LevelDef, PortalDef};
use worldcore::world::types::{AreaId, SurfaceId};
use worldcore::world::{Area, Surface, SurfaceFlags, World};

/// Two unit cubes sharing a portal at x=0, with an opaque far wall closing
/// off area B at x=1.
fn two_cube_world() -> World {
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

fn permissive_frustum(forward: Vec3) -> [Plane; 5] {
    let right = if forward.x.abs() < 0.9 { Vec3::X } else { Vec3::Y }.cross(forward).normalize();
    let up = forward.cross(right).normalize();
    [
        Plane::new(right, 100.0),
        Plane::new(-right, 100.0),
        Plane::new(up, 100.0),
        Plane::new(-up, 100.0),
        Plane::new(forward, 100.0),
    ]
}

fn masks() -> VisMasks {
    VisMasks { query_group: u32::MAX, vis_group: u32::MAX }
}

/// A viewer inside area A sees area B's far wall through the portal, and a
/// ray cast along the same line of sight hits that same surface — both
/// traversals agree on what's visible across the portal boundary.
#[test]
fn vis_and_raycast_agree_across_an_open_portal() {
    let world = two_cube_world();

    let mut vis = VisSystem::new();
    let mut result = VisResult::default();
    let view = ViewParams { position: vec3(-0.5, 0.0, 0.0), right: -Vec3::X, up: Vec3::Y, forward: Vec3::X, near_dist: 0.01 };
    let query = VisQuery { view, frustum: permissive_frustum(Vec3::X), masks: masks() };
    vis.query(&world, &query, &mut result);

    assert_eq!(result.surfaces, vec![SurfaceId(0)], "area B's far wall must be in the visible set");

    let mut ray = RayEngine::new();
    let hit = ray.raycast_closest(&world, vec3(-0.5, 0.0, 0.0), vec3(2.0, 0.0, 0.0), None);
    let hit = hit.expect("ray should cross the open portal and hit the far wall");
    assert!((hit.distance - 1.5).abs() < 1e-3);
}

/// Blocking the portal hides area B from both visibility and raycasting,
/// using the same shared vis-query marker for each traversal.
#[test]
fn blocking_the_portal_hides_the_far_wall_from_both_systems() {
    let world = two_cube_world();
    world.portals[0].set_blocked(true);

    let mut vis = VisSystem::new();
    let mut result = VisResult::default();
    let view = ViewParams { position: vec3(-0.5, 0.0, 0.0), right: -Vec3::X, up: Vec3::Y, forward: Vec3::X, near_dist: 0.01 };
    let query = VisQuery { view, frustum: permissive_frustum(Vec3::X), masks: masks() };
    vis.query(&world, &query, &mut result);

    assert!(result.surfaces.is_empty(), "a blocked portal must not leak area B's surfaces into the visible set");

    let mut ray = RayEngine::new();
    let hit = ray.raycast_closest(&world, vec3(-0.5, 0.0, 0.0), vec3(2.0, 0.0, 0.0), None);
    assert!(hit.is_none(), "a blocked portal must not let a ray continue into area B either");
}

/// Interleaving a ray query and a vis query against the same world must not
/// let one system's marker stamp spuriously satisfy the other's dedup check
/// — each call advances the one shared counter exactly once (§5).
#[test]
fn interleaved_queries_share_one_marker_without_colliding() {
    let world = two_cube_world();

    let mut ray = RayEngine::new();
    ray.raycast_closest(&world, vec3(-0.5, 0.0, 0.0), vec3(2.0, 0.0, 0.0), None);

    let mut vis = VisSystem::new();
    let mut result = VisResult::default();
    let view = ViewParams { position: vec3(-0.5, 0.0, 0.0), right: -Vec3::X, up: Vec3::Y, forward: Vec3::X, near_dist: 0.01 };
    let query = VisQuery { view, frustum: permissive_frustum(Vec3::X), masks: masks() };
    vis.query(&world, &query, &mut result);

    assert_eq!(result.surfaces, vec![SurfaceId(0)], "a prior raycast must not cause the vis query to drop a surface it hasn't actually visited yet");
    assert!(vis.current_marker() > 0);
}
