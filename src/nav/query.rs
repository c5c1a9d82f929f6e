//! NavMesh query operations (§4.6): nearest-poly lookups, path corridor
//! search, straight-path string-pulling, wall distance, and height sampling
//! against a built `NavMesh`. Scratch sets are capped at `MAX_QUERY_POLYS`.

use std::collections::{BinaryHeap, HashMap};

use bitflags::bitflags;
use glam::Vec3;

use super::tile::{NavMesh, PolyRef};

pub const MAX_QUERY_POLYS: usize = 2048;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StraightPathFlags: u8 {
        const START = 0x01;
        const END = 0x02;
        const OFFMESH_CONNECTION = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingMode {
    None,
    PerAreaChange,
    PerEdge,
}

/// Area-type inclusion mask plus per-area traversal cost multiplier, both
/// indexed by the 0..63 area type (§4.5 area painting).
#[derive(Clone, Debug)]
pub struct QueryFilter {
    pub include_areas: u64,
    pub area_cost: [f32; 64],
}

impl Default for QueryFilter {
    fn default() -> Self {
        QueryFilter { include_areas: u64::MAX, area_cost: [1.0; 64] }
    }
}

impl QueryFilter {
    pub fn passes(&self, area: u8) -> bool {
        area != 0 && self.include_areas & (1 << (area & 63)) != 0
    }

    pub fn cost(&self, area: u8) -> f32 {
        self.area_cost[(area & 63) as usize].max(0.01)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StraightPathVertex {
    pub pos: Vec3,
    pub flags: StraightPathFlags,
    pub poly: Option<PolyRef>,
}

pub struct NavMeshQuery<'a> {
    navmesh: &'a NavMesh,
}

impl<'a> NavMeshQuery<'a> {
    pub fn new(navmesh: &'a NavMesh) -> Self {
        NavMeshQuery { navmesh }
    }

    fn poly_area(&self, r: PolyRef) -> Option<u8> {
        self.navmesh.tiles.get(&(r.tile_x, r.tile_z)).and_then(|t| t.areas.get(r.poly_index as usize)).copied()
    }

    fn poly_verts(&self, r: PolyRef) -> Option<Vec<Vec3>> {
        self.navmesh.poly_vertices(r)
    }

    fn poly_center(&self, r: PolyRef) -> Option<Vec3> {
        let verts = self.poly_verts(r)?;
        Some(verts.iter().copied().sum::<Vec3>() / verts.len() as f32)
    }

    fn poly_neighbours(&self, r: PolyRef) -> Vec<PolyRef> {
        let Some(tile) = self.navmesh.tiles.get(&(r.tile_x, r.tile_z)) else { return Vec::new() };
        tile.neighbours[r.poly_index as usize].iter().filter_map(|n| *n).collect()
    }

    fn all_polys(&self) -> impl Iterator<Item = PolyRef> + '_ {
        self.navmesh.tiles.values().flat_map(|t| (0..t.polys.len()).map(move |i| PolyRef { tile_x: t.tx, tile_z: t.tz, poly_index: i as u16 }))
    }

    /// Nearest polygon whose centroid falls within `extents` of `p`
    /// (§4.6 `QueryNearestPoly`).
    pub fn query_nearest_poly(&self, p: Vec3, extents: Vec3, filter: &QueryFilter) -> Option<PolyRef> {
        let mut best = None;
        let mut best_dist = f32::MAX;

        for r in self.all_polys() {
            let Some(area) = self.poly_area(r) else { continue };
            if !filter.passes(area) {
                continue;
            }
            let Some(center) = self.poly_center(r) else { continue };
            if (center.x - p.x).abs() > extents.x || (center.y - p.y).abs() > extents.y || (center.z - p.z).abs() > extents.z {
                continue;
            }
            let dist = center.distance_squared(p);
            if dist < best_dist {
                best_dist = dist;
                best = Some(r);
            }
        }
        best
    }

    /// Same as `query_nearest_poly`, plus the point projected onto that
    /// polygon (§4.6 `QueryNearestPoint`).
    pub fn query_nearest_point(&self, p: Vec3, extents: Vec3, filter: &QueryFilter) -> Option<(PolyRef, Vec3)> {
        let r = self.query_nearest_poly(p, extents, filter)?;
        let (proj, _) = self.query_closest_point_on_poly(r, p)?;
        Some((r, proj))
    }

    /// Projects `p` onto the polygon's plane, clamping into the polygon if
    /// `p`'s projection falls outside (§4.6 `QueryClosestPointOnPoly`).
    pub fn query_closest_point_on_poly(&self, r: PolyRef, p: Vec3) -> Option<(Vec3, bool)> {
        let verts = self.poly_verts(r)?;
        if point_in_polygon_xz(&verts, p.x, p.z) {
            let y = interpolate_height(&verts, p.x, p.z);
            return Some((Vec3::new(p.x, y, p.z), true));
        }
        Some((closest_point_on_boundary(&verts, p), false))
    }

    /// Forces the projection onto the polygon's edge even if `p` projects
    /// inside (§4.6 `QueryClosestPointOnPolyBoundary`).
    pub fn query_closest_point_on_poly_boundary(&self, r: PolyRef, p: Vec3) -> Option<Vec3> {
        let verts = self.poly_verts(r)?;
        Some(closest_point_on_boundary(&verts, p))
    }

    /// Uniformly area-weighted random polygon and point within it (§4.6
    /// `QueryRandomPoint`). `rng_state` is a caller-owned xorshift64 seed,
    /// since the crate carries no general-purpose RNG dependency.
    pub fn query_random_point(&self, filter: &QueryFilter, rng_state: &mut u64) -> Option<(PolyRef, Vec3)> {
        let candidates: Vec<(PolyRef, f32)> =
            self.all_polys().filter_map(|r| self.poly_area(r).filter(|a| filter.passes(*a)).and(self.poly_xz_area(r)).map(|area| (r, area))).collect();
        pick_weighted(&candidates, rng_state).map(|r| (r, self.random_point_in_poly(r, rng_state).unwrap_or_default()))
    }

    /// Same as `query_random_point`, restricted to polygons reachable from
    /// `start` within `radius` graph hops scaled by poly size (§4.6
    /// `QueryRandomPointAroundCircle`).
    pub fn query_random_point_around_circle(&self, start: PolyRef, radius: f32, filter: &QueryFilter, rng_state: &mut u64) -> Option<(PolyRef, Vec3)> {
        let Some(origin) = self.poly_center(start) else { return None };
        let reachable = self.reachable_within(start, radius, filter);
        let candidates: Vec<(PolyRef, f32)> = reachable
            .into_iter()
            .filter_map(|r| {
                let center = self.poly_center(r)?;
                if center.distance(origin) > radius {
                    return None;
                }
                self.poly_xz_area(r).map(|area| (r, area))
            })
            .collect();
        pick_weighted(&candidates, rng_state).map(|r| (r, self.random_point_in_poly(r, rng_state).unwrap_or_default()))
    }

    fn poly_xz_area(&self, r: PolyRef) -> Option<f32> {
        let verts = self.poly_verts(r)?;
        let mut area = 0.0;
        for i in 0..verts.len() {
            let a = verts[i];
            let b = verts[(i + 1) % verts.len()];
            area += a.x * b.z - b.x * a.z;
        }
        Some((area * 0.5).abs())
    }

    fn random_point_in_poly(&self, r: PolyRef, rng_state: &mut u64) -> Option<Vec3> {
        let verts = self.poly_verts(r)?;
        // Fan-triangulate from vertex 0 and sample a random triangle
        // weighted by area, then a random barycentric point inside it.
        let tris: Vec<(Vec3, Vec3, Vec3)> = (1..verts.len() - 1).map(|i| (verts[0], verts[i], verts[i + 1])).collect();
        let weights: Vec<(usize, f32)> = tris.iter().enumerate().map(|(i, (a, b, c))| (i, ((*b - *a).cross(*c - *a)).length() * 0.5)).collect();
        let idx = pick_weighted(&weights, rng_state)?;
        let (a, b, c) = tris[idx];
        let mut u = next_rand(rng_state);
        let mut v = next_rand(rng_state);
        if u + v > 1.0 {
            u = 1.0 - u;
            v = 1.0 - v;
        }
        Some(a + (b - a) * u + (c - a) * v)
    }

    fn reachable_within(&self, start: PolyRef, radius: f32, filter: &QueryFilter) -> Vec<PolyRef> {
        let Some(origin) = self.poly_center(start) else { return Vec::new() };
        let mut visited = vec![start];
        let mut frontier = vec![start];
        while let Some(cur) = frontier.pop() {
            for next in self.poly_neighbours(cur) {
                if visited.contains(&next) || visited.len() >= MAX_QUERY_POLYS {
                    continue;
                }
                let Some(area) = self.poly_area(next) else { continue };
                if !filter.passes(area) {
                    continue;
                }
                let Some(center) = self.poly_center(next) else { continue };
                if center.distance(origin) > radius {
                    continue;
                }
                visited.push(next);
                frontier.push(next);
            }
        }
        visited
    }

    /// Slides from `start` toward `dest`, stepping through neighbouring
    /// polygons and stopping at the first boundary the filter disallows
    /// crossing (§4.6 `MoveAlongSurface`).
    pub fn move_along_surface(&self, start: PolyRef, dest: Vec3, filter: &QueryFilter, max_visited: usize) -> (Vec3, Vec<PolyRef>) {
        let mut visited = vec![start];
        let mut current = start;
        let mut pos = self.poly_center(start).unwrap_or(dest);

        loop {
            if visited.len() >= max_visited.min(MAX_QUERY_POLYS) {
                break;
            }
            let Some((proj, inside)) = self.query_closest_point_on_poly(current, dest) else { break };
            if inside {
                pos = proj;
                break;
            }
            pos = proj;

            let mut stepped = false;
            for next in self.poly_neighbours(current) {
                let Some(area) = self.poly_area(next) else { continue };
                if !filter.passes(area) {
                    continue;
                }
                let Some(center) = self.poly_center(next) else { continue };
                if center.distance(dest) < self.poly_center(current).map(|c| c.distance(dest)).unwrap_or(f32::MAX) {
                    current = next;
                    visited.push(current);
                    stepped = true;
                    break;
                }
            }
            if !stepped {
                break;
            }
        }

        (pos, visited)
    }

    /// A*-style polygon path search with per-area traversal cost (§4.6
    /// `FindPath`).
    pub fn find_path(&self, start: PolyRef, end: PolyRef, filter: &QueryFilter) -> Vec<PolyRef> {
        if start == end {
            return vec![start];
        }

        let Some(goal_pos) = self.poly_center(end) else { return Vec::new() };

        let mut open = BinaryHeap::new();
        let mut came_from: HashMap<PolyRef, PolyRef> = HashMap::new();
        let mut g_score: HashMap<PolyRef, f32> = HashMap::new();

        g_score.insert(start, 0.0);
        open.push(AStarNode { poly: start, f_score: heuristic(self, start, goal_pos) });

        let mut visited_count = 0usize;

        while let Some(AStarNode { poly: current, .. }) = open.pop() {
            if current == end {
                return reconstruct_path(&came_from, current);
            }
            visited_count += 1;
            if visited_count > MAX_QUERY_POLYS {
                break;
            }

            let current_g = *g_score.get(&current).unwrap_or(&f32::MAX);
            let Some(current_center) = self.poly_center(current) else { continue };

            for next in self.poly_neighbours(current) {
                let Some(area) = self.poly_area(next) else { continue };
                if !filter.passes(area) {
                    continue;
                }
                let Some(next_center) = self.poly_center(next) else { continue };
                let step_cost = current_center.distance(next_center) * filter.cost(area);
                let tentative_g = current_g + step_cost;

                if tentative_g < *g_score.get(&next).unwrap_or(&f32::MAX) {
                    came_from.insert(next, current);
                    g_score.insert(next, tentative_g);
                    open.push(AStarNode { poly: next, f_score: tentative_g + heuristic(self, next, goal_pos) });
                }
            }
        }

        Vec::new()
    }

    /// Resolves nearest polygons for `start_pos`/`end_pos`, runs `find_path`
    /// between them, and if the search falls short of `end_ref` re-projects
    /// `end_pos` onto whatever polygon the path actually ends on, so the
    /// result is always a valid `find_straight_path` endpoint.
    pub fn find_path_points(&self, start_pos: Vec3, end_pos: Vec3, extents: Vec3, filter: &QueryFilter) -> Option<(Vec<PolyRef>, Vec3)> {
        let start_ref = self.query_nearest_poly(start_pos, extents, filter)?;
        let end_ref = self.query_nearest_poly(end_pos, extents, filter)?;
        let path = self.find_path(start_ref, end_ref, filter);
        let last = *path.last()?;
        let end_pos = if last == end_ref { end_pos } else { self.query_closest_point_on_poly(last, end_pos)?.0 };
        Some((path, end_pos))
    }

    /// Funnel-algorithm string-pulling of a polygon corridor into
    /// world-space waypoints (§4.6 `FindStraightPath`).
    pub fn find_straight_path(&self, start: Vec3, end: Vec3, path: &[PolyRef], crossing: CrossingMode) -> Vec<StraightPathVertex> {
        if path.is_empty() {
            return Vec::new();
        }

        let mut result = vec![StraightPathVertex { pos: start, flags: StraightPathFlags::START, poly: Some(path[0]) }];

        if path.len() == 1 {
            result.push(StraightPathVertex { pos: end, flags: StraightPathFlags::END, poly: Some(path[0]) });
            return result;
        }

        let mut portal_apex = start;
        let mut portal_left = start;
        let mut portal_right = start;
        let mut left_index = 0usize;
        let mut right_index = 0usize;
        let mut apex_index = 0usize;

        let mut portals: Vec<(Vec3, Vec3)> = Vec::with_capacity(path.len());
        for i in 0..path.len() - 1 {
            let Some((l, r)) = self.shared_edge(path[i], path[i + 1]) else { break };
            portals.push((l, r));
        }
        portals.push((end, end));

        let mut i = 0;
        while i < portals.len() {
            let (left, right) = portals[i];
            if triangle_area_xz(portal_apex, portal_right, right) <= 0.0 {
                if portal_apex == portal_right || triangle_area_xz(portal_apex, portal_left, right) > 0.0 {
                    portal_right = right;
                    right_index = i;
                } else {
                    push_straight_vertex(&mut result, portal_left, &path, apex_index, left_index, crossing);
                    portal_apex = portal_left;
                    apex_index = left_index;
                    portal_left = portal_apex;
                    portal_right = portal_apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index;
                    i += 1;
                    continue;
                }
            }
            if triangle_area_xz(portal_apex, portal_left, left) >= 0.0 {
                if portal_apex == portal_left || triangle_area_xz(portal_apex, portal_right, left) < 0.0 {
                    portal_left = left;
                    left_index = i;
                } else {
                    push_straight_vertex(&mut result, portal_right, &path, apex_index, right_index, crossing);
                    portal_apex = portal_right;
                    apex_index = right_index;
                    portal_left = portal_apex;
                    portal_right = portal_apex;
                    left_index = apex_index;
                    right_index = apex_index;
                    i = apex_index;
                    i += 1;
                    continue;
                }
            }
            i += 1;
        }

        result.push(StraightPathVertex { pos: end, flags: StraightPathFlags::END, poly: path.last().copied() });
        result
    }

    fn shared_edge(&self, a: PolyRef, b: PolyRef) -> Option<(Vec3, Vec3)> {
        let a_verts = self.poly_verts(a)?;
        let b_verts = self.poly_verts(b)?;
        for i in 0..a_verts.len() {
            let a0 = a_verts[i];
            let a1 = a_verts[(i + 1) % a_verts.len()];
            for j in 0..b_verts.len() {
                let b0 = b_verts[j];
                let b1 = b_verts[(j + 1) % b_verts.len()];
                if a0.distance(b1) < 1e-3 && a1.distance(b0) < 1e-3 {
                    return Some((a1, a0));
                }
            }
        }
        None
    }

    /// Radial BFS from `r` out to `radius`, reporting the closest
    /// unconnected edge as the nearest wall (§4.6 `CalcDistanceToWall`).
    pub fn calc_distance_to_wall(&self, r: PolyRef, radius: f32, filter: &QueryFilter) -> (f32, Vec3, Vec3) {
        let Some(origin) = self.poly_center(r) else { return (0.0, Vec3::ZERO, Vec3::ZERO) };
        let mut best_dist = f32::MAX;
        let mut best_hit = origin;
        let mut best_normal = Vec3::ZERO;

        for poly in self.reachable_within(r, radius, filter) {
            let Some(verts) = self.poly_verts(poly) else { continue };
            let Some(tile) = self.navmesh.tiles.get(&(poly.tile_x, poly.tile_z)) else { continue };
            for edge in 0..verts.len() {
                if tile.neighbours[poly.poly_index as usize][edge].is_some() {
                    continue;
                }
                let a = verts[edge];
                let b = verts[(edge + 1) % verts.len()];
                let hit = closest_point_on_segment(origin, a, b);
                let dist = hit.distance(origin);
                if dist < best_dist {
                    best_dist = dist;
                    best_hit = hit;
                    let edge_dir = (b - a).normalize_or_zero();
                    best_normal = Vec3::new(edge_dir.z, 0.0, -edge_dir.x);
                }
            }
        }

        (best_dist.min(radius), best_hit, best_normal)
    }

    /// Barycentric height sample from the polygon's detail mesh (§4.6
    /// `GetHeight`).
    pub fn get_height(&self, r: PolyRef, p: Vec3) -> Option<f32> {
        let tile = self.navmesh.tiles.get(&(r.tile_x, r.tile_z))?;
        let &(vert_base, _, tri_base, tri_count) = tile.detail.meshes.get(r.poly_index as usize)?;
        for i in 0..tri_count {
            let t = tile.detail.tris[(tri_base + i) as usize];
            let (a, b, c) = (tile.detail.verts[t[0] as usize], tile.detail.verts[t[1] as usize], tile.detail.verts[t[2] as usize]);
            if let Some((u, v, w)) = barycentric_xz(p, a, b, c) {
                let _ = vert_base;
                return Some(u * a.y + v * b.y + w * c.y);
            }
        }
        self.poly_center(r).map(|c| c.y)
    }

    /// Endpoints of a teleport-style off-mesh link between two adjacent
    /// polygons. This crate does not model off-mesh connections as a
    /// distinct link table, so the endpoints are each polygon's own
    /// closest point to the other's centroid.
    pub fn get_off_mesh_connection_poly_end_points(&self, prev: PolyRef, r: PolyRef) -> Option<(Vec3, Vec3)> {
        let other_center = self.poly_center(r)?;
        let (start, _) = self.query_closest_point_on_poly(prev, other_center)?;
        let prev_center = self.poly_center(prev)?;
        let (end, _) = self.query_closest_point_on_poly(r, prev_center)?;
        Some((start, end))
    }

    /// Casts a ray across the mesh surface, returning the travelled
    /// fraction and the normal of the boundary it stopped at, or
    /// `fraction = ∞` if it reached `end` unobstructed (§4.6 `CastRay`).
    pub fn cast_ray(&self, start: Vec3, end: Vec3, extents: Vec3, filter: &QueryFilter) -> (f32, Vec3) {
        let Some(mut current) = self.query_nearest_poly(start, extents, filter) else { return (0.0, Vec3::ZERO) };
        let total_len = start.distance(end);
        if total_len < 1e-6 {
            return (f32::INFINITY, Vec3::ZERO);
        }

        let mut traveled = 0.0f32;
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > MAX_QUERY_POLYS {
                break;
            }
            let Some(verts) = self.poly_verts(current) else { break };
            if point_in_polygon_xz(&verts, end.x, end.z) {
                return (f32::INFINITY, Vec3::ZERO);
            }

            let Some(tile) = self.navmesh.tiles.get(&(current.tile_x, current.tile_z)) else { break };
            let mut crossed = None;
            for edge in 0..verts.len() {
                let a = verts[edge];
                let b = verts[(edge + 1) % verts.len()];
                if let Some(t) = segment_crosses_xz(start, end, a, b) {
                    if t >= traveled {
                        crossed = Some((t, edge, tile.neighbours[current.poly_index as usize][edge]));
                    }
                }
            }

            let Some((t, edge, neighbour)) = crossed else { break };
            match neighbour {
                Some(next) if self.poly_area(next).is_some_and(|a| filter.passes(a)) => {
                    current = next;
                    traveled = t;
                }
                _ => {
                    let a = verts[edge];
                    let b = verts[(edge + 1) % verts.len()];
                    let dir = (b - a).normalize_or_zero();
                    return (t, Vec3::new(dir.z, 0.0, -dir.x));
                }
            }
        }

        (traveled, Vec3::ZERO)
    }
}

#[derive(PartialEq)]
struct AStarNode {
    poly: PolyRef,
    f_score: f32,
}

impl Eq for AStarNode {}
impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.f_score.total_cmp(&self.f_score)
    }
}
impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(query: &NavMeshQuery, from: PolyRef, goal_pos: Vec3) -> f32 {
    query.poly_center(from).map(|c| c.distance(goal_pos)).unwrap_or(0.0)
}

fn reconstruct_path(came_from: &HashMap<PolyRef, PolyRef>, mut current: PolyRef) -> Vec<PolyRef> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

fn point_in_polygon_xz(points: &[Vec3], x: f32, z: f32) -> bool {
    let mut inside = false;
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + n - 1) % n];
        if (a.z > z) != (b.z > z) {
            let x_cross = a.x + (z - a.z) / (b.z - a.z) * (b.x - a.x);
            if x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn interpolate_height(verts: &[Vec3], x: f32, z: f32) -> f32 {
    for i in 1..verts.len() - 1 {
        if let Some((u, v, w)) = barycentric_xz(Vec3::new(x, 0.0, z), verts[0], verts[i], verts[i + 1]) {
            return u * verts[0].y + v * verts[i].y + w * verts[i + 1].y;
        }
    }
    verts.iter().map(|v| v.y).sum::<f32>() / verts.len() as f32
}

fn barycentric_xz(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    let v0 = (b.x - a.x, b.z - a.z);
    let v1 = (c.x - a.x, c.z - a.z);
    let v2 = (p.x - a.x, p.z - a.z);
    let den = v0.0 * v1.1 - v1.0 * v0.1;
    if den.abs() < 1e-9 {
        return None;
    }
    let v = (v2.0 * v1.1 - v1.0 * v2.1) / den;
    let w = (v0.0 * v2.1 - v2.0 * v0.1) / den;
    let u = 1.0 - v - w;
    if u >= -1e-4 && v >= -1e-4 && w >= -1e-4 {
        Some((u, v, w))
    } else {
        None
    }
}

fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-9 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

fn closest_point_on_boundary(verts: &[Vec3], p: Vec3) -> Vec3 {
    let mut best = verts[0];
    let mut best_dist = f32::MAX;
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        let candidate = closest_point_on_segment(p, a, b);
        let dist = candidate.distance_squared(p);
        if dist < best_dist {
            best_dist = dist;
            best = candidate;
        }
    }
    best
}

fn triangle_area_xz(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)
}

fn segment_crosses_xz(p0: Vec3, p1: Vec3, a: Vec3, b: Vec3) -> Option<f32> {
    let d1 = (p1.x - p0.x, p1.z - p0.z);
    let d2 = (b.x - a.x, b.z - a.z);
    let denom = d1.0 * d2.1 - d1.1 * d2.0;
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = ((a.x - p0.x) * d2.1 - (a.z - p0.z) * d2.0) / denom;
    let u = ((a.x - p0.x) * d1.1 - (a.z - p0.z) * d1.0) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

/// Pushes a required corner of the funnel. `crossing` only gates whether the
/// vertex also carries `OFFMESH_CONNECTION`-style area-change tagging; the
/// corner itself is always geometrically necessary and always emitted.
fn push_straight_vertex(result: &mut Vec<StraightPathVertex>, pos: Vec3, path: &[PolyRef], from_idx: usize, to_idx: usize, crossing: CrossingMode) {
    let area_changed = crossing == CrossingMode::PerAreaChange && path.get(from_idx) != path.get(to_idx);
    let flags = if area_changed || crossing == CrossingMode::PerEdge { StraightPathFlags::OFFMESH_CONNECTION } else { StraightPathFlags::empty() };
    result.push(StraightPathVertex { pos, flags, poly: path.get(to_idx).copied() });
}

fn next_rand(state: &mut u64) -> f32 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    ((*state >> 11) as f32) / ((1u64 << 53) as f32)
}

fn pick_weighted<T: Copy>(items: &[(T, f32)], rng_state: &mut u64) -> Option<T> {
    let total: f32 = items.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut target = next_rand(rng_state) * total;
    for &(item, weight) in items {
        if target < weight {
            return Some(item);
        }
        target -= weight;
    }
    items.last().map(|(item, _)| *item)
}
