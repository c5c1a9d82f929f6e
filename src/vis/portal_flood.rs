//! Portal-topology visibility flood: recursive area-to-area traversal that
//! narrows frustum and scissor through each traversed portal aperture
//! (§4.3). Budgeted to a fixed stack depth (128) exactly like the ray
//! engine's portal flood (`raycast::portal_flood`).

use glam::{Vec2, Vec3};
use log::warn;

use crate::geometry::clip::{clip_polygon_fast, ClipBuffer, ClipScratch, MAX_HULL_POINTS};
use crate::geometry::Plane;
use crate::world::types::AreaId;
use crate::world::World;

use super::cull::{cull_area, initial_mask, VisMasks, VisResult};
use super::frustum::FrustumPlanes;

/// Portal stack depth budget (§5 structural budget enforcement).
pub const MAX_PORTAL_DEPTH: usize = 128;

#[derive(Clone, Copy, Debug)]
pub struct ViewParams {
    pub position: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
    pub near_dist: f32,
}

/// Axis-aligned 2-D rectangle in view-right/up coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Scissor {
    pub min: Vec2,
    pub max: Vec2,
}

impl Scissor {
    pub fn full() -> Scissor {
        Scissor { min: Vec2::splat(f32::MIN / 2.0), max: Vec2::splat(f32::MAX / 2.0) }
    }

    fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    fn intersect(&self, other: &Scissor) -> Scissor {
        Scissor { min: self.min.max(other.min), max: self.max.min(other.max) }
    }
}

fn project_to_view_plane(view: &ViewParams, p: Vec3) -> Vec2 {
    let rel = p - view.position;
    let depth = rel.dot(view.forward);
    let scale = if depth.abs() > 1e-6 { view.near_dist / depth } else { 1.0 };
    let proj = rel * scale;
    Vec2::new(proj.dot(view.right), proj.dot(view.up))
}

fn unproject_from_view_plane(view: &ViewParams, xy: Vec2) -> Vec3 {
    view.position + view.forward * view.near_dist + view.right * xy.x + view.up * xy.y
}

fn scissor_of(view: &ViewParams, points: &[Vec3], parent: &Scissor) -> Scissor {
    let mut s = Scissor { min: Vec2::splat(f32::MAX), max: Vec2::splat(f32::MIN) };
    for &p in points {
        let xy = project_to_view_plane(view, p);
        s.min = s.min.min(xy);
        s.max = s.max.max(xy);
    }
    s.intersect(parent)
}

/// Build the outgoing frustum for a clipped portal hull: one plane per
/// hull edge (CCW `{view, v_i, v_{i+1}}`) when the hull has <=4 vertices,
/// else the four scissor-corner planes; the parent's far plane is always
/// appended last.
fn outgoing_frustum(view: &ViewParams, hull_points: &[Vec3], scissor: &Scissor, parent_far: Plane) -> FrustumPlanes {
    let mut frustum = FrustumPlanes::new();

    if hull_points.len() <= 4 {
        let n = hull_points.len();
        for i in 0..n {
            let a = hull_points[i];
            let b = hull_points[(i + 1) % n];
            frustum.push(Plane::from_points(view.position, a, b));
        }
    } else {
        let corners = [
            unproject_from_view_plane(view, Vec2::new(scissor.min.x, scissor.min.y)),
            unproject_from_view_plane(view, Vec2::new(scissor.max.x, scissor.min.y)),
            unproject_from_view_plane(view, Vec2::new(scissor.max.x, scissor.max.y)),
            unproject_from_view_plane(view, Vec2::new(scissor.min.x, scissor.max.y)),
        ];
        for i in 0..4 {
            frustum.push(Plane::from_points(view.position, corners[i], corners[(i + 1) % 4]));
        }
    }

    frustum.push(parent_far);
    frustum
}

struct FloodCtx<'a> {
    world: &'a World,
    view: ViewParams,
    marker: u32,
    masks: VisMasks,
    overflow_reported: std::cell::Cell<bool>,
}

/// Entry point: find the view's area and flood from it.
pub fn query(world: &World, view: ViewParams, initial_frustum: FrustumPlanes, marker: u32, masks: VisMasks, result: &mut VisResult) {
    let start_area = world.find_area(view.position);
    let ctx = FloodCtx { world, view, marker, masks, overflow_reported: std::cell::Cell::new(false) };
    let scissor = Scissor::full();
    flood(&ctx, start_area, 0, &initial_frustum, scissor, result);
}

fn flood(ctx: &FloodCtx, area: AreaId, depth: usize, frustum: &FrustumPlanes, scissor: Scissor, result: &mut VisResult) {
    if depth >= MAX_PORTAL_DEPTH {
        if !ctx.overflow_reported.replace(true) {
            warn!("{}; aborting this branch", crate::error::WorldError::PortalStackOverflow(MAX_PORTAL_DEPTH));
        }
        return;
    }

    let mask = initial_mask(frustum);
    cull_area(ctx.world, area, frustum, mask, ctx.marker, ctx.view.position, ctx.masks, result);

    let mut scratch = ClipScratch::default();
    let mut clip_a = ClipBuffer::default();
    let mut clip_b = ClipBuffer::default();

    let mut cur = ctx.world.areas[area.0 as usize].portal_list;
    while let Some(link_id) = cur {
        let link = &ctx.world.portal_links[link_id.0 as usize];
        let portal = &ctx.world.portals[link.portal.0 as usize];
        cur = link.next;

        if portal.is_blocked() {
            continue;
        }
        if link.vis_mark.get() == ctx.marker {
            continue;
        }

        let dist = link.plane.distance_to_point(ctx.view.position);
        if dist <= 0.0 {
            continue;
        }

        let (new_frustum, new_scissor) = if dist <= ctx.view.near_dist {
            (frustum.clone(), scissor)
        } else {
            let hull_points = link.hull.points();
            if hull_points.len() + 4 > MAX_HULL_POINTS {
                continue;
            }

            clip_a.copy_from(hull_points);
            let near_plane = Plane::new(ctx.view.forward, -(ctx.view.forward.dot(ctx.view.position) + ctx.view.near_dist));

            if clip_polygon_fast(&mut scratch, clip_a.as_slice(), &mut clip_b, &near_plane, crate::geometry::epsilon::EPS_PLANE).is_some() {
                std::mem::swap(&mut clip_a, &mut clip_b);
            }

            for plane in frustum.iter() {
                if clip_a.count < 3 {
                    break;
                }
                if clip_polygon_fast(&mut scratch, clip_a.as_slice(), &mut clip_b, plane, crate::geometry::epsilon::EPS_PLANE).is_some() {
                    std::mem::swap(&mut clip_a, &mut clip_b);
                }
            }

            if clip_a.count < 3 {
                continue;
            }

            let new_scissor = scissor_of(&ctx.view, clip_a.as_slice(), &scissor);
            if new_scissor.is_empty() {
                continue;
            }

            let new_frustum = outgoing_frustum(&ctx.view, clip_a.as_slice(), &new_scissor, *frustum.last().unwrap());
            (new_frustum, new_scissor)
        };

        link.vis_mark.set(ctx.marker);
        flood(ctx, link.dest_area, depth + 1, &new_frustum, new_scissor, result);
    }
}
