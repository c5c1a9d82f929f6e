//! Bounds-only raycast (§4.4): test surfaces' AABBs and primitives'
//! Box/Sphere bounds directly, skipping triangle work entirely.

use crate::geometry::Ray;
use crate::world::primitive::PrimitiveShape;
use crate::world::types::{PrimitiveId, SurfaceId};
use crate::world::{Primitive, Surface};

use super::filter::RaycastFilter;
use super::result::{BoundsHit, BoundsResult, HitOwner};

pub fn raycast_surface_bounds(surface_id: SurfaceId, surface: &Surface, ray: &Ray, filter: &RaycastFilter, out: &mut BoundsResult) {
    if !filter.query_group_passes(surface.query_group) || !filter.vis_group_passes(surface.vis_group) {
        return;
    }
    let Some((t_min, t_max)) = ray.intersect_aabb(&surface.aabb) else { return };
    out.hits.push(BoundsHit {
        owner: HitOwner::Surface(surface_id),
        location_min: ray.point_at(t_min),
        location_max: ray.point_at(t_max),
        distance_min: t_min,
        distance_max: t_max,
    });
}

pub fn raycast_primitive_bounds(primitive_id: PrimitiveId, primitive: &Primitive, ray: &Ray, filter: &RaycastFilter, out: &mut BoundsResult) {
    if !filter.query_group_passes(primitive.query_group) || !filter.vis_group_passes(primitive.vis_group) {
        return;
    }

    let (t_min, t_max) = match primitive.shape {
        PrimitiveShape::Box(b) => match ray.intersect_aabb(&b) {
            Some(t) => t,
            None => return,
        },
        PrimitiveShape::Sphere(s) => match ray.intersect_sphere(&s) {
            Some(t) => t,
            None => return,
        },
    };

    out.hits.push(BoundsHit {
        owner: HitOwner::Primitive(primitive_id),
        location_min: ray.point_at(t_min),
        location_max: ray.point_at(t_max),
        distance_min: t_min,
        distance_max: t_max,
    });
}
