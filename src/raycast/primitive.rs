//! Per-primitive raycast (§4.4): delegates triangle intersection to the
//! owner's `PrimitiveRaycastCallbacks`; the core only fills proxy metadata
//! around whatever the owner returns.

use crate::geometry::Ray;
use crate::world::types::PrimitiveId;
use crate::world::Primitive;

use super::filter::RaycastFilter;
use super::result::{AllHitsResult, ClosestHit, HitOwner, ProxyHitRange, ProxyType, TriangleHit};

#[allow(clippy::too_many_arguments)]
pub fn raycast_primitive_closest(
    primitive_id: PrimitiveId,
    primitive: &Primitive,
    ray: &Ray,
    filter: &RaycastFilter,
    current_closest: f32,
    out: &mut Option<ClosestHit>,
) -> f32 {
    if !filter.query_group_passes(primitive.query_group) || !filter.vis_group_passes(primitive.vis_group) {
        return current_closest;
    }
    if ray.intersect_aabb(&primitive.aabb()).is_none() {
        return current_closest;
    }

    let Some(hit) = primitive.callbacks.raycast_closest(ray.start, ray.end, current_closest) else {
        return current_closest;
    };
    if hit.distance >= current_closest {
        return current_closest;
    }

    *out = Some(ClosestHit {
        proxy_type: ProxyType::Primitive,
        owner: HitOwner::Primitive(primitive_id),
        location: hit.location,
        normal: hit.normal,
        uv: hit.uv,
        distance: hit.distance,
        triangle_indices: hit.triangle_indices,
        material: hit.material,
        lightmap: None,
    });
    hit.distance
}

pub fn raycast_primitive_all(
    primitive_id: PrimitiveId,
    primitive: &Primitive,
    ray: &Ray,
    filter: &RaycastFilter,
    out: &mut AllHitsResult,
) {
    if !filter.query_group_passes(primitive.query_group) || !filter.vis_group_passes(primitive.vis_group) {
        return;
    }
    if ray.intersect_aabb(&primitive.aabb()).is_none() {
        return;
    }

    let first_hit = out.hits.len() as u32;
    let mut owner_hits = Vec::new();
    if !primitive.callbacks.raycast_all(ray.start, ray.end, &mut owner_hits) {
        return;
    }

    let mut closest_local = f32::INFINITY;
    let mut closest_idx = first_hit;
    for hit in owner_hits {
        let idx = out.hits.len() as u32;
        if hit.distance < closest_local {
            closest_local = hit.distance;
            closest_idx = idx;
        }
        out.hits.push(TriangleHit {
            location: hit.location,
            normal: hit.normal,
            distance: hit.distance,
            uv: hit.uv,
            indices: hit.triangle_indices,
            material: hit.material,
        });
    }

    let num_hits = out.hits.len() as u32 - first_hit;
    if num_hits > 0 {
        out.proxies.push(ProxyHitRange { owner: HitOwner::Primitive(primitive_id), first_hit, num_hits, closest_hit: closest_idx });
    }
}
