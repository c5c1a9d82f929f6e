//! Public raycast result records (§6): closest-hit, all-triangle-hits, and
//! bounds-only variants, plus the proxy type that tags whether a hit landed
//! on a static surface or a dynamic primitive.

use glam::{Vec2, Vec3};

use crate::world::surface::{LightmapBlock, MaterialRef};
use crate::world::types::{PrimitiveId, SurfaceId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyType {
    Primitive,
    Surface,
}

/// Which element a hit landed on.
#[derive(Clone, Copy, Debug)]
pub enum HitOwner {
    Surface(SurfaceId),
    Primitive(PrimitiveId),
}

/// The single closest hit along a ray, with a full triangle hit record.
#[derive(Clone, Debug)]
pub struct ClosestHit {
    pub proxy_type: ProxyType,
    pub owner: HitOwner,
    pub location: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub distance: f32,
    pub triangle_indices: [u32; 3],
    pub material: MaterialRef,
    pub lightmap: Option<LightmapBlock>,
}

/// One triangle intersection, used by the all-hits accumulator.
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub location: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub uv: Vec2,
    pub indices: [u32; 3],
    pub material: MaterialRef,
}

/// Per-proxy summary into the flat `hits` array: which slice of `hits`
/// belongs to this owner, and which of those is currently closest.
#[derive(Clone, Copy, Debug)]
pub struct ProxyHitRange {
    pub owner: HitOwner,
    pub first_hit: u32,
    pub num_hits: u32,
    pub closest_hit: u32,
}

/// All triangle intersections along the ray, grouped by the proxy that
/// produced them.
#[derive(Default, Debug)]
pub struct AllHitsResult {
    pub hits: Vec<TriangleHit>,
    pub proxies: Vec<ProxyHitRange>,
}

impl AllHitsResult {
    pub fn clear(&mut self) {
        self.hits.clear();
        self.proxies.clear();
    }

    /// Stable sort `hits` (and proxy offsets) ascending by `distance`.
    pub fn sort_by_distance(&mut self) {
        let mut order: Vec<usize> = (0..self.hits.len()).collect();
        order.sort_by(|&a, &b| self.hits[a].distance.partial_cmp(&self.hits[b].distance).unwrap());

        let remap: Vec<u32> = {
            let mut inverse = vec![0u32; order.len()];
            for (new_idx, &old_idx) in order.iter().enumerate() {
                inverse[old_idx] = new_idx as u32;
            }
            inverse
        };

        let sorted: Vec<TriangleHit> = order.iter().map(|&i| self.hits[i]).collect();
        self.hits = sorted;

        for proxy in &mut self.proxies {
            let old_first = proxy.first_hit;
            let old_closest = proxy.closest_hit;
            // The proxy's hits are contiguous before the sort; after a
            // global sort they generally aren't, so re-derive the range by
            // scanning the remap table for this proxy's original indices.
            let mut new_min = u32::MAX;
            let mut new_max = 0u32;
            for i in old_first..old_first + proxy.num_hits {
                let mapped = remap[i as usize];
                new_min = new_min.min(mapped);
                new_max = new_max.max(mapped);
            }
            proxy.first_hit = new_min;
            proxy.closest_hit = remap[old_closest as usize];
            let _ = new_max;
        }
    }
}

/// Bounds-only hit: the ray crossed a proxy's AABB/sphere, no triangle work
/// performed.
#[derive(Clone, Copy, Debug)]
pub struct BoundsHit {
    pub owner: HitOwner,
    pub location_min: Vec3,
    pub location_max: Vec3,
    pub distance_min: f32,
    pub distance_max: f32,
}

#[derive(Default, Debug)]
pub struct BoundsResult {
    pub hits: Vec<BoundsHit>,
}

impl BoundsResult {
    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn sort_by_distance(&mut self) {
        self.hits.sort_by(|a, b| a.distance_min.partial_cmp(&b.distance_min).unwrap());
    }
}
