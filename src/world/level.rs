//! World/level construction, primitive registration, and the dirty-list
//! flush that rebuilds primitive↔area linkage (§4.2).

use std::cell::Cell;

use glam::Vec3;
use log::warn;

use crate::error::WorldError;
use crate::geometry::{ConvexHull, Plane};

use super::area::{decompress_pvs, Area, Portal, PortalLink};
use super::bsp::{BspTree, QueryBounds};
use super::primitive::{LinkPool, Primitive, PrimitiveArena, PrimitiveLink, PrimitiveShape};
use super::surface::Surface;
use super::types::{AreaId, LeafId, LinkId, PlaneId, PortalId, PortalLinkId, PrimitiveId, SurfaceId};

/// Raw input describing one portal before `World::build` resolves it into
/// two directional `PortalLink`s.
pub struct PortalDef {
    pub area_a: AreaId,
    pub area_b: AreaId,
    /// Hull vertices, CCW as seen from `area_a`.
    pub hull: ConvexHull,
}

/// Which per-frame traversal a level uses for visibility and raycasting.
/// Determined from the level's own data (§4.3/§4.4) rather than configured
/// separately, since a tree with compiled PVS data always prefers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    Pvs,
    Portal,
}

/// Optional decompressed/compressed PVS table.
pub struct PvsTable {
    pub data: Vec<u8>,
    pub compressed: bool,
    pub cluster_row_bytes: usize,
}

/// Everything needed to construct a `World`: static geometry, handed in
/// once at load time.
#[derive(Default)]
pub struct LevelDef {
    pub planes: Vec<Plane>,
    pub bsp: BspTree,
    pub areas: Vec<Area>,
    pub portals: Vec<PortalDef>,
    pub surfaces: Vec<Surface>,
    /// Shared vertex buffer; surfaces index into it via `first_vertex`.
    pub vertices: Vec<Vec3>,
    /// Shared triangle index buffer; surfaces slice it via `triangle_indices`.
    pub indices: Vec<u32>,
    pub pvs: Option<PvsTable>,
    /// Index of the area all solid/unresolved positions, and `bIsOutdoor`
    /// primitives, resolve to.
    pub outdoor_area: AreaId,
    /// Cap on live `PrimitiveLink`s (§7 link-pool exhaustion); `None` leaves
    /// the pool unbounded.
    pub max_primitive_links: Option<usize>,
}

/// The static + dynamic world: BSP, areas, portals, surfaces, and the live
/// set of registered primitives.
pub struct World {
    pub planes: Vec<Plane>,
    pub bsp: BspTree,
    pub areas: Vec<Area>,
    pub portals: Vec<Portal>,
    pub portal_links: Vec<PortalLink>,
    pub surfaces: Vec<Surface>,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub pvs: Option<PvsTable>,
    pub outdoor_area: AreaId,

    pub(crate) primitives: PrimitiveArena,
    pub(crate) links: LinkPool,
    primitive_list_head: Option<PrimitiveId>,
    primitive_list_tail: Option<PrimitiveId>,
    dirty_head: Option<PrimitiveId>,

    /// Scratch buffer PVS decompression reuses across queries (§5).
    pvs_scratch: std::cell::RefCell<Vec<u8>>,

    /// Single counter on the visibility level (§5): every top-level vis or
    /// ray query increments it once, so both `VisSystem` and `RayEngine` stamp
    /// the same generation into a surface/primitive's shared `vis_mark`/
    /// `vis_pass` cells without ever colliding with each other.
    vis_marker: Cell<u32>,
}

impl World {
    pub fn build(mut def: LevelDef) -> World {
        def.bsp.resolve_parents();

        let mut portal_links = Vec::with_capacity(def.portals.len() * 2);
        let mut portals = Vec::with_capacity(def.portals.len());

        for (i, portal_def) in def.portals.into_iter().enumerate() {
            let plane = portal_def.hull.plane().unwrap_or_else(|| {
                warn!("{}", WorldError::DegenerateInput("portal hull has fewer than 3 points"));
                Plane::new(Vec3::Z, 0.0)
            });

            // The hull is CCW as seen from area_a, so its own plane (from
            // `from_points` on the first three vertices) already faces back
            // toward area_a: `link_a_to_b`, filed under area_a, keeps that
            // plane as-is. The opposite link uses the reversed hull (CCW as
            // seen from area_b) paired with the negated plane, so it in turn
            // faces area_b. Each link's plane therefore always has its own
            // source area in front, which is what the front-facing test in
            // the flood requires.
            let link_a_id = PortalLinkId(portal_links.len() as u32);
            portal_links.push(PortalLink {
                dest_area: portal_def.area_b,
                hull: portal_def.hull.clone(),
                plane,
                next: def.areas[portal_def.area_a.0 as usize].portal_list,
                portal: PortalId(i as u32),
                vis_mark: Cell::new(0),
            });
            def.areas[portal_def.area_a.0 as usize].portal_list = Some(link_a_id);

            let link_b_id = PortalLinkId(portal_links.len() as u32);
            portal_links.push(PortalLink {
                dest_area: portal_def.area_a,
                hull: portal_def.hull.reversed(),
                plane: plane.negated(),
                next: def.areas[portal_def.area_b.0 as usize].portal_list,
                portal: PortalId(i as u32),
                vis_mark: Cell::new(0),
            });
            def.areas[portal_def.area_b.0 as usize].portal_list = Some(link_b_id);

            portals.push(Portal {
                area_a: portal_def.area_a,
                area_b: portal_def.area_b,
                link_a_to_b: link_a_id,
                link_b_to_a: link_b_id,
                blocked: Cell::new(false),
            });
        }

        let cluster_bytes = def.pvs.as_ref().map(|p| p.cluster_row_bytes).unwrap_or(0);

        World {
            planes: def.planes,
            bsp: def.bsp,
            areas: def.areas,
            portals,
            portal_links,
            surfaces: def.surfaces,
            vertices: def.vertices,
            indices: def.indices,
            pvs: def.pvs,
            outdoor_area: def.outdoor_area,
            primitives: PrimitiveArena::default(),
            links: def.max_primitive_links.map(LinkPool::with_cap).unwrap_or_default(),
            primitive_list_head: None,
            primitive_list_tail: None,
            dirty_head: None,
            pvs_scratch: std::cell::RefCell::new(vec![0u8; cluster_bytes]),
            vis_marker: Cell::new(0),
        }
    }

    /// Advance and return the shared vis-query marker (§5). Every top-level
    /// `VisSystem::query` and `RayEngine::raycast_*` call this exactly once,
    /// so the two traversals never stamp a colliding generation into the
    /// same `vis_mark`/`vis_pass` cells.
    pub fn next_vis_marker(&self) -> u32 {
        let next = self.vis_marker.get().wrapping_add(1);
        self.vis_marker.set(next);
        next
    }

    pub fn plane(&self, id: PlaneId) -> &Plane {
        &self.planes[id.0 as usize]
    }

    /// World-space positions of triangle `tri`, a global triangle index as
    /// returned by `Surface::triangle_indices()`. The shared index buffer
    /// holds absolute offsets into the shared vertex buffer.
    pub fn surface_triangle(&self, tri: u32) -> (Vec3, Vec3, Vec3) {
        let base = (tri * 3) as usize;
        let i0 = self.indices[base] as usize;
        let i1 = self.indices[base + 1] as usize;
        let i2 = self.indices[base + 2] as usize;
        (self.vertices[i0], self.vertices[i1], self.vertices[i2])
    }

    /// A level with a PVS-bearing tree uses the PVS topology for vis/ray
    /// dispatch (§4.3/§4.4); everything else (portal-only levels, or a tree
    /// without compiled visibility data) floods through portals instead.
    pub fn topology(&self) -> Topology {
        if !self.bsp.is_empty() && self.pvs.is_some() {
            Topology::Pvs
        } else {
            Topology::Portal
        }
    }

    pub fn leaf_area(&self, leaf: LeafId) -> AreaId {
        self.bsp.leafs[leaf.0 as usize].area
    }

    /// Decompress (if needed) and return the visibility row for `leaf`'s
    /// cluster, reusing the level's scratch buffer.
    pub fn leaf_visdata(&self, leaf: LeafId) -> Option<std::cell::Ref<'_, [u8]>> {
        let leaf = &self.bsp.leafs[leaf.0 as usize];
        let pvs = self.pvs.as_ref()?;
        let offset = leaf.visdata_offset? as usize;

        if pvs.compressed {
            let mut scratch = self.pvs_scratch.borrow_mut();
            let row_len = scratch.len();
            decompress_pvs(&pvs.data[offset..], &mut scratch);
            drop(scratch);
        } else {
            let row_len = pvs.cluster_row_bytes;
            self.pvs_scratch.borrow_mut().copy_from_slice(&pvs.data[offset..offset + row_len]);
        }

        Some(std::cell::Ref::map(self.pvs_scratch.borrow(), |v| v.as_slice()))
    }

    /// `FindLeaf` + outdoor fallback for solid space.
    pub fn find_area(&self, p: Vec3) -> AreaId {
        if !self.bsp.is_empty() {
            match self.bsp.find_leaf(p, &self.planes) {
                Some(leaf) => self.leaf_area(leaf),
                None => self.outdoor_area,
            }
        } else {
            self.areas
                .iter()
                .position(|a| a.aabb.contains_point(p))
                .map(|i| AreaId(i as u32))
                .unwrap_or(self.outdoor_area)
        }
    }

    // ---------------------------------------------------------------
    // Primitive registration
    // ---------------------------------------------------------------

    pub fn register_primitive(&mut self, primitive: Primitive) -> PrimitiveId {
        let id = self.primitives.insert(primitive);

        if let Some(tail) = self.primitive_list_tail {
            self.primitives.get_mut(tail).unwrap().next = Some(id);
        } else {
            self.primitive_list_head = Some(id);
        }
        self.primitives.get_mut(id).unwrap().prev = self.primitive_list_tail;
        self.primitive_list_tail = Some(id);

        self.link_primitive_to_areas(id);
        id
    }

    pub fn deregister_primitive(&mut self, id: PrimitiveId) {
        self.unlink_primitive(id);

        if let Some(prim) = self.primitives.get(id) {
            let (prev, next) = (prim.prev, prim.next);
            if let Some(prev) = prev {
                self.primitives.get_mut(prev).unwrap().next = next;
            } else {
                self.primitive_list_head = next;
            }
            if let Some(next) = next {
                self.primitives.get_mut(next).unwrap().prev = prev;
            } else {
                self.primitive_list_tail = prev;
            }
        }

        self.unmark_dirty(id);
        self.primitives.remove(id);
    }

    pub fn mark_primitive_dirty(&mut self, id: PrimitiveId) {
        let Some(prim) = self.primitives.get_mut(id) else { return };
        if prim.is_dirty {
            return;
        }
        prim.is_dirty = true;
        prim.next_dirty = self.dirty_head;
        self.dirty_head = Some(id);
    }

    fn unmark_dirty(&mut self, id: PrimitiveId) {
        if let Some(prim) = self.primitives.get_mut(id) {
            prim.is_dirty = false;
            prim.next_dirty = None;
        }
    }

    /// Flush the dirty list: unlink then relink every dirty primitive. This
    /// is the only mechanism that changes primitive↔area membership (§4.2).
    pub fn flush_dirty(&mut self) {
        let mut dirty = Vec::new();
        let mut cur = self.dirty_head;
        while let Some(id) = cur {
            dirty.push(id);
            cur = self.primitives.get(id).and_then(|p| p.next_dirty);
        }
        self.dirty_head = None;

        for &id in &dirty {
            self.unlink_primitive(id);
        }
        for &id in &dirty {
            if let Some(prim) = self.primitives.get_mut(id) {
                prim.is_dirty = false;
                prim.next_dirty = None;
            }
            self.link_primitive_to_areas(id);
        }
    }

    fn is_primitive_in_area(&self, primitive_id: PrimitiveId, area: AreaId) -> bool {
        let Some(prim) = self.primitives.get(primitive_id) else { return false };
        let mut cur = prim.link_list;
        while let Some(link_id) = cur {
            let link = self.links.get(link_id);
            if link.area == area {
                return true;
            }
            cur = link.next_in_primitive;
        }
        false
    }

    fn add_primitive_to_area(&mut self, area: AreaId, primitive_id: PrimitiveId) {
        if self.is_primitive_in_area(primitive_id, area) {
            return;
        }

        let next_in_primitive = self.primitives.get(primitive_id).unwrap().link_list;

        let link = PrimitiveLink {
            primitive: primitive_id,
            area,
            next_in_primitive,
            next_in_area: self.area_link_head(area),
        };
        let Some(link_id) = self.links.alloc(link) else {
            self.report_link_pool_exhaustion(primitive_id);
            return;
        };

        self.primitives.get_mut(primitive_id).unwrap().link_list = Some(link_id);
        self.set_area_link_head(area, link_id);
    }

    fn area_link_head(&self, area: AreaId) -> Option<LinkId> {
        self.areas[area.0 as usize].primitive_list_link
    }

    fn set_area_link_head(&mut self, area: AreaId, head: Option<LinkId>) {
        self.areas[area.0 as usize].primitive_list_link = head;
    }

    fn link_primitive_to_areas(&mut self, id: PrimitiveId) {
        let Some(prim) = self.primitives.get(id) else { return };
        let is_outdoor = prim.is_outdoor;
        let shape = prim.shape;

        if is_outdoor {
            self.add_primitive_to_area(self.outdoor_area, id);
            return;
        }

        let mut linked_any = false;

        if !self.bsp.is_empty() {
            let bounds = match shape {
                PrimitiveShape::Box(b) => QueryBounds::Aabb(b),
                PrimitiveShape::Sphere(s) => QueryBounds::Sphere(s),
            };
            let mut leaves = Vec::new();
            self.bsp.query_overlapping_leaves(bounds, &self.planes, |leaf| leaves.push(leaf));
            for leaf in leaves {
                let area = self.leaf_area(leaf);
                self.add_primitive_to_area(area, id);
                linked_any = true;
            }
        } else {
            let aabb = shape.aabb();
            let overlapping: Vec<AreaId> = self
                .areas
                .iter()
                .enumerate()
                .filter(|(_, a)| a.aabb.overlaps(&aabb))
                .map(|(i, _)| AreaId(i as u32))
                .collect();
            for area in overlapping {
                self.add_primitive_to_area(area, id);
                linked_any = true;
            }
        }

        if !linked_any {
            self.add_primitive_to_area(self.outdoor_area, id);
        }
    }

    fn unlink_primitive(&mut self, id: PrimitiveId) {
        let Some(mut cur) = self.primitives.get(id).and_then(|p| p.link_list) else { return };

        loop {
            let (area, next_in_primitive) = {
                let link = self.links.get(cur);
                (link.area, link.next_in_primitive)
            };

            // Remove `cur` from area's chain.
            let mut walk = self.area_link_head(area);
            let mut prev: Option<LinkId> = None;
            while let Some(w) = walk {
                if w == cur {
                    let next_in_area = self.links.get(w).next_in_area;
                    if let Some(prev_id) = prev {
                        self.links.get_mut(prev_id).next_in_area = next_in_area;
                    } else {
                        self.set_area_link_head(area, next_in_area);
                    }
                    break;
                }
                prev = Some(w);
                walk = self.links.get(w).next_in_area;
            }

            self.links.free(cur);

            match next_in_primitive {
                Some(next) => cur = next,
                None => break,
            }
        }

        if let Some(prim) = self.primitives.get_mut(id) {
            prim.link_list = None;
        }
    }

    /// Iterate the `PrimitiveLink` chain for `area`, yielding each linked
    /// primitive id. Used by visibility culling and raycasting.
    pub fn area_primitives(&self, area: AreaId) -> impl Iterator<Item = PrimitiveId> + '_ {
        let mut cur = self.area_link_head(area);
        std::iter::from_fn(move || {
            let link_id = cur?;
            let link = self.links.get(link_id);
            cur = link.next_in_area;
            Some(link.primitive)
        })
    }

    pub fn get_primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id)
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn report_link_pool_exhaustion(&self, id: PrimitiveId) {
        warn!("{}; prior links remain valid", WorldError::LinkPoolExhausted(id));
    }
}
