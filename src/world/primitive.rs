//! Dynamic bounded primitives (Box/Sphere) registered by external systems,
//! their intrusive world/dirty lists, and the per-(primitive, area)
//! `PrimitiveLink` pool.

use std::cell::Cell;
use std::fmt;

use glam::{Vec2, Vec3};

use crate::geometry::{Aabb, Plane, Sphere};

use super::surface::SurfaceFlags;
use super::types::{AreaId, LinkId, PrimitiveId};

#[derive(Debug, Clone, Copy)]
pub enum PrimitiveShape {
    Box(Aabb),
    Sphere(Sphere),
}

impl PrimitiveShape {
    pub fn aabb(&self) -> Aabb {
        match self {
            PrimitiveShape::Box(b) => *b,
            PrimitiveShape::Sphere(s) => Aabb::new(s.center - Vec3::splat(s.radius), s.center + Vec3::splat(s.radius)),
        }
    }
}

/// One triangle hit returned by an owner's raycast callback; the core wraps
/// this with proxy metadata (owner, primitive id) to build the public
/// result record.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveTriangleHit {
    pub location: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub distance: f32,
    pub triangle_indices: [u32; 3],
    pub material: u32,
}

/// Hook back into the primitive's external owner. The core never inspects
/// triangle data itself for primitives — it only forwards the segment and
/// lets the owner decide what "inside" means.
pub trait PrimitiveRaycastCallbacks: fmt::Debug {
    fn raycast_closest(&self, start: Vec3, end: Vec3, current_closest: f32) -> Option<PrimitiveTriangleHit>;
    fn raycast_all(&self, start: Vec3, end: Vec3, out_hits: &mut Vec<PrimitiveTriangleHit>) -> bool;
}

pub struct Primitive {
    pub shape: PrimitiveShape,
    pub query_group: u32,
    pub vis_group: u32,
    pub flags: SurfaceFlags,
    pub face_plane: Option<Plane>,
    pub next: Option<PrimitiveId>,
    pub prev: Option<PrimitiveId>,
    pub next_dirty: Option<PrimitiveId>,
    pub prev_dirty: Option<PrimitiveId>,
    pub is_dirty: bool,
    pub link_list: Option<LinkId>,
    pub vis_mark: Cell<u32>,
    pub vis_pass: Cell<u32>,
    /// Opaque external identifier for the owning object; the core holds no
    /// strong ownership over it (§5 lifetime model).
    pub owner: u64,
    pub callbacks: Box<dyn PrimitiveRaycastCallbacks>,
    pub is_outdoor: bool,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("shape", &self.shape)
            .field("owner", &self.owner)
            .field("is_outdoor", &self.is_outdoor)
            .finish()
    }
}

impl Primitive {
    pub fn aabb(&self) -> Aabb {
        self.shape.aabb()
    }

    pub fn is_planar(&self) -> bool {
        self.flags.contains(SurfaceFlags::PLANAR)
    }

    pub fn is_two_sided(&self) -> bool {
        self.flags.contains(SurfaceFlags::TWO_SIDED)
    }
}

enum Slot {
    Occupied(Primitive),
    Free(Option<u32>),
}

/// Free-list-backed arena of primitives. Unlike the append-only BSP/area
/// arrays, primitives are added and removed continuously at runtime.
/// Generations are tracked in a parallel array so a stale `PrimitiveId`
/// from a reused slot is rejected rather than silently aliasing whatever
/// now occupies that index.
#[derive(Default)]
pub struct PrimitiveArena {
    slots: Vec<Slot>,
    generations: Vec<u32>,
    free_head: Option<u32>,
    len: usize,
}

impl PrimitiveArena {
    pub fn insert(&mut self, primitive: Primitive) -> PrimitiveId {
        if let Some(index) = self.free_head {
            let next_free = match self.slots[index as usize] {
                Slot::Free(next_free) => next_free,
                Slot::Occupied(_) => unreachable!("free list points at occupied slot"),
            };
            self.free_head = next_free;
            self.slots[index as usize] = Slot::Occupied(primitive);
            self.len += 1;
            PrimitiveId { index, generation: self.generations[index as usize] }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied(primitive));
            self.generations.push(0);
            self.len += 1;
            PrimitiveId { index, generation: 0 }
        }
    }

    fn generation_matches(&self, id: PrimitiveId) -> bool {
        self.generations.get(id.index as usize).copied() == Some(id.generation)
    }

    pub fn remove(&mut self, id: PrimitiveId) -> Option<Primitive> {
        if !self.generation_matches(id) {
            return None;
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        match slot {
            Slot::Occupied(_) => {
                let taken = std::mem::replace(slot, Slot::Free(self.free_head));
                self.generations[id.index as usize] = id.generation.wrapping_add(1);
                self.free_head = Some(id.index);
                self.len -= 1;
                match taken {
                    Slot::Occupied(p) => Some(p),
                    Slot::Free(_) => unreachable!(),
                }
            }
            Slot::Free(_) => None,
        }
    }

    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        if !self.generation_matches(id) {
            return None;
        }
        match self.slots.get(id.index as usize)? {
            Slot::Occupied(p) => Some(p),
            Slot::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        if !self.generation_matches(id) {
            return None;
        }
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied(p) => Some(p),
            Slot::Free(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveId, &Primitive)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Occupied(p) => Some((PrimitiveId { index: i as u32, generation: self.generations[i] }, p)),
            Slot::Free(_) => None,
        })
    }
}

/// Intrusive node shared by two linked lists at once: the primitive's own
/// chain of areas it overlaps, and the area's chain of primitives that
/// overlap it. Allocated from `LinkPool`, never inlined into `Primitive` or
/// `Area` (§9).
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveLink {
    pub primitive: PrimitiveId,
    pub area: AreaId,
    pub next_in_primitive: Option<LinkId>,
    pub next_in_area: Option<LinkId>,
}

enum LinkSlot {
    Occupied(PrimitiveLink),
    Free(Option<LinkId>),
}

#[derive(Default)]
pub struct LinkPool {
    slots: Vec<LinkSlot>,
    free_head: Option<LinkId>,
    /// `None` means unbounded (growth always succeeds, mirroring a plain
    /// `Vec`-backed pool). `Some(cap)` bounds the pool at `cap` live links;
    /// set via `World::build`'s `LevelDef::max_primitive_links`.
    cap: Option<usize>,
}

impl LinkPool {
    pub fn with_cap(cap: usize) -> Self {
        LinkPool { slots: Vec::new(), free_head: None, cap: Some(cap) }
    }

    /// `None` means the pool is at its configured cap and has no free slot
    /// to reuse; the caller (`World::add_primitive_to_area`) reports this as
    /// link-pool exhaustion and leaves the primitive partially linked (§7).
    pub fn alloc(&mut self, link: PrimitiveLink) -> Option<LinkId> {
        if let Some(id) = self.free_head {
            let next = match self.slots[id.0 as usize] {
                LinkSlot::Free(next) => next,
                LinkSlot::Occupied(_) => unreachable!(),
            };
            self.free_head = next;
            self.slots[id.0 as usize] = LinkSlot::Occupied(link);
            return Some(id);
        }

        if let Some(cap) = self.cap {
            if self.slots.len() >= cap {
                return None;
            }
        }

        let id = LinkId(self.slots.len() as u32);
        self.slots.push(LinkSlot::Occupied(link));
        Some(id)
    }

    pub fn free(&mut self, id: LinkId) {
        self.slots[id.0 as usize] = LinkSlot::Free(self.free_head);
        self.free_head = Some(id);
    }

    pub fn get(&self, id: LinkId) -> &PrimitiveLink {
        match &self.slots[id.0 as usize] {
            LinkSlot::Occupied(link) => link,
            LinkSlot::Free(_) => panic!("dangling PrimitiveLink id {id:?}"),
        }
    }

    pub fn get_mut(&mut self, id: LinkId) -> &mut PrimitiveLink {
        match &mut self.slots[id.0 as usize] {
            LinkSlot::Occupied(link) => link,
            LinkSlot::Free(_) => panic!("dangling PrimitiveLink id {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoopCallbacks;
    impl PrimitiveRaycastCallbacks for NoopCallbacks {
        fn raycast_closest(&self, _start: Vec3, _end: Vec3, _current_closest: f32) -> Option<PrimitiveTriangleHit> {
            None
        }
        fn raycast_all(&self, _start: Vec3, _end: Vec3, _out_hits: &mut Vec<PrimitiveTriangleHit>) -> bool {
            false
        }
    }

    fn make_primitive() -> Primitive {
        Primitive {
            shape: PrimitiveShape::Box(Aabb::new(Vec3::ZERO, Vec3::ONE)),
            query_group: 1,
            vis_group: 1,
            flags: SurfaceFlags::empty(),
            face_plane: None,
            next: None,
            prev: None,
            next_dirty: None,
            prev_dirty: None,
            is_dirty: false,
            link_list: None,
            vis_mark: Cell::new(0),
            vis_pass: Cell::new(0),
            owner: 0,
            callbacks: Box::new(NoopCallbacks),
            is_outdoor: false,
        }
    }

    #[test]
    fn arena_insert_remove_reuses_slot_with_new_generation() {
        let mut arena = PrimitiveArena::default();
        let id1 = arena.insert(make_primitive());
        assert_eq!(arena.len(), 1);
        let removed = arena.remove(id1);
        assert!(removed.is_some());
        assert_eq!(arena.len(), 0);
        let id2 = arena.insert(make_primitive());
        assert_eq!(id2.index, id1.index);
        assert_ne!(id2.generation, id1.generation);
        assert!(arena.get(id1).is_none());
        assert!(arena.get(id2).is_some());
    }

    #[test]
    fn link_pool_alloc_free_reuses_slot() {
        let mut pool = LinkPool::default();
        let link = PrimitiveLink { primitive: PrimitiveId { index: 0, generation: 0 }, area: AreaId(0), next_in_primitive: None, next_in_area: None };
        let id = pool.alloc(link).expect("unbounded pool never exhausts");
        pool.free(id);
        let id2 = pool.alloc(link).expect("freed slot must be reusable");
        assert_eq!(id, id2);
    }

    #[test]
    fn link_pool_alloc_past_cap_reports_exhaustion() {
        let mut pool = LinkPool::with_cap(1);
        let link = PrimitiveLink { primitive: PrimitiveId { index: 0, generation: 0 }, area: AreaId(0), next_in_primitive: None, next_in_area: None };
        assert!(pool.alloc(link).is_some());
        assert!(pool.alloc(link).is_none());
    }
}
