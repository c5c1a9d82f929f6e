//! Brush surfaces: polygonal faces attached to an area's static geometry.

use std::cell::Cell;

use bitflags::bitflags;

use crate::geometry::{Aabb, Plane};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SurfaceFlags: u8 {
        /// Surface has a single well-defined face plane and can be
        /// back-face culled.
        const PLANAR    = 0x01;
        /// Visible/raycastable from both sides even if `PLANAR`.
        const TWO_SIDED = 0x02;
    }
}

pub type MaterialRef = u32;

#[derive(Debug, Clone, Copy, Default)]
pub struct LightmapBlock {
    pub index: u32,
    pub offset_x: u16,
    pub offset_y: u16,
}

#[derive(Debug)]
pub struct Surface {
    pub flags: SurfaceFlags,
    /// Only set when `flags.contains(PLANAR)`.
    pub face_plane: Option<Plane>,
    pub aabb: Aabb,
    pub query_group: u32,
    pub vis_group: u32,
    pub first_vertex: u32,
    pub num_vertices: u32,
    pub first_index: u32,
    pub num_indices: u32,
    pub material: MaterialRef,
    pub lightmap: Option<LightmapBlock>,
    pub vis_mark: Cell<u32>,
    pub vis_pass: Cell<u32>,
}

impl Surface {
    pub fn is_planar(&self) -> bool {
        self.flags.contains(SurfaceFlags::PLANAR)
    }

    pub fn is_two_sided(&self) -> bool {
        self.flags.contains(SurfaceFlags::TWO_SIDED)
    }

    /// Triangle index range into the level's shared index buffer, 3 indices
    /// per triangle.
    pub fn triangle_indices(&self) -> std::ops::Range<u32> {
        (self.first_index / 3)..((self.first_index + self.num_indices) / 3)
    }
}
