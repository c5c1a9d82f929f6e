//! Areas, portals and portal links, plus PVS bitmask decompression.

use std::cell::Cell;

use crate::geometry::{Aabb, ConvexHull, Plane};

use super::types::{AreaId, LinkId, PortalId, PortalLinkId, SurfaceId};

/// Convex volume bounded by planar surfaces and portals.
#[derive(Debug)]
pub struct Area {
    pub aabb: Aabb,
    pub first_surface: SurfaceId,
    pub num_surfaces: u32,
    pub portal_list: Option<PortalLinkId>,
    /// Head of the area's `PrimitiveLink` chain (§4.2); the primitive side
    /// of the same intrusive node chains through `Primitive::link_list`.
    pub primitive_list_link: Option<LinkId>,
}

impl Area {
    pub fn surface_range(&self) -> std::ops::Range<u32> {
        self.first_surface.0..self.first_surface.0 + self.num_surfaces
    }
}

/// One directional half of a portal, attached to its source area's
/// `portal_list` singly-linked chain.
#[derive(Debug)]
pub struct PortalLink {
    pub dest_area: AreaId,
    /// CCW as seen from the source area.
    pub hull: ConvexHull,
    /// Oriented toward the source area (i.e. the source area is in front).
    pub plane: Plane,
    pub next: Option<PortalLinkId>,
    pub portal: PortalId,
    pub vis_mark: Cell<u32>,
}

/// Shared boundary between two areas. Owns both directional links.
#[derive(Debug)]
pub struct Portal {
    pub area_a: AreaId,
    pub area_b: AreaId,
    pub link_a_to_b: PortalLinkId,
    pub link_b_to_a: PortalLinkId,
    pub blocked: Cell<bool>,
}

impl Portal {
    pub fn is_blocked(&self) -> bool {
        self.blocked.get()
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.set(blocked);
    }
}

/// Decompress a zero-run-length-encoded PVS row: a nonzero byte is copied
/// verbatim; a zero byte is followed by a run-length byte `n` expanding to
/// `n` zero bytes. Expansion is clamped to `out`'s length.
pub fn decompress_pvs(compressed: &[u8], out: &mut [u8]) {
    let mut src = 0usize;
    let mut dst = 0usize;
    let len = out.len();

    while dst < len && src < compressed.len() {
        let b = compressed[src];
        if b != 0 {
            out[dst] = b;
            dst += 1;
            src += 1;
        } else {
            src += 1;
            let run = if src < compressed.len() { compressed[src] as usize } else { 0 };
            src += 1;
            let fill = run.min(len - dst);
            out[dst..dst + fill].fill(0);
            dst += fill;
        }
    }

    if dst < len {
        out[dst..].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompress_expands_zero_runs() {
        let compressed = [0x05u8, 0x00, 0x03, 0x07u8];
        let mut out = [0xFFu8; 6];
        decompress_pvs(&compressed, &mut out);
        assert_eq!(out, [0x05, 0x00, 0x00, 0x00, 0x07, 0x00]);
    }

    #[test]
    fn decompress_clamps_to_row_length() {
        let compressed = [0x00u8, 200];
        let mut out = [0xFFu8; 4];
        decompress_pvs(&compressed, &mut out);
        assert_eq!(out, [0, 0, 0, 0]);
    }
}
