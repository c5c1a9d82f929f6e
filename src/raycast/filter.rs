//! Raycast query filter and the default substituted when a caller omits one
//! (§4.4: "A global `DefaultRaycastFilter` is substituted when none is
//! supplied").

#[derive(Clone, Copy, Debug)]
pub struct RaycastFilter {
    pub query_mask: u32,
    pub visibility_mask: u32,
    pub sort_by_distance: bool,
    /// The close-enough early-out the source compiled out by default
    /// (§9 open questions); kept available per query for query-heavy
    /// workloads.
    pub early_out: bool,
}

impl Default for RaycastFilter {
    fn default() -> Self {
        RaycastFilter { query_mask: u32::MAX, visibility_mask: u32::MAX, sort_by_distance: false, early_out: false }
    }
}

impl RaycastFilter {
    pub fn query_group_passes(&self, element_group: u32) -> bool {
        self.query_mask & element_group == element_group
    }

    pub fn vis_group_passes(&self, element_group: u32) -> bool {
        self.visibility_mask & element_group != 0
    }
}
