//! Named epsilon constants.
//!
//! The original engine scattered epsilon literals (`1e-4`, `0.00001`, `0.0001`,
//! `0.03125`, ...) across plane classification, raycasting and hull ops. Each
//! constant here documents which clause of the behaviour it backs so a single
//! site change doesn't silently drift the others apart.

/// Plane classification epsilon: a point within this signed distance of a
/// plane is treated as `On` rather than strictly `Front`/`Back`.
pub const EPS_PLANE: f32 = 1e-4;

/// Minimum Möller–Trumbore determinant magnitude before a ray is treated as
/// parallel to the triangle's plane.
pub const EPS_TRI_DET: f32 = 1e-5;

/// Minimum `|n·d|` before a ray direction is treated as parallel to a plane
/// (portal front-face / per-surface planar raycast).
pub const EPS_RAY_PARALLEL: f32 = 1e-4;

/// Rays shorter than this are degenerate and rejected before dispatch; also
/// the "close enough" early-out threshold when `RaycastFilter::early_out` is
/// enabled.
pub const EPS_SEGMENT_MIN: f32 = 1e-4;

/// Shortest hull edge length a convex hull may have before it is flagged
/// `tiny`. This is the smallest literal observed across the source's
/// scattered epsilons, reused here as the hull edge-length floor.
pub const MIN_EDGE: f32 = 0.03125;

/// Coordinates outside `[-HULL_BOUND, HULL_BOUND]` flag a hull as `huge`.
pub const HULL_BOUND: f32 = 1_000_000.0;
