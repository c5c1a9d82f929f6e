//! `worldcore`: the spatial indexing, visibility determination, raycasting
//! and navigation-mesh core of a 3D engine runtime.
//!
//! This crate is headless: it consumes a static level description (planes,
//! a BSP tree, areas, portals, surfaces) plus a stream of dynamic primitive
//! registrations, and answers two kinds of per-frame queries (visibility,
//! raycast) plus navmesh build/query requests. Rendering, asset import,
//! scene graph/ECS, physics and audio are external collaborators — see
//! `DESIGN.md` for the scope boundary.

pub mod error;
pub mod geometry;
pub mod nav;
pub mod raycast;
pub mod vis;
pub mod world;

pub use error::{NavMeshError, RayError, WorldError};
