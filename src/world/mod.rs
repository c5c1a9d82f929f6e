//! World partition (C2): BSP tree, areas, portals, surfaces, and the
//! dynamic primitive registry linked against them.

pub mod area;
pub mod bsp;
pub mod level;
pub mod primitive;
pub mod surface;
pub mod types;

pub use area::{Area, Portal, PortalLink};
pub use bsp::{BspTree, Leaf, Node};
pub use level::{LevelDef, PortalDef, PvsTable, Topology, World};
pub use primitive::{Primitive, PrimitiveLink, PrimitiveRaycastCallbacks, PrimitiveShape, PrimitiveTriangleHit};
pub use surface::{Surface, SurfaceFlags};
