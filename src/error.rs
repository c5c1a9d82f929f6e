//! Crate-wide error enums. None of these are ever thrown as exceptions:
//! they back the diagnostic logged at a failure site, while the public API
//! itself still returns a plain bool or sentinel value to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("link pool exhausted while linking primitive {0:?} to its areas")]
    LinkPoolExhausted(crate::world::types::PrimitiveId),

    #[error("portal stack overflow (depth > {0})")]
    PortalStackOverflow(usize),

    #[error("degenerate geometric input: {0}")]
    DegenerateInput(&'static str),
}

#[derive(Debug, Error)]
pub enum NavMeshError {
    #[error("invalid build config: {0}")]
    InvalidConfig(&'static str),

    #[error("build stage '{stage}' failed: {reason}")]
    BuildStageFailed { stage: &'static str, reason: String },

    #[error("tile cache compressor error: {0}")]
    Compressor(&'static str),

    #[error("tile coordinate ({0}, {1}) out of grid bounds")]
    TileOutOfBounds(i32, i32),
}

#[derive(Debug, Error)]
pub enum RayError {
    #[error("degenerate ray: length below EPS_SEGMENT_MIN")]
    DegenerateRay,
}
