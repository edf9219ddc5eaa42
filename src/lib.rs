//! # VertDb
//!
//! In-memory per-vertex attribute store with a uniform-grid spatial index
//! and a multi-stage attribute transfer pipeline.
//!
//! A [`VertexDb`] keeps one record per mesh vertex: stable external id,
//! position, normal, texture coordinate, color, bone weights, connectivity
//! and an opaque user payload. Records are addressed by dense [`VertKey`]s
//! and looked up by id, by position, texture-coordinate, or color
//! proximity, or by graph traversal over connectivity. [`TransferDb`]
//! moves attributes between stores through an ordered chain of resolver
//! strategies.

pub mod def;
pub mod grid;
pub mod math;
pub mod parallel;
pub mod sparse;
pub mod store;
pub mod transfer;

pub use def::{
    accumulate_weights, combine_defs, combine_defs_uniform, BoneId, BoneWeight, FieldMask, VertId,
    VertexDef,
};
pub use grid::PointGrid;
pub use store::{StoreConfig, VertKey, VertexDb, WeightOptions, INVALID_VERT_KEY};
pub use transfer::{
    FloodFillResolver, GaussianResolver, IdMatchResolver, NearestPositionResolver,
    NearestUvwResolver, TransferDb, TransferResolver, DEFAULT_TOLERANCE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
