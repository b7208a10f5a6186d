//! Error types for shape construction and allocator misuse.

use thiserror::Error;

/// Errors reported by the physics core.
///
/// Geometric early-outs (separated shapes, clipped-away edges) are not errors;
/// they produce empty manifolds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// A polygon could not be built from the supplied points.
    #[error("invalid polygon: {reason}")]
    InvalidPolygon { reason: &'static str },

    /// A chain could not be built from the supplied points.
    #[error("invalid chain: {reason}")]
    InvalidChain { reason: &'static str },

    /// A block handed back to the allocator does not match its bookkeeping.
    #[error("invalid free: {reason}")]
    InvalidFree { reason: &'static str },

    /// A block handle that this allocator never issued, or one issued before
    /// the last `clear`.
    #[error("unknown block handle")]
    UnknownBlock,

    /// A typed value does not fit in the block it was read from.
    #[error("block of {available} bytes cannot hold {needed} bytes")]
    BlockTooSmall { needed: usize, available: usize },

    /// Zero-sized values cannot be stored in the block allocator.
    #[error("zero-sized allocation")]
    ZeroSizedAllocation,

    /// A block's bytes could not be reinterpreted as the requested type.
    #[error("block cast failed: {0}")]
    PodCast(bytemuck::PodCastError),
}

impl From<bytemuck::PodCastError> for PhysicsError {
    fn from(err: bytemuck::PodCastError) -> Self {
        Self::PodCast(err)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhysicsError>;
