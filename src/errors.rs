//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EngineError`] covers all failure modes including:
//! - Registry identity errors (duplicate or unknown ids, stale keys)
//! - Scene graph errors
//! - Mesh buffer ownership and capacity errors
//! - GPU device failures surfaced through the device seam
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, EngineError>`.
//!
//! ```rust,ignore
//! use janus::errors::{EngineError, Result};
//!
//! fn add_asset() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::gpu::GpuError;

/// The main error type for the Janus engine.
///
/// This enum covers all possible error conditions that can occur
/// during engine operation. Each variant provides specific context
/// about what went wrong.
#[derive(Error, Debug)]
pub enum EngineError {
    // ========================================================================
    // Registry & Identity Errors
    // ========================================================================
    /// An id was registered twice in the same registry.
    #[error("Duplicate {kind} id: '{id}'")]
    DuplicateId {
        /// Registry the id collided in (mesh, material, effect, ...)
        kind: &'static str,
        /// The colliding id
        id: String,
    },

    /// A string id did not resolve in its registry.
    #[error("Unknown {kind} id: '{id}'")]
    UnknownId {
        /// Registry the lookup ran against
        kind: &'static str,
        /// The id that failed to resolve
        id: String,
    },

    /// A generational key no longer points at a live entry.
    #[error("Stale {kind} key: the referenced {kind} was removed")]
    StaleKey {
        /// Registry the key belongs to
        kind: &'static str,
    },

    // ========================================================================
    // Scene Graph Errors
    // ========================================================================
    /// A node key did not resolve inside its scene.
    #[error("Node not found in scene '{scene}'")]
    NodeNotFound {
        /// The scene that was searched
        scene: String,
    },

    /// The scene root cannot be removed.
    #[error("Cannot remove the root node of scene '{scene}'")]
    RootRemoval {
        /// The scene whose root was targeted
        scene: String,
    },

    /// Re-parenting would break the tree shape.
    #[error("Cannot attach node in scene '{scene}': {detail}")]
    BadAttach {
        /// The scene the attach ran against
        scene: String,
        /// Which rule the attach violated
        detail: &'static str,
    },

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// Mesh data failed structural validation.
    #[error("Invalid mesh data for '{mesh}': {detail}")]
    InvalidMeshData {
        /// The mesh id being registered
        mesh: String,
        /// What failed (lane count, index range, face count)
        detail: String,
    },

    // ========================================================================
    // Mesh Buffer Errors
    // ========================================================================
    /// The mesh already belongs to a different buffer.
    #[error("Mesh '{mesh}' already belongs to mesh buffer '{owner}'")]
    BufferConflict {
        /// The mesh being added
        mesh: String,
        /// The buffer that currently owns it
        owner: String,
    },

    /// The mesh was added to the same buffer twice.
    #[error("Mesh '{mesh}' was already added to mesh buffer '{buffer}'")]
    AlreadyInBuffer {
        /// The mesh being added
        mesh: String,
        /// The buffer it already belongs to
        buffer: String,
    },

    /// The mesh is not a member of the buffer it was removed from.
    #[error("Mesh '{mesh}' is not a member of mesh buffer '{buffer}'")]
    NotInBuffer {
        /// The mesh being removed
        mesh: String,
        /// The buffer the removal ran against
        buffer: String,
    },

    /// Adding the mesh would overflow the buffer's fixed capacity.
    #[error(
        "Mesh buffer '{buffer}' out of {resource} capacity: requested {requested}, available {available}"
    )]
    CapacityExceeded {
        /// The buffer that ran out of room
        buffer: String,
        /// Which pool overflowed ("vertex" or "index")
        resource: &'static str,
        /// How many slots the mesh needs
        requested: u32,
        /// How many slots remain
        available: u32,
    },

    // ========================================================================
    // Canvas Errors
    // ========================================================================
    /// Only one canvas may render to the default framebuffer.
    #[error("A final canvas already exists at index {existing}")]
    FinalCanvasExists {
        /// Index of the canvas already bound to the default framebuffer
        existing: usize,
    },

    // ========================================================================
    // Device Limit Errors
    // ========================================================================
    /// An effect references more textures than the device exposes units.
    #[error("Effect '{effect}' uses {count} textures but the device has {limit} units")]
    TextureUnitsExceeded {
        /// The offending effect id
        effect: String,
        /// Textures the effect references
        count: usize,
        /// Texture units the device reports
        limit: u32,
    },

    // ========================================================================
    // Threading Errors
    // ========================================================================
    /// The worker pool could not be built.
    #[error("Task pool error: {0}")]
    TaskPool(#[from] rayon::ThreadPoolBuildError),

    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// A GPU device operation failed.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

/// Alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;
