//! Vertex Layout
//!
//! All mesh data shares one interleaved format: position (3), normal (3),
//! texture coordinate (2), eight `f32` per vertex. Indices are `u32`.
//! Techniques pick which attributes of that format their vertex arrays
//! actually wire up.

/// `f32` lanes per interleaved vertex.
pub const VERTEX_FLOATS: usize = 8;

/// Bytes per interleaved vertex.
pub const VERTEX_STRIDE: usize = VERTEX_FLOATS * 4;

/// Bytes per index.
pub const INDEX_STRIDE: usize = 4;

/// One attribute inside the interleaved vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttr {
    /// Shader-side attribute name.
    pub name: &'static str,
    /// Number of `f32` components.
    pub components: u32,
    /// Byte offset from the vertex start.
    pub byte_offset: u32,
}

/// The attribute set a vertex array exposes to a program.
///
/// The stride is always [`VERTEX_STRIDE`]; layouts differ only in which
/// attributes they enable, so buffers are shared freely between techniques.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub attrs: &'static [VertexAttr],
}

impl VertexLayout {
    #[must_use]
    pub const fn stride(&self) -> usize {
        VERTEX_STRIDE
    }
}

/// Position + normal + uv, the full scene format.
pub const SCENE_LAYOUT: VertexLayout = VertexLayout {
    attrs: &[
        VertexAttr {
            name: "a_pos",
            components: 3,
            byte_offset: 0,
        },
        VertexAttr {
            name: "a_normal",
            components: 3,
            byte_offset: 12,
        },
        VertexAttr {
            name: "a_uv",
            components: 2,
            byte_offset: 24,
        },
    ],
};

/// Position + uv, for screen-space quads. Normals stay in the buffer but
/// are not wired up.
pub const SCREEN_QUAD_LAYOUT: VertexLayout = VertexLayout {
    attrs: &[
        VertexAttr {
            name: "a_pos",
            components: 3,
            byte_offset: 0,
        },
        VertexAttr {
            name: "a_uv",
            components: 2,
            byte_offset: 24,
        },
    ],
};
