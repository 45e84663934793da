//! Prefab Meshes
//!
//! Generators for the stock shapes: plane, cube and pyramid. Each returns a
//! [`MeshData`] in the engine's interleaved format with tagged faces, so
//! per-face effect materials work on prefabs out of the box.

use super::{MeshData, MeshFace};

fn push_vertex(out: &mut Vec<f32>, pos: [f32; 3], normal: [f32; 3], uv: [f32; 2]) {
    out.extend_from_slice(&pos);
    out.extend_from_slice(&normal);
    out.extend_from_slice(&uv);
}

/// A `width` x `depth` quad in the XZ plane, normal up, centered at the
/// origin. Faces: `p0`/`p1`, both tagged `plane`.
#[must_use]
pub fn plane(width: f32, depth: f32) -> MeshData {
    let w = width / 2.0;
    let d = depth / 2.0;
    let mut vertices = Vec::with_capacity(4 * 8);
    let n = [0.0, 1.0, 0.0];
    push_vertex(&mut vertices, [-w, 0.0, -d], n, [0.0, 0.0]);
    push_vertex(&mut vertices, [-w, 0.0, d], n, [0.0, 1.0]);
    push_vertex(&mut vertices, [w, 0.0, d], n, [1.0, 1.0]);
    push_vertex(&mut vertices, [w, 0.0, -d], n, [1.0, 0.0]);

    MeshData {
        vertices,
        // CCW seen from +Y
        indices: vec![0, 1, 2, 0, 2, 3],
        faces: vec![MeshFace::new("p0", ["plane"]), MeshFace::new("p1", ["plane"])],
    }
}

/// An axis-aligned box centered at the origin, 4 vertices per face.
///
/// Face ids follow the face: `front+0`/`front+1` for the two +Z triangles
/// and so on. Vertical faces are tagged `side`, top and bottom `cap`.
#[must_use]
pub fn cube(width: f32, height: f32, depth: f32) -> MeshData {
    let w = width / 2.0;
    let h = height / 2.0;
    let d = depth / 2.0;

    // (名字, tag, 法线, 面内 u 轴, 面内 v 轴)
    let sides: [(&str, &str, [f32; 3], [f32; 3], [f32; 3]); 6] = [
        ("front", "side", [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ("back", "side", [0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ("top", "cap", [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ("bottom", "cap", [0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ("right", "side", [1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ("left", "side", [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ];
    let half = [w, h, d];
    let scale = |v: [f32; 3]| [v[0] * half[0], v[1] * half[1], v[2] * half[2]];

    let mut vertices = Vec::with_capacity(24 * 8);
    let mut indices = Vec::with_capacity(36);
    let mut faces = Vec::with_capacity(12);

    for (i, (name, tag, n, u, v)) in sides.iter().enumerate() {
        let center = scale(*n);
        let uv_corners = [(-1.0, -1.0, 0.0, 1.0), (1.0, -1.0, 1.0, 1.0), (1.0, 1.0, 1.0, 0.0), (-1.0, 1.0, 0.0, 0.0)];
        for (su, sv, tu, tv) in uv_corners {
            let du = scale(*u);
            let dv = scale(*v);
            let pos = [
                center[0] + su * du[0] + sv * dv[0],
                center[1] + su * du[1] + sv * dv[1],
                center[2] + su * du[2] + sv * dv[2],
            ];
            push_vertex(&mut vertices, pos, *n, [tu, tv]);
        }
        // Two CCW triangles: 0-1-2, 0-2-3
        let base = (i * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        faces.push(MeshFace::new(format!("{name}+0"), [*tag]));
        faces.push(MeshFace::new(format!("{name}+1"), [*tag]));
    }

    MeshData {
        vertices,
        indices,
        faces,
    }
}

/// A four-sided pyramid with a square base, centered at the origin.
///
/// Side faces are `side-0`..`side-3` tagged `side`; the base pair is
/// `base-0`/`base-1` tagged `base`.
#[must_use]
pub fn pyramid(base: f32, height: f32) -> MeshData {
    let b = base / 2.0;
    let h = height / 2.0;
    let apex = [0.0, h, 0.0];
    // 底面四角, 逆时针 (从 +Y 看)
    let corners = [[-b, -h, -b], [-b, -h, b], [b, -h, b], [b, -h, -b]];

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut faces = Vec::new();

    for i in 0..4 {
        let a = corners[i];
        let c = corners[(i + 1) % 4];
        let n = triangle_normal(a, c, apex);
        let base_idx = (vertices.len() / 8) as u32;
        push_vertex(&mut vertices, a, n, [0.0, 1.0]);
        push_vertex(&mut vertices, c, n, [1.0, 1.0]);
        push_vertex(&mut vertices, apex, n, [0.5, 0.0]);
        indices.extend_from_slice(&[base_idx, base_idx + 1, base_idx + 2]);
        faces.push(MeshFace::new(format!("side-{i}"), ["side"]));
    }

    let down = [0.0, -1.0, 0.0];
    let base_idx = (vertices.len() / 8) as u32;
    push_vertex(&mut vertices, corners[0], down, [0.0, 0.0]);
    push_vertex(&mut vertices, corners[3], down, [1.0, 0.0]);
    push_vertex(&mut vertices, corners[2], down, [1.0, 1.0]);
    push_vertex(&mut vertices, corners[1], down, [0.0, 1.0]);
    // 从下方看为逆时针
    indices.extend_from_slice(&[base_idx, base_idx + 1, base_idx + 2]);
    indices.extend_from_slice(&[base_idx, base_idx + 2, base_idx + 3]);
    faces.push(MeshFace::new("base-0", ["base"]));
    faces.push(MeshFace::new("base-1", ["base"]));

    MeshData {
        vertices,
        indices,
        faces,
    }
}

fn triangle_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        ab[1] * ac[2] - ab[2] * ac[1],
        ab[2] * ac[0] - ab[0] * ac[2],
        ab[0] * ac[1] - ab[1] * ac[0],
    ];
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    [n[0] / len, n[1] / len, n[2] / len]
}
