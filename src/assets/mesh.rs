//! Mesh Definitions
//!
//! A [`Mesh`] owns interleaved CPU-side vertex data in the engine's single
//! vertex format plus `u32` triangle indices. Faces carry optional ids and
//! tags that materials can target with per-face effects. Models are named
//! material bindings; every mesh starts with one default model.
//!
//! GPU residency is handled elsewhere: a mesh joins at most one mesh buffer,
//! tracked here as a key relation only.

use glam::DVec3;

use crate::errors::{EngineError, Result};
use crate::gpu::VERTEX_FLOATS;
use crate::render::MeshBufferKey;

use super::MaterialKey;

/// One triangle's identity for per-face effect lookup.
#[derive(Clone, Debug, Default)]
pub struct MeshFace {
    /// Face id, unique within the mesh by convention.
    pub id: String,
    /// Grouping tags, checked after the id.
    pub tags: Vec<String>,
}

impl MeshFace {
    #[must_use]
    pub fn new(id: impl Into<String>, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Raw mesh definition as handed over by the asset collaborator.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    /// Interleaved pos/normal/uv lanes, eight `f32` per vertex.
    pub vertices: Vec<f32>,
    /// Triangle indices into `vertices`.
    pub indices: Vec<u32>,
    /// Per-triangle identity; may be empty when no face targets effects.
    pub faces: Vec<MeshFace>,
}

impl MeshData {
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        (self.vertices.len() / VERTEX_FLOATS) as u32
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.index_count() / 3
    }

    fn validate(&self, mesh: &str) -> Result<()> {
        let invalid = |detail: String| EngineError::InvalidMeshData {
            mesh: mesh.to_owned(),
            detail,
        };
        if self.vertices.is_empty() {
            return Err(invalid("no vertices".into()));
        }
        if self.vertices.len() % VERTEX_FLOATS != 0 {
            return Err(invalid(format!(
                "vertex lane count {} is not a multiple of {VERTEX_FLOATS}",
                self.vertices.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(invalid(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        if !self.faces.is_empty() && self.faces.len() != self.triangle_count() as usize {
            return Err(invalid(format!(
                "{} faces for {} triangles",
                self.faces.len(),
                self.triangle_count()
            )));
        }
        Ok(())
    }
}

/// Sphere that encloses all vertex positions, in mesh-local space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    /// Center of the positions' bounding box, radius to the farthest vertex.
    fn from_vertices(vertices: &[f32]) -> Self {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for v in vertices.chunks_exact(VERTEX_FLOATS) {
            let p = DVec3::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2]));
            min = min.min(p);
            max = max.max(p);
        }
        let center = (min + max) * 0.5;
        let mut radius_sq: f64 = 0.0;
        for v in vertices.chunks_exact(VERTEX_FLOATS) {
            let p = DVec3::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2]));
            radius_sq = radius_sq.max(center.distance_squared(p));
        }
        Self {
            center,
            radius: radius_sq.sqrt(),
        }
    }
}

/// A named material binding on a mesh.
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub material: Option<MaterialKey>,
}

/// A registered mesh: validated data, models, bounds and buffer membership.
pub struct Mesh {
    id: String,
    data: MeshData,
    models: Vec<Model>,
    bounds: BoundingSphere,
    /// The buffer this mesh currently lives in, if any.
    pub(crate) buffer: Option<MeshBufferKey>,
    /// Cleared whenever membership changes; the render stage uploads on
    /// demand and sets it again.
    pub(crate) gpu_synced: bool,
}

impl Mesh {
    pub(crate) fn new(id: String, data: MeshData) -> Result<Self> {
        data.validate(&id)?;
        let bounds = BoundingSphere::from_vertices(&data.vertices);
        Ok(Self {
            id,
            data,
            models: vec![Model {
                name: String::new(),
                material: None,
            }],
            bounds,
            buffer: None,
            gpu_synced: false,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn data(&self) -> &MeshData {
        &self.data
    }

    #[must_use]
    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.data.vertex_count()
    }

    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.data.index_count()
    }

    /// The buffer this mesh belongs to, if it has been added to one.
    #[must_use]
    pub fn buffer(&self) -> Option<MeshBufferKey> {
        self.buffer
    }

    #[must_use]
    pub fn is_gpu_synced(&self) -> bool {
        self.gpu_synced
    }

    // ==== Models ====

    #[must_use]
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// The unnamed model every mesh starts with.
    #[must_use]
    pub fn default_model(&self) -> &Model {
        &self.models[0]
    }

    #[must_use]
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    /// First model with the given name.
    #[must_use]
    pub fn model_index(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name == name)
    }

    /// Adds a named variant cloning the default model's material binding.
    pub fn add_model(&mut self, name: impl Into<String>) -> usize {
        let material = self.models[0].material;
        self.models.push(Model {
            name: name.into(),
            material,
        });
        self.models.len() - 1
    }

    /// Points a model at a material. Out-of-range indices are ignored.
    pub fn set_model_material(&mut self, index: usize, material: Option<MaterialKey>) {
        if let Some(model) = self.models.get_mut(index) {
            model.material = material;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> MeshData {
        MeshData {
            vertices: vec![0.0; VERTEX_FLOATS * 3],
            indices: vec![0, 1, 2],
            faces: Vec::new(),
        }
    }

    #[test]
    fn validation_rejects_ragged_lanes() {
        let mut data = tri();
        data.vertices.pop();
        assert!(Mesh::new("m".into(), data).is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_index() {
        let mut data = tri();
        data.indices[2] = 9;
        assert!(Mesh::new("m".into(), data).is_err());
    }

    #[test]
    fn validation_rejects_face_count_mismatch() {
        let mut data = tri();
        data.faces = vec![MeshFace::default(), MeshFace::default()];
        assert!(Mesh::new("m".into(), data).is_err());
    }

    #[test]
    fn bounds_cover_all_positions() {
        let mut data = tri();
        data.vertices[0] = -2.0; // v0.x
        data.vertices[VERTEX_FLOATS] = 2.0; // v1.x
        let mesh = Mesh::new("m".into(), data).unwrap();
        let b = mesh.bounds();
        assert!((b.center.x).abs() < 1e-9);
        assert!(b.radius >= 2.0);
    }
}
