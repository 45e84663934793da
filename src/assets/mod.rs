//! Asset Registries
//!
//! Meshes, materials and effects live in slotmap-backed stores addressed two
//! ways: by generational key inside the engine, and by the string id the
//! asset collaborator registered them under. Programs and textures arrive
//! pre-built from the GPU collaborator and are stored as opaque handles.
//!
//! The engine performs no file IO and no decoding; everything here is
//! definition data handed over through [`AssetLibrary`].

mod material;
mod mesh;
pub mod prefabs;

pub use material::{Effect, FaceEffects, Material};
pub use mesh::{BoundingSphere, Mesh, MeshData, MeshFace, Model};

use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::errors::{EngineError, Result};
use crate::gpu::{ProgramHandle, TextureHandle};

new_key_type! {
    /// Key into the mesh store.
    pub struct MeshKey;
    /// Key into the material store.
    pub struct MaterialKey;
    /// Key into the effect store.
    pub struct EffectKey;
}

// ============================================================================
// Generic store
// ============================================================================

/// A slotmap store with a string-id lookup table.
pub struct AssetStore<K: Key, T> {
    map: SlotMap<K, T>,
    lookup: FxHashMap<String, K>,
}

impl<K: Key, T> Default for AssetStore<K, T> {
    fn default() -> Self {
        Self {
            map: SlotMap::default(),
            lookup: FxHashMap::default(),
        }
    }
}

impl<K: Key, T> AssetStore<K, T> {
    /// Inserts under a unique id. `kind` names the registry in errors.
    pub fn insert(&mut self, kind: &'static str, id: String, value: T) -> Result<K> {
        if self.lookup.contains_key(&id) {
            return Err(EngineError::DuplicateId { kind, id });
        }
        let key = self.map.insert(value);
        self.lookup.insert(id, key);
        Ok(key)
    }

    #[must_use]
    pub fn get(&self, key: K) -> Option<&T> {
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.map.get_mut(key)
    }

    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.lookup.contains_key(id)
    }

    /// Removes by string id, returning the entry.
    pub fn remove_by_id(&mut self, kind: &'static str, id: &str) -> Result<(K, T)> {
        let key = self
            .lookup
            .remove(id)
            .ok_or_else(|| EngineError::UnknownId {
                kind,
                id: id.to_owned(),
            })?;
        let value = self
            .map
            .remove(key)
            .ok_or(EngineError::StaleKey { kind })?;
        Ok((key, value))
    }

    /// Removes every entry, returning them.
    pub fn drain(&mut self) -> Vec<(K, T)> {
        self.lookup.clear();
        self.map.drain().collect()
    }

    /// Resolves a string id, with a descriptive error on a miss.
    pub fn resolve(&self, kind: &'static str, id: &str) -> Result<K> {
        self.lookup
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::UnknownId {
                kind,
                id: id.to_owned(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.map.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.map.values_mut()
    }
}

// ============================================================================
// Library
// ============================================================================

/// Every asset definition the engine knows about.
#[derive(Default)]
pub struct AssetLibrary {
    meshes: AssetStore<MeshKey, Mesh>,
    materials: AssetStore<MaterialKey, Material>,
    effects: AssetStore<EffectKey, Effect>,
    programs: FxHashMap<String, ProgramHandle>,
    textures: FxHashMap<String, TextureHandle>,
}

impl AssetLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ==== Meshes ====

    /// Validates and stores mesh data under `id`.
    pub fn add_mesh(&mut self, id: impl Into<String>, data: MeshData) -> Result<MeshKey> {
        let id = id.into();
        let mesh = Mesh::new(id.clone(), data)?;
        self.meshes.insert("mesh", id, mesh)
    }

    #[must_use]
    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    pub fn mesh_mut(&mut self, key: MeshKey) -> Option<&mut Mesh> {
        self.meshes.get_mut(key)
    }

    pub fn mesh_key(&self, id: &str) -> Result<MeshKey> {
        self.meshes.resolve("mesh", id)
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    // ==== Materials ====

    /// Stores a material. `default_effect` must be a live effect key.
    pub fn add_material(
        &mut self,
        id: impl Into<String>,
        default_effect: EffectKey,
        face_effects: FaceEffects,
    ) -> Result<MaterialKey> {
        let id = id.into();
        if !self.effects.contains(default_effect) {
            return Err(EngineError::StaleKey { kind: "effect" });
        }
        self.materials.insert(
            "material",
            id.clone(),
            Material::new(id, default_effect, face_effects),
        )
    }

    #[must_use]
    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    pub fn material_key(&self, id: &str) -> Result<MaterialKey> {
        self.materials.resolve("material", id)
    }

    // ==== Effects ====

    /// Stores an effect tying a program to its texture set.
    ///
    /// Texture-unit limits are enforced by the engine at registration, where
    /// the device is in reach.
    pub fn add_effect(
        &mut self,
        id: impl Into<String>,
        program: ProgramHandle,
        textures: impl Into<SmallVec<[TextureHandle; 8]>>,
    ) -> Result<EffectKey> {
        let id = id.into();
        self.effects
            .insert("effect", id.clone(), Effect::new(id, program, textures.into()))
    }

    #[must_use]
    pub fn effect(&self, key: EffectKey) -> Option<&Effect> {
        self.effects.get(key)
    }

    pub fn effect_key(&self, id: &str) -> Result<EffectKey> {
        self.effects.resolve("effect", id)
    }

    // ==== GPU collaborator registrations ====

    /// Registers an externally linked program under `id`.
    pub fn register_program(&mut self, id: impl Into<String>, handle: ProgramHandle) -> Result<()> {
        let id = id.into();
        if self.programs.contains_key(&id) {
            return Err(EngineError::DuplicateId { kind: "program", id });
        }
        self.programs.insert(id, handle);
        Ok(())
    }

    pub fn program(&self, id: &str) -> Result<ProgramHandle> {
        self.programs
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::UnknownId {
                kind: "program",
                id: id.to_owned(),
            })
    }

    /// Registers an externally decoded texture under `id`.
    pub fn register_texture(&mut self, id: impl Into<String>, handle: TextureHandle) -> Result<()> {
        let id = id.into();
        if self.textures.contains_key(&id) {
            return Err(EngineError::DuplicateId { kind: "texture", id });
        }
        self.textures.insert(id, handle);
        Ok(())
    }

    pub fn texture(&self, id: &str) -> Result<TextureHandle> {
        self.textures
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::UnknownId {
                kind: "texture",
                id: id.to_owned(),
            })
    }
}
