//! Materials and Effects
//!
//! An [`Effect`] is the GPU-facing unit the batcher sorts by: one program
//! plus the textures it samples. A [`Material`] names a default effect and
//! may override it per face, by face id first and face tag second.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::gpu::{ProgramHandle, TextureHandle};

use super::EffectKey;
use super::mesh::MeshFace;

/// A program with its texture bindings, in unit order.
pub struct Effect {
    id: String,
    pub program: ProgramHandle,
    pub textures: SmallVec<[TextureHandle; 8]>,
}

impl Effect {
    pub(crate) fn new(
        id: String,
        program: ProgramHandle,
        textures: SmallVec<[TextureHandle; 8]>,
    ) -> Self {
        Self {
            id,
            program,
            textures,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Per-face effect overrides. Id matches win over tag matches.
#[derive(Clone, Debug, Default)]
pub struct FaceEffects {
    pub by_id: FxHashMap<String, EffectKey>,
    pub by_tag: FxHashMap<String, EffectKey>,
}

impl FaceEffects {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_tag.is_empty()
    }

    /// The override for `face`, if any: its id first, then its tags in order.
    #[must_use]
    pub fn resolve(&self, face: &MeshFace) -> Option<EffectKey> {
        if let Some(&fx) = self.by_id.get(&face.id) {
            return Some(fx);
        }
        face.tags
            .iter()
            .find_map(|tag| self.by_tag.get(tag).copied())
    }
}

/// A default effect plus optional per-face overrides.
pub struct Material {
    id: String,
    pub default_effect: EffectKey,
    pub face_effects: FaceEffects,
}

impl Material {
    pub(crate) fn new(id: String, default_effect: EffectKey, face_effects: FaceEffects) -> Self {
        Self {
            id,
            default_effect,
            face_effects,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this material splits meshes into per-face batch entries.
    #[must_use]
    pub fn has_face_effects(&self) -> bool {
        !self.face_effects.is_empty()
    }

    /// Effect for `face`, falling back to the default effect.
    #[must_use]
    pub fn effect_for_face(&self, face: &MeshFace) -> EffectKey {
        self.face_effects.resolve(face).unwrap_or(self.default_effect)
    }
}
