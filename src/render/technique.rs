use crate::assets::AssetStore;
use crate::errors::Result;
use crate::gpu::layout::{SCENE_LAYOUT, SCREEN_QUAD_LAYOUT, VertexLayout};
use crate::render::TechniqueKey;

/// Name of the stock full-scene technique.
pub const SCENE: &str = "scene";
/// Name of the stock fullscreen-quad technique.
pub const SCREEN_QUAD: &str = "screen_quad";

/// A rendering strategy: a name plus the vertex attribute layout its
/// programs consume.
///
/// Every mesh buffer builds one vertex array per registered technique, so
/// techniques must be registered before mesh buffers are created.
pub struct Technique {
    name: String,
    /// Attribute layout for this technique's vertex arrays.
    pub layout: &'static VertexLayout,
}

impl Technique {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of techniques by key and by name.
#[derive(Default)]
pub struct TechniqueRegistry {
    store: AssetStore<TechniqueKey, Technique>,
}

impl TechniqueRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the two built-in techniques.
    pub fn register_stock(&mut self) -> Result<()> {
        self.register(SCENE, &SCENE_LAYOUT)?;
        self.register(SCREEN_QUAD, &SCREEN_QUAD_LAYOUT)?;
        Ok(())
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        layout: &'static VertexLayout,
    ) -> Result<TechniqueKey> {
        let name = name.into();
        self.store.insert(
            "technique",
            name.clone(),
            Technique { name, layout },
        )
    }

    #[must_use]
    pub fn get(&self, key: TechniqueKey) -> Option<&Technique> {
        self.store.get(key)
    }

    pub fn resolve(&self, name: &str) -> Result<TechniqueKey> {
        self.store.resolve("technique", name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TechniqueKey, &Technique)> {
        self.store.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
