use crate::error::AssetError;
use crate::model::{GltfSource, Model, sibling_locator};
use crate::texture::{EnvironmentMap, Texture};
use crate::AssetId;
use enigma_common::Fetcher;
use enigma_events::{AppEvent, Emitter};
use enigma_scene::MeshHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A resource handed back to its owner when the manager lets go of it.
#[derive(Debug, Clone, PartialEq)]
pub enum Released {
    Model {
        name: String,
        id: AssetId,
        meshes: Vec<MeshHandle>,
    },
    Texture { name: String, id: AssetId },
    Environment { name: String, id: AssetId },
}

/// Called once per released resource, typically to free GPU copies.
pub type ReleaseHook = Box<dyn FnMut(Released)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Texture,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: AssetKind,
    pub name: String,
    pub locator: String,
    pub id: AssetId,
}

/// Snapshot of everything the manager currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub entries: Vec<ManifestEntry>,
}

impl AssetManifest {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

struct Entry<T> {
    locator: String,
    resource: Arc<T>,
}

/// Loads assets through a [`Fetcher`] and keeps them in named registries.
pub struct AssetManager<F> {
    fetcher: F,
    events: Emitter<AppEvent>,
    models: BTreeMap<String, Entry<Model>>,
    textures: BTreeMap<String, Entry<Texture>>,
    environments: BTreeMap<String, Entry<EnvironmentMap>>,
    release: Option<ReleaseHook>,
}

impl<F: Fetcher> AssetManager<F> {
    pub fn new(fetcher: F, events: Emitter<AppEvent>) -> Self {
        Self {
            fetcher,
            events,
            models: BTreeMap::new(),
            textures: BTreeMap::new(),
            environments: BTreeMap::new(),
            release: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn set_release_hook(&mut self, hook: impl FnMut(Released) + 'static) {
        self.release = Some(Box::new(hook));
    }

    /// Load a glTF or GLB model. `on_progress` receives the fraction of the
    /// model file received so far.
    pub async fn load_model(
        &mut self,
        name: &str,
        locator: &str,
        on_progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Arc<Model>, AssetError> {
        let result = self.read_model(name, locator, on_progress).await;
        let model = Arc::new(self.report(locator, result)?);
        tracing::info!(
            name,
            locator,
            meshes = model.meshes.len(),
            triangles = model.triangle_count(),
            "model loaded"
        );
        store(&mut self.models, "model", name, locator, model.clone());
        Ok(model)
    }

    pub async fn load_texture(&mut self, name: &str, locator: &str) -> Result<Arc<Texture>, AssetError> {
        let result = match self.fetch(locator, None).await {
            Ok(bytes) => Texture::decode(AssetId::of(&bytes), name, &bytes).map_err(AssetError::from),
            Err(e) => Err(e),
        };
        let texture = Arc::new(self.report(locator, result)?);
        tracing::info!(name, locator, width = texture.width, height = texture.height, "texture loaded");
        store(&mut self.textures, "texture", name, locator, texture.clone());
        Ok(texture)
    }

    /// Load an equirectangular image and prefilter it into a mip chain.
    pub async fn load_environment(
        &mut self,
        name: &str,
        locator: &str,
    ) -> Result<Arc<EnvironmentMap>, AssetError> {
        let result = match self.fetch(locator, None).await {
            Ok(bytes) => {
                EnvironmentMap::decode(AssetId::of(&bytes), name, &bytes).map_err(AssetError::from)
            }
            Err(e) => Err(e),
        };
        let env = Arc::new(self.report(locator, result)?);
        tracing::info!(name, locator, mips = env.mip_count(), "environment loaded");
        store(&mut self.environments, "environment", name, locator, env.clone());
        Ok(env)
    }

    pub fn get_model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.get(name).map(|e| e.resource.clone())
    }

    pub fn get_texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.get(name).map(|e| e.resource.clone())
    }

    pub fn get_environment(&self, name: &str) -> Option<Arc<EnvironmentMap>> {
        self.environments.get(name).map(|e| e.resource.clone())
    }

    /// Total number of held resources across all registries.
    pub fn len(&self) -> usize {
        self.models.len() + self.textures.len() + self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn manifest(&self) -> AssetManifest {
        let mut entries = Vec::with_capacity(self.len());
        let mut push = |kind, name: &String, locator: &String, id| {
            entries.push(ManifestEntry {
                kind,
                name: name.clone(),
                locator: locator.clone(),
                id,
            })
        };
        for (name, e) in &self.models {
            push(AssetKind::Model, name, &e.locator, e.resource.id);
        }
        for (name, e) in &self.textures {
            push(AssetKind::Texture, name, &e.locator, e.resource.id);
        }
        for (name, e) in &self.environments {
            push(AssetKind::Environment, name, &e.locator, e.resource.id);
        }
        AssetManifest { entries }
    }

    /// Release every held resource once and empty the registries.
    /// Returns how many resources were released.
    pub fn dispose(&mut self) -> usize {
        let mut released = Vec::with_capacity(self.len());
        for (name, e) in std::mem::take(&mut self.models) {
            released.push(Released::Model {
                name,
                id: e.resource.id,
                meshes: e.resource.mesh_handles(),
            });
        }
        for (name, e) in std::mem::take(&mut self.textures) {
            released.push(Released::Texture {
                name,
                id: e.resource.id,
            });
        }
        for (name, e) in std::mem::take(&mut self.environments) {
            released.push(Released::Environment {
                name,
                id: e.resource.id,
            });
        }

        let count = released.len();
        if let Some(hook) = self.release.as_mut() {
            for resource in released {
                hook(resource);
            }
        }
        tracing::info!(count, "assets disposed");
        count
    }

    async fn read_model(
        &self,
        name: &str,
        locator: &str,
        on_progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Model, AssetError> {
        let bytes = self.fetch(locator, on_progress).await?;
        let mut source = GltfSource::parse(&bytes)?;
        let mut external = Vec::new();
        for (index, uri) in source.external_buffers() {
            let data = self.fetch(&sibling_locator(locator, &uri), None).await?;
            external.push((index, data));
        }
        let buffers = source.resolve_buffers(external)?;
        source.decode(AssetId::of(&bytes), name, &buffers)
    }

    async fn fetch(
        &self,
        locator: &str,
        mut on_progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<Vec<u8>, AssetError> {
        let events = self.events.clone();
        let mut progress = |loaded: u64, total: Option<u64>| {
            let total = total.unwrap_or(0);
            events.emit(AppEvent::progress(locator, loaded, total));
            if let Some(callback) = on_progress.as_mut() {
                let fraction = if total == 0 {
                    1.0
                } else {
                    (loaded as f32 / total as f32).min(1.0)
                };
                callback(fraction);
            }
        };
        Ok(self.fetcher.fetch(locator, &mut progress).await?)
    }

    /// Surface a load failure on the event bus and in the log.
    fn report<T>(&self, locator: &str, result: Result<T, AssetError>) -> Result<T, AssetError> {
        if let Err(e) = &result {
            tracing::error!(locator, error = %e, "asset failed to load");
            self.events.emit(AppEvent::AssetError {
                url: locator.to_string(),
            });
        }
        result
    }
}

fn store<T>(
    registry: &mut BTreeMap<String, Entry<T>>,
    kind: &str,
    name: &str,
    locator: &str,
    resource: Arc<T>,
) {
    let entry = Entry {
        locator: locator.to_string(),
        resource,
    };
    if let Some(previous) = registry.insert(name.to_string(), entry) {
        tracing::warn!(
            kind,
            name,
            previous = %previous.locator,
            "replaced existing entry; the previous resource is not released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FileFetcher;
    use crate::model::tests::{quad_gltf, quad_positions};
    use enigma_events::EventBus;
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
            .save(path)
            .unwrap();
    }

    fn setup() -> (tempfile::TempDir, EventBus<AppEvent>) {
        (tempfile::tempdir().unwrap(), EventBus::new())
    }

    #[test]
    fn texture_load_emits_progress_and_registers() {
        let (dir, mut bus) = setup();
        write_png(&dir.path().join("albedo.png"), 4, 4);
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        let tex = pollster::block_on(assets.load_texture("albedo", "albedo.png")).unwrap();
        assert_eq!(tex.name, "albedo");
        assert_eq!(assets.get_texture("albedo").unwrap().width, 4);

        let events = bus.dispatch();
        match events.last() {
            Some(AppEvent::AssetProgress { url, progress, .. }) => {
                assert_eq!(url, "albedo.png");
                assert_eq!(*progress, 100.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failure_emits_asset_error_and_leaves_registry_alone() {
        let (dir, mut bus) = setup();
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        let result = pollster::block_on(assets.load_model("robot", "models/robot.glb", None));
        assert!(matches!(result, Err(AssetError::Fetch(_))));
        assert!(assets.get_model("robot").is_none());
        assert_eq!(
            bus.dispatch(),
            vec![AppEvent::AssetError {
                url: "models/robot.glb".into()
            }]
        );
    }

    #[test]
    fn decode_failure_is_reported_too() {
        let (dir, mut bus) = setup();
        std::fs::write(dir.path().join("broken.png"), b"definitely not png").unwrap();
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        let result = pollster::block_on(assets.load_texture("broken", "broken.png"));
        assert!(matches!(result, Err(AssetError::Image(_))));
        assert!(
            bus.dispatch()
                .contains(&AppEvent::AssetError { url: "broken.png".into() })
        );
    }

    #[test]
    fn model_with_sibling_buffer_loads() {
        let (dir, bus) = setup();
        let models = dir.path().join("models");
        std::fs::create_dir(&models).unwrap();
        std::fs::write(models.join("quad.gltf"), quad_gltf("quad.bin")).unwrap();
        std::fs::write(models.join("quad.bin"), quad_positions()).unwrap();
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        let mut fractions = Vec::new();
        let mut on_progress = |f: f32| fractions.push(f);
        let model = pollster::block_on(assets.load_model(
            "quad",
            "models/quad.gltf",
            Some(&mut on_progress),
        ))
        .unwrap();

        assert_eq!(model.triangle_count(), 2);
        assert_eq!(fractions.last(), Some(&1.0));
        assert!(assets.get_model("quad").is_some());
    }

    #[test]
    fn environment_is_prefiltered() {
        let (dir, bus) = setup();
        write_png(&dir.path().join("sky.png"), 8, 4);
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        let env = pollster::block_on(assets.load_environment("sky", "sky.png")).unwrap();
        assert_eq!(env.mip_count(), 4);
        assert_eq!(env.name, "sky");
        assert!(assets.get_environment("sky").is_some());
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let (dir, bus) = setup();
        write_png(&dir.path().join("a.png"), 2, 2);
        write_png(&dir.path().join("b.png"), 8, 8);
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        pollster::block_on(assets.load_texture("t", "a.png")).unwrap();
        pollster::block_on(assets.load_texture("t", "b.png")).unwrap();
        assert_eq!(assets.get_texture("t").unwrap().width, 8);
        assert_eq!(assets.len(), 1);

        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = released.clone();
        assets.set_release_hook(move |r| sink.borrow_mut().push(r));
        assert_eq!(assets.dispose(), 1);
        assert_eq!(released.borrow().len(), 1);
    }

    #[test]
    fn dispose_releases_everything_once() {
        let (dir, bus) = setup();
        write_png(&dir.path().join("a.png"), 2, 2);
        write_png(&dir.path().join("b.png"), 2, 1);
        std::fs::write(dir.path().join("quad.gltf"), quad_gltf("quad.bin")).unwrap();
        std::fs::write(dir.path().join("quad.bin"), quad_positions()).unwrap();
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());

        pollster::block_on(async {
            assets.load_texture("a", "a.png").await.unwrap();
            assets.load_texture("b", "b.png").await.unwrap();
            assets.load_environment("env", "a.png").await.unwrap();
            assets.load_model("quad", "quad.gltf", None).await.unwrap();
        });
        assert_eq!(assets.len(), 4);

        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = released.clone();
        assets.set_release_hook(move |r| sink.borrow_mut().push(r));

        assert_eq!(assets.dispose(), 4);
        assert!(assets.is_empty());
        assert!(assets.get_model("quad").is_none());
        assert!(assets.get_environment("env").is_none());

        let released = released.borrow();
        let models = released
            .iter()
            .filter(|r| matches!(r, Released::Model { meshes, .. } if meshes.len() == 1))
            .count();
        let textures = released
            .iter()
            .filter(|r| matches!(r, Released::Texture { .. }))
            .count();
        assert_eq!((models, textures, released.len()), (1, 2, 4));
        drop(released);

        assert_eq!(assets.dispose(), 0);
    }

    #[test]
    fn manifest_lists_entries_by_kind() {
        let (dir, bus) = setup();
        write_png(&dir.path().join("a.png"), 1, 1);
        let mut assets = AssetManager::new(FileFetcher::new(dir.path()), bus.emitter());
        pollster::block_on(assets.load_texture("a", "/a.png")).unwrap();

        let manifest = assets.manifest();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].kind, AssetKind::Texture);
        assert_eq!(manifest.entries[0].locator, "/a.png");
        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"texture\""));
    }
}
