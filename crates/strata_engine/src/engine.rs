//! Engine and frame tick
//!
//! One tick: merge background-loaded binaries, dispatch input, advance
//! animations and bindings, lay out, render the composer graph, present, and
//! optionally drop unused resources. A failing step is recorded in the
//! `FrameReport`; the engine keeps running.

use crate::config::EngineConfig;
use crate::input::{pointer_target, InputHandler, InputQueue};
use crate::loader_thread::{BackgroundBinaryLoader, LoadedBinary};
use crate::surface::Surface;
use glam::Vec2;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strata_binary::BinarySource;
use strata_composer::{
    register_composer_properties, ComposerFactory, ComposerGraph, ComposerId, ComposerProperties,
    DrawObjectsComposer, FrameStats, RenderContext,
};
use strata_core::{Error, Result};
use strata_property::{AnimationPlayer, PropertyTypeRegistry};
use strata_resource::{ResourceEvent, ResourceManager};
use strata_scene::{register_builtin_properties, BuiltinProperties, NodeId, SceneGraph};

/// What happened during one tick
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub binaries_merged: usize,
    pub input_events: usize,
    pub input_consumed: usize,
    pub animations_finished: usize,
    pub bindings_evaluated: usize,
    pub property_changes: usize,
    /// `None` when the frame was not rendered
    pub render: Option<FrameStats>,
    pub presented: bool,
    pub resources_unloaded: usize,
    /// Resource manager events since the previous tick
    pub resource_events: Vec<ResourceEvent>,
    /// Failures of this frame, in the order they happened
    pub errors: Vec<Error>,
}

impl FrameReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Engine core: registry, scene, resources and the composer graph
pub struct Engine {
    config: EngineConfig,
    registry: Arc<PropertyTypeRegistry>,
    composer_properties: ComposerProperties,
    resources: Arc<ResourceManager>,
    scene: SceneGraph,
    composers: ComposerGraph,
    composer_factory: ComposerFactory,
    animations: AnimationPlayer,
    loader: BackgroundBinaryLoader,
    input_handlers: Vec<InputHandler>,
    frame: u64,
}

impl Engine {
    /// Build the registry, open the configured binaries and the root composer
    pub fn new(config: EngineConfig) -> Result<Self> {
        let registry = Arc::new(PropertyTypeRegistry::new());
        register_builtin_properties(&registry)?;
        let composer_properties = register_composer_properties(&registry)?;
        if config.properties.lock_registry_on_start {
            registry.lock();
        }

        let resources = Arc::new(ResourceManager::new());
        resources.install_builtin_loaders()?;
        if !config.resources.allowed_prefixes.is_empty() {
            let prefixes = config.resources.allowed_prefixes.clone();
            resources.set_validator(move |key| prefixes.iter().any(|prefix| key.starts_with(prefix.as_str())));
        }
        for path in config.binary_paths()? {
            let source = BinarySource::open(&path, config.binaries.access)?;
            let report = resources.add_source(source);
            log::info!(
                "Opened {} ({} new paths, {} overridden)",
                path.display(),
                report.added.len(),
                report.overridden.len()
            );
        }

        let scene = SceneGraph::new(registry.clone())?;
        let mut engine = Self {
            config,
            registry,
            composer_properties,
            resources,
            scene,
            composers: ComposerGraph::new(),
            composer_factory: ComposerFactory::new(),
            animations: AnimationPlayer::new(),
            loader: BackgroundBinaryLoader::new(),
            input_handlers: Vec::new(),
            frame: 0,
        };

        match engine.config.render.root_composer.clone() {
            Some(url) => {
                engine.set_root_composer(&url)?;
            }
            None => {
                let object = engine.scene.allocate_object();
                let root = engine
                    .composers
                    .add("Default", object, Box::new(DrawObjectsComposer::new()));
                engine.composers.set_root(root)?;
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PropertyTypeRegistry> {
        &self.registry
    }

    pub fn builtins(&self) -> &BuiltinProperties {
        self.scene.builtins()
    }

    pub fn composer_properties(&self) -> &ComposerProperties {
        &self.composer_properties
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn composers(&self) -> &ComposerGraph {
        &self.composers
    }

    pub fn composers_mut(&mut self) -> &mut ComposerGraph {
        &mut self.composers
    }

    pub fn composer_factory_mut(&mut self) -> &mut ComposerFactory {
        &mut self.composer_factory
    }

    pub fn animations_mut(&mut self) -> &mut AnimationPlayer {
        &mut self.animations
    }

    /// Frames ticked so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Replace the composer graph with the one authored at `url`. The old
    /// graph's property cells are dropped; on failure the old graph stays.
    pub fn set_root_composer(&mut self, url: &str) -> Result<ComposerId> {
        let mut graph = ComposerGraph::new();
        let root = self
            .composer_factory
            .build_graph(url, &self.resources, &mut self.scene, &mut graph)?;
        graph.set_root(root)?;
        let old = std::mem::replace(&mut self.composers, graph);
        for object in old.objects() {
            self.scene.properties_mut().remove_object(object);
        }
        log::info!("Root composer set to {}", url);
        Ok(root)
    }

    pub fn add_input_handler(
        &mut self,
        handler: impl FnMut(&crate::input::InputEvent, Option<NodeId>, &mut SceneGraph) -> bool + Send + 'static,
    ) {
        self.input_handlers.push(Box::new(handler));
    }

    /// Open a container on the loader thread; it is merged by a later tick
    pub fn load_binary_in_background(&mut self, path: impl Into<PathBuf>) {
        self.loader.request(path, self.config.binaries.access);
    }

    /// Block until background loads finish, merging them now
    pub fn wait_for_background_loads(&mut self, timeout: Duration) -> Result<usize> {
        let done = self.loader.wait(timeout);
        let mut merged = 0;
        for loaded in done {
            self.merge_loaded(loaded)?;
            merged += 1;
        }
        Ok(merged)
    }

    fn merge_loaded(&self, loaded: LoadedBinary) -> Result<()> {
        let source = loaded.source?;
        let report = self.resources.add_source(source);
        log::info!(
            "Merged background binary {} ({} new paths, {} overridden)",
            loaded.path.display(),
            report.added.len(),
            report.overridden.len()
        );
        Ok(())
    }

    fn default_camera(&self) -> Option<NodeId> {
        let root = *self.scene.roots().first()?;
        match &self.config.render.camera {
            Some(path) => self.scene.find_by_path(root, path),
            None => self.scene.find_camera(root),
        }
    }

    /// Run one frame
    pub fn tick(&mut self, dt: f32, input: &mut InputQueue, surface: &mut dyn Surface) -> FrameReport {
        let mut report = FrameReport {
            frame: self.frame,
            ..Default::default()
        };

        for loaded in self.loader.poll() {
            match self.merge_loaded(loaded) {
                Ok(()) => report.binaries_merged += 1,
                Err(e) => {
                    log::error!("Background binary failed: {}", e);
                    report.errors.push(e);
                }
            }
        }

        // Input
        for event in input.drain() {
            report.input_events += 1;
            let target = event.position().and_then(|p| pointer_target(&self.scene, p));
            for handler in self.input_handlers.iter_mut() {
                if handler(&event, target, &mut self.scene) {
                    report.input_consumed += 1;
                    break;
                }
            }
        }

        // Properties
        match self.animations.advance(dt, self.scene.properties_mut()) {
            Ok(finished) => report.animations_finished = finished,
            Err(e) => report.errors.push(e),
        }
        report.bindings_evaluated = self.scene.properties_mut().update_bindings();

        // Layout
        let viewport = surface.viewport();
        let available = Vec2::new(viewport.width as f32, viewport.height as f32);
        for root in self.scene.roots().to_vec() {
            if let Err(e) = self.scene.update_layout(root, available) {
                report.errors.push(e);
            }
        }

        let changes = self.scene.properties_mut().drain_changes();
        report.property_changes = changes.len();

        // Render and present
        match self.render(surface, !changes.is_empty()) {
            Ok(stats) => {
                report.render = Some(stats);
                match surface.swap() {
                    Ok(()) => report.presented = true,
                    Err(e) => report.errors.push(e),
                }
            }
            Err(e) => {
                log::warn!("Frame {} skipped: {}", self.frame, e);
                report.errors.push(e);
            }
        }

        if self.config.resources.unload_unused_each_frame {
            report.resources_unloaded = self.resources.unload_unused();
        }
        report.resource_events = self.resources.drain_events();

        self.frame += 1;
        report
    }

    fn render(&mut self, surface: &mut dyn Surface, content_changed: bool) -> Result<FrameStats> {
        surface.make_current()?;
        let camera = self.default_camera();
        let viewport = surface.viewport();
        let mut ctx = RenderContext::new(&self.scene, surface.backend(), viewport)?
            .with_resources(&self.resources)
            .with_camera(camera)
            .with_frame(self.frame)
            .with_content_changed(content_changed);
        self.composers.render_frame(&mut ctx)
    }
}
