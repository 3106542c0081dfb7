//! Per-frame render state shared by every composer in a frame

use crate::backend::{DrawItem, Effect, RenderBackend, RenderTargetDesc, Viewport};
use crate::properties::ComposerProperties;
use std::collections::HashMap;
use strata_core::{Error, ObjectId, Result};
use strata_filter::FilterContext;
use strata_property::{Color, FromPropertyValue, PropertyTypeId};
use strata_resource::{Material, Mesh, Resource, ResourceManager};
use strata_scene::{CameraView, NodeId, SceneGraph};

/// Everything a composer can touch while rendering one frame
pub struct RenderContext<'a> {
    scene: &'a SceneGraph,
    resources: Option<&'a ResourceManager>,
    backend: &'a mut dyn RenderBackend,
    ids: ComposerProperties,
    viewport: Viewport,
    camera: Option<NodeId>,
    frame: u64,
    content_changed: bool,
    targets: Vec<RenderTargetDesc>,
    substitutions: Vec<HashMap<String, String>>,
    views: Vec<CameraView>,
}

impl<'a> RenderContext<'a> {
    /// Fails with `UnknownPropertyType` if the composer properties were never
    /// registered in the scene's registry
    pub fn new(
        scene: &'a SceneGraph,
        backend: &'a mut dyn RenderBackend,
        viewport: Viewport,
    ) -> Result<Self> {
        let ids = ComposerProperties::lookup(scene.registry())?;
        Ok(Self {
            scene,
            resources: None,
            backend,
            ids,
            viewport,
            camera: None,
            frame: 0,
            content_changed: true,
            targets: Vec::new(),
            substitutions: Vec::new(),
            views: Vec::new(),
        })
    }

    pub fn with_resources(mut self, resources: &'a ResourceManager) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Camera used by composers that do not name their own
    pub fn with_camera(mut self, camera: Option<NodeId>) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }

    /// Whether any scene property changed since the previous frame
    pub fn with_content_changed(mut self, changed: bool) -> Self {
        self.content_changed = changed;
        self
    }

    pub fn scene(&self) -> &'a SceneGraph {
        self.scene
    }

    pub fn resources(&self) -> Option<&'a ResourceManager> {
        self.resources
    }

    pub fn ids(&self) -> &ComposerProperties {
        &self.ids
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn content_changed(&self) -> bool {
        self.content_changed
    }

    pub fn default_camera(&self) -> Option<NodeId> {
        self.camera
    }

    /// Resolve a composer property for this frame
    pub fn property<T: FromPropertyValue>(&self, object: ObjectId, property: PropertyTypeId) -> Result<T> {
        self.scene.properties().resolve_as::<T>(object, property)
    }

    // ========================================================================
    // Targets
    // ========================================================================

    /// Bind an offscreen target; it stays current until `unbind_target`
    pub fn bind_target(&mut self, target: RenderTargetDesc) -> Result<()> {
        self.backend.bind_target(&target)?;
        log::trace!("Bound target '{}'", target.name);
        self.targets.push(target);
        Ok(())
    }

    /// Unbind the innermost target
    pub fn unbind_target(&mut self) -> Result<RenderTargetDesc> {
        let target = self
            .targets
            .pop()
            .ok_or_else(|| Error::RenderTargetBind {
                target: "<none>".into(),
                reason: "unbind without a bound target".into(),
            })?;
        self.backend.unbind_target(&target)?;
        Ok(target)
    }

    /// Innermost bound target, or `None` when drawing to the surface
    pub fn current_target(&self) -> Option<&RenderTargetDesc> {
        self.targets.last()
    }

    pub fn clear(&mut self, color: Color) {
        self.backend.clear(color);
    }

    pub fn apply_effect(&mut self, effect: Effect) -> Result<()> {
        self.backend.apply_effect(&effect)
    }

    /// Drop per-frame state after a failed frame
    pub(crate) fn abort(&mut self) {
        self.targets.clear();
        self.substitutions.clear();
        self.views.clear();
        self.backend.abort_frame();
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Force a view on nested draws, such as one cubemap face or one eye
    pub fn push_view(&mut self, view: CameraView) {
        self.views.push(view);
    }

    pub fn pop_view(&mut self) -> Option<CameraView> {
        self.views.pop()
    }

    /// View forced by an enclosing composer, if any
    pub fn forced_view(&self) -> Option<CameraView> {
        self.views.last().copied()
    }

    /// Evaluate a camera, falling back to the forced view, then the default
    /// camera, then the identity view
    pub fn resolve_view(&self, camera: Option<NodeId>) -> Result<CameraView> {
        if let Some(view) = self.forced_view() {
            return Ok(view);
        }
        match camera.or(self.camera) {
            Some(camera) if self.scene.contains(camera) => {
                self.scene.camera_view(camera, self.viewport.aspect())
            }
            _ => Ok(CameraView::identity()),
        }
    }

    /// Filter context matching the current view
    pub fn filter_context(&self, camera: Option<NodeId>) -> FilterContext<'a> {
        let mut ctx = FilterContext::new(self.scene)
            .with_camera(camera.or(self.camera))
            .with_aspect(self.viewport.aspect());
        if let Some(resources) = self.resources {
            ctx = ctx.with_resources(resources);
        }
        ctx
    }

    // ========================================================================
    // Materials and draws
    // ========================================================================

    /// Install a material substitution table for nested draws
    pub fn push_substitutions(&mut self, table: HashMap<String, String>) {
        self.substitutions.push(table);
    }

    pub fn pop_substitutions(&mut self) {
        self.substitutions.pop();
    }

    /// Material actually used for an authored material; the innermost table
    /// that mentions it wins
    pub fn material_for(&self, material: &str) -> String {
        self.substitutions
            .iter()
            .rev()
            .find_map(|table| table.get(material))
            .cloned()
            .unwrap_or_else(|| material.to_string())
    }

    /// Load a resource for the duration of `read`. Draws go ahead without
    /// resources that fail to load.
    fn with_resource<T: Resource, R>(&self, url: &str, read: impl FnOnce(&T) -> R) -> Option<R> {
        let resources = self.resources?;
        let resource = match resources.acquire::<T>(url) {
            Ok(resource) => resource,
            Err(e) => {
                log::warn!("Drawing without '{}': {}", url, e);
                return None;
            }
        };
        let value = read(&resource);
        if let Err(e) = resources.release(url) {
            log::warn!("Release of '{}' failed: {}", url, e);
        }
        Some(value)
    }

    /// Set the view and draw nodes in order. A node without its own material
    /// uses its mesh's material.
    pub fn draw_nodes(&mut self, view: &CameraView, nodes: &[NodeId]) -> Result<usize> {
        self.backend.set_view(view.view_projection());
        let scene = self.scene;
        let builtins = *scene.builtins();
        let properties = scene.properties();
        let mut drawn = 0;
        for &node in nodes {
            let object = scene
                .object_of(node)
                .ok_or_else(|| Error::NotFound(format!("node {}", node)))?;
            let url = |property| -> Result<Option<String>> {
                Ok(properties
                    .resolve(object, property)?
                    .as_str()
                    .filter(|url| !url.is_empty())
                    .map(str::to_string))
            };
            let mesh = url(builtins.mesh)?;
            let authored = match url(builtins.material)? {
                Some(material) => Some(material),
                None => mesh
                    .as_deref()
                    .and_then(|mesh| self.with_resource(mesh, |mesh: &Mesh| mesh.material.clone()))
                    .flatten(),
            };
            let material = authored.map(|m| self.material_for(&m));
            let shader = material
                .as_deref()
                .and_then(|material| self.with_resource(material, |material: &Material| material.shader.clone()));
            let item = DrawItem {
                node,
                object,
                mesh,
                material,
                shader,
                world: scene.world_transform(node)?,
                opacity: properties.resolve_as::<f32>(object, builtins.opacity)?,
            };
            self.backend.draw(&item)?;
            drawn += 1;
        }
        Ok(drawn)
    }
}
