//! Built-in composers
//!
//! Every composer reads its parameters from the property manager on each
//! frame, so animations and state overrides on a composer object take effect
//! on the next render.

use crate::backend::{Effect, RenderTargetDesc, TargetFormat, Viewport};
use crate::context::RenderContext;
use crate::graph::{ChildComposers, Composer};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use strata_core::{Error, ObjectId, Result};
use strata_filter::{ObjectSource, PredicateFilter, SceneSource, TypeFilter};
use strata_property::Color;
use strata_scene::{object_type, CameraView, NodeId, SceneGraph};

/// Resolve an authored node path against the first scene root
pub(crate) fn find_node(scene: &SceneGraph, path: &str) -> Option<NodeId> {
    scene
        .roots()
        .first()
        .and_then(|&root| scene.find_by_path(root, path))
}

fn resolve_camera(ctx: &RenderContext<'_>, camera: Option<&str>) -> Option<NodeId> {
    let path = camera?;
    let node = find_node(ctx.scene(), path);
    if node.is_none() {
        log::warn!("Camera '{}' not found, using the default camera", path);
    }
    node
}

fn viewport_target(name: &str, viewport: Viewport) -> RenderTargetDesc {
    RenderTargetDesc::new(name, viewport.width, viewport.height)
}

// ============================================================================
// Group
// ============================================================================

/// Renders its children in order and nothing else
#[derive(Clone, Copy, Debug, Default)]
pub struct GroupComposer;

impl Composer for GroupComposer {
    fn kind(&self) -> &str {
        "Group"
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        children.render_all(ctx)
    }
}

// ============================================================================
// Draw objects
// ============================================================================

/// Draws the nodes produced by an object source, then renders its children
pub struct DrawObjectsComposer {
    source: Box<dyn ObjectSource>,
    camera: Option<String>,
    target: Option<String>,
}

impl DrawObjectsComposer {
    /// Draw every visible model in the scene
    pub fn new() -> Self {
        Self::with_source(Box::new(
            SceneSource::whole_scene().then(PredicateFilter::new(TypeFilter::new([object_type::MODEL]))),
        ))
    }

    pub fn with_source(source: Box<dyn ObjectSource>) -> Self {
        Self {
            source,
            camera: None,
            target: None,
        }
    }

    /// Camera node path; the frame's default camera when unset
    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    /// Draw into an offscreen target instead of the current one
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl Default for DrawObjectsComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer for DrawObjectsComposer {
    fn kind(&self) -> &str {
        "DrawObjects"
    }

    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        if let Some(target) = &self.target {
            ctx.bind_target(viewport_target(target, ctx.viewport()))?;
            let color = ctx.property::<Color>(object, ctx.ids().clear_color)?;
            ctx.clear(color);
        }
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        let camera = resolve_camera(ctx, self.camera.as_deref());
        let view = ctx.resolve_view(camera)?;
        let nodes = self.source.collect(&ctx.filter_context(camera))?;
        let drawn = ctx.draw_nodes(&view, &nodes)?;
        log::trace!("DrawObjects drew {} of {} nodes", drawn, nodes.len());
        children.render_all(ctx)
    }

    fn unbind(&mut self, ctx: &mut RenderContext<'_>, _object: ObjectId) -> Result<()> {
        if self.target.is_some() {
            ctx.unbind_target()?;
        }
        Ok(())
    }
}

// ============================================================================
// Blur and bloom
// ============================================================================

/// Renders its children offscreen, then blurs the result onto the current
/// target
pub struct BlurComposer {
    target: String,
}

impl BlurComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Composer for BlurComposer {
    fn kind(&self) -> &str {
        "Blur"
    }

    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        ctx.bind_target(viewport_target(&self.target, ctx.viewport()))?;
        let color = ctx.property::<Color>(object, ctx.ids().clear_color)?;
        ctx.clear(color);
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        children.render_all(ctx)
    }

    fn unbind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let target = ctx.unbind_target()?;
        let radius = ctx.property::<f32>(object, ctx.ids().blur_radius)?;
        ctx.apply_effect(Effect::Blur {
            source: target.name,
            radius,
        })
    }
}

/// Renders its children offscreen, then adds their bright parts back
pub struct BloomComposer {
    target: String,
}

impl BloomComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Composer for BloomComposer {
    fn kind(&self) -> &str {
        "Bloom"
    }

    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let target =
            viewport_target(&self.target, ctx.viewport()).with_format(TargetFormat::Rgba16Float);
        ctx.bind_target(target)?;
        let color = ctx.property::<Color>(object, ctx.ids().clear_color)?;
        ctx.clear(color);
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        children.render_all(ctx)
    }

    fn unbind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let target = ctx.unbind_target()?;
        let ids = *ctx.ids();
        let threshold = ctx.property::<f32>(object, ids.bloom_threshold)?;
        let intensity = ctx.property::<f32>(object, ids.bloom_intensity)?;
        ctx.apply_effect(Effect::Bloom {
            source: target.name,
            threshold,
            intensity,
        })
    }
}

// ============================================================================
// Antialiasing
// ============================================================================

/// Renders its children into a multisampled target and resolves it. While
/// `Composer.MovingState` is set the children render directly, without
/// multisampling.
pub struct AntialiasingComposer {
    target: String,
    samples: Option<u32>,
}

impl AntialiasingComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            samples: None,
        }
    }

    /// Sample count used by the frame in progress, `None` when skipped
    pub fn active_samples(&self) -> Option<u32> {
        self.samples
    }
}

impl Composer for AntialiasingComposer {
    fn kind(&self) -> &str {
        "Antialiasing"
    }

    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let ids = *ctx.ids();
        let moving = ctx.property::<bool>(object, ids.moving_state)?;
        let samples = ctx.property::<i32>(object, ids.antialiasing_samples)?.max(1) as u32;
        if moving || samples <= 1 {
            self.samples = None;
            return Ok(());
        }
        let target = viewport_target(&self.target, ctx.viewport()).with_samples(samples);
        ctx.bind_target(target)?;
        ctx.clear(ctx.property::<Color>(object, ids.clear_color)?);
        self.samples = Some(samples);
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        children.render_all(ctx)
    }

    fn unbind(&mut self, ctx: &mut RenderContext<'_>, _object: ObjectId) -> Result<()> {
        let Some(samples) = self.samples.take() else {
            return Ok(());
        };
        let target = ctx.unbind_target()?;
        ctx.apply_effect(Effect::Resolve {
            source: target.name,
            samples,
        })
    }
}

// ============================================================================
// Shadow map
// ============================================================================

/// Renders its children into a depth target with every known material
/// swapped for its shadow variant
pub struct ShadowMapComposer {
    target: String,
    substitutions: HashMap<String, String>,
}

impl ShadowMapComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            substitutions: HashMap::new(),
        }
    }

    /// Draw `shadow` wherever `original` is authored
    pub fn substitute(mut self, original: impl Into<String>, shadow: impl Into<String>) -> Self {
        self.substitutions.insert(original.into(), shadow.into());
        self
    }

    pub fn substitutions(&self) -> &HashMap<String, String> {
        &self.substitutions
    }
}

impl Composer for ShadowMapComposer {
    fn kind(&self) -> &str {
        "ShadowMap"
    }

    fn bind(&mut self, ctx: &mut RenderContext<'_>, object: ObjectId) -> Result<()> {
        let size = ctx.property::<i32>(object, ctx.ids().shadow_map_size)?.max(1) as u32;
        let target = RenderTargetDesc::new(&self.target, size, size).with_format(TargetFormat::Depth32Float);
        ctx.bind_target(target)?;
        ctx.clear(Color::WHITE);
        ctx.push_substitutions(self.substitutions.clone());
        Ok(())
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        _object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        children.render_all(ctx)
    }

    fn unbind(&mut self, ctx: &mut RenderContext<'_>, _object: ObjectId) -> Result<()> {
        ctx.pop_substitutions();
        ctx.unbind_target()?;
        Ok(())
    }
}

// ============================================================================
// Cubemap
// ============================================================================

/// Face directions and up vectors in +X, -X, +Y, -Y, +Z, -Z order
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Renders its children six times, once per cube face, from the position of
/// an attached node
pub struct CubemapComposer {
    target: String,
    node: String,
    near: f32,
    far: f32,
}

impl CubemapComposer {
    pub fn new(target: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            node: node.into(),
            near: 0.1,
            far: 1000.0,
        }
    }

    pub fn with_depth_range(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// View of one face seen from `position`
    pub fn face_view(&self, node: NodeId, position: Vec3, face: usize) -> CameraView {
        let (direction, up) = CUBE_FACES[face % 6];
        CameraView {
            node: Some(node),
            view: Mat4::look_at_rh(position, position + direction, up),
            projection: Mat4::perspective_rh_gl(std::f32::consts::FRAC_PI_2, 1.0, self.near, self.far),
            position,
            forward: direction,
        }
    }
}

impl Composer for CubemapComposer {
    fn kind(&self) -> &str {
        "Cubemap"
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        let scene = ctx.scene();
        let node = find_node(scene, &self.node)
            .ok_or_else(|| Error::NotFound(format!("cubemap node '{}'", self.node)))?;
        let position = scene.world_position(node)?;
        let size = ctx.property::<i32>(object, ctx.ids().cubemap_size)?.max(1) as u32;
        let clear = ctx.property::<Color>(object, ctx.ids().clear_color)?;

        for face in 0..CUBE_FACES.len() {
            let target = RenderTargetDesc::new(&self.target, size, size).with_layer(face as u32);
            ctx.bind_target(target)?;
            ctx.clear(clear);
            ctx.push_view(self.face_view(node, position, face));
            let rendered = children.render_all(ctx);
            ctx.pop_view();
            rendered?;
            ctx.unbind_target()?;
        }
        Ok(())
    }
}

// ============================================================================
// Stereoscopic
// ============================================================================

pub const STEREO_LEFT: &str = "stereo_left";
pub const STEREO_RIGHT: &str = "stereo_right";

/// Renders its children once per eye. The eyes sit half the eye separation
/// to each side of the camera along its right axis.
#[derive(Default)]
pub struct StereoscopicComposer {
    camera: Option<String>,
}

impl StereoscopicComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    /// Shift a view sideways by `offset` along its right axis
    pub fn eye_view(view: &CameraView, offset: f32) -> CameraView {
        let right = view.view.inverse().x_axis.truncate().normalize_or_zero();
        let shift = right * offset;
        CameraView {
            view: view.view * Mat4::from_translation(-shift),
            position: view.position + shift,
            ..*view
        }
    }
}

impl Composer for StereoscopicComposer {
    fn kind(&self) -> &str {
        "Stereoscopic"
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        let camera = resolve_camera(ctx, self.camera.as_deref());
        let base = ctx.resolve_view(camera)?;
        let half = ctx.property::<f32>(object, ctx.ids().stereo_eye_separation)? * 0.5;
        let clear = ctx.property::<Color>(object, ctx.ids().clear_color)?;
        let viewport = Viewport::new(ctx.viewport().width / 2, ctx.viewport().height);

        for (target, offset) in [(STEREO_LEFT, -half), (STEREO_RIGHT, half)] {
            ctx.bind_target(viewport_target(target, viewport))?;
            ctx.clear(clear);
            ctx.push_view(Self::eye_view(&base, offset));
            let rendered = children.render_all(ctx);
            ctx.pop_view();
            rendered?;
            ctx.unbind_target()?;
        }
        Ok(())
    }
}

// ============================================================================
// Partial rendering
// ============================================================================

/// Caches its children's output and re-renders only when the surface size or
/// the scene content changed; otherwise the cached target is presented as is
#[derive(Debug)]
pub struct PartialRenderingComposer {
    target: String,
    previous_size: Option<Viewport>,
    frames_rendered: u64,
    content_only_changed: bool,
}

impl PartialRenderingComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            previous_size: None,
            frames_rendered: 0,
            content_only_changed: false,
        }
    }

    /// Frames in which the children actually rendered
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Whether the last re-render happened at an unchanged size
    pub fn content_only_changed(&self) -> bool {
        self.content_only_changed
    }
}

impl Composer for PartialRenderingComposer {
    fn kind(&self) -> &str {
        "PartialRendering"
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        let size = ctx.viewport();
        let resized = self.previous_size != Some(size);
        if resized || ctx.content_changed() {
            ctx.bind_target(viewport_target(&self.target, size))?;
            ctx.clear(ctx.property::<Color>(object, ctx.ids().clear_color)?);
            children.render_all(ctx)?;
            ctx.unbind_target()?;
            self.content_only_changed = !resized;
            self.previous_size = Some(size);
            self.frames_rendered += 1;
        } else {
            log::trace!("Partial rendering reuses '{}'", self.target);
        }
        ctx.apply_effect(Effect::Copy {
            source: self.target.clone(),
        })
    }

    fn invalidate(&mut self) {
        self.previous_size = None;
        self.frames_rendered = 0;
        self.content_only_changed = false;
    }
}

// ============================================================================
// Step rendering
// ============================================================================

/// Spreads its children over several frames, `Step.Count` children per
/// frame, accumulating into one target. A size or content change restarts
/// the sequence.
#[derive(Debug)]
pub struct StepRenderingComposer {
    target: String,
    previous_size: Option<Viewport>,
    next_child: usize,
    frame: u64,
}

impl StepRenderingComposer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            previous_size: None,
            next_child: 0,
            frame: 0,
        }
    }

    /// Index of the next child to render
    pub fn next_child(&self) -> usize {
        self.next_child
    }

    /// Frames spent on the current sequence
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

impl Composer for StepRenderingComposer {
    fn kind(&self) -> &str {
        "StepRendering"
    }

    fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        object: ObjectId,
        children: &mut dyn ChildComposers,
    ) -> Result<()> {
        let size = ctx.viewport();
        if self.previous_size != Some(size) || ctx.content_changed() {
            self.next_child = 0;
            self.frame = 0;
            self.previous_size = Some(size);
        }

        let count = children.count();
        if self.next_child < count {
            let step = ctx.property::<i32>(object, ctx.ids().step_count)?.max(1) as usize;
            let end = (self.next_child + step).min(count);
            ctx.bind_target(viewport_target(&self.target, size))?;
            if self.next_child == 0 {
                ctx.clear(ctx.property::<Color>(object, ctx.ids().clear_color)?);
            }
            for index in self.next_child..end {
                children.render_child(index, ctx)?;
            }
            ctx.unbind_target()?;
            self.next_child = end;
            self.frame += 1;
        }
        ctx.apply_effect(Effect::Copy {
            source: self.target.clone(),
        })
    }

    fn invalidate(&mut self) {
        self.previous_size = None;
        self.next_child = 0;
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RecordingBackend, RenderCommand};
    use crate::graph::ComposerGraph;
    use crate::tests_support::scene;

    #[test]
    fn test_cube_faces_look_outward() {
        let (mut scene, _) = scene();
        let anchor = scene.create_node("Anchor", object_type::NODE);
        let cubemap = CubemapComposer::new("env", "/Anchor");
        for face in 0..6 {
            let view = cubemap.face_view(anchor, Vec3::ZERO, face);
            let ahead = CUBE_FACES[face].0 * 5.0;
            assert!((view.depth_of(ahead) - 5.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_eye_views_are_separated() {
        let base = CameraView::identity();
        let left = StereoscopicComposer::eye_view(&base, -0.5);
        let right = StereoscopicComposer::eye_view(&base, 0.5);
        assert_eq!(left.position, Vec3::new(-0.5, 0.0, 0.0));
        assert_eq!(right.position, Vec3::new(0.5, 0.0, 0.0));
        // A point at the origin appears to the right of the left eye
        assert!(left.view.transform_point3(Vec3::ZERO).x > 0.0);
    }

    #[test]
    fn test_blur_renders_children_into_its_target() {
        let (scene, _) = scene();
        let mut graph = ComposerGraph::new();
        let blur = graph.add("Blur", scene.allocate_object(), Box::new(BlurComposer::new("blur")));
        let group = graph.add("Group", scene.allocate_object(), Box::new(GroupComposer));
        graph.attach_child(blur, group).unwrap();
        graph.set_root(blur).unwrap();

        let mut backend = RecordingBackend::new();
        {
            let mut ctx = RenderContext::new(&scene, &mut backend, Viewport::new(32, 16)).unwrap();
            graph.render_frame(&mut ctx).unwrap();
        }
        let commands = backend.commands();
        assert!(matches!(&commands[0], RenderCommand::BindTarget(t) if t.name == "blur" && t.width == 32));
        assert_eq!(
            commands.last(),
            Some(&RenderCommand::Effect(Effect::Blur {
                source: "blur".into(),
                radius: 4.0
            }))
        );
    }

    #[test]
    fn test_shadow_map_target_uses_property_size() {
        let (mut scene, ids) = scene();
        let object = scene.allocate_object();
        scene.properties_mut().set_base(object, ids.shadow_map_size, 512).unwrap();
        let mut graph = ComposerGraph::new();
        let shadow = graph.add("Shadow", object, Box::new(ShadowMapComposer::new("shadow")));
        graph.set_root(shadow).unwrap();

        let mut backend = RecordingBackend::new();
        {
            let mut ctx = RenderContext::new(&scene, &mut backend, Viewport::new(64, 64)).unwrap();
            graph.render_frame(&mut ctx).unwrap();
        }
        match &backend.commands()[0] {
            RenderCommand::BindTarget(target) => {
                assert_eq!((target.width, target.height), (512, 512));
                assert_eq!(target.format, TargetFormat::Depth32Float);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(backend.bound_targets().is_empty());
    }
}
