//! Object filters
//!
//! A filter maps an ordered list of nodes to another. Predicate filters keep
//! the nodes a predicate accepts, or with `exclusive` set the nodes it
//! rejects. Filters never mutate the scene.

use glam::Vec3;
use std::collections::HashSet;
use strata_core::{Error, Result};
use strata_property::{PropertyTypeId, PropertyValue};
use strata_resource::ResourceManager;
use strata_scene::{CameraView, NodeId, ObjectType, SceneGraph};

/// What a filter may read while evaluating
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    pub scene: &'a SceneGraph,
    /// Camera node; resolved again on every evaluation
    pub camera: Option<NodeId>,
    /// Width over height of the render target
    pub aspect: f32,
    pub resources: Option<&'a ResourceManager>,
}

impl<'a> FilterContext<'a> {
    pub fn new(scene: &'a SceneGraph) -> Self {
        Self {
            scene,
            camera: None,
            aspect: 1.0,
            resources: None,
        }
    }

    pub fn with_camera(mut self, camera: Option<NodeId>) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_resources(mut self, resources: &'a ResourceManager) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Evaluate the camera, if there is one that still exists
    pub fn camera_view(&self) -> Result<Option<CameraView>> {
        match self.camera {
            Some(camera) if self.scene.contains(camera) => {
                self.scene.camera_view(camera, self.aspect).map(Some)
            }
            _ => Ok(None),
        }
    }
}

/// A stage of an object source pipeline
pub trait ObjectFilter: Send + Sync {
    /// Kind name, as used in authored filter descriptions
    fn kind(&self) -> &str;

    /// Produce the output list for an input list
    fn evaluate(&self, input: Vec<NodeId>, ctx: &FilterContext) -> Result<Vec<NodeId>>;
}

// ============================================================================
// Predicate filters
// ============================================================================

/// Per-node test of a predicate filter
pub trait NodePredicate: Send + Sync {
    fn kind(&self) -> &str;

    /// Prepare per-evaluation state; `None` means the predicate cannot run
    /// in this context and the input passes through unchanged
    fn prepare(&self, ctx: &FilterContext) -> Result<Option<PreparedView>> {
        let _ = ctx;
        Ok(Some(PreparedView::default()))
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, view: &PreparedView) -> Result<bool>;
}

/// Per-evaluation data computed once for all nodes
#[derive(Clone, Debug, Default)]
pub struct PreparedView {
    pub camera: Option<CameraView>,
}

/// Keeps accepted nodes, or rejected ones when exclusive
pub struct PredicateFilter<P> {
    predicate: P,
    exclusive: bool,
}

impl<P: NodePredicate> PredicateFilter<P> {
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            exclusive: false,
        }
    }

    /// Keep only nodes the predicate rejects
    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }
}

impl<P: NodePredicate> ObjectFilter for PredicateFilter<P> {
    fn kind(&self) -> &str {
        self.predicate.kind()
    }

    fn evaluate(&self, input: Vec<NodeId>, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        let Some(view) = self.predicate.prepare(ctx)? else {
            log::debug!("{} filter has no camera, passing input through", self.kind());
            return Ok(input);
        };
        let mut output = Vec::with_capacity(input.len());
        for node in input {
            if self.predicate.accepts(node, ctx, &view)? != self.exclusive {
                output.push(node);
            }
        }
        Ok(output)
    }
}

fn object_of(ctx: &FilterContext, node: NodeId) -> Result<strata_core::ObjectId> {
    ctx.scene
        .object_of(node)
        .ok_or_else(|| Error::NotFound(format!("node {}", node)))
}

/// Object type is one of a set
pub struct TypeFilter {
    types: Vec<ObjectType>,
}

impl TypeFilter {
    pub fn new(types: impl IntoIterator<Item = ObjectType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

impl NodePredicate for TypeFilter {
    fn kind(&self) -> &str {
        "Type"
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, _view: &PreparedView) -> Result<bool> {
        Ok(ctx
            .scene
            .get(node)
            .is_some_and(|n| self.types.contains(n.object_type())))
    }
}

/// Node carries every required tag
pub struct TagFilter {
    tags: HashSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl NodePredicate for TagFilter {
    fn kind(&self) -> &str {
        "Tag"
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, _view: &PreparedView) -> Result<bool> {
        Ok(ctx
            .scene
            .get(node)
            .is_some_and(|n| self.tags.iter().all(|tag| n.has_tag(tag))))
    }
}

/// Resolved property value equals a given value
pub struct PropertyEqualsFilter {
    property: PropertyTypeId,
    value: PropertyValue,
}

impl PropertyEqualsFilter {
    pub fn new(property: PropertyTypeId, value: impl Into<PropertyValue>) -> Self {
        Self {
            property,
            value: value.into(),
        }
    }
}

impl NodePredicate for PropertyEqualsFilter {
    fn kind(&self) -> &str {
        "PropertyEquals"
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, _view: &PreparedView) -> Result<bool> {
        Ok(ctx.scene.resolve_property(node, self.property)? == self.value)
    }
}

/// Node holds a value (base or override) for a property
pub struct HasPropertyFilter {
    property: PropertyTypeId,
}

impl HasPropertyFilter {
    pub fn new(property: PropertyTypeId) -> Self {
        Self { property }
    }
}

impl NodePredicate for HasPropertyFilter {
    fn kind(&self) -> &str {
        "HasProperty"
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, _view: &PreparedView) -> Result<bool> {
        let object = object_of(ctx, node)?;
        Ok(ctx.scene.properties().has_value(object, self.property))
    }
}

/// Camera distance within `[min, max]`
pub struct DistanceFilter {
    min: f32,
    max: f32,
}

impl DistanceFilter {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

impl NodePredicate for DistanceFilter {
    fn kind(&self) -> &str {
        "Distance"
    }

    fn prepare(&self, ctx: &FilterContext) -> Result<Option<PreparedView>> {
        Ok(ctx.camera_view()?.map(|camera| PreparedView {
            camera: Some(camera),
        }))
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, view: &PreparedView) -> Result<bool> {
        let eye = view.camera.map(|c| c.position).unwrap_or(Vec3::ZERO);
        let distance = ctx.scene.world_position(node)?.distance(eye);
        Ok(distance >= self.min && distance <= self.max)
    }
}

/// Bounding sphere (`Node.BoundingRadius` around the world origin of the
/// node) intersects the camera frustum
pub struct FrustumFilter;

impl NodePredicate for FrustumFilter {
    fn kind(&self) -> &str {
        "Frustum"
    }

    fn prepare(&self, ctx: &FilterContext) -> Result<Option<PreparedView>> {
        Ok(ctx.camera_view()?.map(|camera| PreparedView {
            camera: Some(camera),
        }))
    }

    fn accepts(&self, node: NodeId, ctx: &FilterContext, view: &PreparedView) -> Result<bool> {
        let Some(camera) = view.camera else {
            return Ok(true);
        };
        let object = object_of(ctx, node)?;
        let radius = ctx
            .scene
            .properties()
            .resolve_as::<f32>(object, ctx.scene.builtins().bounding_radius)?;
        let center = ctx.scene.world_position(node)?;
        Ok(camera.frustum().intersects_sphere(center, radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::scene;
    use strata_scene::object_type::{CAMERA, LIGHT, MODEL, NODE};

    #[test]
    fn test_type_filter_exclusive_flag() {
        let (mut scene, _) = scene();
        let root = scene.create_node("Root", NODE);
        let camera = scene.create_child(root, "Camera", CAMERA).unwrap();
        let model = scene.create_child(root, "Model", MODEL).unwrap();
        let light = scene.create_child(root, "Light", LIGHT).unwrap();
        let input = vec![root, camera, model, light];
        let ctx = FilterContext::new(&scene);

        let keep = PredicateFilter::new(TypeFilter::new([MODEL, LIGHT]));
        assert_eq!(keep.evaluate(input.clone(), &ctx).unwrap(), vec![model, light]);

        let drop = PredicateFilter::new(TypeFilter::new([CAMERA])).exclusive(true);
        assert_eq!(drop.evaluate(input, &ctx).unwrap(), vec![root, model, light]);
    }

    #[test]
    fn test_tag_and_property_filters() {
        let (mut scene, builtins) = scene();
        let a = scene.create_node("A", MODEL);
        let b = scene.create_node("B", MODEL);
        scene.add_tag(a, "hud").unwrap();
        scene.add_tag(a, "opaque").unwrap();
        scene.add_tag(b, "hud").unwrap();
        scene.set_property(b, builtins.opacity, 0.5f32).unwrap();
        let ctx = FilterContext::new(&scene);

        let tags = PredicateFilter::new(TagFilter::new(["hud", "opaque"]));
        assert_eq!(tags.evaluate(vec![a, b], &ctx).unwrap(), vec![a]);

        let translucent = PredicateFilter::new(PropertyEqualsFilter::new(builtins.opacity, 0.5f32));
        assert_eq!(translucent.evaluate(vec![a, b], &ctx).unwrap(), vec![b]);

        let authored = PredicateFilter::new(HasPropertyFilter::new(builtins.opacity)).exclusive(true);
        assert_eq!(authored.evaluate(vec![a, b], &ctx).unwrap(), vec![a]);
    }

    #[test]
    fn test_camera_filters_pass_through_without_camera() {
        let (mut scene, _) = scene();
        let a = scene.create_node("A", MODEL);
        let ctx = FilterContext::new(&scene);

        let frustum = PredicateFilter::new(FrustumFilter);
        assert_eq!(frustum.evaluate(vec![a], &ctx).unwrap(), vec![a]);
        let distance = PredicateFilter::new(DistanceFilter::new(100.0, 200.0));
        assert_eq!(distance.evaluate(vec![a], &ctx).unwrap(), vec![a]);
    }

    #[test]
    fn test_distance_and_frustum_with_camera() {
        let (mut scene, builtins) = scene();
        let root = scene.create_node("Root", NODE);
        let camera = scene.create_child(root, "Camera", CAMERA).unwrap();
        let near = scene.create_child(root, "Near", MODEL).unwrap();
        let far = scene.create_child(root, "Far", MODEL).unwrap();
        let behind = scene.create_child(root, "Behind", MODEL).unwrap();
        let place = |scene: &mut SceneGraph, node, z: f32| {
            scene
                .set_property(node, builtins.transform, glam::Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
                .unwrap();
        };
        place(&mut scene, camera, 10.0);
        place(&mut scene, near, 5.0);
        place(&mut scene, far, -40.0);
        place(&mut scene, behind, 30.0);
        let ctx = FilterContext::new(&scene).with_camera(Some(camera));

        let distance = PredicateFilter::new(DistanceFilter::new(0.0, 25.0));
        assert_eq!(distance.evaluate(vec![near, far, behind], &ctx).unwrap(), vec![near, behind]);

        let frustum = PredicateFilter::new(FrustumFilter);
        assert_eq!(frustum.evaluate(vec![near, far, behind], &ctx).unwrap(), vec![near, far]);
    }
}
