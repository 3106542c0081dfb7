//! Node classes
//!
//! Behavior that differs per object type (how a node measures and arranges
//! its children, which children it renders) lives in a `NodeClass` registered
//! for that type. Level-of-detail, instantiator, and portal nodes are classes,
//! not node subtypes.

use crate::graph::SceneGraph;
use crate::node::NodeId;
use crate::object_type::{self, ObjectType};
use crate::properties::float_array;
use glam::Vec2;
use std::sync::Arc;
use strata_core::{ClassRegistry, Result};

/// Capability table of one object type
pub trait NodeClass: Send + Sync {
    /// Desired size given the available space and the children's desired sizes
    fn measure(&self, scene: &SceneGraph, node: NodeId, available: Vec2, children: &[Vec2]) -> Vec2 {
        let _ = (scene, node, available);
        children.iter().copied().fold(Vec2::ZERO, Vec2::max)
    }

    /// Offsets of the children inside a node of the given size
    fn arrange(&self, scene: &SceneGraph, node: NodeId, size: Vec2, children: &[Vec2]) -> Vec<Vec2> {
        let _ = (scene, node, size);
        vec![Vec2::ZERO; children.len()]
    }

    /// Children to render, in order, as seen from an optional camera
    fn render_children(&self, scene: &SceneGraph, node: NodeId, camera: Option<NodeId>) -> Vec<NodeId> {
        let _ = camera;
        scene.children(node).to_vec()
    }

    /// Whether nodes of this class act as cameras
    fn is_camera(&self) -> bool {
        false
    }
}

/// Plain nodes, layers, models, lights, components
pub struct PlainClass;

impl NodeClass for PlainClass {}

/// Camera nodes
pub struct CameraClass;

impl NodeClass for CameraClass {
    fn is_camera(&self) -> bool {
        true
    }
}

/// Lays its children out one after another along `Stack.Direction`
pub struct StackLayerClass;

impl StackLayerClass {
    fn axis(scene: &SceneGraph, node: NodeId) -> Vec2 {
        let direction = scene
            .object_of(node)
            .and_then(|object| {
                scene
                    .properties()
                    .resolve_as::<i32>(object, scene.builtins().stack_direction)
                    .ok()
            })
            .unwrap_or(0);
        if direction == 1 {
            Vec2::Y
        } else {
            Vec2::X
        }
    }
}

impl NodeClass for StackLayerClass {
    fn measure(&self, scene: &SceneGraph, node: NodeId, _available: Vec2, children: &[Vec2]) -> Vec2 {
        let axis = Self::axis(scene, node);
        let cross = Vec2::ONE - axis;
        let along: f32 = children.iter().map(|child| child.dot(axis)).sum();
        let across = children
            .iter()
            .map(|child| child.dot(cross))
            .fold(0.0, f32::max);
        axis * along + cross * across
    }

    fn arrange(&self, scene: &SceneGraph, node: NodeId, _size: Vec2, children: &[Vec2]) -> Vec<Vec2> {
        let axis = Self::axis(scene, node);
        let mut cursor = Vec2::ZERO;
        children
            .iter()
            .map(|child| {
                let offset = cursor;
                cursor += *child * axis;
                offset
            })
            .collect()
    }
}

/// Renders exactly one child, picked by camera distance against `Lod.Distances`
pub struct LevelOfDetailClass;

impl LevelOfDetailClass {
    /// Index of the child to render for a camera distance
    pub fn select(distances: &[f32], distance: f32, child_count: usize) -> Option<usize> {
        if child_count == 0 {
            return None;
        }
        let level = distances.iter().filter(|&&threshold| distance >= threshold).count();
        Some(level.min(child_count - 1))
    }
}

impl NodeClass for LevelOfDetailClass {
    fn render_children(&self, scene: &SceneGraph, node: NodeId, camera: Option<NodeId>) -> Vec<NodeId> {
        let children = scene.children(node);
        let distance = match camera {
            Some(camera) => match (scene.world_position(node), scene.world_position(camera)) {
                (Ok(a), Ok(b)) => a.distance(b),
                _ => 0.0,
            },
            None => 0.0,
        };
        let distances = scene
            .object_of(node)
            .and_then(|object| {
                scene
                    .properties()
                    .resolve(object, scene.builtins().lod_distances)
                    .ok()
            })
            .map(|value| float_array(&value))
            .unwrap_or_default();

        Self::select(&distances, distance, children.len())
            .map(|index| vec![children[index]])
            .unwrap_or_default()
    }
}

/// Renders the node its `Instantiator.Template` pointer refers to
pub struct InstantiatorClass;

impl NodeClass for InstantiatorClass {
    fn render_children(&self, scene: &SceneGraph, node: NodeId, _camera: Option<NodeId>) -> Vec<NodeId> {
        let Some(object) = scene.object_of(node) else {
            return Vec::new();
        };
        let path = match scene
            .properties()
            .resolve(object, scene.builtins().instantiator_template)
        {
            Ok(value) => value.as_str().unwrap_or_default().to_string(),
            Err(_) => return Vec::new(),
        };
        if path.is_empty() {
            return Vec::new();
        }
        match scene.find_by_path(node, &path) {
            Some(target) if target != node && !scene.is_ancestor(node, target) => vec![target],
            Some(_) => {
                log::warn!("Instantiator template '{}' would render its own ancestor", path);
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

/// Renders its children only while `Portal.Open` is set
pub struct PortalClass;

impl NodeClass for PortalClass {
    fn render_children(&self, scene: &SceneGraph, node: NodeId, _camera: Option<NodeId>) -> Vec<NodeId> {
        let open = scene
            .object_of(node)
            .and_then(|object| {
                scene
                    .properties()
                    .resolve_as::<bool>(object, scene.builtins().portal_open)
                    .ok()
            })
            .unwrap_or(true);
        if open {
            scene.children(node).to_vec()
        } else {
            Vec::new()
        }
    }
}

/// Class table with every built-in class registered
pub fn builtin_classes() -> Result<ClassRegistry<dyn NodeClass>> {
    let plain: Arc<dyn NodeClass> = Arc::new(PlainClass);
    let mut classes: ClassRegistry<dyn NodeClass> = ClassRegistry::new();
    for tag in [
        object_type::NODE,
        object_type::LAYER,
        object_type::MODEL,
        object_type::LIGHT,
        object_type::COMPONENT,
    ] {
        classes.register(tag, plain.clone())?;
    }
    let specialised: [(ObjectType, Arc<dyn NodeClass>); 5] = [
        (object_type::CAMERA, Arc::new(CameraClass)),
        (object_type::STACK_LAYER, Arc::new(StackLayerClass)),
        (object_type::LEVEL_OF_DETAIL, Arc::new(LevelOfDetailClass)),
        (object_type::INSTANTIATOR, Arc::new(InstantiatorClass)),
        (object_type::PORTAL, Arc::new(PortalClass)),
    ];
    for (tag, class) in specialised {
        classes.register(tag, class)?;
    }
    Ok(classes)
}
