//! Scene graph
//!
//! Nodes live in a generation-checked arena. Structural edits are validated
//! before anything is touched, so a rejected `attach` leaves the tree exactly
//! as it was. The graph owns the property manager its nodes store their
//! values in and tears a node's cells down when the node is destroyed.

use crate::class::{builtin_classes, NodeClass, PlainClass};
use crate::node::{NodeId, ObjectNode};
use crate::object_type::ObjectType;
use crate::properties::BuiltinProperties;
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{ClassRegistry, Error, HandleMap, ObjectId, ObjectIdGenerator, Result};
use strata_property::{PropertyManager, PropertyTypeId, PropertyTypeRegistry, PropertyValue};

/// Tree of object nodes plus their property storage
pub struct SceneGraph {
    nodes: HandleMap<ObjectNode>,
    roots: Vec<NodeId>,
    by_object: HashMap<ObjectId, NodeId>,
    properties: PropertyManager,
    builtins: BuiltinProperties,
    classes: ClassRegistry<dyn NodeClass>,
    fallback_class: Arc<dyn NodeClass>,
    ids: ObjectIdGenerator,
}

impl SceneGraph {
    /// Create an empty scene over a registry holding the built-in properties
    pub fn new(registry: Arc<PropertyTypeRegistry>) -> Result<Self> {
        let builtins = BuiltinProperties::lookup(&registry)?;
        Ok(Self {
            nodes: HandleMap::new(),
            roots: Vec::new(),
            by_object: HashMap::new(),
            properties: PropertyManager::new(registry),
            builtins,
            classes: builtin_classes()?,
            fallback_class: Arc::new(PlainClass),
            ids: ObjectIdGenerator::new(),
        })
    }

    pub fn builtins(&self) -> &BuiltinProperties {
        &self.builtins
    }

    pub fn properties(&self) -> &PropertyManager {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyManager {
        &mut self.properties
    }

    pub fn registry(&self) -> &Arc<PropertyTypeRegistry> {
        self.properties.registry()
    }

    /// Identity for a property owner that is not a node, such as a composer
    pub fn allocate_object(&self) -> ObjectId {
        self.ids.next()
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Register the class for an object type
    pub fn register_class(&mut self, object_type: ObjectType, class: Arc<dyn NodeClass>) -> Result<()> {
        self.classes.register(object_type, class)
    }

    /// Class of a node; unknown object types behave as plain nodes
    pub fn class_of(&self, node: NodeId) -> Arc<dyn NodeClass> {
        self.nodes
            .get(node)
            .and_then(|n| self.classes.get(&n.object_type))
            .unwrap_or_else(|| self.fallback_class.clone())
    }

    /// Whether a node acts as a camera
    pub fn is_camera(&self, node: NodeId) -> bool {
        self.nodes.contains(node) && self.class_of(node).is_camera()
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Create a new root node
    pub fn create_node(&mut self, name: impl Into<String>, object_type: ObjectType) -> NodeId {
        let object = self.ids.next();
        let id = self
            .nodes
            .insert(ObjectNode::new(object, name.into(), object_type));
        self.roots.push(id);
        self.by_object.insert(object, id);
        id
    }

    /// Create a node and attach it under `parent`
    pub fn create_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        object_type: ObjectType,
    ) -> Result<NodeId> {
        self.node(parent)?;
        // A fresh node has no descendants, so no cycle check is needed
        let object = self.ids.next();
        let mut node = ObjectNode::new(object, name.into(), object_type);
        node.parent = Some(parent);
        let child = self.nodes.insert(node);
        self.by_object.insert(object, child);
        if let Some(entry) = self.nodes.get_mut(parent) {
            entry.children.push(child);
        }
        Ok(child)
    }

    fn node(&self, id: NodeId) -> Result<&ObjectNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("node {}", id)))
    }

    pub fn get(&self, id: NodeId) -> Option<&ObjectNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ObjectNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Property owner identity of a node
    pub fn object_of(&self, id: NodeId) -> Option<ObjectId> {
        self.nodes.get(id).map(ObjectNode::object)
    }

    /// Node owning an object identity
    pub fn node_of(&self, object: ObjectId) -> Option<NodeId> {
        self.by_object.get(&object).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children in insertion order; empty for unknown nodes
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(ObjectNode::children).unwrap_or(&[])
    }

    /// Nodes without a parent, in creation order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a tag
    pub fn add_tag(&mut self, id: NodeId, tag: impl Into<String>) -> Result<()> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("node {}", id)))?
            .tags
            .insert(tag.into());
        Ok(())
    }

    /// Check if `ancestor` is an ancestor of `node`
    pub fn is_ancestor(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Attach `child` under `parent`, moving it if it already has a parent.
    ///
    /// Fails with `Cycle` if `child` is `parent` or one of its ancestors; the
    /// tree is unchanged on failure.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == parent || self.is_ancestor(parent, child) {
            return Err(Error::Cycle(format!(
                "cannot attach {} under its own descendant {}",
                child, parent
            )));
        }

        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        Ok(())
    }

    /// Remove a node from its parent (or the root list) without destroying it
    fn unlink(&mut self, child: NodeId) {
        match self.parent(child) {
            Some(old_parent) => {
                if let Some(node) = self.nodes.get_mut(old_parent) {
                    node.children.retain(|&c| c != child);
                }
            }
            None => self.roots.retain(|&r| r != child),
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
    }

    /// Make a node a root again, keeping its subtree
    pub fn remove_parent(&mut self, child: NodeId) -> Result<()> {
        self.node(child)?;
        if self.parent(child).is_some() {
            self.unlink(child);
            self.roots.push(child);
        }
        Ok(())
    }

    /// Remove a node and its subtree from the scene, dropping their property
    /// cells. Returns the number of nodes removed.
    pub fn detach(&mut self, child: NodeId) -> Result<usize> {
        self.node(child)?;
        let doomed = self.pre_order(child);
        self.unlink(child);

        for id in doomed.iter().rev() {
            if let Some(node) = self.nodes.remove(*id) {
                self.by_object.remove(&node.object);
                self.properties.remove_object(node.object);
            }
        }
        log::debug!("Detached {} nodes", doomed.len());
        Ok(doomed.len())
    }

    // ========================================================================
    // Traversal and lookup
    // ========================================================================

    /// Node and descendants, parents before children
    pub fn pre_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Node and descendants, children before parents
    pub fn post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains(root) {
            return out;
        }
        // Node, then children right to left; reversed that is post-order
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().copied());
        }
        out.reverse();
        out
    }

    /// First node with the name, in pre-order over all roots
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .flat_map(|&root| self.pre_order(root))
            .find(|&id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Resolve a path relative to `from`.
    ///
    /// `/Root/Child` starts at a root named `Root`; `..` and `.` move up and
    /// stay; any other segment selects the first child with that name.
    pub fn find_by_path(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let (mut current, rest) = match path.strip_prefix('/') {
            Some(rest) => {
                let (first, rest) = rest.split_once('/').unwrap_or((rest, ""));
                let root = self
                    .roots
                    .iter()
                    .copied()
                    .find(|&r| self.nodes.get(r).is_some_and(|n| n.name == first))?;
                (root, rest)
            }
            None => {
                self.nodes.get(from)?;
                (from, path)
            }
        };

        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            current = match segment {
                "." => current,
                ".." => self.parent(current)?,
                name => self
                    .children(current)
                    .iter()
                    .copied()
                    .find(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))?,
            };
        }
        Some(current)
    }

    /// Absolute path of a node
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(node_id)?;
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn object(&self, id: NodeId) -> Result<ObjectId> {
        self.node(id).map(ObjectNode::object)
    }

    /// Set the base value of a node property
    pub fn set_property(
        &mut self,
        node: NodeId,
        property: PropertyTypeId,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        let object = self.object(node)?;
        self.properties.set_base(object, property, value)
    }

    /// Resolve a node property; inherited types fall back to the nearest
    /// ancestor holding a value before the type default
    pub fn resolve_property(&self, node: NodeId, property: PropertyTypeId) -> Result<PropertyValue> {
        let object = self.object(node)?;
        let inherited = self
            .registry()
            .get(property)
            .ok_or_else(|| Error::UnknownPropertyType(format!("#{}", property.index())))?
            .flags()
            .inherited;

        if inherited && !self.properties.has_value(object, property) {
            let mut current = self.parent(node);
            while let Some(ancestor) = current {
                let ancestor_object = self.object(ancestor)?;
                if self.properties.has_value(ancestor_object, property) {
                    return self.properties.resolve(ancestor_object, property);
                }
                current = self.parent(ancestor);
            }
        }
        self.properties.resolve(object, property)
    }

    /// Local transform composed with every ancestor's, evaluated now
    pub fn world_transform(&self, node: NodeId) -> Result<Mat4> {
        let mut transform = Mat4::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            let local = self
                .properties
                .resolve_as::<Mat4>(self.object(id)?, self.builtins.transform)?;
            transform = local * transform;
            current = self.parent(id);
        }
        Ok(transform)
    }

    /// World-space origin of a node
    pub fn world_position(&self, node: NodeId) -> Result<Vec3> {
        Ok(self.world_transform(node)?.transform_point3(Vec3::ZERO))
    }

    /// Visible only if the node and every ancestor are visible
    pub fn is_effectively_visible(&self, node: NodeId) -> Result<bool> {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self
                .properties
                .resolve_as::<bool>(self.object(id)?, self.builtins.visible)?
            {
                return Ok(false);
            }
            current = self.parent(id);
        }
        Ok(true)
    }

    /// Effective `Node.Enabled`, inherited from ancestors
    pub fn is_enabled(&self, node: NodeId) -> Result<bool> {
        let value = self.resolve_property(node, self.builtins.enabled)?;
        Ok(value.as_bool().unwrap_or(true))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::object_type::{CAMERA, MODEL, NODE};
    use crate::properties::register_builtin_properties;
    use glam::Vec3;

    pub(crate) fn scene() -> SceneGraph {
        let registry = Arc::new(PropertyTypeRegistry::new());
        register_builtin_properties(&registry).unwrap();
        registry.lock();
        SceneGraph::new(registry).unwrap()
    }

    #[test]
    fn test_attach_preserves_insertion_order() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let a = scene.create_child(root, "A", MODEL).unwrap();
        let b = scene.create_child(root, "B", MODEL).unwrap();
        let c = scene.create_child(root, "C", MODEL).unwrap();

        assert_eq!(scene.children(root), &[a, b, c]);
        assert_eq!(scene.roots(), &[root]);
        assert_eq!(scene.parent(b), Some(root));
    }

    #[test]
    fn test_cycle_rejected_and_tree_unchanged() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let child = scene.create_child(root, "Child", NODE).unwrap();
        let grandchild = scene.create_child(child, "Grandchild", NODE).unwrap();

        let before: Vec<_> = scene.pre_order(root);
        assert!(matches!(scene.attach(grandchild, root), Err(Error::Cycle(_))));
        assert!(matches!(scene.attach(child, child), Err(Error::Cycle(_))));

        assert_eq!(scene.pre_order(root), before);
        assert_eq!(scene.parent(root), None);
        assert_eq!(scene.roots(), &[root]);
        assert_eq!(scene.children(grandchild), &[] as &[NodeId]);
    }

    #[test]
    fn test_reparent() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let a = scene.create_child(root, "A", NODE).unwrap();
        let b = scene.create_child(root, "B", NODE).unwrap();
        let leaf = scene.create_child(a, "Leaf", NODE).unwrap();

        scene.attach(b, leaf).unwrap();
        assert!(scene.children(a).is_empty());
        assert_eq!(scene.children(b), &[leaf]);
        assert_eq!(scene.path_of(leaf).unwrap(), "/Root/B/Leaf");

        scene.remove_parent(b).unwrap();
        assert_eq!(scene.roots(), &[root, b]);
        assert_eq!(scene.path_of(leaf).unwrap(), "/B/Leaf");
    }

    #[test]
    fn test_detach_drops_cells() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let child = scene.create_child(root, "Child", NODE).unwrap();
        let leaf = scene.create_child(child, "Leaf", NODE).unwrap();
        let opacity = scene.builtins().opacity;
        scene.set_property(child, opacity, 0.5f32).unwrap();
        scene.set_property(leaf, opacity, 0.25f32).unwrap();
        let leaf_object = scene.object_of(leaf).unwrap();

        assert_eq!(scene.detach(child).unwrap(), 2);
        assert!(!scene.contains(child));
        assert!(!scene.contains(leaf));
        assert!(scene.children(root).is_empty());
        assert_eq!(scene.properties().cell_count(), 0);
        assert_eq!(scene.node_of(leaf_object), None);
        assert!(matches!(scene.detach(child), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_traversal_orders() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let a = scene.create_child(root, "A", NODE).unwrap();
        let a1 = scene.create_child(a, "A1", NODE).unwrap();
        let b = scene.create_child(root, "B", NODE).unwrap();

        assert_eq!(scene.pre_order(root), vec![root, a, a1, b]);
        assert_eq!(scene.post_order(root), vec![a1, a, b, root]);
    }

    #[test]
    fn test_deep_chain_traversal() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let mut leaf = root;
        for i in 0..100_000 {
            leaf = scene.create_child(leaf, format!("N{}", i), NODE).unwrap();
        }

        let post = scene.post_order(root);
        assert_eq!(post.len(), 100_001);
        assert_eq!(post.first(), Some(&leaf));
        assert_eq!(post.last(), Some(&root));
        assert_eq!(scene.pre_order(root).len(), 100_001);
        assert_eq!(scene.roots(), &[root]);
        assert!(scene.is_ancestor(leaf, root));
    }

    #[test]
    fn test_find_by_path() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let camera = scene.create_child(root, "Camera", CAMERA).unwrap();
        let group = scene.create_child(root, "Group", NODE).unwrap();
        let box_node = scene.create_child(group, "Box", MODEL).unwrap();

        assert_eq!(scene.find_by_path(root, "Group/Box"), Some(box_node));
        assert_eq!(scene.find_by_path(box_node, "../../Camera"), Some(camera));
        assert_eq!(scene.find_by_path(box_node, "/Root/Camera"), Some(camera));
        assert_eq!(scene.find_by_path(group, "./Box"), Some(box_node));
        assert_eq!(scene.find_by_path(root, ".."), None);
        assert_eq!(scene.find_by_name("Box"), Some(box_node));
        assert!(scene.is_camera(camera));
        assert!(!scene.is_camera(box_node));
    }

    #[test]
    fn test_world_transform_composes_ancestors() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let child = scene.create_child(root, "Child", NODE).unwrap();
        let transform = scene.builtins().transform;

        scene
            .set_property(root, transform, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        scene
            .set_property(child, transform, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)))
            .unwrap();
        assert_eq!(scene.world_position(child).unwrap(), Vec3::new(1.0, 2.0, 0.0));

        scene
            .set_property(root, transform, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(scene.world_position(child).unwrap(), Vec3::new(5.0, 2.0, 0.0));
    }

    #[test]
    fn test_visibility_and_inherited_enabled() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let child = scene.create_child(root, "Child", NODE).unwrap();
        let visible = scene.builtins().visible;
        let enabled = scene.builtins().enabled;

        assert!(scene.is_effectively_visible(child).unwrap());
        scene.set_property(root, visible, false).unwrap();
        assert!(!scene.is_effectively_visible(child).unwrap());

        assert!(scene.is_enabled(child).unwrap());
        scene.set_property(root, enabled, false).unwrap();
        assert!(!scene.is_enabled(child).unwrap());
        scene.set_property(child, enabled, true).unwrap();
        assert!(scene.is_enabled(child).unwrap());
    }

    #[test]
    fn test_type_mismatch_on_set() {
        let mut scene = scene();
        let root = scene.create_node("Root", NODE);
        let opacity = scene.builtins().opacity;
        assert!(matches!(
            scene.set_property(root, opacity, true),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
