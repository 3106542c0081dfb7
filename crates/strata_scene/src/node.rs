//! Object nodes

use crate::object_type::ObjectType;
use glam::Vec2;
use std::collections::BTreeSet;
use strata_core::{Handle, ObjectId};

/// Generation-checked handle to a node
pub type NodeId = Handle<ObjectNode>;

/// Result of the last layout pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutState {
    /// Size the node asked for while measuring
    pub desired: Vec2,
    /// Size the node was given while arranging
    pub actual: Vec2,
    /// Offset from the parent's origin
    pub offset: Vec2,
}

/// A node in the scene graph
#[derive(Clone, Debug)]
pub struct ObjectNode {
    pub(crate) object: ObjectId,
    pub(crate) name: String,
    pub(crate) object_type: ObjectType,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) layout: LayoutState,
}

impl ObjectNode {
    pub(crate) fn new(object: ObjectId, name: String, object_type: ObjectType) -> Self {
        Self {
            object,
            name,
            object_type,
            parent: None,
            children: Vec::new(),
            tags: BTreeSet::new(),
            layout: LayoutState::default(),
        }
    }

    /// Identity of the node's property cells
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> &ObjectType {
        &self.object_type
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }
}
