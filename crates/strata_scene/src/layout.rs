//! Layout
//!
//! Three passes over a subtree. Constraints flow from parents to children:
//! each node is offered what its parent was offered, narrowed by its own
//! explicit size. Measure then runs children first and asks each node's class
//! for its desired size. Arrange runs parents first, gives each child its
//! desired size clamped to the parent's actual size, and asks the class where
//! the children go. Explicit `Layout.Width` / `Layout.Height` values
//! (non-negative) win over measured sizes on either axis.

use crate::graph::SceneGraph;
use crate::node::NodeId;
use glam::Vec2;
use std::collections::HashMap;
use strata_core::{Error, Result};

/// Axis-aligned rectangle in root layout space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayoutRect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl LayoutRect {
    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.origin + self.size;
        point.x >= self.origin.x && point.y >= self.origin.y && point.x < max.x && point.y < max.y
    }
}

impl SceneGraph {
    fn explicit_size(&self, node: NodeId) -> Result<(Option<f32>, Option<f32>)> {
        let object = self
            .object_of(node)
            .ok_or_else(|| Error::NotFound(format!("node {}", node)))?;
        let builtins = *self.builtins();
        let width = self.properties().resolve_as::<f32>(object, builtins.layout_width)?;
        let height = self.properties().resolve_as::<f32>(object, builtins.layout_height)?;
        Ok((
            (width >= 0.0).then_some(width),
            (height >= 0.0).then_some(height),
        ))
    }

    fn apply_explicit(size: Vec2, explicit: (Option<f32>, Option<f32>)) -> Vec2 {
        Vec2::new(explicit.0.unwrap_or(size.x), explicit.1.unwrap_or(size.y))
    }

    /// Measure and arrange the subtree under `root` within `available` space
    pub fn update_layout(&mut self, root: NodeId, available: Vec2) -> Result<()> {
        if !self.contains(root) {
            return Err(Error::NotFound(format!("node {}", root)));
        }

        // Constraints, parents before children
        let order = self.pre_order(root);
        let mut explicit: HashMap<NodeId, (Option<f32>, Option<f32>)> = HashMap::with_capacity(order.len());
        let mut constraints: HashMap<NodeId, Vec2> = HashMap::with_capacity(order.len());
        for &node in &order {
            let own = self.explicit_size(node)?;
            let inherited = self
                .get(node)
                .and_then(|n| n.parent)
                .and_then(|parent| constraints.get(&parent).copied())
                .unwrap_or(available);
            constraints.insert(node, Self::apply_explicit(inherited, own));
            explicit.insert(node, own);
        }

        // Measure, children before parents
        for &node in order.iter().rev() {
            let own = explicit.get(&node).copied().unwrap_or((None, None));
            let constraint = constraints.get(&node).copied().unwrap_or(available);
            let children: Vec<Vec2> = self
                .children(node)
                .iter()
                .filter_map(|&child| self.get(child).map(|n| n.layout.desired))
                .collect();
            let measured = self.class_of(node).measure(self, node, constraint, &children);
            let desired = Self::apply_explicit(measured, own);
            if let Some(entry) = self.node_mut(node) {
                entry.layout.desired = desired;
            }
        }

        // Arrange, parents before children; nobody gets more than its parent
        let root_constraint = constraints.get(&root).copied().unwrap_or(available);
        let root_size = self
            .get(root)
            .map(|n| n.layout.desired)
            .unwrap_or_default()
            .min(root_constraint);
        if let Some(entry) = self.node_mut(root) {
            entry.layout.actual = root_size;
            entry.layout.offset = Vec2::ZERO;
        }

        for node in order {
            let size = self.get(node).map(|n| n.layout.actual).unwrap_or_default();
            let children: Vec<NodeId> = self.children(node).to_vec();
            let desired: Vec<Vec2> = children
                .iter()
                .filter_map(|&child| self.get(child).map(|n| n.layout.desired))
                .collect();
            let offsets = self.class_of(node).arrange(self, node, size, &desired);
            for ((child, child_desired), offset) in children.iter().zip(desired).zip(offsets) {
                if let Some(entry) = self.node_mut(*child) {
                    entry.layout.actual = child_desired.min(size);
                    entry.layout.offset = offset;
                }
            }
        }

        log::trace!("Layout updated for {} at {:?}", root, available);
        Ok(())
    }

    /// Bounds of a node in the space of its topmost ancestor
    pub fn layout_bounds(&self, node: NodeId) -> Option<LayoutRect> {
        let size = self.get(node)?.layout.actual;
        let mut origin = Vec2::ZERO;
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = self.get(id)?;
            origin += entry.layout.offset;
            current = entry.parent;
        }
        Some(LayoutRect { origin, size })
    }

    /// Deepest visible node under `root` whose bounds contain `point`.
    /// Later siblings are on top and win over earlier ones.
    pub fn hit_test(&self, root: NodeId, point: Vec2) -> Option<NodeId> {
        if !self.is_effectively_visible(root).unwrap_or(false) {
            return None;
        }
        self.hit_test_from(root, point)
    }

    fn hit_test_from(&self, node: NodeId, point: Vec2) -> Option<NodeId> {
        let visible = self
            .object_of(node)
            .and_then(|object| {
                self.properties()
                    .resolve_as::<bool>(object, self.builtins().visible)
                    .ok()
            })
            .unwrap_or(false);
        if !visible {
            return None;
        }
        for &child in self.children(node).iter().rev() {
            if let Some(hit) = self.hit_test_from(child, point) {
                return Some(hit);
            }
        }
        self.layout_bounds(node)
            .filter(|bounds| bounds.contains(point))
            .map(|_| node)
    }
}
