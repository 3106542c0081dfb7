//! Object sources
//!
//! Sources are pulled by the composer that draws them. A `SceneSource`
//! collects the renderable nodes below a root; a `FilteredSource` runs one
//! filter over exactly one upstream source.

use crate::filter::{FilterContext, ObjectFilter};
use std::collections::HashSet;
use strata_core::{Error, Result};
use strata_scene::NodeId;

/// Produces the ordered node list for one evaluation
pub trait ObjectSource: Send + Sync {
    fn collect(&self, ctx: &FilterContext) -> Result<Vec<NodeId>>;

    /// Chain a filter after this source
    fn then<F>(self, filter: F) -> FilteredSource
    where
        Self: Sized + 'static,
        F: ObjectFilter + 'static,
    {
        FilteredSource::new(Box::new(self), Box::new(filter))
    }
}

/// Where a scene source starts collecting
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRoot {
    Node(NodeId),
    /// Absolute node path, resolved on every evaluation
    Path(String),
    /// Every scene root in order
    Scene,
}

/// Visible nodes below a root in render order
pub struct SceneSource {
    root: SourceRoot,
}

impl SceneSource {
    pub fn new(root: SourceRoot) -> Self {
        Self { root }
    }

    pub fn from_node(node: NodeId) -> Self {
        Self::new(SourceRoot::Node(node))
    }

    pub fn whole_scene() -> Self {
        Self::new(SourceRoot::Scene)
    }

    fn roots(&self, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        match &self.root {
            SourceRoot::Node(node) if ctx.scene.contains(*node) => Ok(vec![*node]),
            SourceRoot::Node(node) => Err(Error::NotFound(format!("source root {}", node))),
            SourceRoot::Path(path) => {
                ctx.scene
                    .roots()
                    .first()
                    .and_then(|&start| ctx.scene.find_by_path(start, path))
                    .map(|node| vec![node])
                    .ok_or_else(|| Error::NotFound(format!("source root '{}'", path)))
            }
            SourceRoot::Scene => Ok(ctx.scene.roots().to_vec()),
        }
    }

    /// Depth-first walk over render children with an explicit stack
    fn visit(&self, root: NodeId, ctx: &FilterContext, out: &mut Vec<NodeId>) -> Result<()> {
        enum Step {
            Enter(NodeId),
            Leave(NodeId),
        }

        let mut path: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Enter(node) => node,
                Step::Leave(node) => {
                    path.remove(&node);
                    continue;
                }
            };
            let object = ctx
                .scene
                .object_of(node)
                .ok_or_else(|| Error::NotFound(format!("node {}", node)))?;
            let visible = ctx
                .scene
                .properties()
                .resolve_as::<bool>(object, ctx.scene.builtins().visible)?;
            // Instantiators can point at each other; never re-enter the current path
            if !visible || path.contains(&node) {
                continue;
            }

            out.push(node);
            path.insert(node);
            stack.push(Step::Leave(node));
            let class = ctx.scene.class_of(node);
            let children = class.render_children(ctx.scene, node, ctx.camera);
            stack.extend(children.into_iter().rev().map(Step::Enter));
        }
        Ok(())
    }
}

impl ObjectSource for SceneSource {
    fn collect(&self, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for root in self.roots(ctx)? {
            // Hidden ancestors hide the whole subtree
            if ctx.scene.is_effectively_visible(root)? {
                self.visit(root, ctx, &mut out)?;
            }
        }
        Ok(out)
    }
}

/// One upstream source followed by one filter
pub struct FilteredSource {
    upstream: Box<dyn ObjectSource>,
    filter: Box<dyn ObjectFilter>,
}

impl FilteredSource {
    pub fn new(upstream: Box<dyn ObjectSource>, filter: Box<dyn ObjectFilter>) -> Self {
        Self { upstream, filter }
    }

    pub fn filter(&self) -> &dyn ObjectFilter {
        self.filter.as_ref()
    }
}

impl ObjectSource for FilteredSource {
    fn collect(&self, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        let input = self.upstream.collect(ctx)?;
        self.filter.evaluate(input, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{PredicateFilter, TypeFilter};
    use crate::tests_support::scene;
    use strata_property::PropertyValue;
    use strata_scene::object_type::{INSTANTIATOR, MODEL, NODE, PORTAL};

    #[test]
    fn test_scene_source_order_and_visibility() {
        let (mut scene, builtins) = scene();
        let root = scene.create_node("Root", NODE);
        let a = scene.create_child(root, "A", MODEL).unwrap();
        let a1 = scene.create_child(a, "A1", MODEL).unwrap();
        let hidden = scene.create_child(root, "Hidden", MODEL).unwrap();
        let _under_hidden = scene.create_child(hidden, "UnderHidden", MODEL).unwrap();
        let portal = scene.create_child(root, "Portal", PORTAL).unwrap();
        let _inside = scene.create_child(portal, "Inside", MODEL).unwrap();
        scene.set_property(hidden, builtins.visible, false).unwrap();
        scene.set_property(portal, builtins.portal_open, false).unwrap();

        let ctx = FilterContext::new(&scene);
        let nodes = SceneSource::from_node(root).collect(&ctx).unwrap();
        assert_eq!(nodes, vec![root, a, a1, portal]);

        let nodes = SceneSource::new(SourceRoot::Path("/Root/A".into())).collect(&ctx).unwrap();
        assert_eq!(nodes, vec![a, a1]);
        assert!(SceneSource::new(SourceRoot::Path("/Nope".into())).collect(&ctx).is_err());
    }

    #[test]
    fn test_mutual_instantiators_terminate() {
        let (mut scene, builtins) = scene();
        let root = scene.create_node("Root", NODE);
        let a = scene.create_child(root, "A", INSTANTIATOR).unwrap();
        let b = scene.create_child(root, "B", INSTANTIATOR).unwrap();
        scene
            .set_property(a, builtins.instantiator_template, PropertyValue::Pointer("../B".into()))
            .unwrap();
        scene
            .set_property(b, builtins.instantiator_template, PropertyValue::Pointer("../A".into()))
            .unwrap();

        let ctx = FilterContext::new(&scene);
        let nodes = SceneSource::from_node(root).collect(&ctx).unwrap();
        assert_eq!(nodes, vec![root, a, b, b, a]);
    }

    #[test]
    fn test_chained_source() {
        let (mut scene, _) = scene();
        let root = scene.create_node("Root", NODE);
        let model = scene.create_child(root, "Model", MODEL).unwrap();

        let source = SceneSource::from_node(root).then(PredicateFilter::new(TypeFilter::new([MODEL])));
        let ctx = FilterContext::new(&scene);
        assert_eq!(source.collect(&ctx).unwrap(), vec![model]);
        assert_eq!(source.filter().kind(), "Type");
    }

    #[test]
    fn test_deep_chain_is_collected() {
        let (mut scene, _) = scene();
        let root = scene.create_node("Root", NODE);
        let mut leaf = root;
        for i in 0..100_000 {
            leaf = scene.create_child(leaf, format!("M{}", i), MODEL).unwrap();
        }

        let ctx = FilterContext::new(&scene);
        let nodes = SceneSource::from_node(root).collect(&ctx).unwrap();
        assert_eq!(nodes.len(), 100_001);
        assert_eq!(nodes.first(), Some(&root));
        assert_eq!(nodes.last(), Some(&leaf));
    }
}
