//! Template instantiation

use crate::graph::SceneGraph;
use crate::node::NodeId;
use strata_core::{Error, Result, TypeTag};
use strata_property::{PropertyTypeId, PropertyValue};
use strata_resource::SceneTemplate;

impl SceneGraph {
    /// Build a new subtree from a template and return its root.
    ///
    /// Property names are checked before any node is created; if a value is
    /// rejected afterwards the partial subtree is removed again.
    pub fn instantiate(&mut self, template: &SceneTemplate) -> Result<NodeId> {
        let mut resolved = Vec::with_capacity(template.nodes.len());
        for node in &template.nodes {
            let properties = node
                .properties
                .iter()
                .map(|(name, value)| {
                    self.registry()
                        .find_by_name(name)
                        .map(|id| (id, value.clone()))
                        .ok_or_else(|| Error::UnknownPropertyType(name.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            resolved.push(properties);
        }

        let mut created: Vec<NodeId> = Vec::with_capacity(template.nodes.len());
        let result = self.build_template(template, resolved, &mut created);
        match (result, created.first().copied()) {
            (Ok(()), Some(root)) => Ok(root),
            (Ok(()), None) => Err(Error::invalid_data("template", "no nodes")),
            (Err(e), root) => {
                // Everything hangs off the first node once attached; stragglers
                // that failed before attaching are roots of their own
                for id in created.iter().rev() {
                    if Some(*id) == root || self.parent(*id).is_none() {
                        let _ = self.detach(*id);
                    }
                }
                Err(e)
            }
        }
    }

    fn build_template(
        &mut self,
        template: &SceneTemplate,
        resolved: Vec<Vec<(PropertyTypeId, PropertyValue)>>,
        created: &mut Vec<NodeId>,
    ) -> Result<()> {
        for (node, properties) in template.nodes.iter().zip(resolved) {
            let id = self.create_node(node.name.clone(), TypeTag::new(node.object_type.clone()));
            created.push(id);
            if let Some(parent) = node.parent {
                let parent = created
                    .get(parent)
                    .copied()
                    .filter(|_| parent + 1 < created.len())
                    .ok_or_else(|| {
                        Error::invalid_data(
                            node.name.clone(),
                            format!("parent index {} is not an earlier node", parent),
                        )
                    })?;
                self.attach(parent, id)?;
            }
            for (property, value) in properties {
                self.set_property(id, property, value)?;
            }
            for tag in &node.tags {
                self.add_tag(id, tag.clone())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::tests::scene;
    use crate::properties::{OPACITY, VISIBLE};
    use std::collections::BTreeMap;
    use strata_core::Error;
    use strata_property::PropertyValue;
    use strata_resource::{NodeTemplate, SceneTemplate};

    fn node(name: &str, parent: Option<usize>, properties: &[(&str, PropertyValue)]) -> NodeTemplate {
        NodeTemplate {
            name: name.into(),
            object_type: "Node".into(),
            parent,
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            tags: vec!["ui".into()],
        }
    }

    #[test]
    fn test_instantiate() {
        let mut scene = scene();
        let template = SceneTemplate {
            nodes: vec![
                node("Card", None, &[(OPACITY, PropertyValue::Float(0.5))]),
                node("Title", Some(0), &[]),
                node("Icon", Some(0), &[(VISIBLE, PropertyValue::Bool(false))]),
            ],
        };

        let root = scene.instantiate(&template).unwrap();
        let second = scene.instantiate(&template).unwrap();
        assert_ne!(root, second);
        assert_eq!(scene.len(), 6);
        assert_eq!(scene.children(root).len(), 2);
        let icon = scene.find_by_path(root, "Icon").unwrap();
        assert!(!scene.is_effectively_visible(icon).unwrap());
        assert!(scene.get(icon).unwrap().has_tag("ui"));
    }

    #[test]
    fn test_failed_instantiate_leaves_no_nodes() {
        let mut scene = scene();
        let unknown = SceneTemplate {
            nodes: vec![node("Card", None, &[("Card.Missing", PropertyValue::Float(0.5))])],
        };
        assert!(matches!(
            scene.instantiate(&unknown),
            Err(Error::UnknownPropertyType(_))
        ));
        assert!(scene.is_empty());

        let mismatched = SceneTemplate {
            nodes: vec![
                node("Card", None, &[]),
                node("Title", Some(0), &[(OPACITY, PropertyValue::Bool(true))]),
            ],
        };
        assert!(scene.instantiate(&mismatched).is_err());
        assert!(scene.is_empty());
        assert_eq!(scene.properties().cell_count(), 0);
    }
}
