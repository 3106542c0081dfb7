//! Property groups and state managers
//!
//! Both apply named property values to a node as overrides rather than base
//! values, so removing them restores whatever was authored underneath.
//! Property groups write in the group priority class, states in the state
//! class, so a state wins over a group on the same property.

use crate::graph::SceneGraph;
use crate::node::NodeId;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::{Error, ObjectId, Result};
use strata_property::{OverrideToken, PriorityClass, PropertyTypeId, PropertyValue};
use strata_resource::{PropertyGroup, StateManager};

/// Override handle for one applied value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppliedOverride {
    pub object: ObjectId,
    pub property: PropertyTypeId,
    pub token: OverrideToken,
}

impl SceneGraph {
    /// Resolve every property name up front so nothing is written on failure
    fn resolve_names(
        &self,
        values: &BTreeMap<String, PropertyValue>,
    ) -> Result<Vec<(PropertyTypeId, PropertyValue)>> {
        values
            .iter()
            .map(|(name, value)| {
                let id = self
                    .registry()
                    .find_by_name(name)
                    .ok_or_else(|| Error::UnknownPropertyType(name.clone()))?;
                Ok((id, value.clone()))
            })
            .collect()
    }

    /// Write a set of named values as overrides; all or nothing
    pub fn apply_overrides(
        &mut self,
        node: NodeId,
        values: &BTreeMap<String, PropertyValue>,
        priority: PriorityClass,
    ) -> Result<Vec<AppliedOverride>> {
        let object = self
            .object_of(node)
            .ok_or_else(|| Error::NotFound(format!("node {}", node)))?;
        let resolved = self.resolve_names(values)?;

        let mut applied = Vec::with_capacity(resolved.len());
        for (property, value) in resolved {
            match self
                .properties_mut()
                .add_override(object, property, priority, value)
            {
                Ok(token) => applied.push(AppliedOverride {
                    object,
                    property,
                    token,
                }),
                Err(e) => {
                    self.remove_applied(&applied);
                    return Err(e);
                }
            }
        }
        Ok(applied)
    }

    /// Remove overrides returned by `apply_overrides`
    pub fn remove_applied(&mut self, applied: &[AppliedOverride]) {
        for entry in applied {
            self.properties_mut()
                .remove_override(entry.object, entry.property, entry.token);
        }
    }

    /// Apply a property group to a node
    pub fn apply_property_group(
        &mut self,
        node: NodeId,
        group: &PropertyGroup,
    ) -> Result<Vec<AppliedOverride>> {
        self.apply_overrides(node, &group.properties, PriorityClass::GROUP)
    }
}

/// Drives one node through the states of a state manager
pub struct StateController {
    node: NodeId,
    states: Arc<StateManager>,
    current: Option<String>,
    applied: Vec<AppliedOverride>,
}

impl StateController {
    pub fn new(node: NodeId, states: Arc<StateManager>) -> Self {
        Self {
            node,
            states,
            current: None,
            applied: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Leave the current state and enter `name`
    pub fn go_to_state(&mut self, scene: &mut SceneGraph, name: &str) -> Result<()> {
        let state = self
            .states
            .state(name)
            .ok_or_else(|| Error::NotFound(format!("state '{}'", name)))?;
        let values = state.values.clone();

        let previous = std::mem::take(&mut self.applied);
        scene.remove_applied(&previous);
        match scene.apply_overrides(self.node, &values, PriorityClass::STATE) {
            Ok(applied) => {
                self.applied = applied;
                self.current = Some(name.to_string());
                log::debug!("Node {} entered state '{}'", self.node, name);
                Ok(())
            }
            Err(e) => {
                self.current = None;
                Err(e)
            }
        }
    }

    /// Enter the initial state, if the manager names one
    pub fn go_to_initial(&mut self, scene: &mut SceneGraph) -> Result<()> {
        match self.states.initial.clone() {
            Some(initial) => self.go_to_state(scene, &initial),
            None => Ok(()),
        }
    }

    /// Leave the current state without entering another
    pub fn clear(&mut self, scene: &mut SceneGraph) {
        let previous = std::mem::take(&mut self.applied);
        scene.remove_applied(&previous);
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::scene;
    use crate::object_type::NODE;
    use crate::properties::{OPACITY, VISIBLE};
    use strata_resource::StateDefinition;

    fn values(pairs: &[(&str, PropertyValue)]) -> BTreeMap<String, PropertyValue> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_property_group_is_all_or_nothing() {
        let mut scene = scene();
        let node = scene.create_node("Button", NODE);
        let opacity = scene.builtins().opacity;

        let bad = PropertyGroup {
            properties: values(&[
                (OPACITY, PropertyValue::Float(0.3)),
                ("Missing.Property", PropertyValue::Bool(true)),
            ]),
        };
        assert!(matches!(
            scene.apply_property_group(node, &bad),
            Err(Error::UnknownPropertyType(_))
        ));
        assert_eq!(scene.properties().cell_count(), 0);

        let mismatched = PropertyGroup {
            properties: values(&[
                (OPACITY, PropertyValue::Float(0.3)),
                (VISIBLE, PropertyValue::Int(1)),
            ]),
        };
        assert!(scene.apply_property_group(node, &mismatched).is_err());
        assert!(!scene.properties().has_value(scene.object_of(node).unwrap(), opacity));

        let good = PropertyGroup {
            properties: values(&[(OPACITY, PropertyValue::Float(0.3))]),
        };
        let applied = scene.apply_property_group(node, &good).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(scene.resolve_property(node, opacity).unwrap(), PropertyValue::Float(0.3));
        scene.remove_applied(&applied);
        assert_eq!(scene.resolve_property(node, opacity).unwrap(), PropertyValue::Float(1.0));
    }

    #[test]
    fn test_state_transitions() {
        let mut scene = scene();
        let node = scene.create_node("Button", NODE);
        let opacity = scene.builtins().opacity;
        scene.set_property(node, opacity, 0.9f32).unwrap();

        let states = Arc::new(StateManager {
            initial: Some("Normal".into()),
            states: vec![
                StateDefinition {
                    name: "Normal".into(),
                    values: BTreeMap::new(),
                },
                StateDefinition {
                    name: "Pressed".into(),
                    values: values(&[(OPACITY, PropertyValue::Float(0.5))]),
                },
            ],
        });
        let mut controller = StateController::new(node, states);
        controller.go_to_initial(&mut scene).unwrap();
        assert_eq!(controller.current_state(), Some("Normal"));

        // A group underneath loses to the state
        let group = PropertyGroup {
            properties: values(&[(OPACITY, PropertyValue::Float(0.2))]),
        };
        scene.apply_property_group(node, &group).unwrap();
        controller.go_to_state(&mut scene, "Pressed").unwrap();
        assert_eq!(scene.resolve_property(node, opacity).unwrap(), PropertyValue::Float(0.5));

        controller.go_to_state(&mut scene, "Normal").unwrap();
        assert_eq!(scene.resolve_property(node, opacity).unwrap(), PropertyValue::Float(0.2));

        assert!(matches!(
            controller.go_to_state(&mut scene, "Hovered"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(controller.current_state(), Some("Normal"));

        controller.clear(&mut scene);
        assert_eq!(controller.current_state(), None);
    }
}
