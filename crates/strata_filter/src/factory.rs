//! Building sources from authored descriptions

use crate::filter::{
    DistanceFilter, FrustumFilter, HasPropertyFilter, ObjectFilter, PredicateFilter,
    PropertyEqualsFilter, TagFilter, TypeFilter,
};
use crate::sort::{SortByShader, SortByViewZ};
use crate::source::{FilteredSource, ObjectSource, SceneSource, SourceRoot};
use std::collections::HashMap;
use strata_core::{Error, Result, TypeTag};
use strata_property::{PropertyTypeId, PropertyTypeRegistry, PropertyValue};
use strata_resource::{FilterDescription, ObjectSourceDescription};

/// Builds one filter kind from its description
pub type FilterBuilder =
    Box<dyn Fn(&FilterDescription, &PropertyTypeRegistry) -> Result<Box<dyn ObjectFilter>> + Send + Sync>;

/// Table of filter builders keyed by kind name
pub struct FilterFactory {
    builders: HashMap<String, FilterBuilder>,
}

impl FilterFactory {
    /// Factory without any kinds
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Factory with every built-in filter kind
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.insert("Type", |desc, _| {
            let types = strings(desc, "Types", "Type")?
                .into_iter()
                .map(TypeTag::new)
                .collect::<Vec<_>>();
            Ok(predicate(TypeFilter::new(types), desc))
        });
        factory.insert("Tag", |desc, _| {
            Ok(predicate(TagFilter::new(strings(desc, "Tags", "Tag")?), desc))
        });
        factory.insert("PropertyEquals", |desc, registry| {
            let property = property(desc, registry)?;
            let value = desc
                .arguments
                .get("Value")
                .cloned()
                .ok_or_else(|| missing(desc, "Value"))?;
            Ok(predicate(PropertyEqualsFilter::new(property, value), desc))
        });
        factory.insert("HasProperty", |desc, registry| {
            Ok(predicate(HasPropertyFilter::new(property(desc, registry)?), desc))
        });
        factory.insert("Distance", |desc, _| {
            let min = float(desc, "Min")?.unwrap_or(0.0);
            let max = float(desc, "Max")?.unwrap_or(f32::INFINITY);
            Ok(predicate(DistanceFilter::new(min, max), desc))
        });
        factory.insert("Frustum", |desc, _| Ok(predicate(FrustumFilter, desc)));
        factory.insert("SortByViewZ", |desc, _| {
            let front_to_back = match desc.arguments.get("FrontToBack") {
                None => true,
                Some(value) => value.as_bool().ok_or_else(|| wrong(desc, "FrontToBack", "bool"))?,
            };
            Ok(Box::new(SortByViewZ::new(front_to_back)))
        });
        factory.insert("SortByShader", |_, _| Ok(Box::new(SortByShader)));
        factory
    }

    fn insert<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&FilterDescription, &PropertyTypeRegistry) -> Result<Box<dyn ObjectFilter>>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind.to_string(), Box::new(builder));
    }

    /// Register a builder for a new filter kind
    pub fn register<F>(&mut self, kind: &str, builder: F) -> Result<()>
    where
        F: Fn(&FilterDescription, &PropertyTypeRegistry) -> Result<Box<dyn ObjectFilter>>
            + Send
            + Sync
            + 'static,
    {
        if self.builders.contains_key(kind) {
            return Err(Error::DuplicateName(format!("filter kind '{}'", kind)));
        }
        self.insert(kind, builder);
        Ok(())
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build one filter
    pub fn build_filter(
        &self,
        desc: &FilterDescription,
        registry: &PropertyTypeRegistry,
    ) -> Result<Box<dyn ObjectFilter>> {
        let builder = self
            .builders
            .get(&desc.kind)
            .ok_or_else(|| Error::NotFound(format!("filter kind '{}'", desc.kind)))?;
        builder(desc, registry)
    }

    /// Build a scene source followed by the described filter chain
    pub fn build_source(
        &self,
        desc: &ObjectSourceDescription,
        registry: &PropertyTypeRegistry,
    ) -> Result<Box<dyn ObjectSource>> {
        let root = match &desc.root {
            Some(path) => SourceRoot::Path(path.clone()),
            None => SourceRoot::Scene,
        };
        let mut source: Box<dyn ObjectSource> = Box::new(SceneSource::new(root));
        for filter in &desc.filters {
            source = Box::new(FilteredSource::new(source, self.build_filter(filter, registry)?));
        }
        Ok(source)
    }
}

impl Default for FilterFactory {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

fn predicate<P>(predicate: P, desc: &FilterDescription) -> Box<dyn ObjectFilter>
where
    P: crate::filter::NodePredicate + 'static,
{
    Box::new(PredicateFilter::new(predicate).exclusive(desc.exclusive))
}

fn missing(desc: &FilterDescription, argument: &str) -> Error {
    Error::invalid_data(
        format!("{} filter", desc.kind),
        format!("missing argument '{}'", argument),
    )
}

fn wrong(desc: &FilterDescription, argument: &str, expected: &str) -> Error {
    Error::type_mismatch(format!("{}.{}", desc.kind, argument), expected, "other value")
}

/// A list argument, or a single-value argument as a one-element list
fn strings(desc: &FilterDescription, list: &str, single: &str) -> Result<Vec<String>> {
    if let Some(value) = desc.arguments.get(list) {
        let PropertyValue::Array(items) = value else {
            return Err(wrong(desc, list, "array of strings"));
        };
        return items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| wrong(desc, list, "array of strings"))
            })
            .collect();
    }
    let value = desc
        .arguments
        .get(single)
        .ok_or_else(|| missing(desc, single))?;
    value
        .as_str()
        .map(|s| vec![s.to_string()])
        .ok_or_else(|| wrong(desc, single, "string"))
}

fn float(desc: &FilterDescription, name: &str) -> Result<Option<f32>> {
    desc.arguments
        .get(name)
        .map(|value| value.as_float().ok_or_else(|| wrong(desc, name, "float")))
        .transpose()
}

fn property(desc: &FilterDescription, registry: &PropertyTypeRegistry) -> Result<PropertyTypeId> {
    let name = desc
        .arguments
        .get("Property")
        .and_then(PropertyValue::as_str)
        .ok_or_else(|| missing(desc, "Property"))?;
    registry
        .find_by_name(name)
        .ok_or_else(|| Error::UnknownPropertyType(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterContext;
    use crate::tests_support::scene;
    use std::collections::BTreeMap;
    use strata_scene::object_type::{CAMERA, MODEL, NODE};

    fn desc(kind: &str, exclusive: bool, arguments: &[(&str, PropertyValue)]) -> FilterDescription {
        FilterDescription {
            kind: kind.into(),
            exclusive,
            arguments: arguments
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_build_source_from_description() {
        let (mut scene, _) = scene();
        let root = scene.create_node("Root", NODE);
        let _camera = scene.create_child(root, "Camera", CAMERA).unwrap();
        let model = scene.create_child(root, "Model", MODEL).unwrap();

        let description = ObjectSourceDescription {
            root: Some("/Root".into()),
            filters: vec![
                desc("Type", true, &[("Types", PropertyValue::Array(vec![
                    PropertyValue::String("Camera".into()),
                    PropertyValue::String("Node".into()),
                ]))]),
                desc("SortByViewZ", false, &[]),
            ],
        };
        let factory = FilterFactory::new();
        let source = factory.build_source(&description, scene.registry()).unwrap();
        let ctx = FilterContext::new(&scene);
        assert_eq!(source.collect(&ctx).unwrap(), vec![model]);
    }

    #[test]
    fn test_factory_errors() {
        let (scene, _) = scene();
        let factory = FilterFactory::new();
        let registry = scene.registry();

        assert!(matches!(
            factory.build_filter(&desc("Sparkle", false, &[]), registry),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            factory.build_filter(&desc("Tag", false, &[]), registry),
            Err(Error::InvalidData { .. })
        ));
        assert!(matches!(
            factory.build_filter(
                &desc("HasProperty", false, &[("Property", PropertyValue::String("Nope".into()))]),
                registry
            ),
            Err(Error::UnknownPropertyType(_))
        ));
        assert!(matches!(
            factory.build_filter(&desc("Distance", false, &[("Max", PropertyValue::Bool(true))]), registry),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_register_custom_kind() {
        let mut factory = FilterFactory::new();
        factory
            .register("Everything", |_, _| Ok(Box::new(SortByShader)))
            .unwrap();
        assert!(matches!(
            factory.register("Type", |_, _| Ok(Box::new(SortByShader))),
            Err(Error::DuplicateName(_))
        ));
        assert!(factory.kinds().contains(&"Everything"));
    }
}
