//! Building composer graphs from authored descriptions

use crate::composers::{
    AntialiasingComposer, BloomComposer, BlurComposer, CubemapComposer, DrawObjectsComposer,
    GroupComposer, PartialRenderingComposer, ShadowMapComposer, StepRenderingComposer,
    StereoscopicComposer,
};
use crate::graph::{Composer, ComposerGraph, ComposerId};
use std::collections::{HashMap, HashSet};
use strata_core::{Error, ObjectId, Result};
use strata_filter::FilterFactory;
use strata_property::{PropertyTypeId, PropertyTypeRegistry, PropertyValue};
use strata_resource::{ComposerDescription, ResourceManager};
use strata_scene::SceneGraph;

/// Builds one composer kind from its description
pub type ComposerBuilder = Box<
    dyn Fn(&ComposerDescription, &FilterFactory, &PropertyTypeRegistry) -> Result<Box<dyn Composer>>
        + Send
        + Sync,
>;

/// Table of composer builders keyed by kind name
pub struct ComposerFactory {
    builders: HashMap<String, ComposerBuilder>,
    filters: FilterFactory,
}

fn target_name(desc: &ComposerDescription) -> String {
    if desc.name.is_empty() {
        desc.kind.to_lowercase()
    } else {
        desc.name.clone()
    }
}

impl ComposerFactory {
    /// Factory without any kinds
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
            filters: FilterFactory::new(),
        }
    }

    /// Factory with every built-in composer kind
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.insert("Group", |_, _, _| Ok(Box::new(GroupComposer)));
        factory.insert("DrawObjects", |desc, filters, registry| {
            let mut composer = match &desc.object_source {
                Some(source) => {
                    DrawObjectsComposer::with_source(filters.build_source(source, registry)?)
                }
                None => DrawObjectsComposer::new(),
            };
            if let Some(camera) = &desc.camera {
                composer = composer.with_camera(camera.clone());
            }
            Ok(Box::new(composer))
        });
        factory.insert("Blur", |desc, _, _| Ok(Box::new(BlurComposer::new(target_name(desc)))));
        factory.insert("Bloom", |desc, _, _| Ok(Box::new(BloomComposer::new(target_name(desc)))));
        factory.insert("Antialiasing", |desc, _, _| {
            Ok(Box::new(AntialiasingComposer::new(target_name(desc))))
        });
        factory.insert("ShadowMap", |desc, _, _| {
            let composer = desc
                .substitutions
                .iter()
                .fold(ShadowMapComposer::new(target_name(desc)), |composer, (original, shadow)| {
                    composer.substitute(original.clone(), shadow.clone())
                });
            Ok(Box::new(composer))
        });
        factory.insert("Cubemap", |desc, _, _| {
            let node = desc.camera.clone().ok_or_else(|| {
                Error::invalid_data(format!("composer '{}'", desc.name), "cubemap needs a node path")
            })?;
            Ok(Box::new(CubemapComposer::new(target_name(desc), node)))
        });
        factory.insert("Stereoscopic", |desc, _, _| {
            let composer = match &desc.camera {
                Some(camera) => StereoscopicComposer::new().with_camera(camera.clone()),
                None => StereoscopicComposer::new(),
            };
            Ok(Box::new(composer))
        });
        factory.insert("PartialRendering", |desc, _, _| {
            Ok(Box::new(PartialRenderingComposer::new(target_name(desc))))
        });
        factory.insert("StepRendering", |desc, _, _| {
            Ok(Box::new(StepRenderingComposer::new(target_name(desc))))
        });
        factory
    }

    fn insert<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&ComposerDescription, &FilterFactory, &PropertyTypeRegistry) -> Result<Box<dyn Composer>>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind.to_string(), Box::new(builder));
    }

    /// Register a builder for a new composer kind
    pub fn register<F>(&mut self, kind: &str, builder: F) -> Result<()>
    where
        F: Fn(&ComposerDescription, &FilterFactory, &PropertyTypeRegistry) -> Result<Box<dyn Composer>>
            + Send
            + Sync
            + 'static,
    {
        if self.builders.contains_key(kind) {
            return Err(Error::DuplicateName(format!("composer kind '{}'", kind)));
        }
        self.insert(kind, builder);
        Ok(())
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Filter factory used for `DrawObjects` sources
    pub fn filters_mut(&mut self) -> &mut FilterFactory {
        &mut self.filters
    }

    /// Build one composer without touching any graph
    pub fn build_composer(
        &self,
        desc: &ComposerDescription,
        registry: &PropertyTypeRegistry,
    ) -> Result<Box<dyn Composer>> {
        let builder = self
            .builders
            .get(&desc.kind)
            .ok_or_else(|| Error::NotFound(format!("composer kind '{}'", desc.kind)))?;
        builder(desc, &self.filters, registry)
    }

    /// Load the composer at `url` and everything below it into `graph`.
    /// Each composer gets a fresh object in `scene` carrying its authored
    /// properties as base values. A description reached twice is built once
    /// and shared. Descriptions are released once read; on failure every
    /// composer and object created by this call is removed again.
    pub fn build_graph(
        &self,
        url: &str,
        resources: &ResourceManager,
        scene: &mut SceneGraph,
        graph: &mut ComposerGraph,
    ) -> Result<ComposerId> {
        let mut build = GraphBuild::default();
        match self.build_recursive(url, resources, scene, graph, &mut build) {
            Ok(id) => Ok(id),
            Err(e) => {
                for (id, object) in build.created.into_iter().rev() {
                    let _ = graph.remove(id);
                    scene.properties_mut().remove_object(object);
                }
                log::warn!("Composer graph '{}' failed to build: {}", url, e);
                Err(e)
            }
        }
    }

    fn build_recursive(
        &self,
        url: &str,
        resources: &ResourceManager,
        scene: &mut SceneGraph,
        graph: &mut ComposerGraph,
        build: &mut GraphBuild,
    ) -> Result<ComposerId> {
        if let Some(&id) = build.built.get(url) {
            return Ok(id);
        }
        if !build.in_progress.insert(url.to_string()) {
            return Err(Error::Cycle(format!("composer '{}' contains itself", url)));
        }

        let desc = resources.acquire::<ComposerDescription>(url)?;
        let registry = scene.registry().clone();
        let prepared = self.prepare(&desc, &registry);
        resources.release(url)?;
        let (values, composer) = prepared?;

        let object = scene.allocate_object();
        let name = if desc.name.is_empty() { url } else { desc.name.as_str() };
        let id = graph.add(name, object, composer);
        build.created.push((id, object));
        for (property, value) in values {
            scene.properties_mut().set_base(object, property, value)?;
        }
        log::debug!("Built {} composer '{}'", desc.kind, name);

        for child in &desc.children {
            let child_id = self.build_recursive(child, resources, scene, graph, build)?;
            graph.attach_child(id, child_id)?;
        }

        build.in_progress.remove(url);
        build.built.insert(url.to_string(), id);
        Ok(id)
    }

    /// Resolve every property name and build the composer before anything is
    /// created
    fn prepare(
        &self,
        desc: &ComposerDescription,
        registry: &PropertyTypeRegistry,
    ) -> Result<(Vec<(PropertyTypeId, PropertyValue)>, Box<dyn Composer>)> {
        let mut values = Vec::with_capacity(desc.properties.len());
        for (name, value) in &desc.properties {
            let property = registry
                .find_by_name(name)
                .ok_or_else(|| Error::UnknownPropertyType(name.clone()))?;
            values.push((property, value.clone()));
        }
        let composer = self.build_composer(desc, registry)?;
        Ok((values, composer))
    }
}

/// Bookkeeping of one `build_graph` call
#[derive(Default)]
struct GraphBuild {
    built: HashMap<String, ComposerId>,
    in_progress: HashSet<String>,
    created: Vec<(ComposerId, ObjectId)>,
}

impl Default for ComposerFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::scene;

    #[test]
    fn test_builtin_kinds() {
        let factory = ComposerFactory::new();
        assert_eq!(
            factory.kinds(),
            vec![
                "Antialiasing",
                "Bloom",
                "Blur",
                "Cubemap",
                "DrawObjects",
                "Group",
                "PartialRendering",
                "ShadowMap",
                "StepRendering",
                "Stereoscopic",
            ]
        );
    }

    #[test]
    fn test_unknown_kind_and_duplicate_registration() {
        let (scene, _) = scene();
        let mut factory = ComposerFactory::new();
        let desc = ComposerDescription {
            kind: "Hologram".into(),
            ..Default::default()
        };
        assert!(matches!(
            factory.build_composer(&desc, scene.registry()),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            factory.register("Group", |_, _, _| Ok(Box::new(GroupComposer))),
            Err(Error::DuplicateName(_))
        ));
        factory
            .register("Hologram", |_, _, _| Ok(Box::new(GroupComposer)))
            .unwrap();
        assert_eq!(factory.build_composer(&desc, scene.registry()).unwrap().kind(), "Group");
    }

    #[test]
    fn test_cubemap_requires_node_path() {
        let (scene, _) = scene();
        let desc = ComposerDescription {
            kind: "Cubemap".into(),
            name: "Env".into(),
            ..Default::default()
        };
        assert!(matches!(
            ComposerFactory::new().build_composer(&desc, scene.registry()),
            Err(Error::InvalidData { .. })
        ));
    }
}
