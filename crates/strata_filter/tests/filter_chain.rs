//! Filter chains over a populated scene

use glam::{Mat4, Vec3};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_binary::{BinarySource, BinaryWriter};
use strata_filter::prelude::*;
use strata_filter::FilteredSource;
use strata_property::{PropertyTypeRegistry, PropertyValue};
use strata_resource::{encode, Material, Resource, ResourceManager, Shader};
use strata_scene::{register_builtin_properties, BuiltinProperties, NodeId, SceneGraph};

fn scene() -> (SceneGraph, BuiltinProperties) {
    let registry = Arc::new(PropertyTypeRegistry::new());
    let builtins = register_builtin_properties(&registry).unwrap();
    registry.lock();
    (SceneGraph::new(registry).unwrap(), builtins)
}

fn place(scene: &mut SceneGraph, builtins: &BuiltinProperties, node: NodeId, z: f32) {
    scene
        .set_property(node, builtins.transform, Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
        .unwrap();
}

#[test]
fn test_drop_camera_then_sort_front_to_back() {
    let (mut scene, builtins) = scene();
    let root = scene.create_node("Root", object_type::NODE);
    let camera = scene.create_child(root, "Camera", object_type::CAMERA).unwrap();
    let a = scene.create_child(root, "A", object_type::MODEL).unwrap();
    let b = scene.create_child(root, "B", object_type::MODEL).unwrap();
    let c = scene.create_child(root, "C", object_type::MODEL).unwrap();
    let d = scene.create_child(root, "D", object_type::MODEL).unwrap();
    place(&mut scene, &builtins, camera, 10.0);
    place(&mut scene, &builtins, a, -20.0);
    place(&mut scene, &builtins, b, 5.0);
    place(&mut scene, &builtins, c, -2.0);
    place(&mut scene, &builtins, d, 0.0);

    let input = vec![camera, a, b, c, d];
    struct Fixed(Vec<NodeId>);
    impl ObjectSource for Fixed {
        fn collect(&self, _ctx: &FilterContext) -> strata_core::Result<Vec<NodeId>> {
            Ok(self.0.clone())
        }
    }

    let source = Fixed(input)
        .then(PredicateFilter::new(TypeFilter::new([object_type::CAMERA])).exclusive(true))
        .then(SortByViewZ::front_to_back());
    let ctx = FilterContext::new(&scene).with_camera(Some(camera));
    assert_eq!(source.collect(&ctx).unwrap(), vec![b, d, c, a]);

    // Turning the camera around is picked up on the next evaluation
    scene
        .set_property(
            camera,
            builtins.transform,
            Mat4::from_translation(Vec3::new(0.0, 0.0, -30.0))
                * Mat4::from_rotation_y(std::f32::consts::PI),
        )
        .unwrap();
    let ctx = FilterContext::new(&scene).with_camera(Some(camera));
    assert_eq!(source.collect(&ctx).unwrap(), vec![a, c, d, b]);
}

#[test]
fn test_sort_by_shader_groups_materials() {
    let flat = Material {
        shader: "kzb://project/shaders/flat".into(),
        ..Default::default()
    };
    let lit = Material {
        shader: "kzb://project/shaders/lit".into(),
        ..Default::default()
    };
    let mut writer = BinaryWriter::new();
    writer
        .add("project/shaders/flat", Shader::TYPE, encode(&Shader::default()).unwrap())
        .add("project/shaders/lit", Shader::TYPE, encode(&Shader::default()).unwrap())
        .add("project/materials/flat", Material::TYPE, encode(&flat).unwrap())
        .add("project/materials/lit", Material::TYPE, encode(&lit).unwrap());

    let resources = ResourceManager::new();
    resources.install_builtin_loaders().unwrap();
    resources.add_source(BinarySource::from_bytes("project.kzb", writer.finish()).unwrap());
    assert_eq!(resources.loaded_count(), 0);

    let (mut scene, builtins) = scene();
    let root = scene.create_node("Root", object_type::NODE);
    let mut nodes = Vec::new();
    for (name, material) in [
        ("L1", Some("kzb://project/materials/lit")),
        ("F1", Some("kzb://project/materials/flat")),
        ("None", None),
        ("L2", Some("kzb://project/materials/lit")),
        ("F2", Some("kzb://project/materials/flat")),
    ] {
        let node = scene.create_child(root, name, object_type::MODEL).unwrap();
        if let Some(material) = material {
            scene
                .set_property(node, builtins.material, PropertyValue::Resource(material.into()))
                .unwrap();
        }
        nodes.push(node);
    }

    let source = FilteredSource::new(
        Box::new(SceneSource::from_node(root)),
        Box::new(PredicateFilter::new(TypeFilter::new([object_type::MODEL]))),
    )
    .then(SortByShader);
    let ctx = FilterContext::new(&scene).with_resources(&resources);
    let sorted = source.collect(&ctx).unwrap();
    assert_eq!(sorted, vec![nodes[1], nodes[4], nodes[0], nodes[3], nodes[2]]);

    // Sorting loaded the materials and their shaders without keeping them
    assert_eq!(resources.loaded_count(), 4);
    assert_eq!(resources.ref_count("kzb://project/materials/flat"), 0);
    assert_eq!(resources.ref_count("kzb://project/materials/lit"), 0);
}

#[test]
fn test_factory_chain_matches_hand_built() {
    let (mut scene, builtins) = scene();
    let root = scene.create_node("Root", object_type::NODE);
    let camera = scene.create_child(root, "Camera", object_type::CAMERA).unwrap();
    let near = scene.create_child(root, "Near", object_type::MODEL).unwrap();
    let far = scene.create_child(root, "Far", object_type::MODEL).unwrap();
    scene.add_tag(near, "pickable").unwrap();
    scene.add_tag(far, "pickable").unwrap();
    place(&mut scene, &builtins, camera, 10.0);
    place(&mut scene, &builtins, near, 0.0);
    place(&mut scene, &builtins, far, -50.0);

    let description = strata_resource::ObjectSourceDescription {
        root: None,
        filters: vec![
            strata_resource::FilterDescription {
                kind: "Tag".into(),
                exclusive: false,
                arguments: BTreeMap::from([("Tag".to_string(), PropertyValue::String("pickable".into()))]),
            },
            strata_resource::FilterDescription {
                kind: "SortByViewZ".into(),
                exclusive: false,
                arguments: BTreeMap::from([("FrontToBack".to_string(), PropertyValue::Bool(false))]),
            },
        ],
    };
    let source = FilterFactory::new()
        .build_source(&description, scene.registry())
        .unwrap();
    let ctx = FilterContext::new(&scene).with_camera(Some(camera));
    assert_eq!(source.collect(&ctx).unwrap(), vec![far, near]);
}
