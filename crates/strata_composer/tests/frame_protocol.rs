//! Whole frames rendered through a recording backend

use glam::{Mat4, Vec3};
use std::sync::Arc;
use strata_composer::prelude::*;
use strata_composer::{
    AntialiasingComposer, BlurComposer, CubemapComposer, DrawObjectsComposer, Effect, FrameStats,
    GroupComposer, PartialRenderingComposer, ShadowMapComposer, StepRenderingComposer,
    StereoscopicComposer, STEREO_LEFT, STEREO_RIGHT,
};
use strata_core::{Error, ObjectId};
use strata_property::{PropertyTypeRegistry, PropertyValue};
use strata_scene::{object_type, register_builtin_properties, NodeId, SceneGraph};

struct Fixture {
    scene: SceneGraph,
    ids: ComposerProperties,
    models: Vec<NodeId>,
}

fn fixture() -> Fixture {
    let registry = Arc::new(PropertyTypeRegistry::new());
    let builtins = register_builtin_properties(&registry).unwrap();
    let ids = register_composer_properties(&registry).unwrap();
    registry.lock();
    let mut scene = SceneGraph::new(registry).unwrap();

    let root = scene.create_node("Root", object_type::NODE);
    let camera = scene.create_child(root, "Camera", object_type::CAMERA).unwrap();
    scene
        .set_property(camera, builtins.transform, Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)))
        .unwrap();
    let mut models = Vec::new();
    let materials = [
        ("Box", "kzb://project/materials/lit"),
        ("Ball", "kzb://project/materials/glass"),
    ];
    for (name, material) in materials {
        let model = scene.create_child(root, name, object_type::MODEL).unwrap();
        scene
            .set_property(model, builtins.material, PropertyValue::Resource(material.into()))
            .unwrap();
        models.push(model);
    }
    Fixture {
        scene,
        ids,
        models,
    }
}

fn render(
    graph: &mut ComposerGraph,
    scene: &SceneGraph,
    backend: &mut RecordingBackend,
    viewport: Viewport,
    content_changed: bool,
) -> strata_core::Result<FrameStats> {
    let camera = scene.find_by_path(scene.roots()[0], "/Root/Camera");
    let mut ctx = RenderContext::new(scene, backend, viewport)
        .unwrap()
        .with_camera(camera)
        .with_content_changed(content_changed);
    graph.render_frame(&mut ctx)
}

/// `composer` at the root with one default draw pass below it
fn single(
    graph: &mut ComposerGraph,
    scene: &SceneGraph,
    composer: Box<dyn Composer>,
) -> (ComposerId, ObjectId) {
    let object = scene.allocate_object();
    let id = graph.add(composer.kind().to_string(), object, composer);
    let draw = graph.add("Draw", scene.allocate_object(), Box::new(DrawObjectsComposer::new()));
    graph.attach_child(id, draw).unwrap();
    graph.set_root(id).unwrap();
    (id, object)
}

#[test]
fn test_bind_failure_aborts_only_that_frame() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    let root = graph.add("Root", f.scene.allocate_object(), Box::new(GroupComposer));
    let blur = graph.add("Blur", f.scene.allocate_object(), Box::new(BlurComposer::new("blur")));
    let draw = graph.add("Draw", f.scene.allocate_object(), Box::new(DrawObjectsComposer::new()));
    graph.attach_child(root, blur).unwrap();
    graph.attach_child(blur, draw).unwrap();
    graph.set_root(root).unwrap();

    let mut backend = RecordingBackend::new();
    backend.fail_bind("blur");
    let err = render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap_err();
    assert!(matches!(err, Error::RenderTargetBind { ref target, .. } if target == "blur"));
    assert!(err.is_frame_scoped());
    assert_eq!(backend.commands().last(), Some(&RenderCommand::AbortFrame));
    assert!(backend.draws().is_empty());

    backend.heal("blur");
    backend.take_commands();
    let stats = render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    assert_eq!(stats.composers_rendered, 3);
    assert!(!backend.commands().contains(&RenderCommand::AbortFrame));
    assert_eq!(backend.draws().len(), f.models.len());
    assert!(backend.bound_targets().is_empty());
}

#[test]
fn test_unbind_failure_is_reported_like_bind_failure() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    single(&mut graph, &f.scene, Box::new(BlurComposer::new("blur")));

    let mut backend = RecordingBackend::new();
    backend.fail_unbind("blur");
    let err = render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap_err();
    assert!(err.is_frame_scoped());
    // Drawing happened, the effect did not
    assert_eq!(backend.draws().len(), 2);
    assert!(!backend
        .commands()
        .iter()
        .any(|c| matches!(c, RenderCommand::Effect(Effect::Blur { .. }))));
}

#[test]
fn test_draw_objects_uses_camera_and_filters_models() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    let draw = graph.add("Draw", f.scene.allocate_object(), Box::new(DrawObjectsComposer::new()));
    graph.set_root(draw).unwrap();

    let mut backend = RecordingBackend::new();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(100, 100), true).unwrap();
    let draws = backend.draws();
    assert_eq!(draws.iter().map(|d| d.node).collect::<Vec<_>>(), f.models);
    assert_eq!(draws[0].material.as_deref(), Some("kzb://project/materials/lit"));
    assert_eq!(draws[0].opacity, 1.0);

    let camera = f.scene.find_by_path(f.scene.roots()[0], "/Root/Camera").unwrap();
    let expected = f.scene.camera_view(camera, 1.0).unwrap();
    assert_eq!(backend.commands()[0], RenderCommand::SetView(expected.view_projection()));
}

#[test]
fn test_moving_state_skips_multisampling() {
    let mut f = fixture();
    let mut graph = ComposerGraph::new();
    let (_, object) = single(&mut graph, &f.scene, Box::new(AntialiasingComposer::new("msaa")));

    f.scene.properties_mut().set_base(object, f.ids.moving_state, true).unwrap();
    let mut backend = RecordingBackend::new();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    assert!(!backend.commands().iter().any(|c| matches!(c, RenderCommand::BindTarget(_))));
    assert_eq!(backend.draws().len(), 2);

    f.scene.properties_mut().set_base(object, f.ids.moving_state, false).unwrap();
    backend.take_commands();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    match &backend.commands()[0] {
        RenderCommand::BindTarget(target) => assert_eq!(target.samples, 4),
        other => panic!("expected a bind, got {:?}", other),
    }
    assert_eq!(
        backend.commands().last(),
        Some(&RenderCommand::Effect(Effect::Resolve {
            source: "msaa".into(),
            samples: 4
        }))
    );
}

#[test]
fn test_shadow_map_substitutes_materials_during_draw() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    let shadow = ShadowMapComposer::new("shadow")
        .substitute("kzb://project/materials/lit", "kzb://project/materials/lit_shadow");
    single(&mut graph, &f.scene, Box::new(shadow));

    let mut backend = RecordingBackend::new();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    let materials: Vec<_> = backend.draws().iter().map(|d| d.material.clone()).collect();
    assert_eq!(
        materials,
        vec![
            Some("kzb://project/materials/lit_shadow".to_string()),
            Some("kzb://project/materials/glass".to_string()),
        ]
    );

    // The table only applies inside the shadow pass
    let mut plain = ComposerGraph::new();
    let draw = plain.add("Draw", f.scene.allocate_object(), Box::new(DrawObjectsComposer::new()));
    plain.set_root(draw).unwrap();
    backend.take_commands();
    render(&mut plain, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    assert_eq!(backend.draws()[0].material.as_deref(), Some("kzb://project/materials/lit"));
}

#[test]
fn test_partial_rendering_reuses_unchanged_frames() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    let (partial, _) = single(&mut graph, &f.scene, Box::new(PartialRenderingComposer::new("cache")));
    let mut backend = RecordingBackend::new();
    let mut frame = |graph: &mut ComposerGraph, viewport, changed| {
        backend.take_commands();
        render(graph, &f.scene, &mut backend, viewport, changed).unwrap();
        backend.draws().len()
    };

    assert_eq!(frame(&mut graph, Viewport::new(64, 64), false), 2);
    assert_eq!(frame(&mut graph, Viewport::new(64, 64), false), 0);
    assert_eq!(frame(&mut graph, Viewport::new(64, 64), true), 2);
    assert_eq!(frame(&mut graph, Viewport::new(128, 64), false), 2);
    assert_eq!(frame(&mut graph, Viewport::new(128, 64), false), 0);

    graph.invalidate(partial).unwrap();
    assert_eq!(frame(&mut graph, Viewport::new(128, 64), false), 2);
}

#[test]
fn test_step_rendering_spreads_children_over_frames() {
    let mut f = fixture();
    let mut graph = ComposerGraph::new();
    let step_object = f.scene.allocate_object();
    let step = graph.add("Step", step_object, Box::new(StepRenderingComposer::new("steps")));
    for (index, &model) in f.models.iter().enumerate() {
        let source = strata_filter::SceneSource::from_node(model);
        let draw = DrawObjectsComposer::with_source(Box::new(source));
        let child = graph.add(format!("Draw{}", index), f.scene.allocate_object(), Box::new(draw));
        graph.attach_child(step, child).unwrap();
    }
    graph.set_root(step).unwrap();

    let mut backend = RecordingBackend::new();
    let mut drawn = Vec::new();
    for _ in 0..3 {
        backend.take_commands();
        render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), false).unwrap();
        drawn.push(backend.draws().iter().map(|d| d.node).collect::<Vec<_>>());
    }
    assert_eq!(drawn, vec![vec![f.models[0]], vec![f.models[1]], vec![]]);

    // Two children per frame after a refresh
    f.scene.properties_mut().set_base(step_object, f.ids.step_count, 2).unwrap();
    graph.invalidate_all();
    backend.take_commands();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), false).unwrap();
    assert_eq!(backend.draws().len(), 2);
}

#[test]
fn test_stereo_renders_each_eye_into_its_target() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    single(&mut graph, &f.scene, Box::new(StereoscopicComposer::new().with_camera("/Root/Camera")));

    let mut backend = RecordingBackend::new();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(200, 100), true).unwrap();
    let targets: Vec<_> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            RenderCommand::BindTarget(t) => Some((t.name.clone(), t.width)),
            _ => None,
        })
        .collect();
    assert_eq!(targets, vec![(STEREO_LEFT.to_string(), 100), (STEREO_RIGHT.to_string(), 100)]);
    assert_eq!(backend.draws().len(), 4);

    let views: Vec<Mat4> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            RenderCommand::SetView(m) => Some(*m),
            _ => None,
        })
        .collect();
    assert_eq!(views.len(), 2);
    assert_ne!(views[0], views[1]);
}

#[test]
fn test_cubemap_renders_six_layers() {
    let f = fixture();
    let mut graph = ComposerGraph::new();
    single(&mut graph, &f.scene, Box::new(CubemapComposer::new("env", "/Root/Box")));

    let mut backend = RecordingBackend::new();
    render(&mut graph, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap();
    let layers: Vec<u32> = backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            RenderCommand::BindTarget(t) => Some(t.layer),
            _ => None,
        })
        .collect();
    assert_eq!(layers, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(backend.draws().len(), 12);

    let mut missing = ComposerGraph::new();
    single(&mut missing, &f.scene, Box::new(CubemapComposer::new("env", "/Root/Nowhere")));
    let err = render(&mut missing, &f.scene, &mut backend, Viewport::new(64, 64), true).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
