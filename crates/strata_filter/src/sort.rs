//! Sorting filters
//!
//! Both sorts are stable: nodes with equal keys keep their input order.

use crate::filter::{FilterContext, ObjectFilter};
use std::cmp::Ordering;
use strata_core::Result;
use strata_resource::{Material, ResourceManager};
use strata_scene::{CameraView, NodeId};

/// Orders nodes by depth along the camera's forward axis
pub struct SortByViewZ {
    front_to_back: bool,
}

impl SortByViewZ {
    /// Nearest first; used for opaque geometry
    pub fn front_to_back() -> Self {
        Self {
            front_to_back: true,
        }
    }

    /// Farthest first; used for blended geometry
    pub fn back_to_front() -> Self {
        Self {
            front_to_back: false,
        }
    }

    pub fn new(front_to_back: bool) -> Self {
        Self { front_to_back }
    }
}

impl ObjectFilter for SortByViewZ {
    fn kind(&self) -> &str {
        "SortByViewZ"
    }

    fn evaluate(&self, input: Vec<NodeId>, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        let camera = match ctx.camera_view()? {
            Some(camera) => camera,
            None => {
                log::debug!("SortByViewZ has no camera, sorting in identity view");
                CameraView::identity()
            }
        };

        let mut keyed = Vec::with_capacity(input.len());
        for node in input {
            let depth = camera.depth_of(ctx.scene.world_position(node)?);
            keyed.push((depth, node));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            let order = a.total_cmp(b);
            if self.front_to_back {
                order
            } else {
                order.reverse()
            }
        });
        Ok(keyed.into_iter().map(|(_, node)| node).collect())
    }
}

/// Groups nodes by the shader of their material so state changes are minimal.
/// Materials are loaded on demand; nodes whose material is unset or fails to
/// load sort last.
pub struct SortByShader;

fn shader_of(resources: &ResourceManager, url: &str) -> Option<String> {
    let material = match resources.acquire::<Material>(url) {
        Ok(material) => material,
        Err(e) => {
            log::debug!("SortByShader could not load '{}': {}", url, e);
            return None;
        }
    };
    let shader = material.shader.clone();
    if let Err(e) = resources.release(url) {
        log::warn!("Release of '{}' failed: {}", url, e);
    }
    Some(shader)
}

impl ObjectFilter for SortByShader {
    fn kind(&self) -> &str {
        "SortByShader"
    }

    fn evaluate(&self, input: Vec<NodeId>, ctx: &FilterContext) -> Result<Vec<NodeId>> {
        let material_property = ctx.scene.builtins().material;
        let mut keyed = Vec::with_capacity(input.len());
        for node in input {
            let material = ctx.scene.resolve_property(node, material_property)?;
            let shader = match (material.as_str().filter(|url| !url.is_empty()), ctx.resources) {
                (Some(url), Some(resources)) => shader_of(resources, url),
                _ => None,
            };
            keyed.push((shader, node));
        }
        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(keyed.into_iter().map(|(_, node)| node).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::scene;
    use glam::{Mat4, Vec3};
    use strata_scene::object_type::{CAMERA, MODEL, NODE};

    #[test]
    fn test_sort_by_view_z_is_stable() {
        let (mut scene, builtins) = scene();
        let root = scene.create_node("Root", NODE);
        let camera = scene.create_child(root, "Camera", CAMERA).unwrap();
        let mut nodes = Vec::new();
        for (name, z) in [("A", -5.0), ("B", -1.0), ("C", -5.0), ("D", -3.0)] {
            let node = scene.create_child(root, name, MODEL).unwrap();
            scene
                .set_property(node, builtins.transform, Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
                .unwrap();
            nodes.push(node);
        }
        let (a, b, c, d) = (nodes[0], nodes[1], nodes[2], nodes[3]);
        let ctx = FilterContext::new(&scene).with_camera(Some(camera));

        let front = SortByViewZ::front_to_back().evaluate(nodes.clone(), &ctx).unwrap();
        assert_eq!(front, vec![b, d, a, c]);
        let back = SortByViewZ::back_to_front().evaluate(nodes.clone(), &ctx).unwrap();
        assert_eq!(back, vec![a, c, d, b]);

        // No camera: identity view, depth is -z
        let ctx = FilterContext::new(&scene);
        assert_eq!(SortByViewZ::front_to_back().evaluate(nodes, &ctx).unwrap(), vec![b, d, a, c]);
    }

    #[test]
    fn test_sort_by_shader_without_resources_keeps_order() {
        let (mut scene, builtins) = scene();
        let a = scene.create_node("A", MODEL);
        let b = scene.create_node("B", MODEL);
        scene
            .set_property(a, builtins.material, strata_property::PropertyValue::Resource("kzb://p/m".into()))
            .unwrap();
        let ctx = FilterContext::new(&scene);
        assert_eq!(SortByShader.evaluate(vec![b, a], &ctx).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_sort_by_view_z_with_nan_depth() {
        let (mut scene, builtins) = scene();
        let root = scene.create_node("Root", NODE);
        let mut nodes = Vec::new();
        for (name, z) in [("B", -3.0), ("N", f32::NAN), ("A", -1.0)] {
            let node = scene.create_child(root, name, MODEL).unwrap();
            scene
                .set_property(node, builtins.transform, Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
                .unwrap();
            nodes.push(node);
        }
        let (b, n, a) = (nodes[0], nodes[1], nodes[2]);
        let ctx = FilterContext::new(&scene);

        let sorted = SortByViewZ::front_to_back().evaluate(nodes, &ctx).unwrap();
        assert_eq!(sorted.len(), 3);
        let finite: Vec<NodeId> = sorted.iter().copied().filter(|&node| node != n).collect();
        assert_eq!(finite, vec![a, b]);
        assert!(sorted.first() == Some(&n) || sorted.last() == Some(&n));
    }
}
