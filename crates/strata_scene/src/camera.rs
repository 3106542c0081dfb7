//! Cameras and view frustums
//!
//! A camera is any node whose class reports `is_camera`. Its view matrix is the
//! inverse of its world transform; its projection comes from the
//! `Camera.FieldOfView` / `Camera.Near` / `Camera.Far` properties and the
//! target aspect ratio.

use crate::graph::SceneGraph;
use crate::node::NodeId;
use glam::{Mat4, Vec3, Vec4};
use strata_core::{Error, Result};

/// Plane in 3D space (normal . p + distance = 0), normal pointing inward
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    fn from_row(row: Vec4) -> Self {
        let normal = row.truncate();
        let length = normal.length();
        if length > 1e-10 {
            Self {
                normal: normal / length,
                distance: row.w / length,
            }
        } else {
            Self {
                normal: Vec3::Y,
                distance: 0.0,
            }
        }
    }

    /// Signed distance; positive is inside
    #[inline]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum: left, right, bottom, top, near, far
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes from an OpenGL-convention view-projection matrix
    /// (Gribb/Hartmann)
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let x = view_projection.row(0);
        let y = view_projection.row(1);
        let z = view_projection.row(2);
        let w = view_projection.row(3);
        Self {
            planes: [
                Plane::from_row(w + x),
                Plane::from_row(w - x),
                Plane::from_row(w + y),
                Plane::from_row(w - y),
                Plane::from_row(w + z),
                Plane::from_row(w - z),
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Whether any part of the sphere is inside
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }
}

/// Camera matrices evaluated for one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub node: Option<NodeId>,
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub forward: Vec3,
}

impl CameraView {
    /// Identity view looking down -Z, used when no camera is available
    pub fn identity() -> Self {
        Self {
            node: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    /// Distance in front of the camera along its forward axis
    pub fn depth_of(&self, point: Vec3) -> f32 {
        -self.view.transform_point3(point).z
    }
}

impl Default for CameraView {
    fn default() -> Self {
        Self::identity()
    }
}

impl SceneGraph {
    /// Evaluate a camera node for a target aspect ratio
    pub fn camera_view(&self, camera: NodeId, aspect: f32) -> Result<CameraView> {
        let node = self
            .get(camera)
            .ok_or_else(|| Error::NotFound(format!("camera {}", camera)))?;
        if !self.is_camera(camera) {
            return Err(Error::type_mismatch(
                node.name(),
                "Camera",
                node.object_type().name(),
            ));
        }

        let object = node.object();
        let builtins = *self.builtins();
        let properties = self.properties();
        let fov = properties.resolve_as::<f32>(object, builtins.camera_field_of_view)?;
        let near = properties.resolve_as::<f32>(object, builtins.camera_near)?;
        let far = properties.resolve_as::<f32>(object, builtins.camera_far)?;
        if !(near > 0.0 && far > near) {
            return Err(Error::invalid_data(
                node.name(),
                format!("camera clip range {}..{}", near, far),
            ));
        }

        let world = self.world_transform(camera)?;
        let aspect = if aspect > 0.0 { aspect } else { 1.0 };
        Ok(CameraView {
            node: Some(camera),
            view: world.inverse(),
            projection: Mat4::perspective_rh_gl(fov.to_radians(), aspect, near, far),
            position: world.transform_point3(Vec3::ZERO),
            forward: world.transform_vector3(Vec3::NEG_Z).normalize_or_zero(),
        })
    }

    /// First camera in pre-order below `root`
    pub fn find_camera(&self, root: NodeId) -> Option<NodeId> {
        self.pre_order(root).into_iter().find(|&id| self.is_camera(id))
    }
}
