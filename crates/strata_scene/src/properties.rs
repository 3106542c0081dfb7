//! Built-in scene properties
//!
//! Registered once at startup before the registry is locked. Every scene
//! graph looks the ids up again with `BuiltinProperties::lookup`, so the
//! registry stays the single source of truth.

use glam::Mat4;
use strata_core::{Error, Result};
use strata_property::{ArrayLength, PropertyType, PropertyTypeId, PropertyTypeRegistry, PropertyValue};

pub const TRANSFORM: &str = "Node.Transform";
pub const OPACITY: &str = "Node.Opacity";
pub const VISIBLE: &str = "Node.Visible";
pub const ENABLED: &str = "Node.Enabled";
pub const MATERIAL: &str = "Node.Material";
pub const MESH: &str = "Node.Mesh";
pub const BOUNDING_RADIUS: &str = "Node.BoundingRadius";
pub const LAYOUT_WIDTH: &str = "Layout.Width";
pub const LAYOUT_HEIGHT: &str = "Layout.Height";
pub const CAMERA_FIELD_OF_VIEW: &str = "Camera.FieldOfView";
pub const CAMERA_NEAR: &str = "Camera.Near";
pub const CAMERA_FAR: &str = "Camera.Far";
pub const LOD_DISTANCES: &str = "Lod.Distances";
pub const PORTAL_OPEN: &str = "Portal.Open";
pub const INSTANTIATOR_TEMPLATE: &str = "Instantiator.Template";
pub const STACK_DIRECTION: &str = "Stack.Direction";

/// Ids of the built-in scene properties
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltinProperties {
    pub transform: PropertyTypeId,
    pub opacity: PropertyTypeId,
    pub visible: PropertyTypeId,
    pub enabled: PropertyTypeId,
    pub material: PropertyTypeId,
    pub mesh: PropertyTypeId,
    pub bounding_radius: PropertyTypeId,
    pub layout_width: PropertyTypeId,
    pub layout_height: PropertyTypeId,
    pub camera_field_of_view: PropertyTypeId,
    pub camera_near: PropertyTypeId,
    pub camera_far: PropertyTypeId,
    pub lod_distances: PropertyTypeId,
    pub portal_open: PropertyTypeId,
    pub instantiator_template: PropertyTypeId,
    pub stack_direction: PropertyTypeId,
}

fn builtin_types() -> Vec<PropertyType> {
    vec![
        PropertyType::new(TRANSFORM, Mat4::IDENTITY)
            .affects_render()
            .with_description("Local transform relative to the parent"),
        PropertyType::new(OPACITY, 1.0f32).affects_render(),
        PropertyType::new(VISIBLE, true).affects_render(),
        PropertyType::new(ENABLED, true)
            .inherited()
            .with_description("Whether the node takes input; children inherit it"),
        PropertyType::resource(MATERIAL).affects_render(),
        PropertyType::resource(MESH).affects_render(),
        PropertyType::new(BOUNDING_RADIUS, 0.0f32),
        PropertyType::new(LAYOUT_WIDTH, -1.0f32)
            .affects_layout()
            .with_description("Explicit width; negative means size to content"),
        PropertyType::new(LAYOUT_HEIGHT, -1.0f32)
            .affects_layout()
            .with_description("Explicit height; negative means size to content"),
        PropertyType::new(CAMERA_FIELD_OF_VIEW, 45.0f32).with_description("Vertical, degrees"),
        PropertyType::new(CAMERA_NEAR, 0.1f32),
        PropertyType::new(CAMERA_FAR, 1000.0f32),
        PropertyType::array(
            LOD_DISTANCES,
            PropertyType::new("Lod.Distance", 0.0f32),
            ArrayLength::Unlimited,
        )
        .with_description("Camera distances at which the next child takes over"),
        PropertyType::new(PORTAL_OPEN, true).affects_render(),
        PropertyType::pointer(INSTANTIATOR_TEMPLATE).affects_render(),
        PropertyType::new(STACK_DIRECTION, 0i32)
            .affects_layout()
            .with_description("0 stacks along X, 1 along Y"),
    ]
}

/// Register the built-in scene properties
pub fn register_builtin_properties(registry: &PropertyTypeRegistry) -> Result<BuiltinProperties> {
    for property_type in builtin_types() {
        registry.register(property_type)?;
    }
    BuiltinProperties::lookup(registry)
}

impl BuiltinProperties {
    /// Look up the ids of already registered built-ins
    pub fn lookup(registry: &PropertyTypeRegistry) -> Result<Self> {
        let find = |name: &str| {
            registry
                .find_by_name(name)
                .ok_or_else(|| Error::UnknownPropertyType(name.to_string()))
        };
        Ok(Self {
            transform: find(TRANSFORM)?,
            opacity: find(OPACITY)?,
            visible: find(VISIBLE)?,
            enabled: find(ENABLED)?,
            material: find(MATERIAL)?,
            mesh: find(MESH)?,
            bounding_radius: find(BOUNDING_RADIUS)?,
            layout_width: find(LAYOUT_WIDTH)?,
            layout_height: find(LAYOUT_HEIGHT)?,
            camera_field_of_view: find(CAMERA_FIELD_OF_VIEW)?,
            camera_near: find(CAMERA_NEAR)?,
            camera_far: find(CAMERA_FAR)?,
            lod_distances: find(LOD_DISTANCES)?,
            portal_open: find(PORTAL_OPEN)?,
            instantiator_template: find(INSTANTIATOR_TEMPLATE)?,
            stack_direction: find(STACK_DIRECTION)?,
        })
    }
}

/// Float list out of an array value
pub(crate) fn float_array(value: &PropertyValue) -> Vec<f32> {
    match value {
        PropertyValue::Array(items) => items.iter().filter_map(PropertyValue::as_float).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_lookup() {
        let registry = PropertyTypeRegistry::new();
        let registered = register_builtin_properties(&registry).unwrap();
        assert_eq!(BuiltinProperties::lookup(&registry).unwrap(), registered);
        assert!(registry.find(ENABLED).unwrap().flags().inherited);
    }

    #[test]
    fn test_lookup_before_registration() {
        let registry = PropertyTypeRegistry::new();
        assert!(matches!(
            BuiltinProperties::lookup(&registry),
            Err(Error::UnknownPropertyType(_))
        ));
    }

    #[test]
    fn test_register_twice() {
        let registry = PropertyTypeRegistry::new();
        register_builtin_properties(&registry).unwrap();
        assert!(matches!(
            register_builtin_properties(&registry),
            Err(Error::DuplicateName(_))
        ));
    }
}
