//! Built-in composer properties

use strata_core::{Error, Result};
use strata_property::{Color, PropertyType, PropertyTypeId, PropertyTypeRegistry};

pub const ENABLED: &str = "Composer.Enabled";
pub const MOVING_STATE: &str = "Composer.MovingState";
pub const CLEAR_COLOR: &str = "Composer.ClearColor";
pub const BLUR_RADIUS: &str = "Blur.Radius";
pub const BLOOM_THRESHOLD: &str = "Bloom.Threshold";
pub const BLOOM_INTENSITY: &str = "Bloom.Intensity";
pub const ANTIALIASING_SAMPLES: &str = "Antialiasing.Samples";
pub const SHADOW_MAP_SIZE: &str = "ShadowMap.Size";
pub const STEREO_EYE_SEPARATION: &str = "Stereo.EyeSeparation";
pub const CUBEMAP_SIZE: &str = "Cubemap.Size";
pub const STEP_COUNT: &str = "Step.Count";

/// Ids of the built-in composer properties
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposerProperties {
    pub enabled: PropertyTypeId,
    pub moving_state: PropertyTypeId,
    pub clear_color: PropertyTypeId,
    pub blur_radius: PropertyTypeId,
    pub bloom_threshold: PropertyTypeId,
    pub bloom_intensity: PropertyTypeId,
    pub antialiasing_samples: PropertyTypeId,
    pub shadow_map_size: PropertyTypeId,
    pub stereo_eye_separation: PropertyTypeId,
    pub cubemap_size: PropertyTypeId,
    pub step_count: PropertyTypeId,
}

/// Register the built-in composer properties
pub fn register_composer_properties(registry: &PropertyTypeRegistry) -> Result<ComposerProperties> {
    let types = [
        PropertyType::new(ENABLED, true),
        PropertyType::new(MOVING_STATE, false)
            .with_description("Set while content moves; expensive passes may degrade"),
        PropertyType::new(CLEAR_COLOR, Color::TRANSPARENT),
        PropertyType::new(BLUR_RADIUS, 4.0f32),
        PropertyType::new(BLOOM_THRESHOLD, 0.8f32),
        PropertyType::new(BLOOM_INTENSITY, 1.0f32),
        PropertyType::new(ANTIALIASING_SAMPLES, 4i32),
        PropertyType::new(SHADOW_MAP_SIZE, 1024i32),
        PropertyType::new(STEREO_EYE_SEPARATION, 0.064f32),
        PropertyType::new(CUBEMAP_SIZE, 256i32),
        PropertyType::new(STEP_COUNT, 1i32).with_description("Children rendered per frame"),
    ];
    for property_type in types {
        registry.register(property_type)?;
    }
    ComposerProperties::lookup(registry)
}

impl ComposerProperties {
    /// Look up the ids of already registered composer properties
    pub fn lookup(registry: &PropertyTypeRegistry) -> Result<Self> {
        let find = |name: &str| {
            registry
                .find_by_name(name)
                .ok_or_else(|| Error::UnknownPropertyType(name.to_string()))
        };
        Ok(Self {
            enabled: find(ENABLED)?,
            moving_state: find(MOVING_STATE)?,
            clear_color: find(CLEAR_COLOR)?,
            blur_radius: find(BLUR_RADIUS)?,
            bloom_threshold: find(BLOOM_THRESHOLD)?,
            bloom_intensity: find(BLOOM_INTENSITY)?,
            antialiasing_samples: find(ANTIALIASING_SAMPLES)?,
            shadow_map_size: find(SHADOW_MAP_SIZE)?,
            stereo_eye_separation: find(STEREO_EYE_SEPARATION)?,
            cubemap_size: find(CUBEMAP_SIZE)?,
            step_count: find(STEP_COUNT)?,
        })
    }
}
