//! Built-in resource payloads
//!
//! Every built-in payload except `Text` is a serde struct stored in the
//! container as bincode. `Payload::dependencies` lists the resources a payload
//! references so its loader can acquire them before the payload becomes
//! reachable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::{Error, Result, TypeTag};
use strata_property::PropertyValue;

/// A loadable resource type
pub trait Resource: Send + Sync + 'static {
    /// Type tag stored in the container index
    const TYPE: TypeTag;
}

/// A resource stored as a bincode payload
pub trait Payload: Resource + Serialize + DeserializeOwned {
    /// Referenced resources with the type each is expected to have
    fn dependencies(&self) -> Vec<(String, TypeTag)> {
        Vec::new()
    }

    /// Structural checks run after decoding
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Encode a payload for a container entry
pub fn encode<T: Payload>(payload: &T) -> Result<Vec<u8>> {
    bincode::serialize(payload).map_err(|e| Error::invalid_data(T::TYPE.name(), e))
}

/// Decode and validate a payload
pub fn decode<T: Payload>(bytes: &[u8]) -> Result<T> {
    let payload: T =
        bincode::deserialize(bytes).map_err(|e| Error::invalid_data(T::TYPE.name(), e))?;
    payload.validate()?;
    Ok(payload)
}

// ============================================================================
// Shading
// ============================================================================

/// Shader program sources
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shader {
    pub vertex: String,
    pub fragment: String,
    /// Uniform names, matched against material property names
    pub uniforms: Vec<String>,
}

impl Resource for Shader {
    const TYPE: TypeTag = TypeTag::from_static("Shader");
}

impl Payload for Shader {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Rgb8,
    Alpha8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
            Self::Alpha8 => 1,
        }
    }
}

/// Uncompressed texture image
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl Resource for Texture {
    const TYPE: TypeTag = TypeTag::from_static("Texture");
}

impl Payload for Texture {
    fn validate(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        if self.pixels.len() != expected {
            return Err(Error::invalid_data(
                "Texture",
                format!(
                    "{}x{} {:?} needs {} bytes, payload has {}",
                    self.width,
                    self.height,
                    self.format,
                    expected,
                    self.pixels.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Shader plus parameter values and texture bindings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Shader URL
    pub shader: String,
    pub properties: BTreeMap<String, PropertyValue>,
    /// Sampler name to texture URL
    pub textures: BTreeMap<String, String>,
}

impl Resource for Material {
    const TYPE: TypeTag = TypeTag::from_static("Material");
}

impl Payload for Material {
    fn dependencies(&self) -> Vec<(String, TypeTag)> {
        std::iter::once((self.shader.clone(), Shader::TYPE))
            .chain(self.textures.values().map(|url| (url.clone(), Texture::TYPE)))
            .collect()
    }
}

/// Triangle mesh
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    /// Material URL
    pub material: Option<String>,
}

impl Mesh {
    /// Radius of the bounding sphere around the local origin
    pub fn bounding_radius(&self) -> f32 {
        self.positions
            .iter()
            .map(|[x, y, z]| (x * x + y * y + z * z).sqrt())
            .fold(0.0, f32::max)
    }
}

impl Resource for Mesh {
    const TYPE: TypeTag = TypeTag::from_static("Mesh");
}

impl Payload for Mesh {
    fn dependencies(&self) -> Vec<(String, TypeTag)> {
        self.material
            .iter()
            .map(|url| (url.clone(), Material::TYPE))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::invalid_data("Mesh", "index count is not a multiple of 3"));
        }
        let vertices = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&index| index >= vertices) {
            return Err(Error::invalid_data(
                "Mesh",
                format!("index {} out of range for {} vertices", bad, vertices),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Property data
// ============================================================================

/// Named property values applied together
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Resource for PropertyGroup {
    const TYPE: TypeTag = TypeTag::from_static("PropertyGroup");
}

impl Payload for PropertyGroup {}

/// One state of a state manager
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub name: String,
    pub values: BTreeMap<String, PropertyValue>,
}

/// Named sets of property values a node switches between
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateManager {
    pub initial: Option<String>,
    pub states: Vec<StateDefinition>,
}

impl StateManager {
    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|state| state.name == name)
    }
}

impl Resource for StateManager {
    const TYPE: TypeTag = TypeTag::from_static("StateManager");
}

impl Payload for StateManager {
    fn validate(&self) -> Result<()> {
        if let Some(initial) = &self.initial {
            if self.state(initial).is_none() {
                return Err(Error::invalid_data(
                    "StateManager",
                    format!("initial state '{}' is not defined", initial),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Text and scripts
// ============================================================================

/// UTF-8 text, stored raw rather than as bincode
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Text {
    pub content: String,
}

impl Resource for Text {
    const TYPE: TypeTag = TypeTag::from_static("Text");
}

/// Script source for an embedding host
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub language: String,
    pub source: String,
}

impl Resource for Script {
    const TYPE: TypeTag = TypeTag::from_static("Script");
}

impl Payload for Script {}

// ============================================================================
// Render graph descriptions
// ============================================================================

/// One filter stage of an object source
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDescription {
    /// Filter kind, e.g. `Type` or `SortByViewZ`
    pub kind: String,
    pub exclusive: bool,
    pub arguments: BTreeMap<String, PropertyValue>,
}

/// Scene root plus filter chain feeding a composer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSourceDescription {
    /// Node path of the collection root; the scene root when absent
    pub root: Option<String>,
    pub filters: Vec<FilterDescription>,
}

/// Authored composer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposerDescription {
    /// Composer kind, e.g. `DrawObjects` or `Blur`
    pub kind: String,
    pub name: String,
    pub properties: BTreeMap<String, PropertyValue>,
    /// Child composer URLs, rendered in order
    pub children: Vec<String>,
    pub object_source: Option<ObjectSourceDescription>,
    /// Camera node path
    pub camera: Option<String>,
    /// Original material URL to substitute material URL
    pub substitutions: Vec<(String, String)>,
}

impl Resource for ComposerDescription {
    const TYPE: TypeTag = TypeTag::from_static("Composer");
}

impl Payload for ComposerDescription {
    fn dependencies(&self) -> Vec<(String, TypeTag)> {
        self.children
            .iter()
            .map(|url| (url.clone(), ComposerDescription::TYPE))
            .chain(
                self.substitutions
                    .iter()
                    .map(|(_, substitute)| (substitute.clone(), Material::TYPE)),
            )
            .collect()
    }
}

// ============================================================================
// Scene templates
// ============================================================================

/// One node of a template
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub name: String,
    pub object_type: String,
    /// Index of the parent in the template; `None` for the template root
    pub parent: Option<usize>,
    /// Property type name to value
    pub properties: BTreeMap<String, PropertyValue>,
    pub tags: Vec<String>,
}

/// Prefab subtree, nodes listed parents-first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneTemplate {
    pub nodes: Vec<NodeTemplate>,
}

impl Resource for SceneTemplate {
    const TYPE: TypeTag = TypeTag::from_static("SceneTemplate");
}

impl Payload for SceneTemplate {
    fn validate(&self) -> Result<()> {
        let mut roots = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            match node.parent {
                None => roots += 1,
                Some(parent) if parent < index => {}
                Some(parent) => {
                    return Err(Error::invalid_data(
                        "SceneTemplate",
                        format!("node {} lists parent {} that does not precede it", index, parent),
                    ))
                }
            }
        }
        if !self.nodes.is_empty() && roots != 1 {
            return Err(Error::invalid_data(
                "SceneTemplate",
                format!("expected exactly one root node, found {}", roots),
            ));
        }
        Ok(())
    }
}
