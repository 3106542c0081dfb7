//! Built-in object types
//!
//! Object types are open `TypeTag`s. The constants below name the kinds the
//! engine ships classes for; anything else falls back to plain node behavior
//! unless a class is registered for it.

use strata_core::TypeTag;

/// Object type of a node
pub type ObjectType = TypeTag;

pub const NODE: ObjectType = TypeTag::from_static("Node");
pub const LAYER: ObjectType = TypeTag::from_static("Layer");
pub const CAMERA: ObjectType = TypeTag::from_static("Camera");
pub const MODEL: ObjectType = TypeTag::from_static("Model");
pub const LIGHT: ObjectType = TypeTag::from_static("Light");
pub const COMPONENT: ObjectType = TypeTag::from_static("Component");
pub const STACK_LAYER: ObjectType = TypeTag::from_static("StackLayer");
pub const LEVEL_OF_DETAIL: ObjectType = TypeTag::from_static("LevelOfDetail");
pub const INSTANTIATOR: ObjectType = TypeTag::from_static("Instantiator");
pub const PORTAL: ObjectType = TypeTag::from_static("Portal");
