//! # strata_resource - Resource Management
//!
//! Loads typed resources out of the merged binary directory:
//! - **Entries**: one per directory path, `Unresolved → Loading → Loaded → Unloaded`
//! - **Reference counting**: `acquire` / `release`; unreferenced resources are
//!   eligible for unload, never forced out
//! - **Loaders**: pluggable per resource type, with dependency acquisition and
//!   rollback when a dependency fails
//! - **Validator**: optional predicate that refuses paths before they load
//! - **Built-in payloads**: shaders, textures, materials, meshes, property
//!   groups, text, scripts, state managers, composer descriptions, templates
//!
//! ## Example
//!
//! ```ignore
//! use strata_resource::prelude::*;
//!
//! let manager = ResourceManager::new();
//! manager.install_builtin_loaders()?;
//! manager.add_source(BinarySource::open("base.kzb", SourceMode::Mapped)?);
//!
//! let material = manager.acquire::<Material>("kzb://project/materials/foo")?;
//! println!("shader: {}", material.shader);
//! manager.release("kzb://project/materials/foo")?;
//! ```

pub mod handle;
pub mod loader;
pub mod manager;
pub mod types;

pub use handle::{LoadState, ResourceEvent, ResourceRef};
pub use loader::{ErasedLoader, LoadContext, PayloadLoader, ResourceLoader, TextLoader};
pub use manager::{ResourceManager, ResourceValidator};
pub use types::{
    decode, encode, ComposerDescription, FilterDescription, Material, Mesh, NodeTemplate,
    ObjectSourceDescription, Payload, PropertyGroup, Resource, SceneTemplate, Script, Shader,
    StateDefinition, StateManager, Text, Texture, TextureFormat,
};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::handle::{LoadState, ResourceEvent, ResourceRef};
    pub use crate::loader::{LoadContext, ResourceLoader};
    pub use crate::manager::ResourceManager;
    pub use crate::types::*;
    pub use strata_binary::{BinarySource, SourceMode};
}
