//! # strata_property - Typed, Layered Properties
//!
//! Every configurable aspect of a node, composer, or resource is a property:
//! - **Registry**: property types are registered by name during startup and
//!   frozen with `lock()`; each carries a value kind and a default
//! - **Manager**: per-object cells hold a base value plus overrides tagged by
//!   priority class; `resolve` picks the winner and caches it
//! - **Bindings**: one cell drives another through a converter, written as a
//!   binding-priority override
//! - **Animations**: time-driven interpolation written as animation-priority
//!   overrides
//!
//! ## Example
//!
//! ```ignore
//! use strata_property::prelude::*;
//!
//! let registry = Arc::new(PropertyTypeRegistry::new());
//! let opacity = registry.register(PropertyType::new("Node.Opacity", 1.0f32))?;
//! registry.lock();
//!
//! let mut manager = PropertyManager::new(registry.clone());
//! manager.set_base(node, opacity, 0.5f32)?;
//! let token = manager.add_override(node, opacity, PriorityClass::ANIMATION, 0.2f32)?;
//! assert_eq!(manager.resolve_as::<f32>(node, opacity)?, 0.2);
//! manager.remove_override(node, opacity, token);
//! assert_eq!(manager.resolve_as::<f32>(node, opacity)?, 0.5);
//! ```

pub mod animation;
pub mod manager;
pub mod property_type;
pub mod registry;
pub mod value;

pub use animation::{AnimationId, AnimationPlayer, FillMode, PropertyAnimation};
pub use manager::{
    BindingId, OverrideToken, PriorityClass, PropertyBinding, PropertyChange, PropertyManager,
    PropertyRef,
};
pub use property_type::{ArrayLength, PropertyFlags, PropertyType, PropertyTypeId};
pub use registry::PropertyTypeRegistry;
pub use value::{Color, FromPropertyValue, PropertyValue, PropertyValueKind};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::manager::{OverrideToken, PriorityClass, PropertyManager, PropertyRef};
    pub use crate::property_type::{ArrayLength, PropertyType, PropertyTypeId};
    pub use crate::registry::PropertyTypeRegistry;
    pub use crate::value::{Color, PropertyValue, PropertyValueKind};
    pub use std::sync::Arc;
}
