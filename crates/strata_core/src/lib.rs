//! # strata_core - Strata Engine Core
//!
//! Foundational primitives shared by every Strata crate:
//! - **Identifiers**: object identity for property owners
//! - **Handles**: generation-checked arena handles that never alias reused slots
//! - **Type tags**: open, string-backed type identifiers and per-type class tables
//! - **Errors**: the single error taxonomy used across the engine
//!
//! ## Example
//!
//! ```ignore
//! use strata_core::prelude::*;
//!
//! const MODEL: TypeTag = TypeTag::from_static("Model");
//!
//! let ids = ObjectIdGenerator::new();
//! let node = ids.next();
//! assert_eq!(MODEL.name(), "Model");
//! ```

pub mod error;
pub mod handle;
pub mod id;
pub mod type_tag;

pub use error::{Error, Result};
pub use handle::{Handle, HandleMap};
pub use id::{ObjectId, ObjectIdGenerator};
pub use type_tag::{ClassRegistry, TypeTag};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::handle::{Handle, HandleMap};
    pub use crate::id::{ObjectId, ObjectIdGenerator};
    pub use crate::type_tag::{ClassRegistry, TypeTag};
}
