//! # strata_filter - Object Sources and Filters
//!
//! Decides which nodes a draw pass sees, and in what order:
//! - **Sources**: `SceneSource` walks the visible nodes below a root, asking
//!   each node's class which children it renders
//! - **Filters**: predicate filters (type, tag, property, distance, frustum)
//!   with an `exclusive` flag, and stable sorts (view depth, shader)
//! - **Chains**: `FilteredSource` runs one filter over one upstream source
//! - **Factory**: builds chains from authored `ObjectSourceDescription`s
//!
//! ## Example
//!
//! ```ignore
//! use strata_filter::prelude::*;
//!
//! let source = SceneSource::from_node(root)
//!     .then(PredicateFilter::new(TypeFilter::new([object_type::CAMERA])).exclusive(true))
//!     .then(SortByViewZ::front_to_back());
//!
//! let ctx = FilterContext::new(&scene).with_camera(Some(camera));
//! for node in source.collect(&ctx)? {
//!     // draw
//! }
//! ```

pub mod factory;
pub mod filter;
pub mod sort;
pub mod source;

pub use factory::{FilterBuilder, FilterFactory};
pub use filter::{
    DistanceFilter, FilterContext, FrustumFilter, HasPropertyFilter, NodePredicate, ObjectFilter,
    PredicateFilter, PreparedView, PropertyEqualsFilter, TagFilter, TypeFilter,
};
pub use sort::{SortByShader, SortByViewZ};
pub use source::{FilteredSource, ObjectSource, SceneSource, SourceRoot};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::factory::FilterFactory;
    pub use crate::filter::{
        FilterContext, FrustumFilter, ObjectFilter, PredicateFilter, TagFilter, TypeFilter,
    };
    pub use crate::sort::{SortByShader, SortByViewZ};
    pub use crate::source::{ObjectSource, SceneSource, SourceRoot};
    pub use strata_scene::object_type;
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;
    use strata_property::PropertyTypeRegistry;
    use strata_scene::{register_builtin_properties, BuiltinProperties, SceneGraph};

    pub fn scene() -> (SceneGraph, BuiltinProperties) {
        let registry = Arc::new(PropertyTypeRegistry::new());
        let builtins = register_builtin_properties(&registry).unwrap();
        registry.lock();
        (SceneGraph::new(registry).unwrap(), builtins)
    }
}
