//! # strata_scene - Scene Graph
//!
//! Nodes, their classes, and everything evaluated over the tree:
//! - **Graph**: generation-checked node handles, ordered children, cycle-safe
//!   re-parenting, subtree removal that drops property cells
//! - **Classes**: per object type behavior for layout and rendering, including
//!   stack layers, level-of-detail, instantiators and portals
//! - **Properties**: built-in node properties stored in a `PropertyManager`,
//!   with ancestor fallback for inherited types
//! - **Layout**: measure and arrange passes plus hit testing
//! - **Cameras**: view/projection evaluation and frustum extraction
//! - **States**: property groups and state managers applied as overrides
//! - **Templates**: instantiation of prefab subtrees
//!
//! ## Example
//!
//! ```ignore
//! use strata_scene::prelude::*;
//!
//! let registry = Arc::new(PropertyTypeRegistry::new());
//! let builtins = register_builtin_properties(&registry)?;
//! registry.lock();
//!
//! let mut scene = SceneGraph::new(registry)?;
//! let root = scene.create_node("Root", object_type::NODE);
//! let button = scene.create_child(root, "Button", object_type::MODEL)?;
//! scene.set_property(button, builtins.opacity, 0.5f32)?;
//! ```

pub mod camera;
pub mod class;
pub mod graph;
pub mod layout;
pub mod node;
pub mod object_type;
pub mod properties;
pub mod state;
pub mod template;

pub use camera::{CameraView, Frustum, Plane};
pub use class::{
    builtin_classes, CameraClass, InstantiatorClass, LevelOfDetailClass, NodeClass, PlainClass,
    PortalClass, StackLayerClass,
};
pub use graph::SceneGraph;
pub use layout::LayoutRect;
pub use node::{LayoutState, NodeId, ObjectNode};
pub use object_type::ObjectType;
pub use properties::{register_builtin_properties, BuiltinProperties};
pub use state::{AppliedOverride, StateController};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::camera::{CameraView, Frustum};
    pub use crate::class::NodeClass;
    pub use crate::graph::SceneGraph;
    pub use crate::node::{NodeId, ObjectNode};
    pub use crate::object_type::{self, ObjectType};
    pub use crate::properties::{register_builtin_properties, BuiltinProperties};
    pub use crate::state::StateController;
    pub use strata_property::prelude::*;
}
