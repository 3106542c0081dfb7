//! # strata_composer - Render-Pass Graph
//!
//! Composers turn the scene into backend calls:
//! - **Graph**: composers form a DAG; each decides when its children render
//! - **Frame protocol**: bind, render, unbind; the first failure aborts the
//!   rest of the frame and the next frame starts clean
//! - **Built-ins**: draw objects, blur, bloom, antialiasing, shadow maps,
//!   cubemaps, stereo, partial and step rendering
//! - **Backend boundary**: `RenderBackend`, with `RecordingBackend` for
//!   headless runs
//! - **Factory**: graphs built from authored `ComposerDescription`s
//!
//! ## Example
//!
//! ```ignore
//! use strata_composer::prelude::*;
//!
//! let mut graph = ComposerGraph::new();
//! let root = ComposerFactory::new().build_graph(
//!     "kzb://project/composers/main",
//!     &resources,
//!     &mut scene,
//!     &mut graph,
//! )?;
//! graph.set_root(root)?;
//!
//! let mut backend = RecordingBackend::new();
//! let mut ctx = RenderContext::new(&scene, &mut backend, Viewport::new(800, 480))?
//!     .with_resources(&resources);
//! graph.render_frame(&mut ctx)?;
//! ```

pub mod backend;
pub mod composers;
pub mod context;
pub mod factory;
pub mod graph;
pub mod properties;

pub use backend::{
    DrawItem, Effect, RecordingBackend, RenderBackend, RenderCommand, RenderTargetDesc,
    TargetFormat, Viewport,
};
pub use composers::{
    AntialiasingComposer, BloomComposer, BlurComposer, CubemapComposer, DrawObjectsComposer,
    GroupComposer, PartialRenderingComposer, ShadowMapComposer, StepRenderingComposer,
    StereoscopicComposer, STEREO_LEFT, STEREO_RIGHT,
};
pub use context::RenderContext;
pub use factory::{ComposerBuilder, ComposerFactory};
pub use graph::{ChildComposers, Composer, ComposerEntry, ComposerGraph, ComposerId, FrameStats};
pub use properties::{register_composer_properties, ComposerProperties};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::backend::{RecordingBackend, RenderBackend, RenderCommand, Viewport};
    pub use crate::context::RenderContext;
    pub use crate::factory::ComposerFactory;
    pub use crate::graph::{ChildComposers, Composer, ComposerGraph, ComposerId};
    pub use crate::properties::{register_composer_properties, ComposerProperties};
}

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::properties::{register_composer_properties, ComposerProperties};
    use std::sync::Arc;
    use strata_property::PropertyTypeRegistry;
    use strata_scene::{register_builtin_properties, SceneGraph};

    pub fn scene() -> (SceneGraph, ComposerProperties) {
        let registry = Arc::new(PropertyTypeRegistry::new());
        register_builtin_properties(&registry).unwrap();
        let ids = register_composer_properties(&registry).unwrap();
        registry.lock();
        (SceneGraph::new(registry).unwrap(), ids)
    }
}
