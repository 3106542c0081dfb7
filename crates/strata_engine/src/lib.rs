//! # strata_engine - Engine Core
//!
//! Ties the subsystems into a running application:
//! - **Config**: TOML engine configuration, binary lists and render settings
//! - **Frame tick**: input, animations, bindings, layout, composer rendering,
//!   present
//! - **Background loading**: containers opened on a worker thread and merged
//!   between frames
//! - **Boundaries**: `Surface` for presenting, `InputQueue` for platform events
//!
//! ## Example
//!
//! ```ignore
//! use strata_engine::prelude::*;
//!
//! let config = EngineConfig::load("app.toml")?;
//! logging::init_from_config(&config.logging);
//!
//! let mut engine = Engine::new(config)?;
//! let mut surface = HeadlessSurface::new(800, 480);
//! let mut input = InputQueue::new();
//!
//! loop {
//!     let report = engine.tick(1.0 / 60.0, &mut input, &mut surface);
//!     for error in &report.errors {
//!         log::warn!("frame {}: {}", report.frame, error);
//!     }
//! }
//! ```

pub mod config;
pub mod engine;
pub mod input;
pub mod loader_thread;
pub mod logging;
pub mod surface;

pub use config::{
    BinariesConfig, EngineConfig, LoggingConfig, PropertiesConfig, RenderConfig, ResourcesConfig,
};
pub use engine::{Engine, FrameReport};
pub use input::{pointer_target, ButtonState, InputEvent, InputHandler, InputQueue, Modifiers};
pub use loader_thread::{BackgroundBinaryLoader, LoadedBinary};
pub use surface::{HeadlessSurface, Surface};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, FrameReport};
    pub use crate::input::{ButtonState, InputEvent, InputQueue, Modifiers};
    pub use crate::logging;
    pub use crate::surface::{HeadlessSurface, Surface};
    pub use strata_core::{Error, Result};
}
