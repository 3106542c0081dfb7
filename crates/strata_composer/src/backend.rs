//! Render backend boundary
//!
//! Composers never talk to a graphics API directly. Everything they do goes
//! through a `RenderBackend`; `RecordingBackend` records the calls instead of
//! executing them, for headless runs and tests.

use glam::Mat4;
use std::collections::HashSet;
use strata_core::{Error, ObjectId, Result};
use strata_property::Color;
use strata_scene::NodeId;

/// Pixel format of a render target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba8,
    Rgba16Float,
    Depth32Float,
}

/// Offscreen target a composer renders into
#[derive(Clone, Debug, PartialEq)]
pub struct RenderTargetDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
    /// Multisample count; 1 disables multisampling
    pub samples: u32,
    /// Layer of a layered target, such as a cubemap face
    pub layer: u32,
}

impl RenderTargetDesc {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format: TargetFormat::Rgba8,
            samples: 1,
            layer: 0,
        }
    }

    pub fn with_format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Render area in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// One object to draw, with material substitution already applied
#[derive(Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub object: ObjectId,
    pub mesh: Option<String>,
    pub material: Option<String>,
    /// Shader of the material, when the material could be loaded
    pub shader: Option<String>,
    pub world: Mat4,
    pub opacity: f32,
}

/// Full-screen effect applied from the last bound offscreen target onto the
/// current target
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Blur { source: String, radius: f32 },
    Bloom { source: String, threshold: f32, intensity: f32 },
    Resolve { source: String, samples: u32 },
    /// Present a target unchanged, reusing its previous contents
    Copy { source: String },
}

/// Graphics calls made by composers
pub trait RenderBackend {
    fn bind_target(&mut self, target: &RenderTargetDesc) -> Result<()>;

    fn unbind_target(&mut self, target: &RenderTargetDesc) -> Result<()>;

    fn clear(&mut self, color: Color);

    fn set_view(&mut self, view_projection: Mat4);

    fn draw(&mut self, item: &DrawItem) -> Result<()>;

    fn apply_effect(&mut self, effect: &Effect) -> Result<()>;

    /// The frame was abandoned; forget any target still bound
    fn abort_frame(&mut self) {}
}

/// A recorded backend call
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    BindTarget(RenderTargetDesc),
    UnbindTarget(String),
    Clear(Color),
    SetView(Mat4),
    Draw(DrawItem),
    Effect(Effect),
    AbortFrame,
}

/// Backend that records calls, with injectable failures
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<RenderCommand>,
    failing_binds: HashSet<String>,
    failing_unbinds: HashSet<String>,
    bound: Vec<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every bind of the named target fail until `heal` is called
    pub fn fail_bind(&mut self, target: impl Into<String>) {
        self.failing_binds.insert(target.into());
    }

    /// Make every unbind of the named target fail until `heal` is called
    pub fn fail_unbind(&mut self, target: impl Into<String>) {
        self.failing_unbinds.insert(target.into());
    }

    /// Stop injecting failures for a target
    pub fn heal(&mut self, target: &str) {
        self.failing_binds.remove(target);
        self.failing_unbinds.remove(target);
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Draw calls in submission order
    pub fn draws(&self) -> Vec<&DrawItem> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RenderCommand::Draw(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    /// Names of targets currently bound, innermost last
    pub fn bound_targets(&self) -> &[String] {
        &self.bound
    }
}

impl RenderBackend for RecordingBackend {
    fn bind_target(&mut self, target: &RenderTargetDesc) -> Result<()> {
        if self.failing_binds.contains(&target.name) {
            return Err(Error::RenderTargetBind {
                target: target.name.clone(),
                reason: "injected bind failure".into(),
            });
        }
        self.bound.push(target.name.clone());
        self.commands.push(RenderCommand::BindTarget(target.clone()));
        Ok(())
    }

    fn unbind_target(&mut self, target: &RenderTargetDesc) -> Result<()> {
        if self.failing_unbinds.contains(&target.name) {
            return Err(Error::RenderTargetBind {
                target: target.name.clone(),
                reason: "injected unbind failure".into(),
            });
        }
        if let Some(position) = self.bound.iter().rposition(|name| *name == target.name) {
            self.bound.remove(position);
        }
        self.commands.push(RenderCommand::UnbindTarget(target.name.clone()));
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(RenderCommand::Clear(color));
    }

    fn set_view(&mut self, view_projection: Mat4) {
        self.commands.push(RenderCommand::SetView(view_projection));
    }

    fn draw(&mut self, item: &DrawItem) -> Result<()> {
        self.commands.push(RenderCommand::Draw(item.clone()));
        Ok(())
    }

    fn apply_effect(&mut self, effect: &Effect) -> Result<()> {
        self.commands.push(RenderCommand::Effect(effect.clone()));
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.bound.clear();
        self.commands.push(RenderCommand::AbortFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_bind_failure() {
        let mut backend = RecordingBackend::new();
        let target = RenderTargetDesc::new("blur", 64, 64);
        backend.fail_bind("blur");

        let err = backend.bind_target(&target).unwrap_err();
        assert!(err.is_frame_scoped());
        assert!(backend.commands().is_empty());

        backend.heal("blur");
        backend.bind_target(&target).unwrap();
        assert_eq!(backend.bound_targets(), &["blur".to_string()]);
        backend.unbind_target(&target).unwrap();
        assert!(backend.bound_targets().is_empty());
    }

    #[test]
    fn test_viewport_aspect() {
        assert_eq!(Viewport::new(200, 100).aspect(), 2.0);
        assert_eq!(Viewport::new(200, 0).aspect(), 1.0);
    }
}
