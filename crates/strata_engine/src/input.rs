//! Input boundary
//!
//! The platform layer pushes already normalized events; the engine drains the
//! queue once per frame. Pointer events are routed to the node under the
//! pointer by layout bounds.

use glam::Vec2;
use std::collections::VecDeque;
use strata_scene::{NodeId, SceneGraph};

/// Button or key state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Modifier keys held during an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// Normalized input event
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove {
        position: Vec2,
    },
    PointerButton {
        position: Vec2,
        button: u8,
        state: ButtonState,
    },
    Key {
        key: String,
        state: ButtonState,
        modifiers: Modifiers,
    },
}

impl InputEvent {
    /// Pointer position for pointer events
    pub fn position(&self) -> Option<Vec2> {
        match self {
            Self::PointerMove { position } | Self::PointerButton { position, .. } => Some(*position),
            Self::Key { .. } => None,
        }
    }
}

/// Events gathered since the last frame
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove every queued event in arrival order
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }
}

/// Receives dispatched events. Returning true consumes the event; later
/// handlers do not see it.
pub type InputHandler = Box<dyn FnMut(&InputEvent, Option<NodeId>, &mut SceneGraph) -> bool + Send>;

/// Node a pointer event lands on: the deepest hit that is enabled, searched
/// from the last scene root
pub fn pointer_target(scene: &SceneGraph, position: Vec2) -> Option<NodeId> {
    scene
        .roots()
        .iter()
        .rev()
        .find_map(|&root| scene.hit_test(root, position))
        .and_then(|hit| {
            let mut current = Some(hit);
            while let Some(node) = current {
                if scene.is_enabled(node).unwrap_or(false) {
                    return Some(node);
                }
                current = scene.parent(node);
            }
            None
        })
}
