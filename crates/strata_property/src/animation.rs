//! Property animations
//!
//! An animation interpolates one cell from a start value to an end value and
//! writes the result as an animation-priority override, so it wins over
//! authored values, groups, states, and bindings while it runs.

use crate::manager::{OverrideToken, PriorityClass, PropertyManager, PropertyRef};
use crate::value::PropertyValue;
use std::collections::BTreeMap;
use strata_core::{Error, Result};

/// What happens to the override once the animation completes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Keep the final value until the animation is stopped
    #[default]
    Hold,
    /// Remove the override; the cell falls back to lower layers
    Restore,
}

/// Linear animation of one property cell
#[derive(Clone, Debug)]
pub struct PropertyAnimation {
    pub target: PropertyRef,
    pub from: PropertyValue,
    pub to: PropertyValue,
    /// Seconds; zero jumps straight to `to`
    pub duration: f32,
    pub fill: FillMode,
}

impl PropertyAnimation {
    pub fn new(target: PropertyRef, from: PropertyValue, to: PropertyValue, duration: f32) -> Self {
        Self {
            target,
            from,
            to,
            duration,
            fill: FillMode::Hold,
        }
    }

    pub fn with_fill(mut self, fill: FillMode) -> Self {
        self.fill = fill;
        self
    }

    fn sample(&self, elapsed: f32) -> Option<(PropertyValue, bool)> {
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            (elapsed / self.duration).clamp(0.0, 1.0)
        };
        self.from.lerp(&self.to, t).map(|value| (value, t >= 1.0))
    }
}

/// Identifies a playing animation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnimationId(u64);

struct Playback {
    animation: PropertyAnimation,
    elapsed: f32,
    token: Option<OverrideToken>,
    finished: bool,
}

/// Drives animations and writes their overrides
#[derive(Default)]
pub struct AnimationPlayer {
    playbacks: BTreeMap<AnimationId, Playback>,
    next_id: u64,
}

impl AnimationPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an animation; its values must be interpolable
    pub fn play(&mut self, animation: PropertyAnimation) -> Result<AnimationId> {
        if animation.from.lerp(&animation.to, 0.0).is_none() {
            return Err(Error::type_mismatch(
                "animation",
                "interpolable values of one kind",
                format!("{} -> {}", animation.from.kind(), animation.to.kind()),
            ));
        }
        self.next_id += 1;
        let id = AnimationId(self.next_id);
        self.playbacks.insert(
            id,
            Playback {
                animation,
                elapsed: 0.0,
                token: None,
                finished: false,
            },
        );
        Ok(id)
    }

    /// Advance every running animation by `dt` seconds. Returns how many finished.
    pub fn advance(&mut self, dt: f32, manager: &mut PropertyManager) -> Result<usize> {
        let mut finished = 0;
        let mut restored = Vec::new();

        for (id, playback) in self.playbacks.iter_mut() {
            if playback.finished {
                continue;
            }
            playback.elapsed += dt;
            let Some((value, done)) = playback.animation.sample(playback.elapsed) else {
                continue;
            };

            let target = playback.animation.target;
            match playback.token {
                Some(token) => manager.update_override(token, value)?,
                None => {
                    playback.token = Some(manager.add_override(
                        target.object,
                        target.property,
                        PriorityClass::ANIMATION,
                        value,
                    )?);
                }
            }

            if done {
                finished += 1;
                playback.finished = true;
                if playback.animation.fill == FillMode::Restore {
                    restored.push(*id);
                }
            }
        }

        for id in restored {
            self.stop(id, manager);
        }
        Ok(finished)
    }

    /// Stop an animation and remove its override
    pub fn stop(&mut self, id: AnimationId, manager: &mut PropertyManager) -> bool {
        let Some(playback) = self.playbacks.remove(&id) else {
            return false;
        };
        if let Some(token) = playback.token {
            let target = playback.animation.target;
            manager.remove_override(target.object, target.property, token);
        }
        true
    }

    /// Whether the animation is still interpolating
    pub fn is_running(&self, id: AnimationId) -> bool {
        self.playbacks.get(&id).is_some_and(|p| !p.finished)
    }

    /// Number of animations still interpolating
    pub fn running_count(&self) -> usize {
        self.playbacks.values().filter(|p| !p.finished).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_type::PropertyType;
    use crate::registry::PropertyTypeRegistry;
    use std::sync::Arc;
    use strata_core::ObjectId;

    fn manager() -> (PropertyManager, PropertyRef) {
        let registry = Arc::new(PropertyTypeRegistry::new());
        let opacity = registry
            .register(PropertyType::new("Node.Opacity", 1.0f32))
            .unwrap();
        let manager = PropertyManager::new(registry);
        (manager, PropertyRef::new(ObjectId::new(1), opacity))
    }

    #[test]
    fn test_interpolates_and_holds() {
        let (mut manager, target) = manager();
        let mut player = AnimationPlayer::new();
        let id = player
            .play(PropertyAnimation::new(target, 0.0f32.into(), 1.0f32.into(), 2.0))
            .unwrap();

        assert_eq!(player.advance(0.5, &mut manager).unwrap(), 0);
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            0.25
        );

        assert_eq!(player.advance(2.0, &mut manager).unwrap(), 1);
        assert!(!player.is_running(id));
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            1.0
        );

        manager.set_base(target.object, target.property, 0.4f32).unwrap();
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            1.0
        );
        assert!(player.stop(id, &mut manager));
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            0.4
        );
    }

    #[test]
    fn test_restore_fill() {
        let (mut manager, target) = manager();
        manager.set_base(target.object, target.property, 0.5f32).unwrap();
        let mut player = AnimationPlayer::new();
        player
            .play(
                PropertyAnimation::new(target, 0.0f32.into(), 0.2f32.into(), 1.0)
                    .with_fill(FillMode::Restore),
            )
            .unwrap();

        player.advance(0.5, &mut manager).unwrap();
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            0.1
        );
        player.advance(1.0, &mut manager).unwrap();
        assert_eq!(player.running_count(), 0);
        assert_eq!(
            manager.resolve_as::<f32>(target.object, target.property).unwrap(),
            0.5
        );
    }

    #[test]
    fn test_rejects_non_interpolable() {
        let (_, target) = manager();
        let mut player = AnimationPlayer::new();
        assert!(player
            .play(PropertyAnimation::new(target, true.into(), false.into(), 1.0))
            .is_err());
    }
}
