//! Scene container: the light, the clear colour and the current avatar slot.

use glam::Vec3;

use crate::avatar::Avatar;
use crate::config::LightConfig;

/// A single white-ish directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Unit vector from the origin towards the light
    pub direction: Vec3,
    pub color: Vec3,
}

impl DirectionalLight {
    pub fn from_config(config: &LightConfig) -> Self {
        Self {
            direction: Vec3::from(config.direction).try_normalize().unwrap_or(Vec3::Y),
            color: Vec3::from(config.color),
        }
    }
}

/// Everything the renderer draws.
///
/// Holds at most one avatar; the slot is exclusively owned so a replaced
/// avatar can be handed back for teardown.
pub struct Scene {
    pub light: DirectionalLight,
    pub background: Vec3,
    avatar: Option<Avatar>,
}

impl Scene {
    pub fn new(light: &LightConfig) -> Self {
        Self {
            light: DirectionalLight::from_config(light),
            background: Vec3::from(light.background),
            avatar: None,
        }
    }

    pub fn avatar(&self) -> Option<&Avatar> {
        self.avatar.as_ref()
    }

    pub fn avatar_mut(&mut self) -> Option<&mut Avatar> {
        self.avatar.as_mut()
    }

    /// Empty the slot, returning its previous occupant.
    pub fn take_avatar(&mut self) -> Option<Avatar> {
        self.avatar.take()
    }

    /// Fill an empty slot. Callers take the previous avatar out first so
    /// its resources can be released.
    pub fn set_avatar(&mut self, avatar: Avatar) -> &mut Avatar {
        debug_assert!(self.avatar.is_none(), "previous avatar not released");
        self.avatar.insert(avatar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_is_normalized() {
        let scene = Scene::new(&LightConfig::default());
        assert!((scene.light.direction.length() - 1.0).abs() < 1e-6);
        assert!((scene.light.direction.x - scene.light.direction.y).abs() < 1e-6);
        assert!(scene.avatar().is_none());
    }
}
