//! Frame driver: one tick per display refresh.
//!
//! Each tick reads the clock delta, spins the current avatar's hips about
//! the vertical axis by `delta` radians, advances the avatar's pose and
//! skinning, and renders. With no avatar the tick only renders.

use std::time::Instant;

use crate::avatar::{Avatar, HumanBone};
use crate::camera::Camera;
use crate::scene::Scene;
use crate::state::ViewerState;

/// Where frames go. Implemented by the GPU renderer in the native UI.
pub trait SceneRenderer {
    /// Draw the scene as seen by the camera.
    fn render(&mut self, scene: &Scene, camera: &Camera);

    /// Drop every GPU resource held for an avatar that is being replaced.
    fn release(&mut self, avatar: &Avatar);
}

/// Renderer for runs without a GPU surface: draws nothing.
#[derive(Debug, Default)]
pub struct HeadlessRenderer;

impl SceneRenderer for HeadlessRenderer {
    fn render(&mut self, _scene: &Scene, _camera: &Camera) {}

    fn release(&mut self, avatar: &Avatar) {
        tracing::trace!("release {}", avatar.id());
    }
}

/// Whether the driver has an avatar to animate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Animating,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Idle => write!(f, "idle"),
            DriverState::Animating => write!(f, "animating"),
        }
    }
}

/// Monotonic clock, started once and never reset.
#[derive(Debug, Clone)]
pub struct Clock {
    start: Instant,
    last: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
        }
    }

    /// Seconds since the previous call (since start, on the first call).
    pub fn delta(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }

    /// Seconds since start
    pub fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Drives animation and rendering.
#[derive(Debug, Default)]
pub struct FrameDriver {
    clock: Clock,
    frames: u64,
}

impl FrameDriver {
    pub fn new(clock: Clock) -> Self {
        Self { clock, frames: 0 }
    }

    /// Run one frame using the wall-clock delta. Returns the delta used.
    pub fn frame(&mut self, state: &mut ViewerState, renderer: &mut dyn SceneRenderer) -> f32 {
        let delta = self.clock.delta();
        self.tick(state, delta, renderer);
        delta
    }

    /// Run one frame with an explicit delta in seconds.
    pub fn tick(&mut self, state: &mut ViewerState, delta: f32, renderer: &mut dyn SceneRenderer) {
        if let Some(avatar) = state.scene.avatar_mut() {
            // Avatars without a humanoid or hips still update and render
            avatar.rotate_bone_y(HumanBone::Hips, delta);
            avatar.update(delta);
        }

        renderer.render(&state.scene, &state.camera);

        self.frames += 1;
        tracing::trace!("frame {} ({:.4}s, {})", self.frames, delta, state.driver_state());
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::avatar::AvatarId;

    /// Renderer that only records what it was asked to do.
    #[derive(Default)]
    pub struct RecordingRenderer {
        pub renders: usize,
        pub rendered_avatars: Vec<Option<AvatarId>>,
        pub released: Vec<AvatarId>,
    }

    impl SceneRenderer for RecordingRenderer {
        fn render(&mut self, scene: &Scene, _camera: &Camera) {
            self.renders += 1;
            self.rendered_avatars.push(scene.avatar().map(Avatar::id));
        }

        fn release(&mut self, avatar: &Avatar) {
            self.released.push(avatar.id());
        }
    }
}
