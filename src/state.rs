//! Application state shared by the drop handler and the frame driver.
//!
//! Constructed once at startup and passed explicitly to both; the UI thread
//! owns it, so no locking is involved.

use glam::Vec3;

use crate::avatar::Avatar;
use crate::camera::{self, Camera};
use crate::config::Config;
use crate::driver::{DriverState, SceneRenderer};
use crate::error::{BindError, LoadError};
use crate::scene::Scene;

/// What happened when an avatar was installed.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    /// Rig complete; the camera now sits level with the head
    Framed { head: Vec3 },
    /// Avatar is current but the rig is incomplete; camera untouched
    Unframed(BindError),
}

/// The viewer's application state
pub struct ViewerState {
    pub config: Config,
    pub scene: Scene,
    pub camera: Camera,
}

impl ViewerState {
    pub fn new(config: Config) -> Self {
        let scene = Scene::new(&config.light);
        let camera = Camera::from_config(&config);
        Self {
            config,
            scene,
            camera,
        }
    }

    pub fn driver_state(&self) -> DriverState {
        if self.scene.avatar().is_some() {
            DriverState::Animating
        } else {
            DriverState::Idle
        }
    }

    /// Apply the result of a finished load.
    ///
    /// Hard failures are logged and leave the state untouched.
    pub fn apply(
        &mut self,
        result: Result<Avatar, LoadError>,
        renderer: &mut dyn SceneRenderer,
    ) -> Option<InstallOutcome> {
        match result {
            Ok(avatar) => Some(self.install(avatar, renderer)),
            Err(e) => {
                tracing::error!("Failed to load avatar: {}", e);
                None
            }
        }
    }

    /// Make `avatar` current, then validate its rig and frame the camera.
    ///
    /// The previous avatar is released through the renderer before the new
    /// one is assigned. The avatar stays current even when validation fails;
    /// only the camera framing is skipped.
    pub fn install(&mut self, avatar: Avatar, renderer: &mut dyn SceneRenderer) -> InstallOutcome {
        if let Some(previous) = self.scene.take_avatar() {
            tracing::info!("Releasing {} ({})", previous.name(), previous.id());
            renderer.release(&previous);
        }

        tracing::info!("Current avatar: {} ({})", avatar.name(), avatar.id());
        let avatar = self.scene.set_avatar(avatar);

        let rig = match avatar.rig() {
            Ok(rig) => rig,
            Err(e) => {
                tracing::error!("{}", e);
                return InstallOutcome::Unframed(e);
            }
        };

        let head = avatar.world_transforms()[rig.head].w_axis.truncate();
        camera::frame(&mut self.camera, head, self.config.camera.distance);

        InstallOutcome::Framed { head }
    }
}
