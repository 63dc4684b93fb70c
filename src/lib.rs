//! vrmdrop - Drag-and-drop VRM avatar viewer
//!
//! Drop a VRM (or any glTF/GLB) file onto the window and it is:
//! - parsed into a scene graph and bound to its humanoid rig
//! - framed by the camera at head height
//! - spun around its hips, one increment per rendered frame
//!
//! The native window and GPU renderer live behind the `native-ui` feature;
//! everything else runs headless.

pub mod avatar;
pub mod camera;
pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod scene;
pub mod state;

#[cfg(feature = "native-ui")]
pub mod ui;

pub use config::Config;
pub use driver::{Clock, DriverState, FrameDriver, HeadlessRenderer, SceneRenderer};
pub use error::{Result, VrmDropError};
pub use pipeline::DropHandler;
pub use state::{InstallOutcome, ViewerState};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
