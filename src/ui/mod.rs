//! Native egui window for the viewer.
//!
//! One central viewport that accepts dropped files, plus a status bar.
//! Enabled via the `native-ui` feature.

mod app;
mod renderer;
mod viewport;

pub use app::ViewerApp;
pub use renderer::{GpuSceneRenderer, VrmRenderer};
