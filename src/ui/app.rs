//! Main egui application: a single viewport that accepts dropped files.

use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Handle;

use crate::avatar::{ByteSource, DroppedFile};
use crate::config::Config;
use crate::driver::{FrameDriver, HeadlessRenderer, SceneRenderer};
use crate::pipeline::DropHandler;
use crate::state::ViewerState;

use super::renderer::{GpuSceneRenderer, VrmRenderer};
use super::viewport::VrmViewportCallback;

/// The native viewer window.
pub struct ViewerApp {
    state: ViewerState,
    drops: DropHandler,
    driver: FrameDriver,
    renderer: Box<dyn SceneRenderer>,
    /// Offscreen renderer shared with the paint callback
    viewport: Option<Arc<VrmRenderer>>,
}

impl ViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: Config,
        runtime: Handle,
        initial: Option<ByteSource>,
    ) -> Self {
        let (renderer, viewport): (Box<dyn SceneRenderer>, _) =
            match cc.wgpu_render_state.clone() {
                Some(render_state) => {
                    let gpu = GpuSceneRenderer::new(
                        render_state,
                        config.viewport.width,
                        config.viewport.height,
                    );
                    let viewport = gpu.renderer();
                    (Box::new(gpu), Some(viewport))
                }
                None => {
                    tracing::error!("wgpu render state not available; nothing will be drawn");
                    (Box::new(HeadlessRenderer), None)
                }
            };

        let mut drops = DropHandler::new(runtime);
        if let Some(source) = initial {
            drops.open(source);
        }

        Self {
            state: ViewerState::new(config),
            drops,
            driver: FrameDriver::default(),
            renderer,
            viewport,
        }
    }

    /// Launch the native window. Blocks until the window is closed.
    pub fn run(config: Config, runtime: Handle, initial: Option<ByteSource>) -> eframe::Result {
        let size = [config.viewport.width as f32, config.viewport.height as f32];
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_title(crate::NAME)
                .with_inner_size(size)
                .with_resizable(false)
                .with_drag_and_drop(true),
            ..Default::default()
        };

        eframe::run_native(
            crate::NAME,
            options,
            Box::new(move |cc| Ok(Box::new(Self::new(cc, config, runtime, initial)))),
        )
    }

    /// Forward hover and drop events to the drop handler.
    fn handle_file_events(&mut self, ctx: &egui::Context) {
        let (hovered, dropped) =
            ctx.input(|i| (i.raw.hovered_files.len(), i.raw.dropped_files.clone()));

        if hovered > 0 {
            self.drops.on_drag_over(hovered);
        }

        if !dropped.is_empty() {
            let files: Vec<DroppedFile> = dropped.into_iter().map(convert_dropped).collect();
            if let Some(ticket) = self.drops.on_drop(&files) {
                tracing::debug!(
                    "Drop accepted: {} (generation {})",
                    ticket.source,
                    ticket.generation
                );
            }
        }
    }

    /// Install whatever the pipeline finished since the last frame.
    /// Failures only reach the log.
    fn apply_completions(&mut self) {
        while let Some(completion) = self.drops.try_completion() {
            self.state.apply(completion.result, self.renderer.as_mut());
        }
    }
}

fn convert_dropped(file: egui::DroppedFile) -> DroppedFile {
    match (file.bytes, file.path) {
        (Some(bytes), path) => DroppedFile {
            name: file.name,
            path,
            bytes: Some(bytes),
        },
        (None, Some(path)) => DroppedFile::from_path(path),
        (None, None) => DroppedFile {
            name: file.name,
            ..Default::default()
        },
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_file_events(ctx);
        self.apply_completions();
        self.driver.frame(&mut self.state, self.renderer.as_mut());

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("State: {}", self.state.driver_state()));
                if let Some(avatar) = self.state.scene.avatar() {
                    ui.separator();
                    ui.label(avatar.name());
                }
                if self.drops.is_loading() {
                    ui.separator();
                    ui.spinner();
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available_size = ui.available_size();
            let (rect, _response) =
                ui.allocate_exact_size(available_size, egui::Sense::hover());

            if let Some(renderer) = &self.viewport {
                let ppp = ctx.pixels_per_point();
                let vp_width = (available_size.x * ppp) as u32;
                let vp_height = (available_size.y * ppp) as u32;

                ui.painter().add(eframe::egui_wgpu::Callback::new_paint_callback(
                    rect,
                    VrmViewportCallback {
                        renderer: renderer.clone(),
                        viewport_width: vp_width.max(1),
                        viewport_height: vp_height.max(1),
                    },
                ));
            }

            if self.state.scene.avatar().is_none() {
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Drop a VRM file here",
                    egui::FontId::proportional(20.0),
                    egui::Color32::GRAY,
                );
            }
        });

        // Repaint continuously; one driver tick per repaint
        ctx.request_repaint();
    }
}
