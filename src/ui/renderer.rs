//! wgpu rendering pipeline for the current avatar.
//!
//! Renders offscreen (colour + depth) and blits into the egui pass. GPU
//! buffers are created when a new avatar first shows up in the scene and
//! destroyed when that avatar is released. Vertex buffers are rewritten
//! every frame from the CPU-skinned positions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytemuck::{Pod, Zeroable};
use eframe::egui_wgpu;
use eframe::wgpu;
use glam::{Mat4, Vec3};

use crate::avatar::{Avatar, AvatarId};
use crate::camera::Camera;
use crate::driver::SceneRenderer;
use crate::scene::Scene;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const AMBIENT: [f32; 4] = [0.15, 0.15, 0.18, 1.0];

/// Vertex layout matching the shader.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Uniform buffer layout matching the shader.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
    pub base_color: [f32; 4],
}

/// One primitive's GPU resources.
struct DrawCall {
    mesh: usize,
    primitive: usize,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_indices: u32,
    base_color: [f32; 4],
}

impl DrawCall {
    fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

/// Buffers for the avatar currently on the GPU.
struct GpuModel {
    avatar: AvatarId,
    draw_calls: Vec<DrawCall>,
}

/// Per-frame scene parameters, written by the frame driver and read when
/// the paint callback renders.
struct FrameParams {
    view_proj: Mat4,
    light_dir: Vec3,
    light_color: Vec3,
    clear: wgpu::Color,
}

/// Offscreen target, recreated when the viewport size changes.
struct OffscreenState {
    offscreen_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    blit_bind_group: wgpu::BindGroup,
    offscreen_size: [u32; 2],
}

/// Holds all GPU resources for offscreen rendering.
pub struct VrmRenderer {
    scene_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,
    scene_bind_group_layout: wgpu::BindGroupLayout,
    blit_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    offscreen: Mutex<OffscreenState>,
    model: Mutex<Option<GpuModel>>,
    frame: Mutex<FrameParams>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VrmRenderer {
    /// Create the pipelines and an empty offscreen target. No avatar is
    /// uploaded until one appears in the scene.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vrm_scene_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vrm_blit_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
        });

        let scene_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("vrm_scene_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let scene_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vrm_scene_pl"),
                bind_group_layouts: &[&scene_bind_group_layout],
                push_constant_ranges: &[],
            });

        let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("vrm_scene_pipeline"),
            layout: Some(&scene_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &scene_shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &scene_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OFFSCREEN_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // double-sided materials are common
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let blit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("vrm_blit_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let blit_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vrm_blit_pl"),
                bind_group_layouts: &[&blit_bind_group_layout],
                push_constant_ranges: &[],
            });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("vrm_blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: Some("vs_blit"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_blit"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vrm_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let offscreen =
            create_offscreen(device, &blit_bind_group_layout, &sampler, width.max(1), height.max(1));

        Self {
            scene_pipeline,
            blit_pipeline,
            scene_bind_group_layout,
            blit_bind_group_layout,
            sampler,
            offscreen: Mutex::new(offscreen),
            model: Mutex::new(None),
            frame: Mutex::new(FrameParams {
                view_proj: Mat4::IDENTITY,
                light_dir: Vec3::Y,
                light_color: Vec3::ONE,
                clear: wgpu::Color::BLACK,
            }),
        }
    }

    /// Resize the offscreen render target if the viewport size changed.
    ///
    /// Only the texture follows the viewport; the projection stays with
    /// the camera's configured aspect.
    pub fn resize(&self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        let mut state = lock(&self.offscreen);
        if state.offscreen_size == [width, height] {
            return;
        }
        *state = create_offscreen(
            device,
            &self.blit_bind_group_layout,
            &self.sampler,
            width,
            height,
        );
    }

    /// Bring the GPU copy of the scene up to date: upload a newly current
    /// avatar, rewrite its skinned vertices and record camera and light.
    pub fn sync(&self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &Scene, camera: &Camera) {
        {
            let mut frame = lock(&self.frame);
            frame.view_proj = camera.view_projection();
            frame.light_dir = scene.light.direction;
            frame.light_color = scene.light.color;
            frame.clear = wgpu::Color {
                r: scene.background.x as f64,
                g: scene.background.y as f64,
                b: scene.background.z as f64,
                a: 1.0,
            };
        }

        let mut model = lock(&self.model);
        let Some(avatar) = scene.avatar() else {
            if let Some(stale) = model.take() {
                stale.draw_calls.iter().for_each(DrawCall::destroy);
            }
            return;
        };

        if model.as_ref().map(|m| m.avatar) != Some(avatar.id()) {
            if let Some(stale) = model.take() {
                stale.draw_calls.iter().for_each(DrawCall::destroy);
            }
            *model = Some(self.upload(device, queue, avatar));
        }

        if let Some(model) = model.as_ref() {
            write_vertices(queue, model, avatar);
        }
    }

    fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue, avatar: &Avatar) -> GpuModel {
        let mut draw_calls = Vec::new();

        for (mesh_idx, mesh) in avatar.scene().meshes.iter().enumerate() {
            for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
                if prim.positions.is_empty() || prim.indices.is_empty() {
                    continue;
                }

                let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("vrm_vb_{}_{}", mesh_idx, prim_idx)),
                    size: (prim.positions.len() * std::mem::size_of::<Vertex>()) as u64,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("vrm_ib_{}_{}", mesh_idx, prim_idx)),
                    size: (prim.indices.len() * std::mem::size_of::<u32>()) as u64,
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                queue.write_buffer(&index_buffer, 0, bytemuck::cast_slice(&prim.indices));

                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("vrm_ub_{}_{}", mesh_idx, prim_idx)),
                    size: std::mem::size_of::<Uniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("vrm_bg_{}_{}", mesh_idx, prim_idx)),
                    layout: &self.scene_bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                draw_calls.push(DrawCall {
                    mesh: mesh_idx,
                    primitive: prim_idx,
                    vertex_buffer,
                    index_buffer,
                    uniform_buffer,
                    bind_group,
                    num_indices: prim.indices.len() as u32,
                    base_color: prim.base_color,
                });
            }
        }

        tracing::debug!(
            "Uploaded {} ({} draw calls)",
            avatar.id(),
            draw_calls.len()
        );

        GpuModel {
            avatar: avatar.id(),
            draw_calls,
        }
    }

    /// Destroy the buffers held for `id`, if it is the avatar on the GPU.
    pub fn release(&self, id: AvatarId) {
        let mut model = lock(&self.model);
        if model.as_ref().is_some_and(|m| m.avatar == id) {
            if let Some(released) = model.take() {
                released.draw_calls.iter().for_each(DrawCall::destroy);
                tracing::debug!("Released GPU buffers for {}", id);
            }
        }
    }

    /// Render the scene offscreen. Call this in `prepare()`.
    pub fn render_offscreen(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let state = lock(&self.offscreen);
        let model = lock(&self.model);
        let (view_proj, light_dir, light_color, clear) = {
            let frame = lock(&self.frame);
            (frame.view_proj, frame.light_dir, frame.light_color, frame.clear)
        };

        let draw_calls: &[DrawCall] = model
            .as_ref()
            .map(|m| m.draw_calls.as_slice())
            .unwrap_or(&[]);
        for dc in draw_calls {
            let uniforms = Uniforms {
                view_proj: view_proj.to_cols_array_2d(),
                light_dir: light_dir.extend(0.0).to_array(),
                light_color: light_color.extend(1.0).to_array(),
                ambient: AMBIENT,
                base_color: dc.base_color,
            };
            queue.write_buffer(&dc.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("vrm_offscreen_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("vrm_offscreen_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.offscreen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &state.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.scene_pipeline);
            for dc in draw_calls {
                pass.set_bind_group(0, &dc.bind_group, &[]);
                pass.set_vertex_buffer(0, dc.vertex_buffer.slice(..));
                pass.set_index_buffer(dc.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..dc.num_indices, 0, 0..1);
            }
        }

        // Drop locks before submit
        drop(model);
        drop(state);
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Blit the offscreen texture to the current render pass. Call this in `paint()`.
    pub fn blit(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        let state = lock(&self.offscreen);
        render_pass.set_pipeline(&self.blit_pipeline);
        render_pass.set_bind_group(0, Some(&state.blit_bind_group), &[]);
        drop(state);
        render_pass.draw(0..3, 0..1); // fullscreen triangle
    }
}

/// Skinned positions with the rest-pose normals.
fn write_vertices(queue: &wgpu::Queue, model: &GpuModel, avatar: &Avatar) {
    let skinned = avatar.skinned_meshes();
    let meshes = &avatar.scene().meshes;

    for dc in &model.draw_calls {
        let Some(positions) = skinned.get(dc.mesh).and_then(|m| m.get(dc.primitive)) else {
            continue;
        };
        let normals = &meshes[dc.mesh].primitives[dc.primitive].normals;

        let vertices: Vec<Vertex> = positions
            .iter()
            .zip(normals.iter().chain(std::iter::repeat(&Vec3::Y)))
            .map(|(p, n)| Vertex {
                position: p.to_array(),
                normal: n.to_array(),
            })
            .collect();

        queue.write_buffer(&dc.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
    }
}

fn create_offscreen(
    device: &wgpu::Device,
    blit_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> OffscreenState {
    let offscreen_view = create_texture_view(
        device,
        "vrm_offscreen_color",
        width,
        height,
        OFFSCREEN_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    );
    let depth_view = create_texture_view(
        device,
        "vrm_offscreen_depth",
        width,
        height,
        DEPTH_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT,
    );

    let blit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("vrm_blit_bg"),
        layout: blit_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&offscreen_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    OffscreenState {
        offscreen_view,
        depth_view,
        blit_bind_group,
        offscreen_size: [width, height],
    }
}

fn create_texture_view(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

/// [`SceneRenderer`] backed by the egui-wgpu device.
///
/// `render` only stages the frame; the actual draw happens in the viewport
/// paint callback.
pub struct GpuSceneRenderer {
    render_state: egui_wgpu::RenderState,
    renderer: Arc<VrmRenderer>,
}

impl GpuSceneRenderer {
    pub fn new(render_state: egui_wgpu::RenderState, width: u32, height: u32) -> Self {
        let renderer = VrmRenderer::new(
            &render_state.device,
            render_state.target_format,
            width,
            height,
        );
        Self {
            render_state,
            renderer: Arc::new(renderer),
        }
    }

    pub fn renderer(&self) -> Arc<VrmRenderer> {
        self.renderer.clone()
    }
}

impl SceneRenderer for GpuSceneRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.renderer.sync(
            &self.render_state.device,
            &self.render_state.queue,
            scene,
            camera,
        );
    }

    fn release(&mut self, avatar: &Avatar) {
        self.renderer.release(avatar.id());
    }
}
