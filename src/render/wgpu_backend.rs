//! The `wgpu` implementation of `RenderBackend`.
//!
//! `wgpu` has no global render state, so the calls of a frame are recorded and
//! encoded into a single render pass when the frame is presented. The pipeline
//! implements `RenderState::GUI` (alpha blending, no culling, no depth, scissor),
//! which is the only state the rasterizer draws with.

use super::{
    DrawIndex, Projection, RenderBackend, RenderState, ScissorRect, TextureHandle, Vertex,
};
use crate::utils::MessageError;
use crate::{ErrorCode, UiError, UiResult};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Unorm8x4];

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

struct Draw {
    mesh: usize,
    texture: Option<TextureHandle>,
    scissor: Option<ScissorRect>,
    projection: Projection,
    first_index: u32,
    count: u32,
}

#[derive(Clone, Copy)]
struct SavedState {
    state: RenderState,
    texture: Option<TextureHandle>,
    projection: Projection,
    scissor: Option<ScissorRect>,
}

#[derive(Default)]
struct FrameRecording {
    clear_color: wgpu::Color,
    state: RenderState,
    texture: Option<TextureHandle>,
    projection: Projection,
    scissor: Option<ScissorRect>,
    saved: Vec<SavedState>,
    mesh: Option<usize>,
    meshes: Vec<Mesh>,
    draws: Vec<Draw>,
}

/// Draws GUI geometry to the surface of a window.
pub struct WgpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    textures: HashMap<TextureHandle, GpuTexture>,
    next_texture_id: usize,
    frame: FrameRecording,
}

impl WgpuRenderer {
    /// Creates the surface for `window` and selects a graphics device for it.
    pub fn new(
        window: Arc<winit::window::Window>,
        present_mode: wgpu::PresentMode,
    ) -> UiResult<WgpuRenderer> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .map_err(|err| UiError::with_source(ErrorCode::SURFACE_CREATION_FAILED, err))?;

        let (adapter, device, queue) = WgpuRenderer::select_gpu_device(&instance, &surface)?;

        let caps = surface.get_capabilities(&adapter);
        // imgui colors are not linear, so avoid the implicit sRGB conversion
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| {
                UiError::with_message(
                    ErrorCode::SURFACE_CREATION_FAILED,
                    "the surface is not supported by the graphics adapter",
                )
            })?;
        log::debug!("Using surface format {:?}.", format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&device, &config);
        }

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("imgui_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("imgui_texture_layout"),
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

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("imgui_uniform_buffer"),
            contents: bytemuck::cast_slice(&Projection::IDENTITY.matrix),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("imgui_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("imgui_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("imgui_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("imgui_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("imgui_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Vertex::STRIDE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Ok(WgpuRenderer {
            surface,
            device,
            queue,
            config,

            pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            sampler,

            textures: HashMap::new(),
            next_texture_id: 1,
            frame: FrameRecording::default(),
        })
    }

    fn select_gpu_device(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
    ) -> UiResult<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
        use futures::executor::block_on;

        let mut adapter_opts = wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(surface),
        };

        let adapter = match block_on(instance.request_adapter(&adapter_opts)) {
            Some(val) => val,
            None => {
                log::debug!("Failed to get a hardware graphics adapter, retrying with the fallback adapter.");

                adapter_opts.force_fallback_adapter = true;
                match block_on(instance.request_adapter(&adapter_opts)) {
                    Some(val) => val,
                    None => {
                        log::debug!("Failed to request graphics adapter.");
                        return Err(ErrorCode::GRAPHICS_ADAPTER_NOT_AVAILABLE.into());
                    }
                }
            }
        };
        log::info!("Using graphics adapter {:?}.", adapter.get_info().name);

        let device_desc = wgpu::DeviceDescriptor {
            label: Some("imgui_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                .using_resolution(adapter.limits()),
        };
        let (device, queue) = block_on(adapter.request_device(&device_desc, None))
            .map_err(|err| UiError::with_source(ErrorCode::REQUEST_GRAPHICS_DEVICE_FAILED, err))?;

        Ok((adapter, device, queue))
    }

    /// Uploads the font atlas of `fonts` and stores the new texture's handle in it.
    pub fn upload_font_atlas(&mut self, fonts: &mut imgui::FontAtlas) -> UiResult<TextureHandle> {
        let handle = {
            let atlas = fonts.build_rgba32_texture();
            self.create_texture(atlas.width, atlas.height, atlas.data)
                .map_err(|err| UiError::with_source(ErrorCode::FONT_TEXTURE_FAILED, err))?
        };
        fonts.tex_id = handle.into();
        Ok(handle)
    }

    /// Creates a texture from tightly packed RGBA8 pixels.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> UiResult<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(UiError::with_message(
                ErrorCode::RENDER_ERROR,
                format!("invalid texture size {}x{} (maximum {})", width, height, max),
            ));
        }
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(UiError::with_message(
                ErrorCode::RENDER_ERROR,
                format!(
                    "{} bytes of pixel data for a {}x{} texture",
                    rgba.len(),
                    width,
                    height
                ),
            ));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("imgui_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("imgui_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let handle = TextureHandle(self.next_texture_id);
        self.next_texture_id += 1;
        self.textures.insert(
            handle,
            GpuTexture {
                _texture: texture,
                bind_group,
            },
        );
        log::debug!("Created texture {:?} ({}x{}).", handle, width, height);
        Ok(handle)
    }

    /// Resizes the surface, `width` and `height` are in physical pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        if width > 0 && height > 0 {
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn acquire_frame(&mut self) -> UiResult<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(output) => Ok(output),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring.");
                self.surface.configure(&self.device, &self.config);
                Err(ErrorCode::SURFACE_LOST.into())
            }
            Err(wgpu::SurfaceError::Timeout) => Err(ErrorCode::SURFACE_TIMEOUT.into()),
            Err(err) => Err(UiError::with_source(
                ErrorCode::RENDER_ERROR,
                MessageError::debug(&err),
            )),
        }
    }
}

impl RenderBackend for WgpuRenderer {
    fn clear(&mut self, color: [f32; 4]) {
        self.frame = FrameRecording {
            clear_color: wgpu::Color {
                r: f64::from(color[0]),
                g: f64::from(color[1]),
                b: f64::from(color[2]),
                a: f64::from(color[3]),
            },
            ..FrameRecording::default()
        };
    }

    fn push_state(&mut self) {
        let frame = &mut self.frame;
        frame.saved.push(SavedState {
            state: frame.state,
            texture: frame.texture,
            projection: frame.projection,
            scissor: frame.scissor,
        });
    }

    fn apply_state(&mut self, state: &RenderState) {
        if *state != RenderState::GUI {
            log::trace!("Render state {:?} is drawn with the GUI pipeline.", state);
        }
        self.frame.state = *state;
    }

    fn set_projection(&mut self, projection: &Projection) {
        self.frame.projection = *projection;
    }

    fn bind_draw_list(&mut self, vertices: &[Vertex], indices: &[DrawIndex]) {
        if vertices.is_empty() || indices.is_empty() {
            self.frame.mesh = None;
            return;
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("imgui_vertex_buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("imgui_index_buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let frame = &mut self.frame;
        frame.mesh = Some(frame.meshes.len());
        frame.meshes.push(Mesh {
            vertex_buffer,
            index_buffer,
        });
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        self.frame.texture = Some(texture);
    }

    fn set_scissor(&mut self, scissor: ScissorRect) {
        self.frame.scissor = Some(scissor);
    }

    fn draw_indexed(&mut self, first_index: u32, count: u32) {
        let frame = &mut self.frame;
        let mesh = match frame.mesh {
            Some(mesh) => mesh,
            None => {
                log::warn!("draw_indexed() without a bound draw list.");
                return;
            }
        };
        frame.draws.push(Draw {
            mesh,
            texture: frame.texture,
            scissor: if frame.state.scissor_test {
                frame.scissor
            } else {
                None
            },
            projection: frame.projection,
            first_index,
            count,
        });
    }

    fn pop_state(&mut self) {
        let frame = &mut self.frame;
        match frame.saved.pop() {
            Some(saved) => {
                frame.state = saved.state;
                frame.texture = saved.texture;
                frame.projection = saved.projection;
                frame.scissor = saved.scissor;
            }
            None => log::warn!("pop_state() without a matching push_state()."),
        }
    }

    fn present(&mut self) -> UiResult<()> {
        let recording = std::mem::take(&mut self.frame);
        let (width, height) = (self.config.width, self.config.height);
        if width == 0 || height == 0 {
            // minimized
            return Ok(());
        }

        let output = self.acquire_frame()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(first) = recording.draws.first() {
            if recording.draws.iter().any(|d| d.projection != first.projection) {
                log::debug!("Multiple projections in one frame, using the first.");
            }
            self.queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::cast_slice(&first.projection.matrix),
            );
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("imgui_command_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("imgui_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(recording.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            let mut bound_mesh = None;
            for draw in &recording.draws {
                let (x, y, w, h) = match draw.scissor {
                    Some(scissor) => match scissor.to_top_left(width, height) {
                        Some(rect) => rect,
                        None => continue,
                    },
                    None => (0, 0, width, height),
                };
                let texture = match draw.texture.and_then(|t| self.textures.get(&t)) {
                    Some(texture) => texture,
                    None => {
                        log::warn!("Draw with unknown texture {:?} skipped.", draw.texture);
                        continue;
                    }
                };
                let mesh = match recording.meshes.get(draw.mesh) {
                    Some(mesh) => mesh,
                    None => continue,
                };

                if bound_mesh != Some(draw.mesh) {
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                    bound_mesh = Some(draw.mesh);
                }
                pass.set_bind_group(1, &texture.bind_group, &[]);
                pass.set_scissor_rect(x, y, w, h);
                pass.draw_indexed(draw.first_index..draw.first_index + draw.count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
