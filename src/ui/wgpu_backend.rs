use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};
use wgpu::util::DeviceExt;
use wgpu::{Device, Queue, Surface, SurfaceConfiguration, TextureViewDescriptor};
use winit::window::Window;

use crate::font::AtlasImage;
use crate::ui::backend::{
    BackendError, BufferId, Primitive, ProgramDesc, ProgramId, RenderBackend, TextureId,
    UniformTable, UniformValue,
};

struct GpuProgram {
    desc: ProgramDesc,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: UniformTable,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
    len: usize,
}

struct GpuTexture {
    label: String,
    view: Option<wgpu::TextureView>,
}

/// A draw recorded during the frame and replayed in `present`.
struct PendingDraw {
    program: ProgramId,
    buffer: BufferId,
    vertices: Range<u32>,
    bind_group: wgpu::BindGroup,
}

/// [`RenderBackend`] drawing into a window surface with wgpu.
///
/// Draws are recorded with a snapshot of their uniforms and replayed into a
/// single render pass on `present`.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    sampler: wgpu::Sampler,
    programs: HashMap<ProgramId, GpuProgram>,
    buffers: HashMap<BufferId, GpuBuffer>,
    textures: HashMap<TextureId, GpuTexture>,
    bound: HashMap<u32, TextureId>,
    pending: Vec<PendingDraw>,
    clear_color: [f32; 4],
    next_id: u32,
}

impl WgpuBackend {
    /// Create a backend for `window`
    pub async fn new(window: Arc<Window>) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::Unsupported(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::Unsupported("No suitable adapter found".to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::Unsupported("Surface has no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|m| *m == wgpu::CompositeAlphaMode::PreMultiplied)
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    label: Some("Ticker Device"),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::Unsupported(e.to_string()))?;

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Glyph Atlas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        debug!(
            "wgpu backend ready: {:?} {}x{}",
            surface_format, config.width, config.height
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
            sampler,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            bound: HashMap::new(),
            pending: Vec::new(),
            clear_color: [0.0; 4],
            next_id: 0,
        })
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn create_pipeline(
        &self,
        desc: &ProgramDesc,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        if UniformTable::new(desc.uniforms).has_sampler() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.label),
                    entries: &entries,
                });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let mut offset = 0u64;
        let attributes: Vec<wgpu::VertexAttribute> = desc
            .attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| {
                let format = match attribute.components {
                    1 => wgpu::VertexFormat::Float32,
                    2 => wgpu::VertexFormat::Float32x2,
                    3 => wgpu::VertexFormat::Float32x3,
                    _ => wgpu::VertexFormat::Float32x4,
                };
                let attr = wgpu::VertexAttribute {
                    format,
                    offset,
                    shader_location: location as u32,
                };
                offset += format.size();
                attr
            })
            .collect();

        let topology = match desc.primitive {
            Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Primitive::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.stride() as u64 * 4,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            });

        (pipeline, bind_group_layout)
    }

    fn texture_view(&self, unit: u32) -> Result<&wgpu::TextureView, BackendError> {
        self.bound
            .get(&unit)
            .and_then(|t| self.textures.get(t))
            .and_then(|t| t.view.as_ref())
            .ok_or(BackendError::MissingTexture(unit))
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

impl RenderBackend for WgpuBackend {
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let (pipeline, bind_group_layout) = self.create_pipeline(desc);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ProgramLink {
                label: desc.label.to_string(),
                reason: err.to_string(),
            });
        }

        let program = ProgramId(self.next_id());
        self.programs.insert(
            program,
            GpuProgram {
                desc: *desc,
                pipeline,
                bind_group_layout,
                uniforms: UniformTable::new(desc.uniforms),
            },
        );
        debug!("Built program {} as {:?}", desc.label, program);
        Ok(program)
    }

    fn create_buffer(&mut self, label: &str, capacity: usize) -> Result<BufferId, BackendError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (capacity.max(1) * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(self.next_id());
        self.buffers.insert(
            id,
            GpuBuffer {
                buffer,
                capacity,
                len: 0,
            },
        );
        Ok(id)
    }

    fn create_texture(&mut self, label: &str) -> Result<TextureId, BackendError> {
        let id = TextureId(self.next_id());
        self.textures.insert(
            id,
            GpuTexture {
                label: label.to_string(),
                view: None,
            },
        );
        Ok(id)
    }

    fn upload_texture(&mut self, texture: TextureId, image: &AtlasImage) -> Result<(), BackendError> {
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", texture)))?;

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&slot.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        slot.view = Some(gpu_texture.create_view(&TextureViewDescriptor::default()));
        Ok(())
    }

    fn write_buffer(&mut self, buffer: BufferId, data: &[f32]) -> Result<(), BackendError> {
        let slot = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", buffer)))?;
        if data.len() > slot.capacity {
            return Err(BackendError::BufferOverflow {
                len: data.len(),
                capacity: slot.capacity,
            });
        }
        if !data.is_empty() {
            self.queue
                .write_buffer(&slot.buffer, 0, bytemuck::cast_slice(data));
        }
        slot.len = data.len();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.clear_color = color;
        self.pending.clear();
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bound.insert(unit, texture);
    }

    fn set_uniform(
        &mut self,
        program: ProgramId,
        name: &'static str,
        value: UniformValue,
    ) -> Result<(), BackendError> {
        self.programs
            .get_mut(&program)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", program)))?
            .uniforms
            .set(name, value)
    }

    fn draw(
        &mut self,
        program: ProgramId,
        buffer: BufferId,
        vertices: Range<u32>,
    ) -> Result<(), BackendError> {
        let gpu_program = self
            .programs
            .get(&program)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", program)))?;
        let gpu_buffer = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| BackendError::UnknownResource(format!("{:?}", buffer)))?;

        let stride = gpu_program.desc.stride() as usize;
        if vertices.end as usize * stride > gpu_buffer.len {
            return Err(BackendError::DrawOutOfRange);
        }

        let packed = gpu_program.uniforms.pack();
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(gpu_program.desc.label),
                contents: bytemuck::cast_slice(&packed),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        if let Some(unit) = gpu_program.uniforms.sampler_unit() {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(self.texture_view(unit)?),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(gpu_program.desc.label),
            layout: &gpu_program.bind_group_layout,
            entries: &entries,
        });

        self.pending.push(PendingDraw {
            program,
            buffer,
            vertices,
            bind_group,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        let draws = std::mem::take(&mut self.pending);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring and dropping frame");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(BackendError::Surface(e.to_string())),
        };

        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ticker Encoder"),
            });

        {
            let [r, g, b, a] = self.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ticker Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &draws {
                let (Some(program), Some(buffer)) =
                    (self.programs.get(&draw.program), self.buffers.get(&draw.buffer))
                else {
                    continue;
                };
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &draw.bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.buffer.slice(..));
                pass.draw(draw.vertices.clone(), 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.remove(&buffer) {
            slot.buffer.destroy();
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.bound.retain(|_, bound| *bound != texture);
        }
    }
}
