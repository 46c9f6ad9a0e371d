//! wgpu backend - per-frame instance buffers and the billboard pipeline

use crate::backend::ParticleBackend;
use crate::gpu_particles::{ParticleConstants, ParticleInstance};
use crate::{Error, Result};
use std::sync::Arc;

/// Creation parameters for [`WgpuParticleBackend`]
#[derive(Debug, Clone)]
pub struct WgpuParticleBackendDesc {
    /// Instances per frame buffer; match the system's `max_particles`
    pub capacity: usize,
    pub frames_in_flight: usize,
    pub color_format: wgpu::TextureFormat,
    /// Depth-tested (never written) when set
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_compare: wgpu::CompareFunction,
}

impl WgpuParticleBackendDesc {
    pub fn new(capacity: usize, color_format: wgpu::TextureFormat) -> Self {
        Self {
            capacity,
            frames_in_flight: 2,
            color_format,
            depth_format: None,
            depth_compare: wgpu::CompareFunction::GreaterEqual,
        }
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_depth(
        mut self,
        format: wgpu::TextureFormat,
        compare: wgpu::CompareFunction,
    ) -> Self {
        self.depth_format = Some(format);
        self.depth_compare = compare;
        self
    }
}

/// Where a frame's particles are drawn: the pass loads and stores both
/// attachments, so it can follow opaque geometry in the same encoder.
pub struct WgpuDrawTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color: &'a wgpu::TextureView,
    pub depth: Option<&'a wgpu::TextureView>,
}

/// Buffers owned by one in-flight frame
struct FrameResources {
    instance_buffer: wgpu::Buffer,
    constants_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuParticleBackend {
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    frames: Vec<FrameResources>,
    capacity: usize,
    has_depth: bool,
}

impl WgpuParticleBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        desc: WgpuParticleBackendDesc,
    ) -> Result<Self> {
        if desc.capacity == 0 || desc.frames_in_flight == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "wgpu particle backend needs capacity and frames, got {} x {}",
                desc.frames_in_flight, desc.capacity
            )));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Constants Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ParticleConstants>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let instance_bytes = ParticleInstance::STRIDE * desc.capacity as u64;
        let frames = (0..desc.frames_in_flight)
            .map(|_| {
                let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Particle Instance Buffer"),
                    size: instance_bytes,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let constants_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Particle Constants Buffer"),
                    size: std::mem::size_of::<ParticleConstants>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Particle Constants Bind Group"),
                    layout: &bind_group_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: constants_buffer.as_entire_binding(),
                    }],
                });
                FrameResources {
                    instance_buffer,
                    constants_buffer,
                    bind_group,
                }
            })
            .collect();

        let pipeline = build_pipeline(&device, &bind_group_layout, &desc);

        if let Some(err) = pop_validation_scope(&device) {
            return Err(err.into());
        }

        log::info!(
            "Particle backend created: {} frames x {} instances ({} bytes each)",
            desc.frames_in_flight,
            desc.capacity,
            instance_bytes
        );

        Ok(Self {
            queue,
            pipeline,
            frames,
            capacity: desc.capacity,
            has_depth: desc.depth_format.is_some(),
        })
    }

    fn frame(&self, frame: usize) -> Result<&FrameResources> {
        self.frames.get(frame).ok_or(Error::FrameOutOfRange {
            frame,
            frames_in_flight: self.frames.len(),
        })
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    desc: &WgpuParticleBackendDesc,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Particle Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/particle.wgsl").into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Particle Pipeline Layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    // Additive: src * alpha + dst
    let additive = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Particle Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: ParticleInstance::STRIDE, // 2 × vec4 = 32 bytes
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    // position (vec3) + size (f32)
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x4,
                        offset: 0,
                        shader_location: 0,
                    },
                    // color (vec3) + alpha (f32)
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x4,
                        offset: 16,
                        shader_location: 1,
                    },
                ],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.color_format,
                blend: Some(wgpu::BlendState {
                    color: additive,
                    alpha: additive,
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: desc.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: false,
            depth_compare: desc.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(not(target_arch = "wasm32"))]
fn pop_validation_scope(device: &wgpu::Device) -> Option<wgpu::Error> {
    pollster::block_on(device.pop_error_scope())
}

// Errors surface through the device's uncaptured error handler on the web.
#[cfg(target_arch = "wasm32")]
fn pop_validation_scope(device: &wgpu::Device) -> Option<wgpu::Error> {
    let _ = device.pop_error_scope();
    None
}

impl ParticleBackend for WgpuParticleBackend {
    type Target<'a> = WgpuDrawTarget<'a>;

    fn instance_capacity(&self) -> usize {
        self.capacity
    }

    fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    fn upload(&self, frame: usize, instances: &[ParticleInstance]) -> Result<()> {
        if instances.len() > self.capacity {
            return Err(Error::Gpu(format!(
                "upload of {} instances exceeds buffer capacity {}",
                instances.len(),
                self.capacity
            )));
        }
        let resources = self.frame(frame)?;
        let bytes: &[u8] = bytemuck::cast_slice(instances);
        self.queue.write_buffer(&resources.instance_buffer, 0, bytes);
        Ok(())
    }

    fn draw(
        &self,
        target: &mut Self::Target<'_>,
        frame: usize,
        instance_count: u32,
        constants: &ParticleConstants,
    ) -> Result<()> {
        if instance_count == 0 {
            return Ok(());
        }
        if self.has_depth && target.depth.is_none() {
            return Err(Error::Gpu("missing depth attachment".into()));
        }

        let resources = self.frame(frame)?;
        let bytes = bytemuck::bytes_of(constants);
        self.queue.write_buffer(&resources.constants_buffer, 0, bytes);

        let depth_stencil_attachment = if self.has_depth {
            target.depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            })
        } else {
            None
        };

        let mut pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let instance_bytes = ParticleInstance::STRIDE * instance_count as u64;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[]);
        pass.set_vertex_buffer(0, resources.instance_buffer.slice(..instance_bytes));
        pass.draw(0..4, 0..instance_count);

        Ok(())
    }
}
