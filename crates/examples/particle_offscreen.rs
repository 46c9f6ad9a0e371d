//! Draw a particle burst into an offscreen target with the wgpu backend

use glam::Vec3;
use helio_particles::{
    EmitterDesc, ParticleSystem, ParticleSystemConfig, ParticleView, WgpuDrawTarget,
    WgpuParticleBackend, WgpuParticleBackendDesc,
};
use std::sync::Arc;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const MAX_PARTICLES: usize = 50_000;
const FRAMES_IN_FLIGHT: usize = 3;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn create_target(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
) -> wgpu::TextureView {
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

fn main() {
    env_logger::init();
    log::info!("Starting offscreen particle example");

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter_options = wgpu::RequestAdapterOptions::default();
    let Some(adapter) = pollster::block_on(instance.request_adapter(&adapter_options)) else {
        log::error!("No suitable GPU adapter found");
        return;
    };
    log::info!("Using adapter: {:?}", adapter.get_info().name);

    let (device, queue) = match pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Particle Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    )) {
        Ok(pair) => pair,
        Err(err) => {
            log::error!("Failed to create device: {}", err);
            return;
        }
    };
    let device = Arc::new(device);
    let queue = Arc::new(queue);

    let backend_desc = WgpuParticleBackendDesc::new(MAX_PARTICLES, COLOR_FORMAT)
        .with_frames_in_flight(FRAMES_IN_FLIGHT)
        .with_depth(DEPTH_FORMAT, wgpu::CompareFunction::LessEqual);
    let config = ParticleSystemConfig::new(MAX_PARTICLES)
        .with_frames_in_flight(FRAMES_IN_FLIGHT);
    let system = WgpuParticleBackend::new(device.clone(), queue.clone(), backend_desc)
        .and_then(|backend| ParticleSystem::new(config, backend));
    let system = match system {
        Ok(system) => system,
        Err(err) => {
            log::error!("Failed to create particle system: {}", err);
            return;
        }
    };

    if let Some(id) = system.add_emitter(
        EmitterDesc::burst(5_000)
            .with_colors(Vec3::new(1.0, 0.8, 0.2), Vec3::new(0.8, 0.1, 0.0))
            .with_size(0.4),
    ) {
        system.reset_emitter(id);
    }

    let color = create_target(&device, "Particle Color Target", COLOR_FORMAT);
    let depth = create_target(&device, "Particle Depth Target", DEPTH_FORMAT);
    let view = ParticleView::perspective(
        Vec3::new(0.0, 25.0, 90.0),
        Vec3::new(0.0, 25.0, 0.0),
        Vec3::Y,
        60f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        500.0,
    );

    for frame in 0..30usize {
        system.step(1.0 / 60.0);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Frame Encoder"),
        });
        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        let mut target = WgpuDrawTarget {
            encoder: &mut encoder,
            color: &color,
            depth: Some(&depth),
        };
        match system.draw(frame % FRAMES_IN_FLIGHT, &view, &mut target) {
            Ok(count) => log::info!("frame {}: {} particles", frame, count),
            Err(err) => {
                log::error!("Draw failed: {}", err);
                return;
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        device.poll(wgpu::Maintain::Wait);
    }

    log::info!("Offscreen particle example finished");
}
