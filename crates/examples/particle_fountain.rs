//! Headless particle fountain
//!
//! A simulation thread steps the system at a fixed tick while the main
//! thread "renders" two in-flight frames through the headless backend.
//! Run with `RUST_LOG=info` (or `trace`) to watch the system work.

use glam::Vec3;
use helio_particles::{
    EmitterDesc, HeadlessBackend, ParticleSystem, ParticleSystemConfig, ParticleView,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const MAX_PARTICLES: usize = 100_000;
const FRAMES_IN_FLIGHT: usize = 2;
const TICK: f32 = 1.0 / 90.0;

fn main() {
    env_logger::init();
    log::info!("Starting headless particle fountain");

    let config = ParticleSystemConfig::new(MAX_PARTICLES)
        .with_frames_in_flight(FRAMES_IN_FLIGHT);
    let backend = HeadlessBackend::new(MAX_PARTICLES, FRAMES_IN_FLIGHT);
    let system = match ParticleSystem::new(config, backend) {
        Ok(system) => system,
        Err(err) => {
            log::error!("Failed to create particle system: {}", err);
            return;
        }
    };

    system.add_emitter(
        EmitterDesc::continuous(2_000.0)
            .with_colors(Vec3::new(1.0, 0.9, 0.3), Vec3::new(1.0, 0.1, 0.0))
            .with_size(0.5),
    );
    let sparks = system.add_emitter(
        EmitterDesc::burst(500)
            .with_position(Vec3::new(20.0, 0.0, 0.0))
            .with_colors(Vec3::ONE, Vec3::new(0.2, 0.4, 1.0))
            .with_size(0.25)
            .with_init(|index, total, p| {
                let angle = index as f32 / total as f32 * std::f32::consts::TAU;
                p.velocity = Vec3::new(angle.cos() * 15.0, 25.0, angle.sin() * 15.0);
                p.life = 2.0;
            }),
    );
    let left = Vec3::new(-20.0, 0.0, 0.0);
    system.add_emitter(EmitterDesc::once(250).with_position(left));

    let running = AtomicBool::new(true);
    let view = ParticleView::perspective(
        Vec3::new(0.0, 30.0, 120.0),
        Vec3::new(0.0, 20.0, 0.0),
        Vec3::Y,
        70f32.to_radians(),
        16.0 / 9.0,
        0.1,
        1000.0,
    );

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut ticks = 0u32;
            while running.load(Ordering::Relaxed) {
                system.step(TICK);
                ticks += 1;
                if ticks % 90 == 0 {
                    if let Some(id) = sparks {
                        system.reset_emitter(id);
                    }
                }
                std::thread::sleep(Duration::from_secs_f32(TICK));
            }
        });

        let start = Instant::now();
        let mut frame = 0usize;
        while start.elapsed() < Duration::from_secs(3) {
            let mut draws = Vec::new();
            match system.draw(frame % FRAMES_IN_FLIGHT, &view, &mut draws) {
                Ok(count) if frame % 60 == 0 => {
                    log::info!("frame {}: {} particles drawn", frame, count);
                }
                Ok(_) => {}
                Err(err) => {
                    log::error!("Draw failed: {}", err);
                    break;
                }
            }
            frame += 1;
            std::thread::sleep(Duration::from_millis(11));
        }

        running.store(false, Ordering::Relaxed);
    });

    let backend = system.destroy();
    log::info!("Done after {} uploads", backend.upload_count());
}
