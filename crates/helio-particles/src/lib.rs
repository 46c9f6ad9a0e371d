//! Helio Particles - pooled CPU particle simulation with sorted instanced rendering
//!
//! Particles live in a fixed-capacity pool and are spawned by emitters
//! (continuous, burst or one-shot). Every draw compacts the live particles,
//! sorts them back-to-front from the camera and uploads them into the
//! instance buffer owned by the current in-flight frame.
//!
//! - Fixed capacity, spawn failures are silent back-pressure
//! - Drift-free continuous emission
//! - One lock around pool + emitters, draw submission outside the lock
//! - Pluggable GPU backend (`wgpu` or headless)

pub mod backend;
pub mod config;
pub mod emitter;
pub mod gpu_particles;
pub mod headless;
pub mod particle;
pub mod pool;
pub mod sort;
pub mod wgpu_backend;

mod particle_system;
mod view;

pub use backend::ParticleBackend;
pub use config::{ParticleSystemConfig, PoolStrategy};
pub use emitter::{EmitterDesc, EmitterId, EmitterKind, ParticleInit};
pub use gpu_particles::{ParticleConstants, ParticleInstance};
pub use headless::{DrawRecord, HeadlessBackend};
pub use particle::Particle;
pub use particle_system::ParticleSystem;
pub use view::ParticleView;
pub use wgpu_backend::{WgpuDrawTarget, WgpuParticleBackend, WgpuParticleBackendDesc};

/// Result type for particle system operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while creating or drawing a particle system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Frame index {frame} out of range ({frames_in_flight} frames in flight)")]
    FrameOutOfRange {
        frame: usize,
        frames_in_flight: usize,
    },

    #[error("GPU error: {0}")]
    Gpu(String),
}

impl From<wgpu::Error> for Error {
    fn from(err: wgpu::Error) -> Self {
        Error::Gpu(err.to_string())
    }
}
