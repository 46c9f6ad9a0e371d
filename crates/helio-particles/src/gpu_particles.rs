//! GPU-side layouts (must match `shaders/particle.wgsl`)

use crate::particle::Particle;
use crate::view::ParticleView;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Per-instance record: two vec4s, 32 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    /// World-space position
    pub position: [f32; 3],
    /// Billboard edge length in world units
    pub size: f32,
    pub color: [f32; 3],
    pub alpha: f32,
}

impl ParticleInstance {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    /// Instance for a live particle.
    ///
    /// Life drives both the color blend (`start.lerp(end, t)`) and alpha,
    /// clamped to [0, 1] so long-lived particles do not overshoot.
    pub fn from_particle(particle: &Particle) -> Self {
        let t = particle.life.clamp(0.0, 1.0);
        let color = particle.start_color.lerp(particle.end_color, t);
        Self {
            position: particle.position.to_array(),
            size: particle.size,
            color: color.to_array(),
            alpha: t,
        }
    }
}

/// Per-frame constants for the billboard shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ParticleConstants {
    pub view_proj: Mat4,
    /// Camera right axis in world space (w unused)
    pub right: Vec4,
    /// Camera up axis in world space (w unused)
    pub up: Vec4,
}

impl ParticleConstants {
    pub fn from_view(view: &ParticleView) -> Self {
        Self {
            view_proj: view.view_proj(),
            right: view.view.row(0),
            up: view.view.row(1),
        }
    }
}
