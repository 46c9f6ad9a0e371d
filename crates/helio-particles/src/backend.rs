//! Graphics collaborator interface

use crate::gpu_particles::{ParticleConstants, ParticleInstance};
use crate::Result;

/// GPU side of a particle system: one instance buffer per in-flight frame
/// plus the draw that consumes it.
///
/// `upload` runs while the system lock is held and must not block on the
/// GPU. `draw` runs after the lock is released and only reads the buffer
/// the matching `upload` filled.
pub trait ParticleBackend: Send + Sync {
    /// What `draw` records into (an encoder, a command list, ...)
    type Target<'a>;

    /// Instances each frame buffer can hold
    fn instance_capacity(&self) -> usize;

    /// Number of per-frame buffers
    fn frames_in_flight(&self) -> usize;

    /// Copy `instances` into the buffer of `frame`
    fn upload(&self, frame: usize, instances: &[ParticleInstance]) -> Result<()>;

    /// Issue one instanced draw of `instance_count` billboards from `frame`
    fn draw(
        &self,
        target: &mut Self::Target<'_>,
        frame: usize,
        instance_count: u32,
        constants: &ParticleConstants,
    ) -> Result<()>;
}
