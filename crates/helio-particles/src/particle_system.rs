//! The particle system: pool + emitters behind one lock, fed to a backend

use crate::backend::ParticleBackend;
use crate::config::ParticleSystemConfig;
use crate::emitter::{Emitter, EmitterDesc, EmitterId, EmitterKind, EmitterRegistry};
use crate::gpu_particles::{ParticleConstants, ParticleInstance};
use crate::pool::ParticleStorage;
use crate::sort::InstanceSorter;
use crate::view::ParticleView;
use crate::{Error, Result};
use glam::Vec3;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};

/// Everything the lock protects
struct SystemState {
    pool: Box<dyn ParticleStorage>,
    emitters: EmitterRegistry,
    gravity: Vec3,
    rng: StdRng,
    sorter: InstanceSorter,
}

/// Pooled particle system drawing through backend `B`.
///
/// All mutating calls and the collection phase of [`draw`](Self::draw)
/// serialize on a single lock. Draw submission happens after the lock is
/// released, against the frame buffer the same call just filled.
pub struct ParticleSystem<B: ParticleBackend> {
    state: Mutex<SystemState>,
    backend: B,
    capacity: usize,
    frames_in_flight: usize,
    last_instance_count: AtomicU32,
}

impl<B: ParticleBackend> ParticleSystem<B> {
    /// Create a system over `backend`.
    ///
    /// Fails if the configuration is degenerate or the backend's per-frame
    /// buffers are smaller than the pool or fewer than requested.
    pub fn new(config: ParticleSystemConfig, backend: B) -> Result<Self> {
        config.validate()?;

        if backend.instance_capacity() < config.max_particles {
            return Err(Error::InvalidConfiguration(format!(
                "backend holds {} instances per frame, pool needs {}",
                backend.instance_capacity(),
                config.max_particles
            )));
        }
        if backend.frames_in_flight() < config.frames_in_flight {
            return Err(Error::InvalidConfiguration(format!(
                "backend has {} frame buffers, {} frames in flight requested",
                backend.frames_in_flight(),
                config.frames_in_flight
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::info!("Creating particle system");
        log::info!(
            "  Capacity: {} particles ({:?})",
            config.max_particles,
            config.pool_strategy
        );
        log::info!("  Frames in flight: {}", config.frames_in_flight);

        Ok(Self {
            state: Mutex::new(SystemState {
                pool: config.pool_strategy.build(config.max_particles),
                emitters: EmitterRegistry::new(),
                gravity: config.gravity,
                rng,
                sorter: InstanceSorter::with_capacity(config.max_particles),
            }),
            backend,
            capacity: config.max_particles,
            frames_in_flight: config.frames_in_flight,
            last_instance_count: AtomicU32::new(0),
        })
    }

    /// Add an emitter.
    ///
    /// `Once` emitters spawn immediately and are not kept; their id is still
    /// returned but refers to nothing afterwards. Returns `None` only when
    /// the id space is exhausted.
    pub fn add_emitter(&self, desc: EmitterDesc) -> Option<EmitterId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(id) = state.emitters.allocate_id() else {
            log::warn!("Emitter id space exhausted, dropping {:?}", desc.kind);
            return None;
        };

        let emitter = Emitter::new(id, desc);
        let kind = emitter.kind;
        match kind {
            EmitterKind::Once { count } => {
                let spawned = emitter.spawn_batch(count, state.pool.as_mut(), &mut state.rng);
                log::debug!("One-shot {} spawned {}/{} particles", id, spawned, count);
            }
            _ => {
                log::debug!("Added {} ({:?})", id, kind);
                state.emitters.insert(emitter);
            }
        }

        Some(id)
    }

    /// Remove a burst or continuous emitter. Its particles live on.
    pub fn delete_emitter(&self, id: EmitterId) -> bool {
        let removed = self.state.lock().emitters.remove(id).is_some();
        if removed {
            log::debug!("Deleted {}", id);
        } else {
            log::warn!("delete_emitter: unknown {}", id);
        }
        removed
    }

    /// Trigger a burst emitter. No-op (false) for any other id.
    pub fn reset_emitter(&self, id: EmitterId) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(emitter) = state.emitters.get(id) else {
            log::warn!("reset_emitter: unknown {}", id);
            return false;
        };
        let EmitterKind::Burst { count } = emitter.kind else {
            return false;
        };

        let spawned = emitter.spawn_batch(count, state.pool.as_mut(), &mut state.rng);
        log::debug!("Burst {} spawned {}/{} particles", id, spawned, count);
        true
    }

    pub fn set_emitter_position(&self, id: EmitterId, position: Vec3) -> bool {
        match self.state.lock().emitters.get_mut(id) {
            Some(emitter) => {
                emitter.position = position;
                true
            }
            None => {
                log::warn!("set_emitter_position: unknown {}", id);
                false
            }
        }
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Every particle is integrated before any continuous emitter spawns,
    /// so particles born this tick start from their initial state.
    pub fn step(&self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("Ignoring particle step with dt = {}", dt);
            return;
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.pool.integrate(state.gravity, dt);

        for emitter in state.emitters.iter_mut() {
            let due = emitter.advance(dt);
            // Whatever does not fit is dropped; the accumulator is already drained.
            let free = state
                .pool
                .capacity()
                .saturating_sub(state.pool.live_count());
            let batch = due.min(u32::try_from(free).unwrap_or(u32::MAX));
            if batch > 0 {
                emitter.spawn_batch(batch, state.pool.as_mut(), &mut state.rng);
            }
            if batch < due {
                log::trace!(
                    "{} dropped {} particles, pool full",
                    emitter.id,
                    due - batch
                );
            }
        }

        log::trace!("Particle step {:.4}s, {} live", dt, state.pool.live_count());
    }

    /// Sort live particles for `view`, upload them into `frame`'s buffer and
    /// draw them into `target`. Returns the instance count (0 skips both
    /// the upload and the draw).
    pub fn draw(
        &self,
        frame: usize,
        view: &ParticleView,
        target: &mut B::Target<'_>,
    ) -> Result<u32> {
        if frame >= self.frames_in_flight {
            return Err(Error::FrameOutOfRange {
                frame,
                frames_in_flight: self.frames_in_flight,
            });
        }

        let count = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let instances = state.sorter.collect(state.pool.slots(), view.position);
            debug_assert!(instances.len() <= self.backend.instance_capacity());
            let count = instances.len() as u32;

            if count > 0 {
                self.backend.upload(frame, instances)?;
            }
            count
        };

        self.last_instance_count.store(count, Ordering::Relaxed);
        if count == 0 {
            return Ok(0);
        }

        log::trace!("Drawing {} particles from frame {}", count, frame);
        let constants = ParticleConstants::from_view(view);
        self.backend.draw(target, frame, count, &constants)?;
        Ok(count)
    }

    /// Sorted instances for `view` without touching the backend
    pub fn snapshot_instances(&self, view: &ParticleView) -> Vec<ParticleInstance> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.sorter.collect(state.pool.slots(), view.position).to_vec()
    }

    pub fn set_gravity(&self, gravity: Vec3) {
        self.state.lock().gravity = gravity;
    }

    pub fn gravity(&self) -> Vec3 {
        self.state.lock().gravity
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().pool.live_count()
    }

    pub fn emitter_count(&self) -> usize {
        self.state.lock().emitters.len()
    }

    pub fn contains_emitter(&self, id: EmitterId) -> bool {
        self.state.lock().emitters.get(id).is_some()
    }

    pub fn emitter_kind(&self, id: EmitterId) -> Option<EmitterKind> {
        self.state.lock().emitters.get(id).map(|e| e.kind)
    }

    /// Pool capacity. Lock-free.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock-free.
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Instance count of the most recent draw. Lock-free.
    pub fn last_instance_count(&self) -> u32 {
        self.last_instance_count.load(Ordering::Relaxed)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tear down the system, returning the backend
    pub fn destroy(self) -> B {
        log::info!(
            "Destroying particle system ({} live particles, {} emitters)",
            self.live_count(),
            self.emitter_count()
        );
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;

    fn system(capacity: usize) -> ParticleSystem<HeadlessBackend> {
        let config = ParticleSystemConfig::new(capacity).with_seed(42);
        ParticleSystem::new(config, HeadlessBackend::new(capacity, 2)).unwrap()
    }

    #[test]
    fn rejects_undersized_backend() {
        let config = ParticleSystemConfig::new(64);
        let result = ParticleSystem::new(config, HeadlessBackend::new(32, 2));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_too_few_frame_buffers() {
        let config = ParticleSystemConfig::new(8).with_frames_in_flight(3);
        assert!(ParticleSystem::new(config, HeadlessBackend::new(8, 2)).is_err());
    }

    #[test]
    fn bad_dt_is_ignored() {
        let system = system(16);
        system.add_emitter(EmitterDesc::once(4).with_init(|_, _, p| p.life = 1.0));

        system.step(f32::NAN);
        system.step(-1.0);
        assert_eq!(system.live_count(), 4);
    }

    #[test]
    fn draw_rejects_unknown_frame() {
        let system = system(4);
        let mut log = Vec::new();
        let err = system.draw(2, &ParticleView::default(), &mut log).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameOutOfRange {
                frame: 2,
                frames_in_flight: 2
            }
        ));
    }

    #[test]
    fn reset_is_burst_only() {
        let system = system(16);
        let continuous = system.add_emitter(EmitterDesc::continuous(5.0)).unwrap();

        assert!(!system.reset_emitter(continuous));
        assert_eq!(system.live_count(), 0);
    }

    #[test]
    fn emitter_kind_reflects_retained_emitters() {
        let system = system(16);
        let burst = system.add_emitter(EmitterDesc::burst(3)).unwrap();
        let once = system.add_emitter(EmitterDesc::once(3)).unwrap();

        assert_eq!(system.emitter_kind(burst), Some(EmitterKind::Burst { count: 3 }));
        assert_eq!(system.emitter_kind(once), None);
        assert_ne!(burst, once);
    }

    #[test]
    fn gravity_is_adjustable() {
        let system = system(4);
        system.set_gravity(Vec3::new(0.0, -1.62, 0.0));
        assert_eq!(system.gravity(), Vec3::new(0.0, -1.62, 0.0));
    }
}
