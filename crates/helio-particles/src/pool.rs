//! Fixed-capacity particle storage
//!
//! The pool never grows. A spawn that finds no free slot is dropped, which
//! is the back-pressure policy of the whole system: emitters keep running
//! and simply lose particles while the pool is saturated.

use crate::particle::Particle;
use glam::Vec3;

/// Backing store for all particles of a system.
///
/// Implementations must keep `live_count` in sync with the slots' life
/// values and must fail `try_acquire` without mutating anything when the
/// pool is full.
pub trait ParticleStorage: Send {
    /// Number of slots, fixed at construction
    fn capacity(&self) -> usize;

    /// Cached number of live particles
    fn live_count(&self) -> usize;

    /// Write `particle` into a free slot. Returns false if none is free.
    fn try_acquire(&mut self, particle: Particle) -> bool;

    /// Advance every slot by `dt` and refresh the live-count cache
    fn integrate(&mut self, gravity: Vec3, dt: f32);

    /// All slots, live or dead, in slot order
    fn slots(&self) -> &[Particle];
}

/// Pool that finds free slots by scanning from slot 0.
///
/// Particles tend to die roughly in spawn order, so the first dead slot is
/// usually close to the front even though the worst case is O(capacity).
pub struct LinearScanPool {
    particles: Vec<Particle>,
    live: usize,
}

impl LinearScanPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::DEAD; capacity],
            live: 0,
        }
    }
}

impl ParticleStorage for LinearScanPool {
    fn capacity(&self) -> usize {
        self.particles.len()
    }

    fn live_count(&self) -> usize {
        self.live
    }

    fn try_acquire(&mut self, particle: Particle) -> bool {
        if self.live >= self.particles.len() {
            return false;
        }

        match self.particles.iter_mut().find(|p| !p.is_alive()) {
            Some(slot) => {
                *slot = particle;
                if particle.is_alive() {
                    self.live += 1;
                }
                true
            }
            None => false,
        }
    }

    fn integrate(&mut self, gravity: Vec3, dt: f32) {
        let mut live = 0;
        for p in &mut self.particles {
            p.integrate(gravity, dt);
            if p.is_alive() {
                live += 1;
            }
        }
        self.live = live;
    }

    fn slots(&self) -> &[Particle] {
        &self.particles
    }
}

/// Pool that keeps a stack of free slot indices for O(1) acquire.
///
/// Same failure semantics as [`LinearScanPool`]; slots are handed out
/// lowest-index first while the pool is fresh.
pub struct FreeListPool {
    particles: Vec<Particle>,
    free: Vec<u32>,
}

impl FreeListPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: vec![Particle::DEAD; capacity],
            free: (0..capacity as u32).rev().collect(),
        }
    }
}

impl ParticleStorage for FreeListPool {
    fn capacity(&self) -> usize {
        self.particles.len()
    }

    fn live_count(&self) -> usize {
        self.particles.len() - self.free.len()
    }

    fn try_acquire(&mut self, particle: Particle) -> bool {
        // A particle spawned already dead occupies nothing.
        if !particle.is_alive() {
            return !self.free.is_empty();
        }

        match self.free.pop() {
            Some(index) => {
                self.particles[index as usize] = particle;
                true
            }
            None => false,
        }
    }

    fn integrate(&mut self, gravity: Vec3, dt: f32) {
        for (index, p) in self.particles.iter_mut().enumerate() {
            if p.integrate(gravity, dt) {
                self.free.push(index as u32);
            }
        }
    }

    fn slots(&self) -> &[Particle] {
        &self.particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alive(life: f32) -> Particle {
        Particle {
            life,
            ..Particle::DEAD
        }
    }

    fn pools(capacity: usize) -> Vec<Box<dyn ParticleStorage>> {
        vec![
            Box::new(LinearScanPool::new(capacity)),
            Box::new(FreeListPool::new(capacity)),
        ]
    }

    #[test]
    fn acquire_fills_until_capacity() {
        for mut pool in pools(3) {
            assert!(pool.try_acquire(alive(1.0)));
            assert!(pool.try_acquire(alive(1.0)));
            assert!(pool.try_acquire(alive(1.0)));
            assert_eq!(pool.live_count(), 3);
            assert!(!pool.try_acquire(alive(1.0)));
            assert_eq!(pool.live_count(), 3);
        }
    }

    #[test]
    fn full_pool_is_not_mutated() {
        for mut pool in pools(2) {
            pool.try_acquire(alive(0.5));
            pool.try_acquire(alive(0.75));
            let before = pool.slots().to_vec();

            let mut intruder = alive(9.0);
            intruder.position = Vec3::splat(42.0);
            assert!(!pool.try_acquire(intruder));
            assert_eq!(pool.slots(), before.as_slice());
        }
    }

    #[test]
    fn dead_slots_are_recycled() {
        for mut pool in pools(2) {
            pool.try_acquire(alive(0.1));
            pool.try_acquire(alive(1.0));
            pool.integrate(Vec3::ZERO, 0.2);
            assert_eq!(pool.live_count(), 1);

            assert!(pool.try_acquire(alive(2.0)));
            assert_eq!(pool.live_count(), 2);
            assert_eq!(pool.slots()[0].life, 2.0);
        }
    }

    #[test]
    fn linear_scan_takes_first_dead_slot() {
        let mut pool = LinearScanPool::new(4);
        for life in [1.0, 0.1, 1.0, 0.1] {
            pool.try_acquire(alive(life));
        }
        pool.integrate(Vec3::ZERO, 0.5);

        assert!(pool.try_acquire(alive(3.0)));
        assert_eq!(pool.slots()[1].life, 3.0);
        assert!(pool.slots()[3].life <= 0.0);
    }

    #[test]
    fn integrate_decays_live_particles_exactly() {
        for mut pool in pools(4) {
            pool.try_acquire(alive(0.75));
            pool.try_acquire(alive(0.5));
            pool.integrate(Vec3::new(0.0, -9.81, 0.0), 0.25);

            let lives: Vec<f32> = pool
                .slots()
                .iter()
                .take(2)
                .map(|p| p.life)
                .collect();
            assert_eq!(lives, vec![0.5, 0.25]);
        }
    }
}
