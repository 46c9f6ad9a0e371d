//! Particle system configuration

use crate::pool::{FreeListPool, LinearScanPool, ParticleStorage};
use crate::{Error, Result};
use glam::Vec3;

/// How the pool finds a free slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolStrategy {
    /// Scan from slot 0 for the first dead particle
    #[default]
    LinearScan,
    /// Stack of free indices, O(1) acquire
    FreeList,
}

impl PoolStrategy {
    pub(crate) fn build(self, capacity: usize) -> Box<dyn ParticleStorage> {
        match self {
            PoolStrategy::LinearScan => Box::new(LinearScanPool::new(capacity)),
            PoolStrategy::FreeList => Box::new(FreeListPool::new(capacity)),
        }
    }
}

/// Particle system configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSystemConfig {
    /// Pool capacity; the backend must hold at least this many instances per frame
    pub max_particles: usize,
    pub gravity: Vec3,
    pub frames_in_flight: usize,
    pub pool_strategy: PoolStrategy,
    /// Seed for the default initializer, entropy when `None`
    pub seed: Option<u64>,
}

impl ParticleSystemConfig {
    pub fn new(max_particles: usize) -> Self {
        Self {
            max_particles,
            ..Default::default()
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    pub fn with_pool_strategy(mut self, strategy: PoolStrategy) -> Self {
        self.pool_strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_particles == 0 {
            return Err(Error::InvalidConfiguration("max_particles must be non-zero".into()));
        }
        if self.max_particles > u32::MAX as usize {
            return Err(Error::InvalidConfiguration(format!(
                "max_particles {} exceeds the u32 instance range",
                self.max_particles
            )));
        }
        if self.frames_in_flight == 0 {
            return Err(Error::InvalidConfiguration("frames_in_flight must be non-zero".into()));
        }
        if !self.gravity.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        Ok(())
    }
}

impl Default for ParticleSystemConfig {
    fn default() -> Self {
        Self {
            max_particles: 100_000,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            frames_in_flight: 2,
            pool_strategy: PoolStrategy::LinearScan,
            seed: None,
        }
    }
}
