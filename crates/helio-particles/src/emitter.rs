//! Emitters and their spawn policies

use crate::particle::Particle;
use crate::pool::ParticleStorage;
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;
use std::fmt;

/// Identifier handed out by `add_emitter`, unique for the lifetime of a system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmitterId(pub u32);

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emitter#{}", self.0)
    }
}

/// Spawn policy of an emitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmitterKind {
    /// Spawns `rate` particles per second from a time accumulator
    Continuous { rate: f32 },
    /// Spawns `count` particles every time the emitter is reset
    Burst { count: u32 },
    /// Spawns `count` particles on creation and is not kept
    Once { count: u32 },
}

/// Particle initializer: `(index, total, particle)`.
///
/// The particle arrives with the emitter's colors and size, zero position
/// and velocity. The emitter position is added to whatever position the
/// initializer leaves behind.
pub type ParticleInit = Box<dyn Fn(u32, u32, &mut Particle) + Send + Sync>;

/// Description of an emitter to add to a system
pub struct EmitterDesc {
    pub kind: EmitterKind,
    pub position: Vec3,
    pub start_color: Vec3,
    pub end_color: Vec3,
    pub size: f32,
    pub init: Option<ParticleInit>,
}

impl EmitterDesc {
    pub fn new(kind: EmitterKind) -> Self {
        Self {
            kind,
            position: Vec3::ZERO,
            start_color: Vec3::ONE,
            end_color: Vec3::ONE,
            size: 1.0,
            init: None,
        }
    }

    pub fn continuous(rate: f32) -> Self {
        Self::new(EmitterKind::Continuous { rate })
    }

    pub fn burst(count: u32) -> Self {
        Self::new(EmitterKind::Burst { count })
    }

    pub fn once(count: u32) -> Self {
        Self::new(EmitterKind::Once { count })
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_colors(mut self, start: Vec3, end: Vec3) -> Self {
        self.start_color = start;
        self.end_color = end;
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    /// Replace the default fountain initializer
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(u32, u32, &mut Particle) + Send + Sync + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }
}

impl fmt::Debug for EmitterDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitterDesc")
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("start_color", &self.start_color)
            .field("end_color", &self.end_color)
            .field("size", &self.size)
            .field("init", &self.init.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Default "fountain" kinematics: straight up with a random cylindrical spread
pub fn fountain<R: Rng + ?Sized>(rng: &mut R, particle: &mut Particle) {
    const SEED_RADIUS: f32 = 30.0;
    const MAX_RISE: f32 = 100.0;

    let theta = rng.gen::<f32>() * TAU;
    let r = rng.gen::<f32>() * SEED_RADIUS;

    particle.position = Vec3::ZERO;
    particle.velocity = Vec3::new(r * theta.sin(), rng.gen::<f32>() * MAX_RISE, r * theta.cos());
    // (0.001, 1.0]
    particle.life = 1.0 - rng.gen::<f32>() * 0.999;
}

/// An emitter kept by the registry
pub(crate) struct Emitter {
    pub id: EmitterId,
    pub kind: EmitterKind,
    pub position: Vec3,
    pub start_color: Vec3,
    pub end_color: Vec3,
    pub size: f32,
    pub init: Option<ParticleInit>,
    /// Seconds between continuous spawns, infinite when the rate is not positive
    pub interval: f64,
    /// Kept in f64 so long sessions and large steps do not lose whole intervals
    pub accumulator: f64,
}

impl Emitter {
    pub fn new(id: EmitterId, desc: EmitterDesc) -> Self {
        let interval = match desc.kind {
            EmitterKind::Continuous { rate } if rate > 0.0 && rate.is_finite() => {
                1.0 / f64::from(rate)
            }
            _ => f64::INFINITY,
        };

        Self {
            id,
            kind: desc.kind,
            position: desc.position,
            start_color: desc.start_color,
            end_color: desc.end_color,
            size: desc.size,
            init: desc.init,
            interval,
            accumulator: 0.0,
        }
    }

    /// Spawn `total` particles into `pool`, stopping at the first rejection.
    ///
    /// Returns the number actually spawned.
    pub fn spawn_batch<R: Rng + ?Sized>(
        &self,
        total: u32,
        pool: &mut dyn ParticleStorage,
        rng: &mut R,
    ) -> u32 {
        let template = Particle {
            start_color: self.start_color,
            end_color: self.end_color,
            size: self.size,
            ..Particle::DEAD
        };

        for index in 0..total {
            let mut particle = template;
            match &self.init {
                Some(init) => init(index, total, &mut particle),
                None => fountain(rng, &mut particle),
            }
            particle.position += self.position;

            if !pool.try_acquire(particle) {
                return index;
            }
        }
        total
    }

    /// Add `dt` to the accumulator and drain every whole interval it holds.
    ///
    /// Returns how many particles are due. At most one interval is left
    /// behind, whatever the caller does with the due count. Only continuous
    /// emitters ever accumulate.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !matches!(self.kind, EmitterKind::Continuous { .. }) || !self.interval.is_finite() {
            return 0;
        }

        self.accumulator += f64::from(dt);
        if self.accumulator <= self.interval {
            return 0;
        }

        // Largest n with accumulator - n * interval still above zero
        let intervals = (self.accumulator / self.interval).ceil() - 1.0;
        self.accumulator = (self.accumulator - intervals * self.interval).max(0.0);
        if intervals >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            intervals as u32
        }
    }
}

/// Dynamic list of retained emitters plus the id counter
pub(crate) struct EmitterRegistry {
    emitters: Vec<Emitter>,
    next_id: u32,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        Self {
            emitters: Vec::new(),
            next_id: 0,
        }
    }

    /// Next id, or None once the id space is used up
    pub fn allocate_id(&mut self) -> Option<EmitterId> {
        if self.next_id == u32::MAX {
            return None;
        }
        let id = EmitterId(self.next_id);
        self.next_id += 1;
        Some(id)
    }

    pub fn insert(&mut self, emitter: Emitter) {
        self.emitters.push(emitter);
    }

    pub fn remove(&mut self, id: EmitterId) -> Option<Emitter> {
        let index = self.emitters.iter().position(|e| e.id == id)?;
        Some(self.emitters.remove(index))
    }

    pub fn get(&self, id: EmitterId) -> Option<&Emitter> {
        self.emitters.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EmitterId) -> Option<&mut Emitter> {
        self.emitters.iter_mut().find(|e| e.id == id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Emitter> {
        self.emitters.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&mut self, next: u32) {
        self.next_id = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::LinearScanPool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fountain_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let mut p = Particle::DEAD;
            fountain(&mut rng, &mut p);

            assert_eq!(p.position, Vec3::ZERO);
            assert!(p.life > 0.001 && p.life <= 1.0, "life {}", p.life);
            assert!(p.velocity.y >= 0.0 && p.velocity.y < 100.0);
            let radial = (p.velocity.x * p.velocity.x + p.velocity.z * p.velocity.z).sqrt();
            assert!(radial < 30.0 + 1e-3);
        }
    }

    #[test]
    fn batch_offsets_by_emitter_position_after_init() {
        let desc = EmitterDesc::burst(3)
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_colors(Vec3::X, Vec3::Y)
            .with_size(2.0)
            .with_init(|index, total, p| {
                assert_eq!(total, 3);
                p.position = Vec3::new(0.0, index as f32, 0.0);
                p.life = 5.0;
            });
        let emitter = Emitter::new(EmitterId(0), desc);
        let mut pool = LinearScanPool::new(8);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(emitter.spawn_batch(3, &mut pool, &mut rng), 3);
        let slots = pool.slots();
        for i in 0..3 {
            assert_eq!(slots[i].position, Vec3::new(10.0, i as f32, 0.0));
            assert_eq!(slots[i].start_color, Vec3::X);
            assert_eq!(slots[i].end_color, Vec3::Y);
            assert_eq!(slots[i].size, 2.0);
        }
    }

    #[test]
    fn batch_stops_when_pool_is_full() {
        let emitter = Emitter::new(EmitterId(0), EmitterDesc::burst(10));
        let mut pool = LinearScanPool::new(4);
        let mut rng = StdRng::seed_from_u64(2);

        assert_eq!(emitter.spawn_batch(10, &mut pool, &mut rng), 4);
        assert_eq!(pool.live_count(), 4);
    }

    #[test]
    fn accumulator_never_resets() {
        let mut emitter = Emitter::new(EmitterId(0), EmitterDesc::continuous(4.0));

        assert_eq!(emitter.advance(0.1), 0);
        assert_eq!(emitter.advance(0.3), 1);
        assert!((emitter.accumulator - 0.15).abs() < 1e-6);
        assert_eq!(emitter.advance(1.0), 4);
    }

    #[test]
    fn exact_multiples_leave_one_interval_behind() {
        let mut emitter = Emitter::new(EmitterId(0), EmitterDesc::continuous(4.0));

        assert_eq!(emitter.advance(0.25), 0);
        assert_eq!(emitter.advance(0.75), 3);
        assert_eq!(emitter.accumulator, 0.25);
    }

    #[test]
    fn huge_steps_drain_in_one_go() {
        let mut slow = Emitter::new(EmitterId(0), EmitterDesc::continuous(1_000.0));
        let due = slow.advance(100_000.0);
        assert!((99_999_999..=100_000_000).contains(&due), "due {due}");
        assert!(slow.accumulator <= slow.interval * 1.001);

        let mut fast = Emitter::new(EmitterId(1), EmitterDesc::continuous(1.0e9));
        assert!(fast.advance(0.05) > 49_000_000);
        assert!(fast.accumulator <= fast.interval * 1.001);

        let mut saturated = Emitter::new(EmitterId(2), EmitterDesc::continuous(f32::MAX));
        assert_eq!(saturated.advance(f32::MAX), u32::MAX);
    }

    #[test]
    fn non_continuous_and_zero_rate_never_accumulate() {
        let mut burst = Emitter::new(EmitterId(0), EmitterDesc::burst(5));
        let mut idle = Emitter::new(EmitterId(1), EmitterDesc::continuous(0.0));

        assert_eq!(burst.advance(10.0), 0);
        assert_eq!(idle.advance(10.0), 0);
        assert_eq!(idle.accumulator, 0.0);
    }

    #[test]
    fn registry_ids_are_monotonic_and_exhaust() {
        let mut registry = EmitterRegistry::new();
        assert_eq!(registry.allocate_id(), Some(EmitterId(0)));
        assert_eq!(registry.allocate_id(), Some(EmitterId(1)));

        registry.set_next_id(u32::MAX - 1);
        assert_eq!(registry.allocate_id(), Some(EmitterId(u32::MAX - 1)));
        assert_eq!(registry.allocate_id(), None);
    }

    #[test]
    fn registry_remove_by_id() {
        let mut registry = EmitterRegistry::new();
        for _ in 0..3 {
            let id = registry.allocate_id().unwrap();
            registry.insert(Emitter::new(id, EmitterDesc::burst(1)));
        }

        assert!(registry.remove(EmitterId(1)).is_some());
        assert!(registry.remove(EmitterId(1)).is_none());
        assert_eq!(registry.len(), 2);
        assert!(registry.get(EmitterId(2)).is_some());
    }
}
