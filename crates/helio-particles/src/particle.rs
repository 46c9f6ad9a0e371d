//! Simulated particle state

use glam::Vec3;

/// A single simulated particle.
///
/// `life` is the remaining lifetime in seconds and the only liveness signal:
/// a slot whose life is `<= 0` is free and will be overwritten by the next
/// spawn that lands on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub start_color: Vec3,
    pub end_color: Vec3,
    pub size: f32,
    pub life: f32,
}

impl Particle {
    /// A dead particle, used to fill fresh pool slots
    pub const DEAD: Self = Self {
        position: Vec3::ZERO,
        velocity: Vec3::ZERO,
        start_color: Vec3::ZERO,
        end_color: Vec3::ZERO,
        size: 0.0,
        life: -1.0,
    };

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }

    /// Advance one tick: gravity then velocity for live particles, age for all.
    ///
    /// Returns true when this tick killed the particle.
    pub fn integrate(&mut self, gravity: Vec3, dt: f32) -> bool {
        let was_alive = self.is_alive();
        if was_alive {
            self.velocity += gravity * dt;
            self.position += self.velocity * dt;
        }
        self.life -= dt;
        was_alive && !self.is_alive()
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::DEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrate_applies_gravity_before_position() {
        let mut p = Particle {
            life: 1.0,
            velocity: Vec3::new(1.0, 0.0, 0.0),
            ..Particle::DEAD
        };
        let died = p.integrate(Vec3::new(0.0, -10.0, 0.0), 0.5);

        assert!(!died);
        assert_eq!(p.velocity, Vec3::new(1.0, -5.0, 0.0));
        assert_eq!(p.position, Vec3::new(0.5, -2.5, 0.0));
        assert_eq!(p.life, 0.5);
    }

    #[test]
    fn dead_particles_only_age() {
        let mut p = Particle {
            velocity: Vec3::ONE,
            ..Particle::DEAD
        };
        let died = p.integrate(Vec3::new(0.0, -9.81, 0.0), 0.25);

        assert!(!died);
        assert_eq!(p.position, Vec3::ZERO);
        assert_eq!(p.velocity, Vec3::ONE);
        assert_eq!(p.life, -1.25);
    }

    #[test]
    fn reports_the_tick_that_kills() {
        let mut p = Particle {
            life: 0.1,
            ..Particle::DEAD
        };
        assert!(p.integrate(Vec3::ZERO, 0.25));
        assert!(!p.integrate(Vec3::ZERO, 0.25));
    }
}
