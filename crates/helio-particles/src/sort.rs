//! Back-to-front compaction of live particles
//!
//! Alpha-blended billboards are drawn without a depth-sorted transparency
//! pass, so instances must reach the GPU farthest-first.

use crate::gpu_particles::ParticleInstance;
use crate::particle::Particle;
use glam::Vec3;

/// Reusable staging storage for the per-draw sort.
///
/// Sized once for the pool capacity so a draw never allocates.
pub struct InstanceSorter {
    keyed: Vec<(f32, ParticleInstance)>,
    packed: Vec<ParticleInstance>,
}

impl InstanceSorter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keyed: Vec::with_capacity(capacity),
            packed: Vec::with_capacity(capacity),
        }
    }

    /// Collect every live slot and sort by descending squared distance
    /// from `eye`. Equal distances keep slot order.
    pub fn collect(&mut self, slots: &[Particle], eye: Vec3) -> &[ParticleInstance] {
        self.keyed.clear();
        self.keyed.extend(
            slots
                .iter()
                .filter(|p| p.is_alive())
                .map(|p| (p.position.distance_squared(eye), ParticleInstance::from_particle(p))),
        );

        self.keyed.sort_by(|(a, _), (b, _)| b.total_cmp(a));

        self.packed.clear();
        self.packed.extend(self.keyed.iter().map(|(_, instance)| *instance));
        &self.packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(position: Vec3, life: f32) -> Particle {
        Particle {
            position,
            life,
            ..Particle::DEAD
        }
    }

    fn distance(instance: &ParticleInstance, eye: Vec3) -> f32 {
        Vec3::from_array(instance.position).distance_squared(eye)
    }

    #[test]
    fn farthest_first_and_dead_skipped() {
        let slots = [
            at(Vec3::new(1.0, 0.0, 0.0), 0.5),
            at(Vec3::new(50.0, 0.0, 0.0), -0.1),
            at(Vec3::new(5.0, 0.0, 0.0), 0.5),
            at(Vec3::new(-3.0, 0.0, 0.0), 0.5),
        ];
        let mut sorter = InstanceSorter::with_capacity(slots.len());
        let out = sorter.collect(&slots, Vec3::ZERO);

        let xs: Vec<f32> = out.iter().map(|i| i.position[0]).collect();
        assert_eq!(xs, vec![5.0, -3.0, 1.0]);
    }

    #[test]
    fn ties_keep_slot_order() {
        let slots = [
            at(Vec3::new(0.0, 0.0, 2.0), 0.1),
            at(Vec3::new(2.0, 0.0, 0.0), 0.2),
            at(Vec3::new(0.0, 2.0, 0.0), 0.3),
        ];
        let mut sorter = InstanceSorter::with_capacity(3);
        let alphas: Vec<f32> = sorter
            .collect(&slots, Vec3::ZERO)
            .iter()
            .map(|i| i.alpha)
            .collect();

        assert_eq!(alphas, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn nan_positions_do_not_break_the_sort() {
        let slots = [
            at(Vec3::new(f32::NAN, 0.0, 0.0), 0.5),
            at(Vec3::new(3.0, 0.0, 0.0), 0.5),
            at(Vec3::new(1.0, 0.0, 0.0), 0.5),
        ];
        let mut sorter = InstanceSorter::with_capacity(3);
        assert_eq!(sorter.collect(&slots, Vec3::ZERO).len(), 3);
    }

    #[test]
    fn non_increasing_distance_for_many() {
        let eye = Vec3::new(0.5, 1.0, -2.0);
        let slots: Vec<Particle> = (0..500)
            .map(|i| {
                let f = i as f32;
                at(Vec3::new((f * 7.3).sin() * 20.0, (f * 1.7).cos() * 20.0, f * 0.01), 0.5)
            })
            .collect();
        let mut sorter = InstanceSorter::with_capacity(slots.len());
        let out = sorter.collect(&slots, eye);

        assert_eq!(out.len(), 500);
        for pair in out.windows(2) {
            assert!(distance(&pair[0], eye) >= distance(&pair[1], eye));
        }
    }
}
