//! CPU-only backend
//!
//! Keeps every frame's instance buffer in host memory and records draws
//! instead of submitting them. Useful for dedicated servers, tools and tests.

use crate::backend::ParticleBackend;
use crate::gpu_particles::{ParticleConstants, ParticleInstance};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A draw captured by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub frame: usize,
    pub instance_count: u32,
    pub constants: ParticleConstants,
    /// Contents of the frame buffer the draw read from
    pub instances: Vec<ParticleInstance>,
}

pub struct HeadlessBackend {
    frames: Vec<Mutex<Vec<ParticleInstance>>>,
    capacity: usize,
    uploads: AtomicU64,
}

impl HeadlessBackend {
    pub fn new(capacity: usize, frames_in_flight: usize) -> Self {
        log::debug!(
            "Headless particle backend: {} frames x {} instances",
            frames_in_flight,
            capacity
        );
        Self {
            frames: (0..frames_in_flight)
                .map(|_| Mutex::new(Vec::with_capacity(capacity)))
                .collect(),
            capacity,
            uploads: AtomicU64::new(0),
        }
    }

    /// Copy of what the last upload wrote into `frame`
    pub fn frame_instances(&self, frame: usize) -> Vec<ParticleInstance> {
        self.frames
            .get(frame)
            .map(|buffer| buffer.lock().clone())
            .unwrap_or_default()
    }

    /// Total uploads performed across all frames
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::Relaxed)
    }

    fn frame(&self, frame: usize) -> Result<&Mutex<Vec<ParticleInstance>>> {
        self.frames.get(frame).ok_or(Error::FrameOutOfRange {
            frame,
            frames_in_flight: self.frames.len(),
        })
    }
}

impl ParticleBackend for HeadlessBackend {
    type Target<'a> = Vec<DrawRecord>;

    fn instance_capacity(&self) -> usize {
        self.capacity
    }

    fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    fn upload(&self, frame: usize, instances: &[ParticleInstance]) -> Result<()> {
        if instances.len() > self.capacity {
            return Err(Error::Gpu(format!(
                "upload of {} instances exceeds buffer capacity {}",
                instances.len(),
                self.capacity
            )));
        }

        let mut buffer = self.frame(frame)?.lock();
        buffer.clear();
        buffer.extend_from_slice(instances);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn draw(
        &self,
        target: &mut Self::Target<'_>,
        frame: usize,
        instance_count: u32,
        constants: &ParticleConstants,
    ) -> Result<()> {
        let buffer = self.frame(frame)?.lock();
        if instance_count as usize > buffer.len() {
            return Err(Error::Gpu(format!(
                "draw of {} instances but frame {} holds {}",
                instance_count,
                frame,
                buffer.len()
            )));
        }

        target.push(DrawRecord {
            frame,
            instance_count,
            constants: *constants,
            instances: buffer[..instance_count as usize].to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ParticleView;

    fn instance(x: f32) -> ParticleInstance {
        ParticleInstance {
            position: [x, 0.0, 0.0],
            size: 1.0,
            color: [1.0; 3],
            alpha: 1.0,
        }
    }

    #[test]
    fn frames_are_independent() {
        let backend = HeadlessBackend::new(4, 2);
        backend.upload(0, &[instance(1.0)]).unwrap();
        backend.upload(1, &[instance(2.0), instance(3.0)]).unwrap();

        assert_eq!(backend.frame_instances(0).len(), 1);
        assert_eq!(backend.frame_instances(1).len(), 2);
        assert_eq!(backend.upload_count(), 2);
    }

    #[test]
    fn rejects_out_of_range_and_oversized() {
        let backend = HeadlessBackend::new(1, 2);
        assert!(matches!(
            backend.upload(2, &[instance(0.0)]),
            Err(Error::FrameOutOfRange {
                frame: 2,
                frames_in_flight: 2
            })
        ));
        assert!(backend.upload(0, &[instance(0.0), instance(1.0)]).is_err());
    }

    #[test]
    fn draw_records_frame_contents() {
        let backend = HeadlessBackend::new(4, 1);
        backend.upload(0, &[instance(7.0), instance(8.0)]).unwrap();

        let constants = ParticleConstants::from_view(&ParticleView::default());
        let mut log = Vec::new();
        backend.draw(&mut log, 0, 2, &constants).unwrap();

        assert_eq!(log.len(), 1);
        assert_eq!(log[0].instances, vec![instance(7.0), instance(8.0)]);
        assert!(backend.draw(&mut log, 0, 3, &constants).is_err());
    }
}
