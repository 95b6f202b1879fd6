//! Static vertex data for the pipeline.
//!
//! Two attribute buffers cover every stage: a unit quad (two triangles) for
//! the full-screen passes, and a flat index array with one entry per
//! particle for the point-sprite draw pass. Both are uploaded once at
//! session start and never mutated.

use crate::gpu::{BufferId, Device};
use crate::shaders::{INDEX_ATTRIBUTE, QUAD_ATTRIBUTE};

/// Corner positions of the unit quad, two triangles, 2 components each.
pub const QUAD_VERTICES: [f32; 12] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];

/// A static vertex buffer bound by attribute name.
#[derive(Debug, Clone, Copy)]
pub struct AttributeBuffer {
    pub id: BufferId,
    pub name: &'static str,
    pub components: i32,
}

/// The session's two attribute buffers.
#[derive(Debug)]
pub struct AttributeBufferSet {
    /// Unit-quad corners, bound as `a_pos`.
    pub quad: AttributeBuffer,
    /// Particle indices `0..resolution²`, bound as `a_index`.
    pub index: AttributeBuffer,
    released: bool,
}

impl AttributeBufferSet {
    /// Upload both buffers for a session of `resolution²` particles.
    pub fn create(device: &mut impl Device, resolution: u32) -> Self {
        let quad = AttributeBuffer {
            id: device.create_buffer(&QUAD_VERTICES),
            name: QUAD_ATTRIBUTE,
            components: 2,
        };

        let count = resolution * resolution;
        let indices: Vec<f32> = (0..count).map(|i| i as f32).collect();
        let index = AttributeBuffer {
            id: device.create_buffer(&indices),
            name: INDEX_ATTRIBUTE,
            components: 1,
        };

        Self {
            quad,
            index,
            released: false,
        }
    }

    /// Release both buffers. Freed on the first call only.
    pub fn release(&mut self, device: &mut impl Device) {
        if self.released {
            return;
        }
        self.released = true;
        device.delete_buffer(self.quad.id);
        device.delete_buffer(self.index.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;

    #[test]
    fn test_create_uploads_two_buffers() {
        let mut device = HeadlessDevice::new();
        let set = AttributeBufferSet::create(&mut device, 4);

        assert_eq!(set.quad.name, "a_pos");
        assert_eq!(set.quad.components, 2);
        assert_eq!(set.index.name, "a_index");
        assert_eq!(set.index.components, 1);
        assert_eq!(device.live_resources(), 2);
    }

    #[test]
    fn test_release_frees_once() {
        let mut device = HeadlessDevice::new();
        let mut set = AttributeBufferSet::create(&mut device, 2);
        set.release(&mut device);
        assert_eq!(device.live_resources(), 0);

        let calls = device.calls();
        set.release(&mut device);
        assert_eq!(device.calls(), calls);
    }
}
