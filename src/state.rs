//! Double-buffered session state.
//!
//! Two texture pairs drive the pipeline: particle positions
//! `{state, previous}` and the accumulated trail image `{screen, back}`.
//! Each pair is a [`BufferPair`]: a two-slot arena with a role index that
//! toggles once per tick, immediately after the stage that produces the new
//! current buffer. Keeping the role explicit (rather than swapping captured
//! references) means there is never any ambiguity about which texture a
//! stage reads and which it writes.

use rand::Rng;

use crate::texture::Texture;

/// A two-slot texture arena with a current-role index.
#[derive(Debug)]
pub struct BufferPair {
    slots: [Texture; 2],
    role: usize,
}

impl BufferPair {
    /// Create a pair with `first` holding the current role.
    pub fn new(first: Texture, second: Texture) -> Self {
        Self {
            slots: [first, second],
            role: 0,
        }
    }

    /// The texture holding this frame's data: the particle state being
    /// read, or the screen buffer being composed.
    pub fn current(&self) -> &Texture {
        &self.slots[self.role]
    }

    /// The other slot: last frame's trail image, or the particle texture
    /// about to be overwritten by the update stage.
    pub fn standby(&self) -> &Texture {
        &self.slots[self.role ^ 1]
    }

    /// Toggle the roles. Called exactly once per tick per pair, at the
    /// stage boundary that produced the new current buffer.
    pub fn swap(&mut self) {
        self.role ^= 1;
    }

    /// Current role index (0 or 1).
    pub fn role(&self) -> usize {
        self.role
    }

    /// Both slots in creation order, regardless of role.
    pub fn slots(&self) -> &[Texture; 2] {
        &self.slots
    }
}

/// All textures owned by one session, sized once at start and never
/// resized or recreated afterwards.
#[derive(Debug)]
pub struct SimulationState {
    /// Square root of the particle count; fixed for the session lifetime.
    pub resolution: u32,
    /// Particle position pair `{state, previous}`.
    pub particles: BufferPair,
    /// Trail accumulation pair `{screen, back}`.
    pub screens: BufferPair,
    /// 16x16 color lookup table.
    pub color_ramp: Texture,
    /// Velocity field image.
    pub velocity: Texture,
}

impl SimulationState {
    /// Number of particles in the system.
    pub fn particle_count(&self) -> u32 {
        self.resolution * self.resolution
    }
}

/// Random initial particle positions, encoded as 4-byte colors.
///
/// Every byte pattern decodes to a valid position in the unit square, so
/// uniform random bytes give a uniform spatial distribution.
pub fn seed_particles(resolution: u32, rng: &mut impl Rng) -> Vec<u8> {
    let len = resolution as usize * resolution as usize * 4;
    (0..len).map(|_| rng.gen()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{Filter, TextureId};
    use rand::rngs::mock::StepRng;

    fn texture(id: usize) -> Texture {
        Texture {
            id: TextureId(id),
            shape: (4, 4),
            filter: Filter::Nearest,
        }
    }

    #[test]
    fn test_swap_parity() {
        let mut pair = BufferPair::new(texture(0), texture(1));
        let original = pair.current().id;

        for tick in 1..=6 {
            pair.swap();
            let expected_original = tick % 2 == 0;
            assert_eq!(
                pair.current().id == original,
                expected_original,
                "after {} swaps",
                tick
            );
        }
    }

    #[test]
    fn test_current_and_standby_are_distinct() {
        let mut pair = BufferPair::new(texture(0), texture(1));
        assert_ne!(pair.current().id, pair.standby().id);
        pair.swap();
        assert_ne!(pair.current().id, pair.standby().id);
        assert_eq!(pair.current().id, texture(1).id);
    }

    #[test]
    fn test_seed_particles_length() {
        let mut rng = StepRng::new(0, 0x9e37_79b9_7f4a_7c15);
        for resolution in [1, 4, 16, 64] {
            let bytes = seed_particles(resolution, &mut rng);
            assert_eq!(bytes.len(), (resolution * resolution * 4) as usize);
        }
    }
}
