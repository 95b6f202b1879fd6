//! Simulation configuration.
//!
//! All the knobs a caller can set before starting a session. Defaults match
//! the tuning the pipeline shipped with: a 16x16 particle grid whose trails
//! fade at 0.92 per frame.
//!
//! # Example
//!
//! ```ignore
//! let config = SimulationConfig::new()
//!     .with_resolution(64)
//!     .with_opacity(0.95)
//!     .with_color_stops(vec![
//!         ColorStop::new(0.0, "#deababff"),
//!         ColorStop::new(1.0, "#660066ff"),
//!     ]);
//! ```

use crate::texture::ColorStop;

/// Configuration for one simulation session.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Side of the square particle grid; particle count is `resolution²`.
    pub resolution: u32,
    /// Trail persistence per frame; closer to 1.0 fades slower.
    pub opacity: f32,
    /// Advection speed multiplier.
    pub speed: f32,
    /// How much faster particles are dropped in fast-flowing regions.
    pub diffusivity: f32,
    /// Point sprite size in pixels.
    pub point_size: f32,
    /// Base probability per frame that a particle resets to a random spot.
    pub drop: f32,
    /// Color ramp stops mapping normalized speed to color.
    pub color_stops: Vec<ColorStop>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the particle grid side length.
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the trail fade factor.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the advection speed multiplier.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the speed-dependent drop bump.
    pub fn with_diffusivity(mut self, diffusivity: f32) -> Self {
        self.diffusivity = diffusivity;
        self
    }

    /// Set the point sprite size.
    pub fn with_point_size(mut self, point_size: f32) -> Self {
        self.point_size = point_size;
        self
    }

    /// Set the base drop probability.
    pub fn with_drop(mut self, drop: f32) -> Self {
        self.drop = drop;
        self
    }

    /// Replace the color ramp stops.
    pub fn with_color_stops(mut self, stops: Vec<ColorStop>) -> Self {
        self.color_stops = stops;
        self
    }

    /// Number of particles this configuration produces.
    pub fn particle_count(&self) -> u32 {
        self.resolution * self.resolution
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: 16,
            opacity: 0.92,
            speed: 0.00007,
            diffusivity: 0.004,
            point_size: 1.0,
            drop: 0.01,
            color_stops: vec![
                ColorStop::new(0.0, "#deababff"),
                ColorStop::new(1.0, "#660066ff"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.resolution, 16);
        assert_eq!(config.particle_count(), 256);
        assert_eq!(config.color_stops.len(), 2);
    }

    #[test]
    fn test_builder_chain() {
        let config = SimulationConfig::new()
            .with_resolution(64)
            .with_speed(0.0001)
            .with_drop(0.02);
        assert_eq!(config.resolution, 64);
        assert_eq!(config.particle_count(), 4096);
        assert_eq!(config.speed, 0.0001);
        assert_eq!(config.drop, 0.02);
    }
}
