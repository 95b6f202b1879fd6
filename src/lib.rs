//! # windtrace
//!
//! GPU-resident particle tracing over 2D velocity fields.
//!
//! windtrace advects thousands of tracer particles through a velocity field
//! stored as a texture, entirely on the GPU: particle positions live in
//! textures, motion is computed by fragment shaders, and the fading trails
//! you see are a feedback loop between two render targets. The CPU only
//! sequences the passes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use windtrace::prelude::*;
//!
//! fn main() -> Result<(), SessionError> {
//!     let metadata = VelocityMetadata {
//!         u: ChannelRange::new(-21.3, 26.8),
//!         v: ChannelRange::new(-21.6, 21.4),
//!     };
//!     let field = VelocityField::open("wind.png", metadata)?;
//!
//!     let config = SimulationConfig::new()
//!         .with_resolution(64)
//!         .with_opacity(0.92);
//!
//!     let mut sim = Simulation::new(HeadlessDevice::new(), config, (800, 600))
//!         .with_velocity(field);
//!     sim.start()?;
//!     sim.run(Some(600))
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### The four-stage frame
//!
//! Every tick runs the same four passes, in order:
//!
//! 1. **screen** - redraw last frame's trail image, scaled by the fade
//!    factor, into the offscreen screen buffer
//! 2. **draw** - render one point sprite per particle on top, colored by
//!    local wind speed through a 256-entry ramp
//! 3. **composite** - present the result to the visible surface
//! 4. **update** - advect every particle position one step through the
//!    velocity field, writing the new state texture
//!
//! ### Textures as state
//!
//! Particle positions are encoded in RGBA texels (low bytes in RG, high
//! bytes in BA), so a `resolution x resolution` texture holds
//! `resolution²` particles at 16-bit precision per axis. The trail image
//! and the particle state are each double-buffered as a [`BufferPair`]
//! whose read/write roles swap once per tick.
//!
//! ### Devices
//!
//! All GPU work goes through the [`Device`](gpu::Device) trait.
//! [`GlowDevice`](gpu::gl::GlowDevice) drives a real OpenGL/WebGL context;
//! [`HeadlessDevice`](gpu::headless::HeadlessDevice) is a recording
//! software device that lets the whole pipeline run in tests and on
//! machines with no graphics stack.
//!
//! ### Driving the loop
//!
//! [`Simulation::run`] sleeps between ticks according to a shared
//! [`TimeConstant`]; clone it to adjust the pace from another thread, and
//! use the [`StopToken`] from [`Simulation::stop_token`] to cancel. A
//! stopped session releases every GPU resource exactly once and never
//! touches the device again.

pub mod buffers;
pub mod config;
mod error;
pub mod gpu;
mod pipeline;
mod program;
pub mod shaders;
mod simulation;
pub mod state;
pub mod texture;
pub mod time;
mod uniforms;
pub mod velocity;

pub use buffers::{AttributeBuffer, AttributeBufferSet, QUAD_VERTICES};
pub use config::SimulationConfig;
pub use error::{CompileError, DeviceError, PipelineError, SessionError, TextureError};
pub use glam::Vec2;
pub use pipeline::{DrawCall, PipelineExecutor, PipelineStage, StageTarget};
pub use program::{ProgramSet, ShaderProgram};
pub use shaders::ShaderSourceRegistry;
pub use simulation::{SessionState, Simulation, StopToken};
pub use state::{seed_particles, BufferPair, SimulationState};
pub use texture::{ColorRamp, ColorStop, Texture, TextureManager};
pub use time::{FrameClock, TimeConstant, BASE_FRAME_INTERVAL};
pub use uniforms::{UniformTable, UniformValue};
pub use velocity::{ChannelRange, VelocityField, VelocityMetadata};

/// Convenient re-exports for common usage.
///
/// # Usage
///
/// ```ignore
/// use windtrace::prelude::*;
/// ```
///
/// This imports:
/// - [`Simulation`] - the session builder and frame loop
/// - [`SimulationConfig`] - tuning knobs and color stops
/// - [`VelocityField`] - the velocity image plus decoding metadata
/// - [`HeadlessDevice`] - the software device for tests and demos
/// - [`GlowDevice`] - the OpenGL/WebGL device
/// - [`SessionError`] - everything that can go wrong driving a session
pub mod prelude {
    pub use crate::config::SimulationConfig;
    pub use crate::error::SessionError;
    pub use crate::gpu::gl::GlowDevice;
    pub use crate::gpu::headless::HeadlessDevice;
    pub use crate::gpu::{Device, Filter};
    pub use crate::simulation::{SessionState, Simulation, StopToken};
    pub use crate::texture::ColorStop;
    pub use crate::time::TimeConstant;
    pub use crate::velocity::{ChannelRange, VelocityField, VelocityMetadata};
    pub use crate::Vec2;
}
