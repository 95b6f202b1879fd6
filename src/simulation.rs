//! The simulation session and its frame loop.
//!
//! A [`Simulation`] owns the device, the compiled programs, every texture
//! and buffer, and the per-frame loop that advects particles through the
//! velocity field. Sessions move through a fixed set of states:
//!
//! ```text
//! Idle -> Compiling -> Ready -> Running -> Stopped
//! ```
//!
//! Each running tick executes four stages in a fixed order, because each
//! stage's output texture is the next stage's input:
//!
//! 1. **screen** - fade last frame's trails into the current screen buffer
//! 2. **draw** - render every particle as a point into the same buffer
//! 3. **composite** - present the buffer to the visible surface, then swap
//!    the `{screen, back}` roles
//! 4. **update** - advect particle positions into the previous state
//!    texture, then swap the `{state, previous}` roles
//!
//! Scheduling is cooperative and single-threaded: nothing suspends inside
//! a tick, and the only wait is the inter-frame delay derived from the
//! [`TimeConstant`]. Stopping cancels the next tick; a tick already in
//! flight finishes. After [`Simulation::stop`] returns, no further device
//! calls are made, ever.
//!
//! # Example
//!
//! ```ignore
//! use windtrace::prelude::*;
//!
//! let device = HeadlessDevice::new();
//! let field = VelocityField::open("wind.png", metadata)?;
//! let mut sim = Simulation::new(device, SimulationConfig::default(), (800, 600))
//!     .with_velocity(field);
//! sim.start()?;
//! let pace = sim.time_constant();
//! let cancel = sim.stop_token();
//! sim.run(None)?; // until `cancel.stop()` is called
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffers::AttributeBufferSet;
use crate::config::SimulationConfig;
use crate::error::{PipelineError, SessionError, TextureError};
use crate::gpu::{Device, DrawMode, Filter, FramebufferId};
use crate::pipeline::{DrawCall, PipelineExecutor, PipelineStage, StageTarget};
use crate::program::{ProgramSet, ShaderProgram};
use crate::shaders::{ShaderSourceRegistry, PIPELINE_PROGRAMS};
use crate::state::{seed_particles, BufferPair, SimulationState};
use crate::texture::{ColorRamp, Texture, TextureManager};
use crate::time::{FrameClock, TimeConstant};
use crate::uniforms::UniformTable;
use crate::velocity::VelocityField;

/// Uniform keys for the trail-fade and composite passes.
const SCREEN_PARAMETERS: [&str; 2] = ["u_screen", "u_opacity"];

/// Uniform keys for the advection pass.
const SIM_PARAMETERS: [&str; 9] = [
    "speed",
    "drop",
    "seed",
    "diffusivity",
    "u_wind_res",
    "u_wind",
    "u_particles",
    "u_wind_min",
    "u_wind_max",
];

/// Uniform keys for the particle draw pass.
const WIND_PARAMETERS: [&str; 6] = [
    "u_wind",
    "u_particles",
    "u_color_ramp",
    "u_particles_res",
    "u_wind_max",
    "u_wind_min",
];

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the velocity field.
    Idle,
    /// Programs are being compiled and resources created.
    Compiling,
    /// Everything is in place; the first frame has not run yet.
    Ready,
    /// Ticks are being executed.
    Running,
    /// Torn down; every GPU handle has been released.
    Stopped,
}

/// Cloneable cancellation handle.
///
/// Firing it cancels the next scheduled tick; the tick currently executing
/// (if any) runs to completion. Resources are released when the loop
/// observes the token, or immediately via [`Simulation::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Session textures in creation order, before ownership moves into the
/// session state.
struct SessionTextures {
    velocity: Texture,
    color_ramp: Texture,
    state: Texture,
    previous: Texture,
    screen: Texture,
    back: Texture,
}

/// GPU resources owned by one started session.
struct SessionAssets {
    programs: ProgramSet,
    textures: TextureManager,
    buffers: AttributeBufferSet,
    framebuffer: FramebufferId,
    state: SimulationState,
}

/// A particle-advection session over one device.
pub struct Simulation<D: Device> {
    device: D,
    config: SimulationConfig,
    surface: (u32, u32),
    registry: ShaderSourceRegistry,
    velocity: Option<VelocityField>,
    session: SessionState,
    assets: Option<SessionAssets>,
    uniforms: UniformTable,
    executor: PipelineExecutor,
    clock: FrameClock,
    time_constant: TimeConstant,
    stop: StopToken,
    message: String,
    rng: StdRng,
}

impl<D: Device> Simulation<D> {
    /// Create an idle session over a device and a rendering surface of the
    /// given device-pixel size.
    pub fn new(device: D, config: SimulationConfig, surface: (u32, u32)) -> Self {
        Self {
            device,
            config,
            surface,
            registry: ShaderSourceRegistry::builtin(),
            velocity: None,
            session: SessionState::Idle,
            assets: None,
            uniforms: UniformTable::new(),
            executor: PipelineExecutor::new(),
            clock: FrameClock::new(),
            time_constant: TimeConstant::default(),
            stop: StopToken::new(),
            message: String::from("waiting for velocity field"),
            rng: StdRng::from_entropy(),
        }
    }

    /// Supply the velocity field.
    pub fn with_velocity(mut self, velocity: VelocityField) -> Self {
        self.set_velocity(velocity);
        self
    }

    /// Supply or replace the velocity field before starting.
    pub fn set_velocity(&mut self, velocity: VelocityField) {
        self.velocity = Some(velocity);
    }

    /// Mutable access to the shader registry, for registering custom
    /// sources before [`start`](Self::start).
    pub fn shader_registry_mut(&mut self) -> &mut ShaderSourceRegistry {
        &mut self.registry
    }

    /// Compile programs and create every GPU resource for this session.
    ///
    /// On success the session is [`SessionState::Ready`]. Individual
    /// program failures are tolerated (their stages never draw); a missing
    /// velocity field keeps the session idle and is reflected in
    /// [`status`](Self::status).
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.session {
            SessionState::Idle => {}
            SessionState::Stopped => return Err(SessionError::Stopped),
            _ => return Err(SessionError::NotReady("session already started")),
        }

        let Some(velocity) = self.velocity.as_ref() else {
            let error = SessionError::VelocityUnavailable;
            self.message = error.to_string();
            return Err(error);
        };

        self.session = SessionState::Compiling;

        // The ramp is pure CPU work and the only fallible setup step;
        // doing it first means no GPU resource is created on a path that
        // can still fail.
        let ramp = match ColorRamp::from_stops(&self.config.color_stops) {
            Ok(ramp) => ramp,
            Err(e) => {
                self.session = SessionState::Idle;
                self.message = format!("error: {}", e);
                return Err(e.into());
            }
        };

        let mut programs =
            ProgramSet::compile(&mut self.device, &self.registry, &PIPELINE_PROGRAMS);

        let resolution = self.config.resolution;
        let seed = seed_particles(resolution, &mut self.rng);
        let mut textures = TextureManager::new();

        let created = match Self::create_session_textures(
            &mut self.device,
            &mut textures,
            &velocity.image,
            &ramp,
            &seed,
            resolution,
            self.surface,
        ) {
            Ok(created) => created,
            Err(e) => {
                // Nothing created so far may outlive the failed start.
                programs.release_all(&mut self.device);
                textures.release_all(&mut self.device);
                self.session = SessionState::Idle;
                self.message = format!("error: {}", e);
                return Err(e.into());
            }
        };

        let buffers = AttributeBufferSet::create(&mut self.device, resolution);
        let framebuffer = self.device.create_framebuffer();

        self.uniforms = UniformTable::new();
        self.uniforms.set("u_wind", 0i32);
        self.uniforms.set("u_particles", 1i32);
        self.uniforms.set("u_color_ramp", 2i32);
        self.uniforms.set("u_screen", 2i32);
        self.uniforms.set("u_opacity", self.config.opacity);
        self.uniforms.set("u_point_size", self.config.point_size);
        self.uniforms.set("u_particles_res", resolution as f32);
        self.uniforms.set("u_wind_min", velocity.wind_min());
        self.uniforms.set("u_wind_max", velocity.wind_max());
        let (wind_w, wind_h) = velocity.shape();
        self.uniforms.set("u_wind_res", [wind_w as f32, wind_h as f32]);
        self.uniforms.set("speed", self.config.speed);
        self.uniforms.set("diffusivity", self.config.diffusivity);
        self.uniforms.set("drop", self.config.drop);
        self.uniforms.set("seed", self.rng.gen::<f32>());

        self.assets = Some(SessionAssets {
            programs,
            textures,
            buffers,
            framebuffer,
            state: SimulationState {
                resolution,
                particles: BufferPair::new(created.state, created.previous),
                screens: BufferPair::new(created.screen, created.back),
                color_ramp: created.color_ramp,
                velocity: created.velocity,
            },
        });

        self.message = format!("tracer particles (n={})", self.config.particle_count());
        self.session = SessionState::Ready;
        Ok(())
    }

    /// Create every session texture through one manager, so a failure can
    /// release the ones already created before it propagates.
    fn create_session_textures(
        device: &mut D,
        textures: &mut TextureManager,
        velocity_image: &RgbaImage,
        ramp: &ColorRamp,
        seed: &[u8],
        resolution: u32,
        surface: (u32, u32),
    ) -> Result<SessionTextures, TextureError> {
        let velocity = textures.from_image(device, velocity_image, Filter::Linear);
        let color_ramp =
            textures.from_bytes(device, ramp.pixels(), ColorRamp::shape(), Filter::Linear)?;

        let particle_shape = (resolution, resolution);
        let state = textures.from_bytes(device, seed, particle_shape, Filter::Nearest)?;
        let previous = textures.from_bytes(device, seed, particle_shape, Filter::Nearest)?;

        let blank = vec![0u8; surface.0 as usize * surface.1 as usize * 4];
        let screen = textures.from_bytes(device, &blank, surface, Filter::Nearest)?;
        let back = textures.from_bytes(device, &blank, surface, Filter::Nearest)?;

        Ok(SessionTextures {
            velocity,
            color_ramp,
            state,
            previous,
            screen,
            back,
        })
    }

    /// Execute one frame: the four stages in order, with role swaps after
    /// the composite and update stages.
    ///
    /// Returns the delay to wait before the next tick, read fresh from the
    /// time constant. A fatal stage error halts the loop and releases all
    /// resources before propagating.
    pub fn tick(&mut self) -> Result<Duration, SessionError> {
        if self.session == SessionState::Stopped || self.stop.is_stopped() {
            return Err(SessionError::Stopped);
        }
        match self.session {
            SessionState::Ready | SessionState::Running => {}
            _ => return Err(SessionError::NotReady("start() has not completed")),
        }
        if self.assets.is_none() {
            return Err(SessionError::NotReady("session has no compiled assets"));
        }

        self.session = SessionState::Running;
        self.clock.tick();

        // Fresh random seed per frame for the drop/respawn shader math.
        let seed = self.rng.gen::<f32>();
        self.uniforms.set("seed", seed);

        if let Err(e) = self.run_stages() {
            log::error!("pipeline halted: {}", e);
            self.message = format!("error: {}", e);
            self.stop();
            return Err(SessionError::Pipeline(e));
        }

        Ok(self.time_constant.frame_delay())
    }

    fn run_stages(&mut self) -> Result<(), PipelineError> {
        let clock_millis = self.clock.elapsed_millis();
        let surface_viewport = [0, 0, self.surface.0 as i32, self.surface.1 as i32];
        let resolution = self.config.resolution as i32;

        let Self {
            device,
            executor,
            uniforms,
            assets,
            ..
        } = self;
        let Some(assets) = assets.as_mut() else {
            return Ok(());
        };

        let quad_draw = DrawCall {
            mode: DrawMode::Triangles,
            first: 0,
            count: 6,
        };

        // 1. Fade the previous accumulation into the current screen buffer.
        {
            let stage = PipelineStage {
                name: "screen",
                program: assets.programs.resolve("screen")?,
                textures: vec![
                    (assets.state.velocity.id, 0),
                    (assets.state.particles.current().id, 1),
                    (assets.state.screens.standby().id, 2),
                ],
                attributes: vec![assets.buffers.quad],
                uniform_keys: SCREEN_PARAMETERS.to_vec(),
                target: StageTarget::Offscreen {
                    framebuffer: assets.framebuffer,
                    color: assets.state.screens.current().id,
                },
                viewport: surface_viewport,
                draw: quad_draw,
            };
            executor.render_stage(device, uniforms, clock_millis, &stage)?;
        }

        // 2. Draw every particle as a point into the same buffer.
        {
            let stage = PipelineStage {
                name: "draw",
                program: assets.programs.resolve("draw")?,
                textures: vec![
                    (assets.state.velocity.id, 0),
                    (assets.state.particles.current().id, 1),
                    (assets.state.color_ramp.id, 2),
                ],
                attributes: vec![assets.buffers.index],
                uniform_keys: WIND_PARAMETERS
                    .iter()
                    .copied()
                    .chain(["u_point_size"])
                    .collect(),
                target: StageTarget::Offscreen {
                    framebuffer: assets.framebuffer,
                    color: assets.state.screens.current().id,
                },
                viewport: surface_viewport,
                draw: DrawCall {
                    mode: DrawMode::Points,
                    first: 0,
                    count: resolution * resolution,
                },
            };
            executor.render_stage(device, uniforms, clock_millis, &stage)?;
        }

        // 3. Composite the accumulated buffer onto the visible surface.
        {
            let stage = PipelineStage {
                name: "composite",
                program: assets.programs.resolve("screen")?,
                textures: vec![(assets.state.screens.current().id, 2)],
                attributes: vec![assets.buffers.quad],
                uniform_keys: SCREEN_PARAMETERS.to_vec(),
                target: StageTarget::Surface,
                viewport: surface_viewport,
                draw: quad_draw,
            };
            executor.render_stage(device, uniforms, clock_millis, &stage)?;
        }
        assets.state.screens.swap();

        // 4. Advect particle positions into the previous state texture.
        {
            let stage = PipelineStage {
                name: "update",
                program: assets.programs.resolve("update")?,
                textures: vec![
                    (assets.state.velocity.id, 0),
                    (assets.state.particles.current().id, 1),
                ],
                attributes: vec![assets.buffers.quad],
                uniform_keys: SIM_PARAMETERS.to_vec(),
                target: StageTarget::Offscreen {
                    framebuffer: assets.framebuffer,
                    color: assets.state.particles.standby().id,
                },
                viewport: [0, 0, resolution, resolution],
                draw: quad_draw,
            };
            executor.render_stage(device, uniforms, clock_millis, &stage)?;
        }
        assets.state.particles.swap();

        Ok(())
    }

    /// Drive the loop until cancellation (or `max_frames`, when given),
    /// sleeping the scheduled delay between ticks.
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<(), SessionError> {
        loop {
            if self.stop.is_stopped() {
                self.stop();
                return Ok(());
            }
            if let Some(max) = max_frames {
                if self.clock.frame() >= max {
                    return Ok(());
                }
            }
            match self.tick() {
                Ok(delay) => {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(SessionError::Stopped) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel the loop and release every GPU resource.
    ///
    /// Idempotent. Once this returns, no further device calls are made by
    /// this session, even if `tick()` is called again.
    pub fn stop(&mut self) {
        self.stop.stop();
        if let Some(mut assets) = self.assets.take() {
            assets.programs.release_all(&mut self.device);
            assets.textures.release_all(&mut self.device);
            assets.buffers.release(&mut self.device);
            self.device.delete_framebuffer(assets.framebuffer);
        }
        self.session = SessionState::Stopped;
    }

    /// Current lifecycle state.
    pub fn session_state(&self) -> SessionState {
        self.session
    }

    /// Status line for display: particle count, or the last error.
    pub fn status(&self) -> &str {
        &self.message
    }

    /// Frames executed so far.
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Handle on the inter-frame pace, adjustable from other threads.
    pub fn time_constant(&self) -> TimeConstant {
        self.time_constant.clone()
    }

    /// Cancellation handle for external controllers.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// The particle `{state, previous}` pair, once started.
    pub fn particle_buffers(&self) -> Option<&BufferPair> {
        self.assets.as_ref().map(|a| &a.state.particles)
    }

    /// The `{screen, back}` trail pair, once started.
    pub fn screen_buffers(&self) -> Option<&BufferPair> {
        self.assets.as_ref().map(|a| &a.state.screens)
    }

    /// The full texture state, once started.
    pub fn simulation_state(&self) -> Option<&SimulationState> {
        self.assets.as_ref().map(|a| &a.state)
    }

    /// A named pipeline program, once started and successfully linked.
    pub fn program(&self, name: &str) -> Option<&ShaderProgram> {
        self.assets.as_ref().and_then(|a| a.programs.get(name))
    }

    /// The stage executor, exposing the warned-key diagnostics.
    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    /// The device, e.g. for reading back headless texture contents.
    pub fn device(&self) -> &D {
        &self.device
    }
}
