//! End-to-end pipeline tests against the software device.
//!
//! These drive the public API the way an embedder would: configure, start,
//! tick, stop, and assert on the device's recorded state.

use windtrace::prelude::*;
use windtrace::texture::parse_hex_color;
use windtrace::{SimulationState, UniformValue};

fn zero_field(shape: (u32, u32)) -> VelocityField {
    let data = vec![0u8; (shape.0 * shape.1 * 4) as usize];
    let metadata = VelocityMetadata {
        u: ChannelRange::new(0.0, 0.0),
        v: ChannelRange::new(0.0, 0.0),
    };
    VelocityField::from_bytes(data, shape, metadata).unwrap()
}

fn started(config: SimulationConfig, surface: (u32, u32)) -> Simulation<HeadlessDevice> {
    let mut sim = Simulation::new(HeadlessDevice::new(), config, surface)
        .with_velocity(zero_field((2, 2)));
    sim.start().unwrap();
    sim
}

#[test]
fn test_buffer_roles_return_after_even_tick_counts() {
    let mut sim = started(SimulationConfig::default().with_resolution(8), (32, 32));

    let first_particle = sim.particle_buffers().unwrap().current().id;
    let first_screen = sim.screen_buffers().unwrap().current().id;

    for tick in 1..=12u32 {
        sim.tick().unwrap();
        let particles = sim.particle_buffers().unwrap();
        let screens = sim.screen_buffers().unwrap();
        if tick % 2 == 0 {
            assert_eq!(particles.current().id, first_particle, "tick {}", tick);
            assert_eq!(screens.current().id, first_screen, "tick {}", tick);
        } else {
            assert_ne!(particles.current().id, first_particle, "tick {}", tick);
            assert_ne!(screens.current().id, first_screen, "tick {}", tick);
        }
    }
}

#[test]
fn test_texture_sizes_are_fixed_by_configuration() {
    let resolution = 32u32;
    let surface = (120, 90);
    let sim = started(
        SimulationConfig::default().with_resolution(resolution),
        surface,
    );

    let state: &SimulationState = sim.simulation_state().unwrap();
    assert_eq!(state.particle_count(), resolution * resolution);

    for texture in state.particles.slots() {
        assert_eq!(texture.shape, (resolution, resolution));
        let data = sim.device().texture_data(texture.id).unwrap();
        assert_eq!(data.len(), (resolution * resolution * 4) as usize);
    }
    for texture in state.screens.slots() {
        assert_eq!(texture.shape, surface);
    }
    assert_eq!(state.color_ramp.shape, (16, 16));
}

#[test]
fn test_particle_textures_use_nearest_filtering() {
    let sim = started(SimulationConfig::default().with_resolution(8), (32, 32));
    let state = sim.simulation_state().unwrap();

    for texture in state.particles.slots() {
        assert_eq!(sim.device().texture_filter(texture.id), Some(Filter::Nearest));
    }
    assert_eq!(
        sim.device().texture_filter(state.velocity.id),
        Some(Filter::Linear)
    );
}

#[test]
fn test_ramp_texture_endpoints_match_the_stops() {
    let stops = vec![
        ColorStop::new(0.0, "#deababff"),
        ColorStop::new(1.0, "#660066ff"),
    ];
    let sim = started(
        SimulationConfig::default()
            .with_resolution(8)
            .with_color_stops(stops.clone()),
        (32, 32),
    );

    let ramp = sim.simulation_state().unwrap().color_ramp;
    let data = sim.device().texture_data(ramp.id).unwrap();
    assert_eq!(data.len(), 16 * 16 * 4);

    let first = parse_hex_color(&stops[0].color).unwrap();
    let last = parse_hex_color(&stops[1].color).unwrap();
    assert_eq!(&data[..4], &first);
    assert_eq!(&data[data.len() - 4..], &last);
}

#[test]
fn test_missing_uniform_warns_once_across_many_ticks() {
    let mut sim = Simulation::new(
        HeadlessDevice::new(),
        SimulationConfig::default().with_resolution(8),
        (32, 32),
    )
    .with_velocity(zero_field((2, 2)));

    // A fade shader that never declares the opacity uniform.
    sim.shader_registry_mut().insert(
        "screen-fragment",
        "precision mediump float;\n\
         uniform sampler2D u_screen;\n\
         varying vec2 v_tex_pos;\n\
         void main() { gl_FragColor = texture2D(u_screen, v_tex_pos); }",
    );
    sim.start().unwrap();

    for _ in 0..30 {
        sim.tick().unwrap();
    }

    assert!(sim.executor().warned_keys().contains("u_opacity"));
    // 4 draws per tick; the mismatch never aborts a frame.
    assert_eq!(sim.device().draw_calls(), 120);
}

#[test]
fn test_broken_program_disables_only_its_stage() {
    let mut sim = Simulation::new(
        HeadlessDevice::new(),
        SimulationConfig::default().with_resolution(8),
        (32, 32),
    )
    .with_velocity(zero_field((2, 2)));

    sim.shader_registry_mut()
        .insert("draw-fragment", "this does not compile");
    sim.start().unwrap();

    for _ in 0..5 {
        sim.tick().unwrap();
    }

    // Fade, composite, and update still draw; the particle pass is skipped.
    assert_eq!(sim.device().draw_calls(), 15);
    assert!(sim.executor().warned_keys().contains("stage:draw"));
}

#[test]
fn test_update_uniforms_arrive_with_shader_arity() {
    let mut sim = started(SimulationConfig::default().with_resolution(8), (32, 32));
    sim.tick().unwrap();

    let update = sim.program("update").unwrap().id;
    let device = sim.device();
    for name in ["speed", "diffusivity", "drop", "seed"] {
        assert!(
            matches!(device.uniform_value(update, name), Some(UniformValue::Float(_))),
            "'{}' should arrive as a scalar float",
            name
        );
    }
    for name in ["u_wind_res", "u_wind_min", "u_wind_max"] {
        assert!(
            matches!(device.uniform_value(update, name), Some(UniformValue::Vec2(_))),
            "'{}' should arrive as a 2-vector",
            name
        );
    }
    for name in ["u_wind", "u_particles"] {
        assert!(
            matches!(device.uniform_value(update, name), Some(UniformValue::Int(_))),
            "'{}' should arrive as a sampler unit",
            name
        );
    }
}

#[test]
fn test_sixty_tick_session_runs_and_stops_clean() {
    let config = SimulationConfig::default()
        .with_resolution(16)
        .with_opacity(0.9)
        .with_speed(0.0001);
    let mut sim = started(config, (64, 48));

    for _ in 0..60 {
        sim.tick().unwrap();
    }

    assert_eq!(sim.frame(), 60);
    assert_eq!(sim.device().draw_calls(), 240);
    assert!(sim.executor().warned_keys().is_empty());

    // Every session texture is still live and correctly sized.
    let state = sim.simulation_state().unwrap();
    for texture in state.particles.slots().iter().chain(state.screens.slots()) {
        assert!(sim.device().texture_data(texture.id).is_some());
    }

    sim.stop();
    assert_eq!(sim.session_state(), SessionState::Stopped);
    assert_eq!(sim.device().live_resources(), 0);
}

#[test]
fn test_no_device_calls_after_stop() {
    let mut sim = started(SimulationConfig::default().with_resolution(8), (32, 32));
    sim.tick().unwrap();
    sim.stop();

    let calls = sim.device().calls();
    for _ in 0..3 {
        assert!(matches!(sim.tick(), Err(SessionError::Stopped)));
    }
    sim.stop();
    assert_eq!(sim.device().calls(), calls);
}

#[test]
fn test_restart_after_stop_is_rejected() {
    let mut sim = started(SimulationConfig::default().with_resolution(8), (32, 32));
    sim.stop();
    assert!(matches!(sim.start(), Err(SessionError::Stopped)));
}
