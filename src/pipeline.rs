//! Stage descriptors and the stage executor.
//!
//! A [`PipelineStage`] is a declarative description of one GPU pass:
//! which program runs, which textures sit on which units, which attribute
//! buffers feed it, which uniform keys to resolve, where the output goes,
//! and the draw-call topology. Stages are cheap values built fresh every
//! tick from the current buffer roles; they reference GPU resources but
//! never own them.
//!
//! [`PipelineExecutor::render_stage`] executes one stage against the
//! device: viewport, framebuffer and color attachment, program, textures,
//! attributes, uniforms, then the draw call. Problems local to the stage
//! (an unavailable program, a uniform key that matches nothing) are warned
//! about once and skipped; a handle the device does not recognize aborts
//! with an error because drawing would bind undefined targets.

use std::collections::HashSet;

use crate::buffers::AttributeBuffer;
use crate::error::PipelineError;
use crate::gpu::{Device, DrawMode, FramebufferId, TextureId};
use crate::program::ShaderProgram;
use crate::shaders::CLOCK_UNIFORM;
use crate::uniforms::{UniformTable, UniformValue};

/// Where a stage's output lands.
#[derive(Debug, Clone, Copy)]
pub enum StageTarget {
    /// The externally visible surface.
    Surface,
    /// The shared framebuffer with the given texture as its color target.
    Offscreen {
        framebuffer: FramebufferId,
        color: TextureId,
    },
}

/// Topology and vertex range for a stage's draw call.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall {
    pub mode: DrawMode,
    pub first: i32,
    pub count: i32,
}

/// Declarative description of one GPU pass.
#[derive(Debug)]
pub struct PipelineStage<'a> {
    /// Stage name, for diagnostics only.
    pub name: &'static str,
    /// The compiled program, or `None` when it failed to link and the
    /// stage should be skipped.
    pub program: Option<&'a ShaderProgram>,
    /// Textures to bind, as `(texture, unit)`.
    pub textures: Vec<(TextureId, u32)>,
    /// Attribute buffers to bind by name.
    pub attributes: Vec<AttributeBuffer>,
    /// Uniform keys to resolve against the session uniform table.
    pub uniform_keys: Vec<&'static str>,
    /// Output target.
    pub target: StageTarget,
    /// Viewport as `[x, y, width, height]`.
    pub viewport: [i32; 4],
    /// Draw call topology and range.
    pub draw: DrawCall,
}

/// Executes pipeline stages and owns the warn-once bookkeeping.
///
/// The warned-key set lives here, per session, so concurrent sessions
/// (tests included) never share warning state.
#[derive(Debug, Default)]
pub struct PipelineExecutor {
    warned: HashSet<String>,
}

impl PipelineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that have produced a missing-uniform (or skipped-stage)
    /// warning so far.
    pub fn warned_keys(&self) -> &HashSet<String> {
        &self.warned
    }

    fn warn_once(&mut self, key: &str, message: impl FnOnce() -> String) {
        if self.warned.insert(key.to_string()) {
            log::warn!("{}", message());
        }
    }

    /// Execute one stage. Returns `Ok(true)` if a draw call was issued,
    /// `Ok(false)` if the stage was skipped because its program is
    /// unavailable.
    pub fn render_stage(
        &mut self,
        device: &mut impl Device,
        uniforms: &UniformTable,
        clock_millis: f32,
        stage: &PipelineStage<'_>,
    ) -> Result<bool, PipelineError> {
        let [x, y, w, h] = stage.viewport;
        device.viewport(x, y, w, h);

        match stage.target {
            StageTarget::Surface => device.bind_framebuffer(None, None)?,
            StageTarget::Offscreen { framebuffer, color } => {
                device.bind_framebuffer(Some(framebuffer), Some(color))?
            }
        }

        let Some(program) = stage.program else {
            self.warn_once(&format!("stage:{}", stage.name), || {
                format!("stage '{}' has no usable program; skipping", stage.name)
            });
            return Ok(false);
        };
        device.use_program(program.id)?;

        for &(texture, unit) in &stage.textures {
            device.bind_texture(texture, unit)?;
        }

        for attribute in &stage.attributes {
            match program.attributes.get(attribute.name) {
                Some(&location) => {
                    device.bind_attribute(attribute.id, location, attribute.components)?
                }
                None => self.warn_once(attribute.name, || {
                    format!(
                        "'{}' is not an attribute of the '{}' stage program",
                        attribute.name, stage.name
                    )
                }),
            }
        }

        for &key in &stage.uniform_keys {
            match (uniforms.get(key), program.uniforms.get(key)) {
                (Some(value), Some(&slot)) => device.set_uniform(program.id, slot, value),
                _ => self.warn_once(key, || {
                    format!("'{}' is not a uniform of the '{}' stage program", key, stage.name)
                }),
            }
        }

        // Clock for deterministic shader components and pseudo-random
        // seeding, uploaded whenever the program declares it.
        if let Some(&slot) = program.uniforms.get(CLOCK_UNIFORM) {
            device.set_uniform(program.id, slot, &UniformValue::Float(clock_millis));
        }

        device.draw_arrays(stage.draw.mode, stage.draw.first, stage.draw.count);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;
    use crate::gpu::Filter;
    use crate::program::{ProgramSet, ShaderProgram};
    use crate::shaders::{self, ShaderSourceRegistry};

    fn quad_stage<'a>(program: Option<&'a ShaderProgram>, keys: Vec<&'static str>) -> PipelineStage<'a> {
        PipelineStage {
            name: "test",
            program,
            textures: Vec::new(),
            attributes: Vec::new(),
            uniform_keys: keys,
            target: StageTarget::Surface,
            viewport: [0, 0, 64, 64],
            draw: DrawCall {
                mode: DrawMode::Triangles,
                first: 0,
                count: 6,
            },
        }
    }

    fn compiled_screen(device: &mut HeadlessDevice) -> ProgramSet {
        let registry = ShaderSourceRegistry::builtin();
        ProgramSet::compile(device, &registry, &[("screen", "quad-vertex", "screen-fragment")])
    }

    #[test]
    fn test_missing_uniform_warns_once_and_never_fails() {
        let mut device = HeadlessDevice::new();
        let set = compiled_screen(&mut device);
        let mut executor = PipelineExecutor::new();
        let mut uniforms = UniformTable::new();
        uniforms.set("u_opacity", 0.9f32);

        for _ in 0..25 {
            let stage = quad_stage(set.get("screen"), vec!["u_opacity", "u_bogus"]);
            let drew = executor
                .render_stage(&mut device, &uniforms, 0.0, &stage)
                .unwrap();
            assert!(drew);
        }

        assert_eq!(executor.warned_keys().len(), 1);
        assert!(executor.warned_keys().contains("u_bogus"));
        assert_eq!(device.draw_calls(), 25);
    }

    #[test]
    fn test_unavailable_program_skips_without_drawing() {
        let mut device = HeadlessDevice::new();
        let mut executor = PipelineExecutor::new();
        let uniforms = UniformTable::new();

        let stage = quad_stage(None, vec![]);
        let drew = executor
            .render_stage(&mut device, &uniforms, 0.0, &stage)
            .unwrap();

        assert!(!drew);
        assert_eq!(device.draw_calls(), 0);
    }

    #[test]
    fn test_deleted_output_texture_is_fatal() {
        let mut device = HeadlessDevice::new();
        let set = compiled_screen(&mut device);
        let mut executor = PipelineExecutor::new();

        let framebuffer = device.create_framebuffer();
        let color = device.create_texture(&[0; 16], (2, 2), Filter::Nearest);
        device.delete_texture(color);

        let mut stage = quad_stage(set.get("screen"), vec![]);
        stage.target = StageTarget::Offscreen { framebuffer, color };

        let result = executor.render_stage(&mut device, &UniformTable::new(), 0.0, &stage);
        assert!(matches!(result, Err(PipelineError::MissingResource(_))));
    }

    #[test]
    fn test_clock_uniform_uploaded_when_declared() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderSourceRegistry::builtin();
        registry.insert(
            "clocked-fragment",
            "precision mediump float;\nuniform float u_time;\nvoid main() { gl_FragColor = vec4(u_time); }",
        );
        let set = ProgramSet::compile(
            &mut device,
            &registry,
            &[("clocked", "quad-vertex", "clocked-fragment")],
        );
        let mut executor = PipelineExecutor::new();

        let stage = quad_stage(set.get("clocked"), vec![]);
        executor
            .render_stage(&mut device, &UniformTable::new(), 1234.5, &stage)
            .unwrap();

        let program = set.get("clocked").unwrap();
        assert_eq!(
            device.uniform_value(program.id, shaders::CLOCK_UNIFORM),
            Some(&UniformValue::Float(1234.5))
        );
    }
}
