//! The GPU binding surface.
//!
//! The pipeline never talks to a graphics API directly. Everything goes
//! through the [`Device`] trait, which mirrors the small immediate-mode
//! subset the renderer needs: create programs/textures/buffers/framebuffers,
//! bind them, upload uniforms, and issue `draw_arrays` calls.
//!
//! Two implementations ship with the crate:
//!
//! - [`gl::GlowDevice`] drives any OpenGL or WebGL context supplied by the
//!   embedder.
//! - [`headless::HeadlessDevice`] is a software device used by the test suite
//!   and the demo binary; it stores texture bytes CPU-side and records every
//!   call.
//!
//! Handles are opaque indices minted by the device. The device owns the
//! underlying native objects; callers track which handles they created and
//! release each exactly once through the `delete_*` methods.

pub mod gl;
pub mod headless;

use std::collections::HashMap;

use crate::error::{CompileError, DeviceError};
use crate::uniforms::UniformValue;

/// Opaque handle to a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) usize);

/// Opaque handle to a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Opaque handle to a static vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) usize);

/// Opaque handle to a framebuffer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub(crate) usize);

/// Opaque handle to a uniform location within one program.
///
/// Slots index the program's reflected uniform table and are only meaningful
/// for the program they were reflected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformSlot(pub(crate) usize);

/// Texture sampling filter, applied to both minification and magnification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Sharp nearest-neighbor lookup. Used for particle state textures,
    /// where texels are data rather than colors.
    #[default]
    Nearest,
    /// Smooth linear interpolation. Used for velocity fields and color ramps.
    Linear,
}

/// Draw-call topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    /// One point sprite per vertex.
    Points,
    /// Independent triangles, three vertices each.
    Triangles,
}

/// Attribute and uniform names reflected from a linked program.
///
/// Built exactly once per program, immediately after a successful link.
#[derive(Debug, Clone, Default)]
pub struct ProgramReflection {
    /// Active attribute name to vertex location.
    pub attributes: HashMap<String, u32>,
    /// Active uniform name to slot in the program's uniform table.
    pub uniforms: HashMap<String, UniformSlot>,
}

/// The immediate-mode graphics operations the pipeline requires.
///
/// The trait is object-safe; the simulation loop is generic over it so tests
/// can swap in the headless device without touching the pipeline code.
pub trait Device {
    /// Compile and link a program from a vertex/fragment source pair,
    /// returning its handle and reflected attribute/uniform names.
    fn create_program(
        &mut self,
        vertex: &str,
        fragment: &str,
    ) -> Result<(ProgramId, ProgramReflection), CompileError>;

    /// Create a 2D RGBA texture from raw bytes (`shape.0 * shape.1 * 4` of
    /// them), upload the data, apply wrap-to-edge and the given filter, and
    /// leave the texture unbound.
    fn create_texture(&mut self, data: &[u8], shape: (u32, u32), filter: Filter) -> TextureId;

    /// Upload a static float vertex buffer.
    fn create_buffer(&mut self, data: &[f32]) -> BufferId;

    /// Create an (unbound) framebuffer object.
    fn create_framebuffer(&mut self) -> FramebufferId;

    /// Set the viewport for subsequent draw calls.
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);

    /// Bind a framebuffer and optionally attach a texture as its color
    /// target, or unbind (`None`) to render to the visible surface.
    ///
    /// At the moment a draw call executes, exactly one color attachment is
    /// bound whenever a framebuffer is.
    fn bind_framebuffer(
        &mut self,
        framebuffer: Option<FramebufferId>,
        color: Option<TextureId>,
    ) -> Result<(), DeviceError>;

    /// Activate a program for subsequent uniform uploads and draw calls.
    fn use_program(&mut self, program: ProgramId) -> Result<(), DeviceError>;

    /// Bind a texture to the given texture unit.
    fn bind_texture(&mut self, texture: TextureId, unit: u32) -> Result<(), DeviceError>;

    /// Bind a vertex buffer to an attribute location with the given
    /// component count per vertex.
    fn bind_attribute(
        &mut self,
        buffer: BufferId,
        location: u32,
        components: i32,
    ) -> Result<(), DeviceError>;

    /// Upload a uniform value to a reflected slot of the given program.
    ///
    /// The slot must come from the program's own [`ProgramReflection`];
    /// uploads to slots of other programs are undefined (but memory-safe).
    fn set_uniform(&mut self, program: ProgramId, slot: UniformSlot, value: &UniformValue);

    /// Issue a draw call with the currently bound state.
    fn draw_arrays(&mut self, mode: DrawMode, first: i32, count: i32);

    /// Release a program. Releasing an already-deleted handle is a no-op.
    fn delete_program(&mut self, program: ProgramId);

    /// Release a texture. Releasing an already-deleted handle is a no-op.
    fn delete_texture(&mut self, texture: TextureId);

    /// Release a buffer. Releasing an already-deleted handle is a no-op.
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Release a framebuffer. Releasing an already-deleted handle is a no-op.
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
}
