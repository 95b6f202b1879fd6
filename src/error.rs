//! Error types for windtrace.
//!
//! This module provides error types for program compilation, device handle
//! validation, texture construction, and session control.

use std::fmt;

/// Errors produced while compiling and linking a shader program.
///
/// Carries the driver's info log so the diagnostic can be surfaced to the
/// embedder. A compile failure disables only the stages that depend on the
/// failing program; it is never fatal to the session.
#[derive(Debug, Clone)]
pub enum CompileError {
    /// The vertex shader failed to compile.
    Vertex(String),
    /// The fragment shader failed to compile.
    Fragment(String),
    /// The shaders compiled but the program failed to link.
    Link(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Vertex(log) => write!(f, "vertex shader failed to compile: {}", log),
            CompileError::Fragment(log) => write!(f, "fragment shader failed to compile: {}", log),
            CompileError::Link(log) => write!(f, "program failed to link: {}", log),
        }
    }
}

impl std::error::Error for CompileError {}

/// Errors raised by a [`Device`](crate::gpu::Device) when a handle does not
/// refer to a live resource.
///
/// Handles are only produced by the device itself, so hitting one of these
/// means a resource was deleted while something still referenced it. That is
/// a broken binding contract, and the simulation loop treats it as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// A program handle that was never created or has been deleted.
    UnknownProgram(usize),
    /// A texture handle that was never created or has been deleted.
    UnknownTexture(usize),
    /// A buffer handle that was never created or has been deleted.
    UnknownBuffer(usize),
    /// A framebuffer handle that was never created or has been deleted.
    UnknownFramebuffer(usize),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnknownProgram(id) => write!(f, "no such program handle: {}", id),
            DeviceError::UnknownTexture(id) => write!(f, "no such texture handle: {}", id),
            DeviceError::UnknownBuffer(id) => write!(f, "no such buffer handle: {}", id),
            DeviceError::UnknownFramebuffer(id) => write!(f, "no such framebuffer handle: {}", id),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Errors raised while executing a single pipeline stage.
///
/// Anything local to one stage (a missing uniform, an unlinked program) is
/// absorbed with a warning instead; these variants only cover resources that
/// are absent entirely, which would otherwise bind undefined targets.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// A stage referenced a GPU handle the device does not recognize.
    MissingResource(DeviceError),
    /// A stage named a program that was never requested from the compiler.
    MissingProgram(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingResource(e) => write!(f, "stage bound a missing resource: {}", e),
            PipelineError::MissingProgram(name) => {
                write!(f, "stage references unknown program '{}'", name)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::MissingResource(e) => Some(e),
            PipelineError::MissingProgram(_) => None,
        }
    }
}

impl From<DeviceError> for PipelineError {
    fn from(e: DeviceError) -> Self {
        PipelineError::MissingResource(e)
    }
}

/// Errors that can occur while constructing textures and color ramps.
#[derive(Debug)]
pub enum TextureError {
    /// Raw byte data did not match `width * height * 4`.
    SizeMismatch { expected: usize, actual: usize },
    /// A color stop was not a parseable hex color.
    BadColor(String),
    /// A color ramp was requested with no stops.
    EmptyRamp,
    /// Failed to decode an image file.
    ImageLoad(image::ImageError),
    /// Failed to read a file from disk.
    Io(std::io::Error),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::SizeMismatch { expected, actual } => {
                write!(f, "texture data is {} bytes, expected {}", actual, expected)
            }
            TextureError::BadColor(s) => write!(f, "'{}' is not a hex color", s),
            TextureError::EmptyRamp => write!(f, "color ramp needs at least one stop"),
            TextureError::ImageLoad(e) => write!(f, "failed to load image: {}", e),
            TextureError::Io(e) => write!(f, "failed to read texture file: {}", e),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::ImageLoad(e) => Some(e),
            TextureError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::ImageLoad(e)
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        TextureError::Io(e)
    }
}

/// Errors that can occur when driving a simulation session.
#[derive(Debug)]
pub enum SessionError {
    /// The velocity field (or its metadata) never arrived from the fetch
    /// layer, so the session cannot leave its setup states.
    VelocityUnavailable,
    /// An operation was attempted in a state that does not allow it.
    NotReady(&'static str),
    /// The session was stopped; no further GPU work is issued.
    Stopped,
    /// A stage failed with an unrecoverable binding error.
    Pipeline(PipelineError),
    /// Texture or color ramp construction failed during setup.
    Texture(TextureError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::VelocityUnavailable => {
                write!(f, "velocity field unavailable; session cannot start")
            }
            SessionError::NotReady(what) => write!(f, "session is not ready: {}", what),
            SessionError::Stopped => write!(f, "session is stopped"),
            SessionError::Pipeline(e) => write!(f, "pipeline halted: {}", e),
            SessionError::Texture(e) => write!(f, "texture setup failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Pipeline(e) => Some(e),
            SessionError::Texture(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for SessionError {
    fn from(e: PipelineError) -> Self {
        SessionError::Pipeline(e)
    }
}

impl From<TextureError> for SessionError {
    fn from(e: TextureError) -> Self {
        SessionError::Texture(e)
    }
}
