//! OpenGL / WebGL backend over [`glow`].
//!
//! Wraps whatever GL context the embedder provides (native or WebGL via
//! `glow::Context`) behind the [`Device`] trait. The device owns every
//! native object it creates and maps them to opaque index handles, so the
//! pipeline layer never sees raw GL names and each object is released
//! exactly once.
//!
//! Object creation (`create_texture` and friends) panics when glow reports
//! an allocation failure: that only happens once the context itself is
//! gone, and a session never outlives its context. Context loss is not
//! recovered from.

use glow::HasContext;

use crate::error::{CompileError, DeviceError};
use crate::gpu::{
    BufferId, Device, DrawMode, Filter, FramebufferId, ProgramId, ProgramReflection, TextureId,
    UniformSlot,
};
use crate::uniforms::UniformValue;

struct ProgramEntry<G: HasContext> {
    raw: G::Program,
    /// Uniform locations in reflection-slot order. A slot can be `None`
    /// when the driver optimized the uniform out between enumeration and
    /// location lookup; uploads to it are silently dropped.
    uniforms: Vec<Option<G::UniformLocation>>,
}

/// A [`Device`] backed by a live GL context.
pub struct GlowDevice<G: HasContext> {
    gl: G,
    programs: Vec<Option<ProgramEntry<G>>>,
    textures: Vec<Option<G::Texture>>,
    buffers: Vec<Option<G::Buffer>>,
    framebuffers: Vec<Option<G::Framebuffer>>,
}

impl<G: HasContext> GlowDevice<G> {
    /// Wrap a GL context. The context must remain current for the lifetime
    /// of the device; context management stays with the embedder.
    pub fn new(gl: G) -> Self {
        Self {
            gl,
            programs: Vec::new(),
            textures: Vec::new(),
            buffers: Vec::new(),
            framebuffers: Vec::new(),
        }
    }

    /// Access the underlying context, e.g. for swap-chain management.
    pub fn context(&self) -> &G {
        &self.gl
    }

    fn program(&self, id: ProgramId) -> Result<&ProgramEntry<G>, DeviceError> {
        self.programs
            .get(id.0)
            .and_then(|p| p.as_ref())
            .ok_or(DeviceError::UnknownProgram(id.0))
    }

    fn texture(&self, id: TextureId) -> Result<G::Texture, DeviceError> {
        self.textures
            .get(id.0)
            .and_then(|t| *t)
            .ok_or(DeviceError::UnknownTexture(id.0))
    }

    fn compile_shader(&self, shader_type: u32, source: &str) -> Result<G::Shader, String> {
        let gl = &self.gl;
        unsafe {
            let shader = gl.create_shader(shader_type)?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            if gl.get_shader_compile_status(shader) {
                Ok(shader)
            } else {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                Err(log)
            }
        }
    }

    fn reflect(&self, program: G::Program) -> (ProgramReflection, Vec<Option<G::UniformLocation>>) {
        let gl = &self.gl;
        let mut reflection = ProgramReflection::default();
        let mut locations = Vec::new();
        unsafe {
            for index in 0..gl.get_active_attributes(program) {
                let Some(attribute) = gl.get_active_attribute(program, index) else {
                    continue;
                };
                if let Some(location) = gl.get_attrib_location(program, &attribute.name) {
                    reflection.attributes.insert(attribute.name, location);
                }
            }
            for index in 0..gl.get_active_uniforms(program) {
                let Some(uniform) = gl.get_active_uniform(program, index) else {
                    continue;
                };
                let location = gl.get_uniform_location(program, &uniform.name);
                reflection
                    .uniforms
                    .insert(uniform.name, UniformSlot(locations.len()));
                locations.push(location);
            }
        }
        (reflection, locations)
    }
}

fn filter_value(filter: Filter) -> i32 {
    match filter {
        Filter::Nearest => glow::NEAREST as i32,
        Filter::Linear => glow::LINEAR as i32,
    }
}

fn draw_mode_value(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Triangles => glow::TRIANGLES,
    }
}

impl<G: HasContext> Device for GlowDevice<G> {
    fn create_program(
        &mut self,
        vertex: &str,
        fragment: &str,
    ) -> Result<(ProgramId, ProgramReflection), CompileError> {
        let vert = self
            .compile_shader(glow::VERTEX_SHADER, vertex)
            .map_err(CompileError::Vertex)?;
        let frag = match self.compile_shader(glow::FRAGMENT_SHADER, fragment) {
            Ok(shader) => shader,
            Err(log) => {
                unsafe { self.gl.delete_shader(vert) };
                return Err(CompileError::Fragment(log));
            }
        };

        let gl = &self.gl;
        let raw = unsafe {
            let program = gl.create_program().map_err(CompileError::Link)?;
            gl.attach_shader(program, vert);
            gl.attach_shader(program, frag);
            gl.link_program(program);
            // Shaders are no longer needed once the program links (or fails
            // to); the program keeps its own copy of the binaries.
            gl.detach_shader(program, vert);
            gl.detach_shader(program, frag);
            gl.delete_shader(vert);
            gl.delete_shader(frag);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(CompileError::Link(log));
            }
            program
        };

        let (reflection, uniforms) = self.reflect(raw);
        let id = ProgramId(self.programs.len());
        self.programs.push(Some(ProgramEntry { raw, uniforms }));
        Ok((id, reflection))
    }

    fn create_texture(&mut self, data: &[u8], shape: (u32, u32), filter: Filter) -> TextureId {
        let gl = &self.gl;
        let texture = unsafe {
            let texture = gl.create_texture().expect("GL texture allocation");
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_S,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_WRAP_T,
                glow::CLAMP_TO_EDGE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                filter_value(filter),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                filter_value(filter),
            );
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                shape.0 as i32,
                shape.1 as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(data)),
            );
            // Unbind to prevent accidental use by a later unrelated call.
            gl.bind_texture(glow::TEXTURE_2D, None);
            texture
        };
        let id = TextureId(self.textures.len());
        self.textures.push(Some(texture));
        id
    }

    fn create_buffer(&mut self, data: &[f32]) -> BufferId {
        let gl = &self.gl;
        let buffer = unsafe {
            let buffer = gl.create_buffer().expect("GL buffer allocation");
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), glow::STATIC_DRAW);
            buffer
        };
        let id = BufferId(self.buffers.len());
        self.buffers.push(Some(buffer));
        id
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        let framebuffer = unsafe { self.gl.create_framebuffer().expect("GL framebuffer allocation") };
        let id = FramebufferId(self.framebuffers.len());
        self.framebuffers.push(Some(framebuffer));
        id
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn bind_framebuffer(
        &mut self,
        framebuffer: Option<FramebufferId>,
        color: Option<TextureId>,
    ) -> Result<(), DeviceError> {
        match framebuffer {
            Some(id) => {
                let raw = self
                    .framebuffers
                    .get(id.0)
                    .and_then(|f| *f)
                    .ok_or(DeviceError::UnknownFramebuffer(id.0))?;
                let attachment = color.map(|tex| self.texture(tex)).transpose()?;
                unsafe {
                    self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(raw));
                    if let Some(texture) = attachment {
                        self.gl.framebuffer_texture_2d(
                            glow::FRAMEBUFFER,
                            glow::COLOR_ATTACHMENT0,
                            glow::TEXTURE_2D,
                            Some(texture),
                            0,
                        );
                    }
                }
            }
            None => unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, None) },
        }
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), DeviceError> {
        let raw = self.program(program)?.raw;
        unsafe { self.gl.use_program(Some(raw)) };
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureId, unit: u32) -> Result<(), DeviceError> {
        let raw = self.texture(texture)?;
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(raw));
        }
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        buffer: BufferId,
        location: u32,
        components: i32,
    ) -> Result<(), DeviceError> {
        let raw = self
            .buffers
            .get(buffer.0)
            .and_then(|b| *b)
            .ok_or(DeviceError::UnknownBuffer(buffer.0))?;
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(raw));
            self.gl.enable_vertex_attrib_array(location);
            self.gl
                .vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, 0, 0);
        }
        Ok(())
    }

    fn set_uniform(&mut self, program: ProgramId, slot: UniformSlot, value: &UniformValue) {
        let Ok(entry) = self.program(program) else {
            return;
        };
        let Some(location) = entry.uniforms.get(slot.0).and_then(|l| l.as_ref()) else {
            return;
        };
        let gl = &self.gl;
        unsafe {
            match value {
                UniformValue::Float(v) => gl.uniform_1_f32(Some(location), *v),
                UniformValue::Int(v) => gl.uniform_1_i32(Some(location), *v),
                UniformValue::Vec2(v) => gl.uniform_2_f32(Some(location), v.x, v.y),
            }
        }
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(draw_mode_value(mode), first, count) };
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(entry) = self.programs.get_mut(program.0).and_then(Option::take) {
            unsafe { self.gl.delete_program(entry.raw) };
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(raw) = self.textures.get_mut(texture.0).and_then(Option::take) {
            unsafe { self.gl.delete_texture(raw) };
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(raw) = self.buffers.get_mut(buffer.0).and_then(Option::take) {
            unsafe { self.gl.delete_buffer(raw) };
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(raw) = self.framebuffers.get_mut(framebuffer.0).and_then(Option::take) {
            unsafe { self.gl.delete_framebuffer(raw) };
        }
    }
}
