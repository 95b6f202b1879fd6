//! Software device for tests and headless runs.
//!
//! Implements [`Device`] without any GPU: texture contents live in CPU
//! memory, programs are "compiled" by scanning their GLSL declarations, and
//! every call is counted. The simulation loop runs against it unchanged,
//! which is what makes the pipeline's sequencing, role-swap, and teardown
//! behavior testable on machines with no graphics context at all.
//!
//! Draw calls update bookkeeping only; the headless device does not
//! rasterize. Visual output is the GL backend's job.

use std::collections::HashMap;

use crate::error::{CompileError, DeviceError};
use crate::gpu::{
    BufferId, Device, DrawMode, Filter, FramebufferId, ProgramId, ProgramReflection, TextureId,
    UniformSlot,
};
use crate::uniforms::UniformValue;

#[derive(Debug)]
struct HeadlessProgram {
    reflection: ProgramReflection,
    uniform_names: Vec<String>,
    /// Last value uploaded per slot, retained for assertions.
    uniform_values: HashMap<usize, UniformValue>,
}

#[derive(Debug)]
struct HeadlessTexture {
    data: Vec<u8>,
    shape: (u32, u32),
    filter: Filter,
}

/// A recording, in-memory [`Device`] implementation.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    programs: Vec<Option<HeadlessProgram>>,
    textures: Vec<Option<HeadlessTexture>>,
    buffers: Vec<Option<Vec<f32>>>,
    framebuffers: Vec<Option<()>>,
    viewport: [i32; 4],
    bound_program: Option<ProgramId>,
    bound_framebuffer: Option<(FramebufferId, Option<TextureId>)>,
    bound_textures: HashMap<u32, TextureId>,
    calls: u64,
    draw_calls: u64,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total device calls issued so far, across all operations.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Draw calls issued so far.
    pub fn draw_calls(&self) -> u64 {
        self.draw_calls
    }

    /// Read back the bytes of a live texture.
    pub fn texture_data(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures
            .get(texture.0)
            .and_then(|t| t.as_ref())
            .map(|t| t.data.as_slice())
    }

    /// Shape of a live texture.
    pub fn texture_shape(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(texture.0)
            .and_then(|t| t.as_ref())
            .map(|t| t.shape)
    }

    /// Filter mode of a live texture.
    pub fn texture_filter(&self, texture: TextureId) -> Option<Filter> {
        self.textures
            .get(texture.0)
            .and_then(|t| t.as_ref())
            .map(|t| t.filter)
    }

    /// Last value uploaded for a named uniform of the given program.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<&UniformValue> {
        let entry = self.programs.get(program.0)?.as_ref()?;
        let slot = entry.reflection.uniforms.get(name)?;
        entry.uniform_values.get(&slot.0)
    }

    /// Number of resources that have been created but not yet deleted.
    pub fn live_resources(&self) -> usize {
        self.programs.iter().filter(|p| p.is_some()).count()
            + self.textures.iter().filter(|t| t.is_some()).count()
            + self.buffers.iter().filter(|b| b.is_some()).count()
            + self.framebuffers.iter().filter(|f| f.is_some()).count()
    }

    /// Current viewport rectangle.
    pub fn current_viewport(&self) -> [i32; 4] {
        self.viewport
    }

    /// Texture currently bound to the given unit.
    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.bound_textures.get(&unit).copied()
    }

    /// Framebuffer and color attachment bound at the last bind call.
    pub fn bound_framebuffer(&self) -> Option<(FramebufferId, Option<TextureId>)> {
        self.bound_framebuffer
    }
}

/// Extract declared names from GLSL source text.
///
/// Good enough for reflection without a real compiler: declarations in the
/// built-in shaders are one per line, `uniform <type> <name>;` or
/// `attribute <type> <name>;`.
fn scan_declarations(source: &str, keyword: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("//") {
            continue;
        }
        let Some(rest) = line.strip_prefix(keyword) else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let decl = rest.trim_end_matches(';').trim();
        if let Some(name) = decl.split_whitespace().last() {
            let name = name.split('[').next().unwrap_or(name);
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

impl Device for HeadlessDevice {
    fn create_program(
        &mut self,
        vertex: &str,
        fragment: &str,
    ) -> Result<(ProgramId, ProgramReflection), CompileError> {
        self.calls += 1;

        if !vertex.contains("void main") {
            return Err(CompileError::Vertex("no entry point".into()));
        }
        if !fragment.contains("void main") {
            return Err(CompileError::Fragment("no entry point".into()));
        }

        let mut reflection = ProgramReflection::default();
        for (location, name) in scan_declarations(vertex, "attribute").into_iter().enumerate() {
            reflection.attributes.insert(name, location as u32);
        }

        let mut uniform_names = scan_declarations(vertex, "uniform");
        for name in scan_declarations(fragment, "uniform") {
            if !uniform_names.contains(&name) {
                uniform_names.push(name);
            }
        }
        for (slot, name) in uniform_names.iter().enumerate() {
            reflection.uniforms.insert(name.clone(), UniformSlot(slot));
        }

        let id = ProgramId(self.programs.len());
        self.programs.push(Some(HeadlessProgram {
            reflection: reflection.clone(),
            uniform_names,
            uniform_values: HashMap::new(),
        }));
        Ok((id, reflection))
    }

    fn create_texture(&mut self, data: &[u8], shape: (u32, u32), filter: Filter) -> TextureId {
        self.calls += 1;
        debug_assert_eq!(data.len(), shape.0 as usize * shape.1 as usize * 4);
        let id = TextureId(self.textures.len());
        self.textures.push(Some(HeadlessTexture {
            data: data.to_vec(),
            shape,
            filter,
        }));
        id
    }

    fn create_buffer(&mut self, data: &[f32]) -> BufferId {
        self.calls += 1;
        let id = BufferId(self.buffers.len());
        self.buffers.push(Some(data.to_vec()));
        id
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.calls += 1;
        let id = FramebufferId(self.framebuffers.len());
        self.framebuffers.push(Some(()));
        id
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.calls += 1;
        self.viewport = [x, y, width, height];
    }

    fn bind_framebuffer(
        &mut self,
        framebuffer: Option<FramebufferId>,
        color: Option<TextureId>,
    ) -> Result<(), DeviceError> {
        self.calls += 1;
        match framebuffer {
            Some(fb) => {
                if self.framebuffers.get(fb.0).map_or(true, |f| f.is_none()) {
                    return Err(DeviceError::UnknownFramebuffer(fb.0));
                }
                if let Some(tex) = color {
                    if self.textures.get(tex.0).map_or(true, |t| t.is_none()) {
                        return Err(DeviceError::UnknownTexture(tex.0));
                    }
                }
                self.bound_framebuffer = Some((fb, color));
            }
            None => self.bound_framebuffer = None,
        }
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), DeviceError> {
        self.calls += 1;
        if self.programs.get(program.0).map_or(true, |p| p.is_none()) {
            return Err(DeviceError::UnknownProgram(program.0));
        }
        self.bound_program = Some(program);
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureId, unit: u32) -> Result<(), DeviceError> {
        self.calls += 1;
        if self.textures.get(texture.0).map_or(true, |t| t.is_none()) {
            return Err(DeviceError::UnknownTexture(texture.0));
        }
        self.bound_textures.insert(unit, texture);
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        buffer: BufferId,
        _location: u32,
        _components: i32,
    ) -> Result<(), DeviceError> {
        self.calls += 1;
        if self.buffers.get(buffer.0).map_or(true, |b| b.is_none()) {
            return Err(DeviceError::UnknownBuffer(buffer.0));
        }
        Ok(())
    }

    fn set_uniform(&mut self, program: ProgramId, slot: UniformSlot, value: &UniformValue) {
        self.calls += 1;
        if let Some(Some(entry)) = self.programs.get_mut(program.0) {
            if slot.0 < entry.uniform_names.len() {
                entry.uniform_values.insert(slot.0, *value);
            }
        }
    }

    fn draw_arrays(&mut self, _mode: DrawMode, _first: i32, _count: i32) {
        self.calls += 1;
        self.draw_calls += 1;
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.calls += 1;
        if let Some(entry) = self.programs.get_mut(program.0) {
            *entry = None;
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.calls += 1;
        if let Some(entry) = self.textures.get_mut(texture.0) {
            *entry = None;
        }
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.calls += 1;
        if let Some(entry) = self.buffers.get_mut(buffer.0) {
            *entry = None;
        }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.calls += 1;
        if let Some(entry) = self.framebuffers.get_mut(framebuffer.0) {
            *entry = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders;

    #[test]
    fn test_reflection_from_builtin_sources() {
        let mut device = HeadlessDevice::new();
        let (_, reflection) = device
            .create_program(shaders::QUAD_VERTEX, shaders::UPDATE_FRAGMENT)
            .unwrap();

        assert!(reflection.attributes.contains_key("a_pos"));
        for name in ["u_particles", "u_wind", "u_wind_res", "speed", "drop", "seed"] {
            assert!(reflection.uniforms.contains_key(name), "missing {}", name);
        }
        assert!(!reflection.uniforms.contains_key("rand_constants"));
    }

    #[test]
    fn test_missing_entry_point_is_a_compile_error() {
        let mut device = HeadlessDevice::new();
        let result = device.create_program(shaders::QUAD_VERTEX, "uniform float broken;");
        assert!(matches!(result, Err(CompileError::Fragment(_))));
    }

    #[test]
    fn test_deleted_texture_is_rejected() {
        let mut device = HeadlessDevice::new();
        let tex = device.create_texture(&[0; 4], (1, 1), Filter::Nearest);
        assert!(device.bind_texture(tex, 0).is_ok());

        device.delete_texture(tex);
        assert_eq!(
            device.bind_texture(tex, 0),
            Err(DeviceError::UnknownTexture(0))
        );
    }

    #[test]
    fn test_delete_twice_is_noop() {
        let mut device = HeadlessDevice::new();
        let tex = device.create_texture(&[0; 4], (1, 1), Filter::Nearest);
        device.delete_texture(tex);
        device.delete_texture(tex);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_uniform_values_are_recorded() {
        let mut device = HeadlessDevice::new();
        let (program, reflection) = device
            .create_program(shaders::QUAD_VERTEX, shaders::SCREEN_FRAGMENT)
            .unwrap();
        let slot = reflection.uniforms["u_opacity"];
        device.set_uniform(program, slot, &UniformValue::Float(0.9));
        assert_eq!(
            device.uniform_value(program, "u_opacity"),
            Some(&UniformValue::Float(0.9))
        );
    }
}
