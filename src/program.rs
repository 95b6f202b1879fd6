//! Program compilation and the compiled-program set.
//!
//! Each named program is a (vertex, fragment) source pair looked up in the
//! [`ShaderSourceRegistry`] and compiled through the device. Reflection of
//! active attribute and uniform names happens exactly once, immediately
//! after a successful link, and the result is immutable afterwards.
//!
//! A link failure is logged and recorded as "unavailable" for that name
//! only; the remaining programs still compile, and stages depending on the
//! failed program simply never draw until a session is re-initiated with
//! fixed sources.

use std::collections::HashMap;

use crate::gpu::{Device, ProgramId, UniformSlot};
use crate::error::PipelineError;
use crate::shaders::ShaderSourceRegistry;

/// A linked program and its reflected locations.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    pub id: ProgramId,
    /// Active attribute name to vertex location.
    pub attributes: HashMap<String, u32>,
    /// Active uniform name to slot.
    pub uniforms: HashMap<String, UniformSlot>,
}

/// The set of programs compiled for one session.
///
/// Every requested name has an entry; the entry is `None` when compilation
/// failed ("unavailable").
#[derive(Debug, Default)]
pub struct ProgramSet {
    programs: HashMap<String, Option<ShaderProgram>>,
    released: bool,
}

impl ProgramSet {
    /// Compile every requested `(name, vertex source name, fragment source
    /// name)` triple. Failures are logged and tolerated per-program.
    pub fn compile(
        device: &mut impl Device,
        registry: &ShaderSourceRegistry,
        requests: &[(&str, &str, &str)],
    ) -> Self {
        let mut programs = HashMap::new();
        for &(name, vertex_name, fragment_name) in requests {
            let sources = match (registry.get(vertex_name), registry.get(fragment_name)) {
                (Some(vertex), Some(fragment)) => Some((vertex, fragment)),
                _ => {
                    log::error!(
                        "program '{}': missing shader source '{}' or '{}'",
                        name,
                        vertex_name,
                        fragment_name
                    );
                    None
                }
            };

            let compiled = sources.and_then(|(vertex, fragment)| {
                match device.create_program(vertex, fragment) {
                    Ok((id, reflection)) => Some(ShaderProgram {
                        id,
                        attributes: reflection.attributes,
                        uniforms: reflection.uniforms,
                    }),
                    Err(e) => {
                        log::error!("program '{}' failed to compile: {}", name, e);
                        None
                    }
                }
            });

            programs.insert(name.to_string(), compiled);
        }
        Self {
            programs,
            released: false,
        }
    }

    /// Look up a usable program. `None` covers both "never requested" and
    /// "failed to compile"; use [`resolve`](Self::resolve) to distinguish.
    pub fn get(&self, name: &str) -> Option<&ShaderProgram> {
        self.programs.get(name).and_then(|p| p.as_ref())
    }

    /// Resolve a program for stage execution.
    ///
    /// A name that was never requested is a broken pipeline contract and
    /// returns an error; a requested-but-unavailable program returns
    /// `Ok(None)` so the stage can be skipped.
    pub fn resolve(&self, name: &str) -> Result<Option<&ShaderProgram>, PipelineError> {
        match self.programs.get(name) {
            Some(program) => Ok(program.as_ref()),
            None => Err(PipelineError::MissingProgram(name.to_string())),
        }
    }

    /// Whether a name was requested at compile time.
    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    /// Number of requested programs that failed to compile.
    pub fn failed_count(&self) -> usize {
        self.programs.values().filter(|p| p.is_none()).count()
    }

    /// Release every linked program. Freed on the first call only.
    pub fn release_all(&mut self, device: &mut impl Device) {
        if self.released {
            return;
        }
        self.released = true;
        for program in self.programs.values_mut() {
            if let Some(program) = program.take() {
                device.delete_program(program.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;
    use crate::shaders;

    #[test]
    fn test_compile_builtin_programs() {
        let mut device = HeadlessDevice::new();
        let registry = ShaderSourceRegistry::builtin();
        let set = ProgramSet::compile(&mut device, &registry, &shaders::PIPELINE_PROGRAMS);

        assert_eq!(set.failed_count(), 0);
        for (name, _, _) in shaders::PIPELINE_PROGRAMS {
            let program = set.get(name).unwrap();
            assert!(!program.uniforms.is_empty(), "{} reflected no uniforms", name);
        }
        assert!(set.get("draw").unwrap().attributes.contains_key("a_index"));
    }

    #[test]
    fn test_one_failure_does_not_poison_the_rest() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderSourceRegistry::builtin();
        registry.insert("screen-fragment", "this does not link");

        let set = ProgramSet::compile(&mut device, &registry, &shaders::PIPELINE_PROGRAMS);
        assert_eq!(set.failed_count(), 1);
        assert!(set.get("screen").is_none());
        assert!(set.contains("screen"));
        assert!(set.get("draw").is_some());
        assert!(set.get("update").is_some());
    }

    #[test]
    fn test_resolve_distinguishes_absent_from_unavailable() {
        let mut device = HeadlessDevice::new();
        let mut registry = ShaderSourceRegistry::builtin();
        registry.insert("draw-fragment", "broken");
        let set = ProgramSet::compile(&mut device, &registry, &shaders::PIPELINE_PROGRAMS);

        assert!(matches!(set.resolve("draw"), Ok(None)));
        assert!(matches!(
            set.resolve("never-requested"),
            Err(PipelineError::MissingProgram(_))
        ));
    }

    #[test]
    fn test_release_all_frees_once() {
        let mut device = HeadlessDevice::new();
        let registry = ShaderSourceRegistry::builtin();
        let mut set = ProgramSet::compile(&mut device, &registry, &shaders::PIPELINE_PROGRAMS);

        set.release_all(&mut device);
        assert_eq!(device.live_resources(), 0);

        let calls = device.calls();
        set.release_all(&mut device);
        assert_eq!(device.calls(), calls);
    }
}
