//! Shader source registry.
//!
//! Pure data: GLSL source text looked up by logical name. The built-in
//! sources cover the four-stage pipeline (trail fade, particle draw,
//! composite, position update); embedders can register additional sources
//! before compilation to extend or replace them.

use std::collections::HashMap;

/// Name of the GLSL attribute carrying the unit-quad corners.
pub const QUAD_ATTRIBUTE: &str = "a_pos";

/// Name of the GLSL attribute carrying particle indices.
pub const INDEX_ATTRIBUTE: &str = "a_index";

/// Reserved uniform name. When a program declares it, the executor uploads
/// the current high-resolution session time (milliseconds) on every draw.
pub const CLOCK_UNIFORM: &str = "u_time";

pub const QUAD_VERTEX: &str = include_str!("glsl/quad.vert.glsl");
pub const DRAW_VERTEX: &str = include_str!("glsl/draw.vert.glsl");
pub const DRAW_FRAGMENT: &str = include_str!("glsl/draw.frag.glsl");
pub const SCREEN_FRAGMENT: &str = include_str!("glsl/screen.frag.glsl");
pub const UPDATE_FRAGMENT: &str = include_str!("glsl/update.frag.glsl");

/// The three programs the pipeline compiles at session start, as
/// `(program name, vertex source name, fragment source name)`.
pub const PIPELINE_PROGRAMS: [(&str, &str, &str); 3] = [
    ("screen", "quad-vertex", "screen-fragment"),
    ("draw", "draw-vertex", "draw-fragment"),
    ("update", "quad-vertex", "update-fragment"),
];

/// Static lookup of shader source text by logical name.
#[derive(Debug, Clone)]
pub struct ShaderSourceRegistry {
    sources: HashMap<String, String>,
}

impl ShaderSourceRegistry {
    /// Registry preloaded with the built-in pipeline sources.
    pub fn builtin() -> Self {
        let mut registry = Self {
            sources: HashMap::new(),
        };
        registry.insert("quad-vertex", QUAD_VERTEX);
        registry.insert("draw-vertex", DRAW_VERTEX);
        registry.insert("draw-fragment", DRAW_FRAGMENT);
        registry.insert("screen-fragment", SCREEN_FRAGMENT);
        registry.insert("update-fragment", UPDATE_FRAGMENT);
        registry
    }

    /// Register (or replace) a source under a logical name.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    /// Look up a source by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for ShaderSourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
