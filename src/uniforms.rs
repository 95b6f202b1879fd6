//! Uniform values and the per-session uniform table.
//!
//! Stages do not carry uniform values, only uniform *keys*. Each key is
//! resolved at execution time against a string-keyed [`UniformTable`] owned
//! by the session and the program's reflected locations. Keys missing from
//! either side are skipped with a one-time warning, so shader/parameter
//! drift during iteration never aborts a frame.
//!
//! # Example
//!
//! ```ignore
//! let mut table = UniformTable::new();
//! table.set("u_opacity", 0.92f32);
//! table.set("u_wind_min", Vec2::new(-15.0, -15.0));
//! table.set("u_particles", 1i32); // sampler unit
//! ```

use glam::Vec2;
use std::collections::HashMap;

/// Supported uniform value types.
///
/// The variants cover everything the built-in shaders declare: scalar floats
/// for simulation parameters, ints for sampler units, and 2-vectors for
/// resolutions and velocity ranges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
}

impl UniformValue {
    /// Number of scalar components uploaded for this value.
    pub fn arity(&self) -> usize {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) => 1,
            UniformValue::Vec2(_) => 2,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(Vec2::from_array(v))
    }
}

/// String-keyed collection of uniform values, resolved against program
/// reflections when a stage executes.
#[derive(Clone, Debug, Default)]
pub struct UniformTable {
    /// Ordered list of (name, value) pairs. Order is kept stable so
    /// diagnostics read the way the table was built.
    values: Vec<(String, UniformValue)>,
    /// Quick lookup by name.
    indices: HashMap<String, usize>,
}

impl UniformTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a value.
    pub fn set<V: Into<UniformValue>>(&mut self, name: &str, value: V) {
        let value = value.into();
        if let Some(&idx) = self.indices.get(name) {
            self.values[idx].1 = value;
        } else {
            let idx = self.values.len();
            self.values.push((name.to_string(), value));
            self.indices.insert(name.to_string(), idx);
        }
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.indices.get(name).map(|&idx| &self.values[idx].1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut table = UniformTable::new();
        table.set("u_opacity", 0.92f32);
        table.set("u_particles", 1i32);

        assert_eq!(table.get("u_opacity"), Some(&UniformValue::Float(0.92)));
        assert_eq!(table.get("u_particles"), Some(&UniformValue::Int(1)));
        assert_eq!(table.get("missing"), None);
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut table = UniformTable::new();
        table.set("seed", 0.1f32);
        table.set("u_opacity", 0.9f32);
        table.set("seed", 0.7f32);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("seed"), Some(&UniformValue::Float(0.7)));
        // Insertion order is preserved across overwrites.
        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["seed", "u_opacity"]);
    }

    #[test]
    fn test_arity() {
        assert_eq!(UniformValue::Float(1.0).arity(), 1);
        assert_eq!(UniformValue::Int(2).arity(), 1);
        assert_eq!(UniformValue::from([1.0, 2.0]).arity(), 2);
    }
}
