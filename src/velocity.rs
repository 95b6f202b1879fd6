//! Velocity field input.
//!
//! The field arrives as an RGBA image whose R and G channels hold the
//! normalized u/v velocity components, plus metadata giving the per-channel
//! `{min, max}` range needed to decode them. Fetching and JSON parsing are
//! the embedder's concern; this module only defines the handoff types and a
//! file-loading convenience for native use.

use std::path::Path;

use image::RgbaImage;

use crate::error::TextureError;

/// Decoding range for one velocity component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    pub min: f32,
    pub max: f32,
}

impl ChannelRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Per-channel decoding ranges for the velocity image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityMetadata {
    /// Horizontal component range.
    pub u: ChannelRange,
    /// Vertical component range.
    pub v: ChannelRange,
}

/// A velocity field: image data plus decoding metadata.
#[derive(Debug, Clone)]
pub struct VelocityField {
    pub image: RgbaImage,
    pub metadata: VelocityMetadata,
}

impl VelocityField {
    pub fn new(image: RgbaImage, metadata: VelocityMetadata) -> Self {
        Self { image, metadata }
    }

    /// Build a field from raw RGBA bytes with an explicit shape. Useful for
    /// synthetic fields in tests and demos.
    pub fn from_bytes(
        data: Vec<u8>,
        shape: (u32, u32),
        metadata: VelocityMetadata,
    ) -> Result<Self, TextureError> {
        let expected = shape.0 as usize * shape.1 as usize * 4;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let image = RgbaImage::from_raw(shape.0, shape.1, data).ok_or(
            TextureError::SizeMismatch {
                expected,
                actual: 0,
            },
        )?;
        Ok(Self { image, metadata })
    }

    /// Load the field image from disk.
    pub fn open<P: AsRef<Path>>(path: P, metadata: VelocityMetadata) -> Result<Self, TextureError> {
        let image = image::open(path.as_ref())?.into_rgba8();
        Ok(Self { image, metadata })
    }

    /// Image dimensions in pixels.
    pub fn shape(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Minimum (u, v) components, for the `u_wind_min` uniform.
    pub fn wind_min(&self) -> [f32; 2] {
        [self.metadata.u.min, self.metadata.v.min]
    }

    /// Maximum (u, v) components, for the `u_wind_max` uniform.
    pub fn wind_max(&self) -> [f32; 2] {
        [self.metadata.u.max, self.metadata.v.max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> VelocityMetadata {
        VelocityMetadata {
            u: ChannelRange::new(-12.5, 14.0),
            v: ChannelRange::new(-9.0, 11.5),
        }
    }

    #[test]
    fn test_from_bytes_checks_length() {
        let result = VelocityField::from_bytes(vec![0; 15], (2, 2), metadata());
        assert!(matches!(
            result,
            Err(TextureError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn test_from_bytes_survives_huge_shapes() {
        let result = VelocityField::from_bytes(vec![0; 16], (65_536, 65_536), metadata());
        assert!(matches!(
            result,
            Err(TextureError::SizeMismatch {
                expected: 17_179_869_184,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_wind_ranges() {
        let field = VelocityField::from_bytes(vec![0; 16], (2, 2), metadata()).unwrap();
        assert_eq!(field.shape(), (2, 2));
        assert_eq!(field.wind_min(), [-12.5, -9.0]);
        assert_eq!(field.wind_max(), [14.0, 11.5]);
    }
}
