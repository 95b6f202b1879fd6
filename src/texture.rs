//! Texture creation and the color-ramp lookup table.
//!
//! All textures in the pipeline are RGBA with one byte per channel: the
//! velocity field (decoded image), the particle state pair (position bytes),
//! the screen pair (accumulated trails), and the color ramp. The manager
//! owns every handle it creates and releases them together on teardown.

use image::RgbaImage;

use crate::error::TextureError;
use crate::gpu::{Device, Filter, TextureId};

/// A created 2D texture: handle, shape in pixels, and filter mode.
///
/// Handles are owned by the [`TextureManager`] that produced them; pipeline
/// stages only ever reference them.
#[derive(Debug, Clone, Copy)]
pub struct Texture {
    pub id: TextureId,
    pub shape: (u32, u32),
    pub filter: Filter,
}

/// Creates and owns 2D textures.
#[derive(Debug, Default)]
pub struct TextureManager {
    created: Vec<TextureId>,
    released: bool,
}

impl TextureManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a texture from raw RGBA bytes with an explicit shape.
    pub fn from_bytes(
        &mut self,
        device: &mut impl Device,
        data: &[u8],
        shape: (u32, u32),
        filter: Filter,
    ) -> Result<Texture, TextureError> {
        let expected = shape.0 as usize * shape.1 as usize * 4;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let id = device.create_texture(data, shape, filter);
        self.created.push(id);
        Ok(Texture { id, shape, filter })
    }

    /// Create a texture from a decoded image; the shape is inferred.
    pub fn from_image(
        &mut self,
        device: &mut impl Device,
        image: &RgbaImage,
        filter: Filter,
    ) -> Texture {
        let shape = image.dimensions();
        let id = device.create_texture(image.as_raw(), shape, filter);
        self.created.push(id);
        Texture { id, shape, filter }
    }

    /// Number of textures created and still owned.
    pub fn len(&self) -> usize {
        self.created.len()
    }

    /// Whether no textures have been created.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Release every owned texture. Safe to call more than once; handles
    /// are freed on the first call only.
    pub fn release_all(&mut self, device: &mut impl Device) {
        if self.released {
            return;
        }
        self.released = true;
        for id in self.created.drain(..) {
            device.delete_texture(id);
        }
    }
}

/// Side length of the square color-ramp texture.
pub const RAMP_SIDE: u32 = 16;

const RAMP_ENTRIES: usize = (RAMP_SIDE * RAMP_SIDE) as usize;

/// A color stop: normalized offset in `0..=1` and a hex color.
///
/// Colors accept `#rrggbb` and `#rrggbbaa`, with or without the leading `#`.
#[derive(Debug, Clone)]
pub struct ColorStop {
    pub offset: f32,
    pub color: String,
}

impl ColorStop {
    pub fn new(offset: f32, color: impl Into<String>) -> Self {
        Self {
            offset,
            color: color.into(),
        }
    }
}

/// A 256-entry color lookup table, stored as a 16x16 RGBA texture image.
///
/// Entry `i` maps the normalized value `i / 255` to a color interpolated
/// between the surrounding stops. The draw shader samples it with the
/// matching `fract`/`floor` addressing.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    pixels: Vec<u8>,
}

impl ColorRamp {
    /// Build the lookup table from color stops.
    ///
    /// Stops are sorted by offset; values before the first stop clamp to
    /// its color, values after the last stop clamp likewise.
    pub fn from_stops(stops: &[ColorStop]) -> Result<Self, TextureError> {
        if stops.is_empty() {
            return Err(TextureError::EmptyRamp);
        }

        let mut parsed: Vec<(f32, [u8; 4])> = stops
            .iter()
            .map(|stop| Ok((stop.offset, parse_hex_color(&stop.color)?)))
            .collect::<Result<_, TextureError>>()?;
        parsed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut pixels = Vec::with_capacity(RAMP_ENTRIES * 4);
        for i in 0..RAMP_ENTRIES {
            let t = i as f32 / (RAMP_ENTRIES - 1) as f32;
            pixels.extend_from_slice(&interpolate(&parsed, t));
        }
        Ok(Self { pixels })
    }

    /// Raw RGBA bytes, row-major, `RAMP_SIDE * RAMP_SIDE * 4` long.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Shape of the ramp texture.
    pub fn shape() -> (u32, u32) {
        (RAMP_SIDE, RAMP_SIDE)
    }

    /// Sample the table at a normalized position, CPU-side.
    ///
    /// Mirrors the shader lookup; used by tests and preview tooling.
    pub fn sample(&self, t: f32) -> [u8; 4] {
        let index = (t.clamp(0.0, 1.0) * (RAMP_ENTRIES - 1) as f32).round() as usize;
        let offset = index * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }
}

fn interpolate(stops: &[(f32, [u8; 4])], t: f32) -> [u8; 4] {
    let first = stops[0];
    let last = stops[stops.len() - 1];
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }
    for pair in stops.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t >= t0 && t <= t1 {
            let span = t1 - t0;
            let f = if span > 0.0 { (t - t0) / span } else { 0.0 };
            return [
                lerp_u8(c0[0], c1[0], f),
                lerp_u8(c0[1], c1[1], f),
                lerp_u8(c0[2], c1[2], f),
                lerp_u8(c0[3], c1[3], f),
            ];
        }
    }
    last.1
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let a = a as f32;
    let b = b as f32;
    (a + (b - a) * t).round() as u8
}

/// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional) into RGBA bytes.
pub fn parse_hex_color(color: &str) -> Result<[u8; 4], TextureError> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    let bad = || TextureError::BadColor(color.to_string());

    let channel = |i: usize| -> Result<u8, TextureError> {
        u8::from_str_radix(hex.get(i..i + 2).ok_or_else(bad)?, 16).map_err(|_| bad())
    };

    match hex.len() {
        6 => Ok([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Ok([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless::HeadlessDevice;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#deabab").unwrap(), [0xde, 0xab, 0xab, 255]);
        assert_eq!(
            parse_hex_color("660066ff").unwrap(),
            [0x66, 0x00, 0x66, 0xff]
        );
        assert!(parse_hex_color("#66").is_err());
        assert!(parse_hex_color("not-a-color").is_err());
    }

    #[test]
    fn test_ramp_endpoints() {
        let ramp = ColorRamp::from_stops(&[
            ColorStop::new(0.0, "#000000"),
            ColorStop::new(1.0, "#ffffff"),
        ])
        .unwrap();

        assert_eq!(ramp.sample(0.0), [0, 0, 0, 255]);
        assert_eq!(ramp.sample(1.0), [255, 255, 255, 255]);
        assert_eq!(ramp.pixels().len(), (RAMP_SIDE * RAMP_SIDE * 4) as usize);
    }

    #[test]
    fn test_ramp_midpoint_is_interpolated() {
        let ramp = ColorRamp::from_stops(&[
            ColorStop::new(0.0, "#000000"),
            ColorStop::new(1.0, "#ffffff"),
        ])
        .unwrap();

        let [r, g, b, _] = ramp.sample(0.5);
        for channel in [r, g, b] {
            assert!((126..=129).contains(&channel), "got {}", channel);
        }
    }

    #[test]
    fn test_ramp_clamps_outside_stops() {
        let ramp = ColorRamp::from_stops(&[
            ColorStop::new(0.25, "#ff0000"),
            ColorStop::new(0.75, "#0000ff"),
        ])
        .unwrap();

        assert_eq!(ramp.sample(0.0), [255, 0, 0, 255]);
        assert_eq!(ramp.sample(1.0), [0, 0, 255, 255]);
    }

    #[test]
    fn test_manager_checks_byte_length() {
        let mut device = HeadlessDevice::new();
        let mut manager = TextureManager::new();
        let result = manager.from_bytes(&mut device, &[0u8; 7], (2, 2), Filter::Nearest);
        assert!(matches!(
            result,
            Err(TextureError::SizeMismatch {
                expected: 16,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_manager_rejects_shapes_past_u32_byte_lengths() {
        let mut device = HeadlessDevice::new();
        let mut manager = TextureManager::new();
        // 65536 * 65536 * 4 bytes does not fit in u32.
        let result = manager.from_bytes(&mut device, &[0u8; 16], (65_536, 65_536), Filter::Nearest);
        assert!(matches!(
            result,
            Err(TextureError::SizeMismatch {
                expected: 17_179_869_184,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_manager_release_all_frees_once() {
        let mut device = HeadlessDevice::new();
        let mut manager = TextureManager::new();
        manager
            .from_bytes(&mut device, &[0u8; 16], (2, 2), Filter::Nearest)
            .unwrap();
        assert_eq!(device.live_resources(), 1);

        manager.release_all(&mut device);
        let calls = device.calls();
        manager.release_all(&mut device);

        assert_eq!(device.live_resources(), 0);
        assert_eq!(device.calls(), calls);
    }
}
