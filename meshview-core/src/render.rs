/// Output surfaces and the final colour pipeline.
///
/// A [`Renderer`] owns one output surface inside a container. Backends
/// rasterize with [`crate::raster::Rasterizer`] and convert the linear result
/// with [`PixelEncoder`], which applies exposure, tone mapping and the output
/// colour space.
use crate::config::{ColorSpace, RendererSettings, ToneMapping};
use crate::layout::SurfaceSize;
use crate::projection::Camera;
use crate::scene::{Color, Scene};

/// Draws a scene graph through a camera into a pixel surface
pub trait Renderer {
    /// Resize the surface; `size` is in CSS pixels
    fn set_size(&mut self, size: SurfaceSize);

    fn render(&mut self, scene: &Scene, camera: &Camera);

    /// Detach the surface from its container
    fn release(&mut self) {}
}

/// Linear colour to display-ready 8-bit RGBA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelEncoder {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub color_space: ColorSpace,
}

impl PixelEncoder {
    pub fn new(settings: &RendererSettings) -> Self {
        Self {
            tone_mapping: settings.tone_mapping,
            exposure: settings.exposure,
            color_space: settings.color_space,
        }
    }

    pub fn tone_map(&self, color: Color) -> Color {
        match self.tone_mapping {
            ToneMapping::None => color,
            ToneMapping::Linear => color.scale(self.exposure),
            ToneMapping::AcesFilmic => {
                let exposed = color.scale(self.exposure);
                Color::new(aces_filmic(exposed.r), aces_filmic(exposed.g), aces_filmic(exposed.b))
            }
        }
    }

    fn encode_channel(&self, value: f32) -> u8 {
        let value = value.clamp(0.0, 1.0);
        let value = match self.color_space {
            ColorSpace::Linear => value,
            ColorSpace::Srgb => linear_to_srgb(value),
        };
        (value * 255.0).round() as u8
    }

    pub fn encode(&self, color: Color) -> [u8; 4] {
        let mapped = self.tone_map(color);
        [
            self.encode_channel(mapped.r),
            self.encode_channel(mapped.g),
            self.encode_channel(mapped.b),
            255,
        ]
    }

    /// Encode a whole frame into a tightly packed RGBA buffer
    pub fn encode_frame(&self, pixels: &[Color], out: &mut Vec<u8>) {
        out.clear();
        out.reserve(pixels.len() * 4);
        for pixel in pixels {
            out.extend_from_slice(&self.encode(*pixel));
        }
    }

    /// Display brightness in `[0, 1]`, for character-cell output
    pub fn brightness(&self, color: Color) -> f32 {
        let mapped = self.tone_map(color);
        let luminance = mapped.luminance().clamp(0.0, 1.0);
        match self.color_space {
            ColorSpace::Linear => luminance,
            ColorSpace::Srgb => linear_to_srgb(luminance),
        }
    }
}

impl Default for PixelEncoder {
    fn default() -> Self {
        Self::new(&RendererSettings::default())
    }
}

/// Narkowicz fit of the ACES filmic curve
pub fn aces_filmic(x: f32) -> f32 {
    let x = x.max(0.0) * 0.6;
    ((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)).clamp(0.0, 1.0)
}

pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(tone_mapping: ToneMapping, color_space: ColorSpace) -> PixelEncoder {
        PixelEncoder {
            tone_mapping,
            exposure: 1.0,
            color_space,
        }
    }

    #[test]
    fn test_white_and_black_survive_srgb() {
        let encoder = encoder(ToneMapping::None, ColorSpace::Srgb);
        assert_eq!(encoder.encode(Color::WHITE), [255, 255, 255, 255]);
        assert_eq!(encoder.encode(Color::BLACK), [0, 0, 0, 255]);
    }

    #[test]
    fn test_srgb_brightens_mid_grey() {
        let linear = encoder(ToneMapping::None, ColorSpace::Linear).encode(Color::new(0.2, 0.2, 0.2));
        let srgb = encoder(ToneMapping::None, ColorSpace::Srgb).encode(Color::new(0.2, 0.2, 0.2));
        assert!(srgb[0] > linear[0]);
    }

    #[test]
    fn test_aces_is_bounded_and_monotonic() {
        let mut previous = aces_filmic(0.0);
        assert_eq!(previous, 0.0);
        for i in 1..200 {
            let value = aces_filmic(i as f32 * 0.25);
            assert!(value >= previous);
            assert!(value <= 1.0);
            previous = value;
        }
    }

    #[test]
    fn test_exposure_scales_linear_mapping() {
        let mut encoder = encoder(ToneMapping::Linear, ColorSpace::Linear);
        encoder.exposure = 0.5;
        assert_eq!(encoder.encode(Color::WHITE)[0], 128);
    }

    #[test]
    fn test_encode_frame_packs_rgba() {
        let encoder = PixelEncoder::default();
        let mut out = Vec::new();
        encoder.encode_frame(&[Color::WHITE, Color::BLACK], &mut out);
        assert_eq!(out, vec![255, 255, 255, 255, 0, 0, 0, 255]);
    }
}
