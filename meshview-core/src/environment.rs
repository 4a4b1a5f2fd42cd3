/// Equirectangular HDR environment maps
use std::f32::consts::{PI, TAU};

use image::ImageFormat;
use nalgebra::Vector3;

use crate::error::LoadError;
use crate::scene::Color;

/// Linear radiance stored row-major, longitude along x and latitude along y
#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pixels: Vec<Color>,
    average: Color,
}

impl EnvironmentMap {
    pub fn new(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, LoadError> {
        if width == 0 || height == 0 || pixels.len() != (width * height) as usize {
            return Err(LoadError::Empty);
        }
        let count = pixels.len() as f32;
        let sum = pixels.iter().fold(Color::BLACK, |acc, p| acc.add(p));
        Ok(Self {
            width,
            height,
            average: sum.scale(1.0 / count),
            pixels,
        })
    }

    /// Decode a Radiance `.hdr` file
    pub fn from_hdr_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)?.into_rgb32f();
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| Color::new(p[0], p[1], p[2]))
            .collect();
        Self::new(width, height, pixels)
    }

    /// Mean radiance, used as the ambient term
    pub fn average(&self) -> Color {
        self.average
    }

    /// Nearest-texel lookup for a world-space direction
    pub fn sample(&self, direction: &Vector3<f32>) -> Color {
        let Some(dir) = direction.try_normalize(f32::EPSILON) else {
            return self.average;
        };
        let u = 0.5 + dir.z.atan2(dir.x) / TAU;
        let v = dir.y.clamp(-1.0, 1.0).acos() / PI;
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }
}
