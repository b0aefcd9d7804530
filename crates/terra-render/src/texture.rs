//! CPU-side texture images and upload options.

use std::borrow::Cow;

use crate::error::RenderError;

/// Decoded RGBA8 pixels, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, RenderError> {
        let image = Self {
            width,
            height,
            rgba,
        };
        image.validate()?;
        Ok(image)
    }

    /// A single-texel image.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: rgba.to_vec(),
        }
    }

    /// Check that the pixel buffer matches the dimensions.
    pub fn validate(&self) -> Result<(), RenderError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.rgba.len() != expected {
            return Err(RenderError::TextureSize {
                width: self.width,
                height: self.height,
                expected,
                actual: self.rgba.len(),
            });
        }
        Ok(())
    }
}

/// How texel values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    /// Color data, decoded from sRGB on sampling.
    #[default]
    Srgb,
    /// Non-color data such as normal and bump maps.
    Linear,
}

/// Upload options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub color_space: ColorSpace,
    /// Mirror rows on upload.
    pub flip_y: bool,
    /// Multiply color channels by alpha on upload.
    pub premultiply_alpha: bool,
    /// Anisotropic filtering clamp; 1 disables it.
    pub anisotropy: u16,
    pub generate_mipmaps: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            color_space: ColorSpace::Srgb,
            flip_y: false,
            premultiply_alpha: false,
            anisotropy: 1,
            generate_mipmaps: true,
        }
    }
}

impl TextureOptions {
    /// Options for non-color maps.
    pub fn linear() -> Self {
        Self {
            color_space: ColorSpace::Linear,
            ..Self::default()
        }
    }

    pub fn with_anisotropy(mut self, anisotropy: u16) -> Self {
        self.anisotropy = anisotropy.max(1);
        self
    }
}

/// Pixels as they should be uploaded. Borrows when no transform applies.
pub fn prepare_pixels<'a>(image: &'a TextureImage, options: &TextureOptions) -> Cow<'a, [u8]> {
    if !options.flip_y && !options.premultiply_alpha {
        return Cow::Borrowed(&image.rgba);
    }
    let mut pixels = image.rgba.clone();
    if options.flip_y {
        let row = image.width as usize * 4;
        let rows = image.height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * row);
            top[y * row..(y + 1) * row].swap_with_slice(&mut bottom[..row]);
        }
    }
    if options.premultiply_alpha {
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3] as u16;
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }
    }
    Cow::Owned(pixels)
}

/// Calculates the number of mip levels for the given dimensions.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
