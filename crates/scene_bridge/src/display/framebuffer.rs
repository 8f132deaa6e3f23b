//! Pixel buffers pulled from the engine and the surface they are shown on

use crate::foundation::math::utils::luminance;

/// Tonemapped RGBA frame, row-major, bottom row first (engine order)
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height * 4` floats
    pub pixels: Vec<f32>,
}

impl Framebuffer {
    /// Black, fully transparent frame
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0.0; width as usize * height as usize * 4],
        }
    }

    /// Wrap existing pixel data; `None` if the length does not match
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<f32>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize * 4).then_some(Self { width, height, pixels })
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 4)
    }

    /// RGBA value of a pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        let i = self.offset(x, y)?;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Overwrite a pixel; out-of-range coordinates are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [f32; 4]) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 4].copy_from_slice(&rgba);
        }
    }

    /// Raw float bytes for upload to a display texture
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// 8-bit RGBA, flipped to top row first, for image files
    pub fn to_rgba8(&self) -> Vec<u8> {
        let row = self.width as usize * 4;
        let mut out = Vec::with_capacity(self.pixels.len());
        for line in self.pixels.chunks(row.max(1)).rev() {
            out.extend(line.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8));
        }
        out
    }

    /// Luminance of every pixel
    pub fn luminances(&self) -> impl Iterator<Item = f32> + '_ {
        self.pixels.chunks_exact(4).map(|p| luminance([p[0], p[1], p[2]]))
    }
}

/// Where pulled frames end up (the editor's viewport or image editor)
pub trait DisplaySurface {
    /// Show a new frame
    fn present(&mut self, frame: &Framebuffer);

    /// Show a status line; ignored by default
    fn set_status(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_access() {
        let mut frame = Framebuffer::new(4, 2);
        frame.set_pixel(3, 1, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(frame.pixel(3, 1), Some([1.0, 0.5, 0.25, 1.0]));
        assert_eq!(frame.pixel(4, 0), None);
        assert_eq!(frame.as_bytes().len(), 4 * 2 * 4 * 4);
    }

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(Framebuffer::from_pixels(2, 2, vec![0.0; 16]).is_some());
        assert!(Framebuffer::from_pixels(2, 2, vec![0.0; 15]).is_none());
    }

    #[test]
    fn test_rgba8_flips_rows() {
        let mut frame = Framebuffer::new(1, 2);
        frame.set_pixel(0, 0, [1.0, 1.0, 1.0, 1.0]);
        let bytes = frame.to_rgba8();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[255, 255, 255, 255]);
    }
}
