use image::{imageops, ImageBuffer, Rgba, RgbaImage};

use crate::error::{RenderError, Result};

/// A single RGBA frame.
///
/// Thin wrapper around an `image` buffer with the pixel plumbing the
/// compositor needs: alpha-blended layering, resizing, and lossless PNG
/// encode/decode for the frame caches.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbaImage,
}

impl Frame {
    /// Create a new frame from an RGBA image buffer
    pub fn new(buffer: RgbaImage) -> Self {
        Self { buffer }
    }

    /// Opaque black canvas, the base every composite starts from.
    pub fn new_canvas(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, [0, 0, 0, 255])
    }

    /// Fully transparent frame of the given dimensions.
    pub fn new_transparent(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    /// Create a new frame filled with the specified RGBA color
    pub fn new_filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgba(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        self.buffer.put_pixel(x, y, Rgba(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbaImage {
        &mut self.buffer
    }

    /// Scaled copy. Lanczos3 keeps text overlay edges clean.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.width() == width && self.height() == height {
            return self.clone();
        }
        Frame::new(imageops::resize(
            &self.buffer,
            width,
            height,
            imageops::FilterType::Lanczos3,
        ))
    }

    /// Alpha-blend `layer` over this frame, modulated by `opacity` in
    /// `[0, 1]`. The layer must match this frame's dimensions; the
    /// compositor resizes layers before blending.
    pub fn blend_layer(&mut self, layer: &Frame, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity == 0.0 {
            return;
        }
        for (dst, src) in self.buffer.pixels_mut().zip(layer.buffer.pixels()) {
            let alpha = (src.0[3] as f64 / 255.0) * opacity;
            if alpha == 0.0 {
                continue;
            }
            for channel in 0..3 {
                let blended =
                    src.0[channel] as f64 * alpha + dst.0[channel] as f64 * (1.0 - alpha);
                dst.0[channel] = blended.round() as u8;
            }
            dst.0[3] = dst.0[3].max((alpha * 255.0).round() as u8);
        }
    }

    /// Lossless PNG encode of this frame.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width(), self.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RenderError::EncodingFailed {
                    reason: e.to_string(),
                })?;
            writer
                .write_image_data(self.buffer.as_raw())
                .map_err(|e| RenderError::EncodingFailed {
                    reason: e.to_string(),
                })?;
        }
        Ok(out)
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Result<Frame> {
        let img = image::load_from_memory(bytes).map_err(|e| RenderError::EncodingFailed {
            reason: format!("PNG decode failed: {e}"),
        })?;
        Ok(Frame::new(img.to_rgba8()))
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_png_bytes()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_is_opaque_black() {
        let frame = Frame::new_canvas(4, 2);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.get_pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn png_round_trip() {
        let mut frame = Frame::new_canvas(8, 8);
        frame.set_pixel(3, 4, [200, 10, 30, 255]);

        let bytes = frame.to_png_bytes().unwrap();
        let back = Frame::from_png_bytes(&bytes).unwrap();
        assert_eq!(back.width(), 8);
        assert_eq!(back.get_pixel(3, 4), [200, 10, 30, 255]);
    }

    #[test]
    fn blend_full_opacity_replaces_pixels() {
        let mut base = Frame::new_canvas(2, 2);
        let layer = Frame::new_filled(2, 2, [100, 150, 200, 255]);
        base.blend_layer(&layer, 1.0);
        assert_eq!(base.get_pixel(0, 0), [100, 150, 200, 255]);
    }

    #[test]
    fn blend_half_opacity_mixes() {
        let mut base = Frame::new_canvas(1, 1);
        let layer = Frame::new_filled(1, 1, [200, 200, 200, 255]);
        base.blend_layer(&layer, 0.5);
        assert_eq!(base.get_pixel(0, 0), [100, 100, 100, 255]);
    }

    #[test]
    fn blend_zero_opacity_is_noop() {
        let mut base = Frame::new_canvas(1, 1);
        let layer = Frame::new_filled(1, 1, [200, 200, 200, 255]);
        base.blend_layer(&layer, 0.0);
        assert_eq!(base.get_pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn blend_respects_layer_alpha() {
        let mut base = Frame::new_canvas(1, 1);
        // Layer pixel is itself half-transparent.
        let layer = Frame::new_filled(1, 1, [200, 200, 200, 128]);
        base.blend_layer(&layer, 1.0);
        let px = base.get_pixel(0, 0);
        assert!(px[0] > 95 && px[0] < 105);
    }

    #[test]
    fn resized_changes_dimensions() {
        let frame = Frame::new_canvas(16, 8);
        let resized = frame.resized(4, 2);
        assert_eq!((resized.width(), resized.height()), (4, 2));
    }
}
