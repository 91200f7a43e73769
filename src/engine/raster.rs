//! Minimal raster drawing surface used by the compositor
//!
//! The compositor only needs four operations, so it talks to this trait
//! rather than to a concrete buffer. `SoftwareRaster` is the in-memory
//! implementation backed by an `RgbaImage`.

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, ImageError, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;

use super::layout::{GlyphPlacement, Rect};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Glyphs the raster knows how to draw without a font file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Bold plus sign
    Plus,
}

/// Drawing operations a composite needs
pub trait Raster {
    fn dimensions(&self) -> (u32, u32);

    /// Paint the whole surface with a solid color
    fn fill_background(&mut self, color: Rgba<u8>);

    /// Draw `image` stretched to `dest`, alpha-blended over what is there
    fn draw_image(&mut self, image: &DynamicImage, dest: &Rect);

    /// Draw a glyph centered on the placement point at the given font size
    fn draw_glyph(&mut self, glyph: Glyph, placement: &GlyphPlacement, color: Rgba<u8>);

    /// Encode the surface losslessly
    fn export_png(&self) -> Result<Vec<u8>, ImageError>;
}

/// CPU-side raster buffer
pub struct SoftwareRaster {
    buffer: RgbaImage,
}

impl SoftwareRaster {
    pub fn new(width: u32, height: u32) -> Self {
        SoftwareRaster {
            buffer: RgbaImage::new(width, height),
        }
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }
}

impl Raster for SoftwareRaster {
    fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    fn fill_background(&mut self, color: Rgba<u8>) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = color;
        }
    }

    fn draw_image(&mut self, image: &DynamicImage, dest: &Rect) {
        // Sub-pixel sizes and offsets snap to the nearest whole pixel
        let width = dest.width.round().max(1.0) as u32;
        let height = dest.height.round().max(1.0) as u32;

        let scaled = imageops::resize(&image.to_rgba8(), width, height, FilterType::Lanczos3);
        imageops::overlay(&mut self.buffer, &scaled, dest.x.round() as i64, dest.y.round() as i64);
    }

    fn draw_glyph(&mut self, glyph: Glyph, placement: &GlyphPlacement, color: Rgba<u8>) {
        match glyph {
            Glyph::Plus => {
                // Proportions of a bold sans-serif "+" relative to its font size
                let arm = (placement.size * 0.6).round().max(1.0);
                let stroke = (placement.size * 0.14).round().max(1.0);

                let bar = |w: f64, h: f64| {
                    imageproc::rect::Rect::at(
                        (placement.center_x - w / 2.0).round() as i32,
                        (placement.center_y - h / 2.0).round() as i32,
                    )
                    .of_size(w as u32, h as u32)
                };

                draw_filled_rect_mut(&mut self.buffer, bar(arm, stroke), color);
                draw_filled_rect_mut(&mut self.buffer, bar(stroke, arm), color);
            }
        }
    }

    fn export_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes).write_image(
            self.buffer.as_raw(),
            self.buffer.width(),
            self.buffer.height(),
            ColorType::Rgba8,
        )?;
        Ok(bytes)
    }
}
