//! Transparent border trimming
//!
//! Finds the tight bounding box of visible pixels in a cutout and crops to it.

use image::{DynamicImage, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{CroppedImage, PixelBounds, SourceImage};

/// Pixels with alpha at or below this are treated as background
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 20;

/// Crop `image` to its visible content using the default alpha threshold
pub fn crop_transparent(image: &SourceImage) -> CroppedImage {
    crop_transparent_with(image, DEFAULT_ALPHA_THRESHOLD)
}

/// Crop `image` to the bounding box of pixels whose alpha exceeds `threshold`.
///
/// Returns the original image untouched when nothing is visible or the
/// detected box is degenerate.
pub fn crop_transparent_with(image: &SourceImage, threshold: u8) -> CroppedImage {
    let rgba = image.image().to_rgba8();

    let Some(bounds) = visible_bounds(&rgba, threshold) else {
        debug!(
            width = image.width(),
            height = image.height(),
            "No visible content to crop, keeping original"
        );
        return CroppedImage::uncropped(image.clone());
    };

    if (bounds.width, bounds.height) == image.dimensions() {
        return CroppedImage::uncropped(image.clone());
    }

    let cropped = image
        .image()
        .crop_imm(bounds.x, bounds.y, bounds.width, bounds.height);

    debug!(
        from_width = image.width(),
        from_height = image.height(),
        to_width = cropped.width(),
        to_height = cropped.height(),
        "Cropped transparent border"
    );

    CroppedImage {
        image: SourceImage::new(DynamicImage::ImageRgba8(cropped.to_rgba8())),
        bounds: Some(bounds),
    }
}

/// Inclusive extents of one row: (min_x, max_x)
type RowSpan = (u32, u32);

/// Bounding box of pixels with alpha above `threshold`, if any.
///
/// A single visible pixel yields a 1x1 box.
pub fn visible_bounds(rgba: &RgbaImage, threshold: u8) -> Option<PixelBounds> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let row_len = width as usize * 4;

    // Scan rows in parallel; each row reports its leftmost and rightmost visible pixel
    let (min_x, max_x, min_y, max_y) = rgba
        .as_raw()
        .par_chunks_exact(row_len)
        .enumerate()
        .filter_map(|(y, row)| row_span(row, threshold).map(|span| (y as u32, span)))
        .fold(
            || None,
            |acc: Option<(u32, u32, u32, u32)>, (y, (lo, hi))| Some(merge(acc, (lo, hi, y, y))),
        )
        .reduce(
            || None,
            |a, b| match (a, b) {
                (Some(a), Some(b)) => Some(merge(Some(a), b)),
                (a, None) => a,
                (None, b) => b,
            },
        )?;

    // Inclusive box; a degenerate box cannot occur once a pixel has been found
    let bounds = PixelBounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    };

    (bounds.width > 0 && bounds.height > 0).then_some(bounds)
}

fn row_span(row: &[u8], threshold: u8) -> Option<RowSpan> {
    let mut visible = row
        .chunks_exact(4)
        .enumerate()
        .filter(|(_, px)| px[3] > threshold)
        .map(|(x, _)| x as u32);

    let first = visible.next()?;
    let last = visible.last().unwrap_or(first);
    Some((first, last))
}

fn merge(acc: Option<(u32, u32, u32, u32)>, next: (u32, u32, u32, u32)) -> (u32, u32, u32, u32) {
    match acc {
        None => next,
        Some((min_x, max_x, min_y, max_y)) => (
            min_x.min(next.0),
            max_x.max(next.1),
            min_y.min(next.2),
            max_y.max(next.3),
        ),
    }
}
