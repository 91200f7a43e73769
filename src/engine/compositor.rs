//! Two-product composite rendering
//!
//! Lays two cropped cutouts onto a white canvas with a "+" between them and
//! encodes the result as PNG.

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{CanvasFormat, CanvasSpec, CroppedImage, ProductPair, ScalePair};
use super::layout::{plan_layout, LayoutDecision};
use super::raster::{Glyph, Raster, SoftwareRaster, BLACK, WHITE};

/// Compositing errors
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("{slot} image has zero size ({width}x{height})")]
    EmptyImage {
        slot: &'static str,
        width: u32,
        height: u32,
    },
    #[error("Canvas has zero size ({0}x{1})")]
    EmptyCanvas(u32, u32),
    #[error("Failed to encode composite: {0}")]
    EncodeFailed(#[from] image::ImageError),
}

/// A finished composite, encoded as PNG
#[derive(Debug, Clone)]
pub struct CompositeCanvas {
    pub spec: CanvasSpec,
    pub layout: LayoutDecision,
    pub png: Bytes,
}

impl CompositeCanvas {
    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }
}

/// Both marketing formats for one product pair
#[derive(Debug, Clone)]
pub struct CompositeSet {
    pub pbp: CompositeCanvas,
    pub square: CompositeCanvas,
}

impl CompositeSet {
    pub fn get(&self, format: CanvasFormat) -> &CompositeCanvas {
        match format {
            CanvasFormat::Pbp => &self.pbp,
            CanvasFormat::Square => &self.square,
        }
    }
}

/// Draw a composite onto any raster surface.
///
/// The main image is always drawn before the second one.
pub fn draw_composite<R: Raster>(
    raster: &mut R,
    cutouts: ProductPair<&CroppedImage>,
    scales: ScalePair,
) -> Result<LayoutDecision, ComposeError> {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return Err(ComposeError::EmptyCanvas(width, height));
    }
    check_not_empty("main", cutouts.main)?;
    check_not_empty("second", cutouts.second)?;

    let spec = CanvasSpec::new(width, height);
    let layout = plan_layout(&spec, cutouts.main.dimensions(), cutouts.second.dimensions(), scales);

    debug!(
        width,
        height,
        orientation = ?layout.orientation,
        main = ?layout.main_rect,
        second = ?layout.second_rect,
        "Planned composite layout"
    );

    raster.fill_background(WHITE);
    raster.draw_image(cutouts.main.image.image(), &layout.main_rect);
    raster.draw_image(cutouts.second.image.image(), &layout.second_rect);
    raster.draw_glyph(Glyph::Plus, &layout.plus, BLACK);

    Ok(layout)
}

/// Compose two cutouts onto a fresh canvas of the given size
pub fn compose(
    main: &CroppedImage,
    second: &CroppedImage,
    spec: CanvasSpec,
    scales: ScalePair,
) -> Result<CompositeCanvas, ComposeError> {
    let mut raster = SoftwareRaster::new(spec.width, spec.height);
    let layout = draw_composite(&mut raster, ProductPair::new(main, second), scales)?;
    let png = raster.export_png()?;

    info!(
        width = spec.width,
        height = spec.height,
        bytes = png.len(),
        "Composite rendered"
    );

    Ok(CompositeCanvas {
        spec,
        layout,
        png: Bytes::from(png),
    })
}

/// Render the wide and square formats, in that order
pub fn compose_all(
    cutouts: &ProductPair<CroppedImage>,
    scales: ScalePair,
) -> Result<CompositeSet, ComposeError> {
    let pbp = compose(&cutouts.main, &cutouts.second, CanvasFormat::Pbp.spec(), scales)?;
    let square = compose(&cutouts.main, &cutouts.second, CanvasFormat::Square.spec(), scales)?;
    Ok(CompositeSet { pbp, square })
}

fn check_not_empty(slot: &'static str, image: &CroppedImage) -> Result<(), ComposeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ComposeError::EmptyImage { slot, width, height });
    }
    Ok(())
}
