//! Images flowing through the pipeline and the main/second pairing

use std::sync::Arc;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use utoipa::ToSchema;

/// A decoded raster image, shared read-only between pipeline stages
#[derive(Debug, Clone)]
pub struct SourceImage(Arc<DynamicImage>);

impl SourceImage {
    pub fn new(image: DynamicImage) -> Self {
        SourceImage(Arc::new(image))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Zero-sized images cannot be laid out
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn is_landscape(&self) -> bool {
        self.width() > self.height()
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        SourceImage::new(image)
    }
}

/// Inclusive-exclusive pixel rectangle of visible content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An image after transparent-border trimming
#[derive(Debug, Clone)]
pub struct CroppedImage {
    pub image: SourceImage,
    /// `None` when no crop was applied and `image` is the original
    pub bounds: Option<PixelBounds>,
}

impl CroppedImage {
    pub fn uncropped(image: SourceImage) -> Self {
        CroppedImage { image, bounds: None }
    }

    pub fn was_trimmed(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// The main product and the second product, always in that order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPair<T> {
    pub main: T,
    pub second: T,
}

impl<T> ProductPair<T> {
    pub fn new(main: T, second: T) -> Self {
        ProductPair { main, second }
    }

    pub fn by_ref(&self) -> ProductPair<&T> {
        ProductPair {
            main: &self.main,
            second: &self.second,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> ProductPair<U> {
        ProductPair {
            main: f(self.main),
            second: f(self.second),
        }
    }
}

impl<T, E> ProductPair<Result<T, E>> {
    /// Both values, or the first error in main/second order
    pub fn transpose(self) -> Result<ProductPair<T>, E> {
        Ok(ProductPair {
            main: self.main?,
            second: self.second?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_orientation() {
        let wide = SourceImage::new(DynamicImage::ImageRgba8(RgbaImage::new(20, 10)));
        let square = SourceImage::new(DynamicImage::ImageRgba8(RgbaImage::new(10, 10)));
        assert!(wide.is_landscape());
        assert!(!square.is_landscape());
        assert!(!square.is_empty());
    }

    #[test]
    fn test_pair_transpose_keeps_first_error() {
        let pair: ProductPair<Result<u8, &str>> = ProductPair::new(Err("main"), Err("second"));
        assert_eq!(pair.transpose(), Err("main"));

        let pair: ProductPair<Result<u8, &str>> = ProductPair::new(Ok(1), Ok(2));
        assert_eq!(pair.transpose(), Ok(ProductPair::new(1, 2)));
    }
}
