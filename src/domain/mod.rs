//! Domain types and models

mod canvas;
mod product;
mod size;

pub use canvas::{CanvasFormat, CanvasSpec, LayoutMetrics};
pub use product::{CroppedImage, PixelBounds, ProductPair, SourceImage};
pub use size::{resolve_scales, ScalePair, ScaleTable, SizeCategory};
