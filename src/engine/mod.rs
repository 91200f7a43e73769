//! Composition engine
//!
//! This module contains the image work of the pipeline:
//! - Transparent border cropping
//! - Two-product layout geometry
//! - Raster drawing and composite rendering
//! - PNG export with dated filenames

pub mod crop;
pub mod layout;
pub mod raster;
pub mod compositor;
pub mod export;

pub use crop::crop_transparent_with;
pub use compositor::{compose_all, CompositeSet};
pub use export::{export, ExportedImage};
pub use layout::Orientation;
