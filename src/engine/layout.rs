//! Layout geometry for two-product composites
//!
//! Pure arithmetic in floating-point canvas units. Nothing here touches pixels;
//! the compositor feeds the resulting rectangles to a raster.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CanvasSpec, LayoutMetrics, ScalePair};

/// How the two product areas are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Side by side, main on the left
    Horizontal,
    /// Stacked, main on top
    Vertical,
}

/// Axis-aligned rectangle in canvas units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// A rectangle of the given size centered inside `self` on both axes
    pub fn centered(&self, width: f64, height: f64) -> Rect {
        Rect {
            x: self.x + (self.width - width) / 2.0,
            y: self.y + (self.height - height) / 2.0,
            width,
            height,
        }
    }
}

/// Where the "+" separator goes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct GlyphPlacement {
    pub center_x: f64,
    pub center_y: f64,
    pub size: f64,
}

/// Every rectangle needed to draw one composite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct LayoutDecision {
    pub orientation: Orientation,
    /// Half of the usable area reserved for the main product
    pub main_area: Rect,
    pub second_area: Rect,
    /// Where the main product is drawn, already scaled and centered
    pub main_rect: Rect,
    pub second_rect: Rect,
    pub plus: GlyphPlacement,
}

/// Choose side-by-side or stacked arrangement.
///
/// The wide canvas is always side by side. Other canvases stack only when both
/// products are landscape.
pub fn choose_orientation(canvas: &CanvasSpec, main: (u32, u32), second: (u32, u32)) -> Orientation {
    let landscape = |(w, h): (u32, u32)| w > h;

    if !canvas.is_wide() && landscape(main) && landscape(second) {
        Orientation::Vertical
    } else {
        Orientation::Horizontal
    }
}

/// Largest size with the image's aspect ratio that fits inside `area`
pub fn fit_within(image: (u32, u32), area: &Rect) -> (f64, f64) {
    let (w, h) = (image.0 as f64, image.1 as f64);
    let ratio = (area.width / w).min(area.height / h);
    (w * ratio, h * ratio)
}

/// Compute the full layout for two images on a canvas
pub fn plan_layout(
    canvas: &CanvasSpec,
    main: (u32, u32),
    second: (u32, u32),
    scales: ScalePair,
) -> LayoutDecision {
    let metrics = canvas.metrics();
    let orientation = choose_orientation(canvas, main, second);
    let (main_area, second_area) = split_areas(canvas, &metrics, orientation);

    let place = |image: (u32, u32), area: &Rect, scale: f64| {
        let (fit_w, fit_h) = fit_within(image, area);
        area.centered(fit_w * scale, fit_h * scale)
    };

    LayoutDecision {
        orientation,
        main_rect: place(main, &main_area, scales.main),
        second_rect: place(second, &second_area, scales.second),
        main_area,
        second_area,
        plus: GlyphPlacement {
            center_x: canvas.width as f64 / 2.0,
            center_y: canvas.height as f64 / 2.0,
            size: metrics.plus_size,
        },
    }
}

/// The two half-areas left after margins and the separator band
fn split_areas(canvas: &CanvasSpec, metrics: &LayoutMetrics, orientation: Orientation) -> (Rect, Rect) {
    let margin = metrics.safe_margin;
    let separator = metrics.separator_span();
    let usable_w = canvas.width as f64 - 2.0 * margin;
    let usable_h = canvas.height as f64 - 2.0 * margin;

    match orientation {
        Orientation::Horizontal => {
            let half = ((usable_w - separator) / 2.0).max(0.0);
            (
                Rect::new(margin, margin, half, usable_h),
                Rect::new(margin + half + separator, margin, half, usable_h),
            )
        }
        Orientation::Vertical => {
            let half = ((usable_h - separator) / 2.0).max(0.0);
            (
                Rect::new(margin, margin, usable_w, half),
                Rect::new(margin, margin + half + separator, usable_w, half),
            )
        }
    }
}
