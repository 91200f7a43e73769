//! Target canvas formats and the spacing metrics that go with them

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Wide "PBP" canvas dimensions
pub const PBP_WIDTH: u32 = 2010;
pub const PBP_HEIGHT: u32 = 1334;

/// Square multi-purpose canvas dimensions
pub const SQUARE_SIZE: u32 = 450;

/// The two marketing canvases every composite request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CanvasFormat {
    Pbp,
    Square,
}

impl CanvasFormat {
    /// Formats in the order they are composed
    pub const ALL: [CanvasFormat; 2] = [CanvasFormat::Pbp, CanvasFormat::Square];

    pub fn spec(self) -> CanvasSpec {
        match self {
            CanvasFormat::Pbp => CanvasSpec::new(PBP_WIDTH, PBP_HEIGHT),
            CanvasFormat::Square => CanvasSpec::new(SQUARE_SIZE, SQUARE_SIZE),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CanvasFormat::Pbp => "pbp",
            CanvasFormat::Square => "square",
        }
    }

    pub fn parse(value: &str) -> Option<CanvasFormat> {
        match value.to_ascii_lowercase().as_str() {
            "pbp" => Some(CanvasFormat::Pbp),
            "square" => Some(CanvasFormat::Square),
            _ => None,
        }
    }
}

/// Pixel dimensions of a target canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

impl CanvasSpec {
    pub fn new(width: u32, height: u32) -> Self {
        CanvasSpec { width, height }
    }

    /// The wide canvas gets tripled spacing and always lays out side by side
    pub fn is_wide(&self) -> bool {
        self.width == PBP_WIDTH
    }

    pub fn metrics(&self) -> LayoutMetrics {
        if self.is_wide() {
            LayoutMetrics::WIDE
        } else {
            LayoutMetrics::SQUARE
        }
    }
}

/// Margin and separator sizing for a canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    /// Blank border kept on every side
    pub safe_margin: f64,
    /// Font size of the "+" separator
    pub plus_size: f64,
    /// Space between the "+" and each product area
    pub plus_gap: f64,
}

impl LayoutMetrics {
    pub const WIDE: LayoutMetrics = LayoutMetrics {
        safe_margin: 120.0,
        plus_size: 120.0,
        plus_gap: 40.0,
    };

    pub const SQUARE: LayoutMetrics = LayoutMetrics {
        safe_margin: 40.0,
        plus_size: 40.0,
        plus_gap: 15.0,
    };

    /// Space reserved between the two product areas
    pub fn separator_span(&self) -> f64 {
        self.plus_size + 2.0 * self.plus_gap
    }
}
