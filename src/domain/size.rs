//! Relative size classification and the scale multipliers derived from it
//!
//! Two products shown side by side at the same pixel height look wrong when
//! one is a refrigerator and the other a speaker. The scale table discounts
//! the smaller product so relative size still reads correctly.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Real-world size class of a product, as reported by extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SizeCategory {
    #[serde(rename = "L", alias = "Large", alias = "large")]
    Large,
    #[serde(rename = "M", alias = "Medium", alias = "medium")]
    Medium,
    #[serde(rename = "S", alias = "Small", alias = "small")]
    Small,
}

impl SizeCategory {
    /// Ordinal value used for comparisons (L=3, M=2, S=1)
    pub fn ordinal(self) -> u8 {
        match self {
            SizeCategory::Large => 3,
            SizeCategory::Medium => 2,
            SizeCategory::Small => 1,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SizeCategory::Large => "L",
            SizeCategory::Medium => "M",
            SizeCategory::Small => "S",
        }
    }
}

impl Default for SizeCategory {
    fn default() -> Self {
        SizeCategory::Medium
    }
}

/// Multipliers applied to the fitted size of each product, each in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct ScalePair {
    pub main: f64,
    pub second: f64,
}

impl ScalePair {
    pub const IDENTITY: ScalePair = ScalePair { main: 1.0, second: 1.0 };

    pub fn swapped(self) -> ScalePair {
        ScalePair {
            main: self.second,
            second: self.main,
        }
    }
}

/// Discount applied to the smaller product for each category pairing
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScaleTable {
    pub large_vs_medium: f64,
    pub large_vs_small: f64,
    pub medium_vs_small: f64,
    /// Used for any pairing the table does not name
    pub fallback: f64,
}

impl Default for ScaleTable {
    fn default() -> Self {
        ScaleTable {
            large_vs_medium: 0.75,
            large_vs_small: 0.55,
            medium_vs_small: 0.70,
            fallback: 0.70,
        }
    }
}

impl ScaleTable {
    /// Every multiplier must lie in (0, 1.0]
    pub fn validate(&self) -> Result<(), String> {
        let entries = [
            ("large_vs_medium", self.large_vs_medium),
            ("large_vs_small", self.large_vs_small),
            ("medium_vs_small", self.medium_vs_small),
            ("fallback", self.fallback),
        ];

        for (name, value) in entries {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("scale '{}' must be in (0, 1.0], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Resolve the scale pair for a main/second category combination.
    ///
    /// The larger product always keeps 1.0; equal categories give (1.0, 1.0).
    pub fn resolve(&self, main: SizeCategory, second: SizeCategory) -> ScalePair {
        if main.ordinal() == second.ordinal() {
            return ScalePair::IDENTITY;
        }

        let main_is_larger = main.ordinal() > second.ordinal();
        let (larger, smaller) = if main_is_larger { (main, second) } else { (second, main) };

        let discount = match (larger, smaller) {
            (SizeCategory::Large, SizeCategory::Medium) => self.large_vs_medium,
            (SizeCategory::Large, SizeCategory::Small) => self.large_vs_small,
            (SizeCategory::Medium, SizeCategory::Small) => self.medium_vs_small,
            _ => self.fallback,
        };

        if main_is_larger {
            ScalePair { main: 1.0, second: discount }
        } else {
            ScalePair { main: discount, second: 1.0 }
        }
    }
}

/// Resolve scales with the stock table
pub fn resolve_scales(main: SizeCategory, second: SizeCategory) -> ScalePair {
    ScaleTable::default().resolve(main, second)
}
