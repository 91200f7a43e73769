//! Composition wizard stage machine
//!
//! `transition` is a pure function from (state, event) to the next state. All
//! network and pixel work happens in the session driver, which reports the
//! outcome back here as an event.
//!
//! ```text
//! Idle ─► ExtractingImages ─┬─► AwaitingConfirmation ─► RemovingBackground ─┬─► CroppingAfterSuccess ──────┐
//!   ▲                        └─► ExtractionFailed                            └─► FallbackCroppingOriginals ─┤
//!   │                                                                                                    ▼
//!   └──────────────────── Reset ◄── Ready ◄── Compositing ◄────────────────────────────── PreviewingCutouts
//! ```

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::{CroppedImage, ProductPair, ScalePair, ScaleTable, SizeCategory, SourceImage};
use crate::engine::CompositeSet;

/// An extracted product with its decoded image
#[derive(Debug, Clone)]
pub struct Product {
    /// Product page the image was extracted from
    pub page_url: String,
    pub image_url: String,
    pub image: SourceImage,
    pub size: SizeCategory,
}

/// Result of extracting one slot
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    Extracted(Product),
    Failed { page_url: String, message: String },
}

impl SlotOutcome {
    pub fn product(&self) -> Option<&Product> {
        match self {
            SlotOutcome::Extracted(product) => Some(product),
            SlotOutcome::Failed { .. } => None,
        }
    }
}

/// Stage name without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ExtractingImages,
    ExtractionFailed,
    AwaitingConfirmation,
    RemovingBackground,
    CroppingAfterSuccess,
    FallbackCroppingOriginals,
    PreviewingCutouts,
    Compositing,
    Ready,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::ExtractingImages => "extracting_images",
            Stage::ExtractionFailed => "extraction_failed",
            Stage::AwaitingConfirmation => "awaiting_confirmation",
            Stage::RemovingBackground => "removing_background",
            Stage::CroppingAfterSuccess => "cropping_after_success",
            Stage::FallbackCroppingOriginals => "fallback_cropping_originals",
            Stage::PreviewingCutouts => "previewing_cutouts",
            Stage::Compositing => "compositing",
            Stage::Ready => "ready",
        }
    }
}

/// Wizard state with everything each stage needs to render
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    ExtractingImages {
        urls: ProductPair<String>,
    },
    /// At least one slot failed; the other slot's result stays visible
    ExtractionFailed {
        outcomes: ProductPair<SlotOutcome>,
    },
    AwaitingConfirmation {
        products: ProductPair<Product>,
    },
    RemovingBackground {
        products: ProductPair<Product>,
    },
    CroppingAfterSuccess {
        products: ProductPair<Product>,
        removed: ProductPair<SourceImage>,
    },
    FallbackCroppingOriginals {
        products: ProductPair<Product>,
        reason: String,
    },
    PreviewingCutouts {
        products: ProductPair<Product>,
        cutouts: ProductPair<CroppedImage>,
        /// Set when background removal failed and the originals were cropped
        fallback_reason: Option<String>,
        /// Set when the last composite attempt failed
        last_error: Option<String>,
    },
    Compositing {
        products: ProductPair<Product>,
        cutouts: ProductPair<CroppedImage>,
        fallback_reason: Option<String>,
    },
    Ready {
        products: ProductPair<Product>,
        cutouts: ProductPair<CroppedImage>,
        fallback_reason: Option<String>,
        composites: CompositeSet,
    },
}

/// Inputs to the stage machine
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    SubmitUrls(ProductPair<String>),
    ExtractionFinished(ProductPair<SlotOutcome>),
    GoBack,
    Confirm,
    BackgroundRemoved(ProductPair<SourceImage>),
    BackgroundRemovalFailed(String),
    CroppingFinished(ProductPair<CroppedImage>),
    RequestComposite,
    CompositingFinished(CompositeSet),
    CompositingFailed(String),
    Reset,
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::SubmitUrls(_) => "submit_urls",
            PipelineEvent::ExtractionFinished(_) => "extraction_finished",
            PipelineEvent::GoBack => "go_back",
            PipelineEvent::Confirm => "confirm",
            PipelineEvent::BackgroundRemoved(_) => "background_removed",
            PipelineEvent::BackgroundRemovalFailed(_) => "background_removal_failed",
            PipelineEvent::CroppingFinished(_) => "cropping_finished",
            PipelineEvent::RequestComposite => "request_composite",
            PipelineEvent::CompositingFinished(_) => "compositing_finished",
            PipelineEvent::CompositingFailed(_) => "compositing_failed",
            PipelineEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {event} while {}", .stage.as_str())]
pub struct TransitionError {
    pub stage: Stage,
    pub event: &'static str,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Idle
    }
}

impl PipelineState {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineState::Idle => Stage::Idle,
            PipelineState::ExtractingImages { .. } => Stage::ExtractingImages,
            PipelineState::ExtractionFailed { .. } => Stage::ExtractionFailed,
            PipelineState::AwaitingConfirmation { .. } => Stage::AwaitingConfirmation,
            PipelineState::RemovingBackground { .. } => Stage::RemovingBackground,
            PipelineState::CroppingAfterSuccess { .. } => Stage::CroppingAfterSuccess,
            PipelineState::FallbackCroppingOriginals { .. } => Stage::FallbackCroppingOriginals,
            PipelineState::PreviewingCutouts { .. } => Stage::PreviewingCutouts,
            PipelineState::Compositing { .. } => Stage::Compositing,
            PipelineState::Ready { .. } => Stage::Ready,
        }
    }

    /// Products known to the current stage, if extraction has succeeded
    pub fn products(&self) -> Option<&ProductPair<Product>> {
        match self {
            PipelineState::AwaitingConfirmation { products }
            | PipelineState::RemovingBackground { products }
            | PipelineState::CroppingAfterSuccess { products, .. }
            | PipelineState::FallbackCroppingOriginals { products, .. }
            | PipelineState::PreviewingCutouts { products, .. }
            | PipelineState::Compositing { products, .. }
            | PipelineState::Ready { products, .. } => Some(products),
            _ => None,
        }
    }

    pub fn cutouts(&self) -> Option<&ProductPair<CroppedImage>> {
        match self {
            PipelineState::PreviewingCutouts { cutouts, .. }
            | PipelineState::Compositing { cutouts, .. }
            | PipelineState::Ready { cutouts, .. } => Some(cutouts),
            _ => None,
        }
    }

    /// Why the originals were cropped instead of the removal output, if they were
    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            PipelineState::FallbackCroppingOriginals { reason, .. } => Some(reason),
            PipelineState::PreviewingCutouts { fallback_reason, .. }
            | PipelineState::Compositing { fallback_reason, .. }
            | PipelineState::Ready { fallback_reason, .. } => fallback_reason.as_deref(),
            _ => None,
        }
    }

    pub fn composites(&self) -> Option<&CompositeSet> {
        match self {
            PipelineState::Ready { composites, .. } => Some(composites),
            _ => None,
        }
    }

    /// Images the cropping stages should trim: the removal output after
    /// success, the untouched originals after a fallback
    pub fn images_to_crop(&self) -> Option<ProductPair<SourceImage>> {
        match self {
            PipelineState::CroppingAfterSuccess { removed, .. } => Some(removed.clone()),
            PipelineState::FallbackCroppingOriginals { products, .. } => {
                Some(products.by_ref().map(|p| p.image.clone()))
            }
            _ => None,
        }
    }

    pub fn scales(&self, table: &ScaleTable) -> Option<ScalePair> {
        self.products()
            .map(|products| table.resolve(products.main.size, products.second.size))
    }

    /// Status line shown to the user
    pub fn status_message(&self) -> String {
        match self {
            PipelineState::Idle => "Enter two product URLs to begin".to_string(),
            PipelineState::ExtractingImages { .. } => "Extracting product images...".to_string(),
            PipelineState::ExtractionFailed { .. } => {
                "Could not extract every product image. Enter new URLs to try again".to_string()
            }
            PipelineState::AwaitingConfirmation { .. } => {
                "Check both product images, then confirm to remove backgrounds".to_string()
            }
            PipelineState::RemovingBackground { .. } => "Removing backgrounds...".to_string(),
            PipelineState::CroppingAfterSuccess { .. } => "Cropping cutouts...".to_string(),
            PipelineState::FallbackCroppingOriginals { .. } => {
                "Background removal failed, cropping the original images instead".to_string()
            }
            PipelineState::PreviewingCutouts { last_error: Some(error), .. } => {
                format!("Failed to generate composites: {}", error)
            }
            PipelineState::PreviewingCutouts { fallback_reason: Some(_), .. } => {
                "Background removal failed, using cropped original images".to_string()
            }
            PipelineState::PreviewingCutouts { .. } => {
                "Cutouts ready. Generate composites when they look right".to_string()
            }
            PipelineState::Compositing { .. } => "Generating composites...".to_string(),
            PipelineState::Ready { .. } => "Composites ready for download".to_string(),
        }
    }
}

/// Compute the next state. The current state is left untouched on error.
pub fn transition(state: &PipelineState, event: PipelineEvent) -> Result<PipelineState, TransitionError> {
    use PipelineEvent as E;
    use PipelineState as S;

    let next = match (state, event) {
        (_, E::Reset) => S::Idle,

        (S::Idle | S::ExtractionFailed { .. }, E::SubmitUrls(urls)) => S::ExtractingImages { urls },

        (S::ExtractingImages { .. }, E::ExtractionFinished(outcomes)) => match outcomes {
            ProductPair {
                main: SlotOutcome::Extracted(main),
                second: SlotOutcome::Extracted(second),
            } => S::AwaitingConfirmation {
                products: ProductPair::new(main, second),
            },
            outcomes => S::ExtractionFailed { outcomes },
        },

        (S::AwaitingConfirmation { .. }, E::GoBack) => S::Idle,

        (S::AwaitingConfirmation { products }, E::Confirm) => S::RemovingBackground {
            products: products.clone(),
        },

        (S::RemovingBackground { products }, E::BackgroundRemoved(removed)) => S::CroppingAfterSuccess {
            products: products.clone(),
            removed,
        },

        (S::RemovingBackground { products }, E::BackgroundRemovalFailed(reason)) => {
            S::FallbackCroppingOriginals {
                products: products.clone(),
                reason,
            }
        }

        (S::CroppingAfterSuccess { products, .. }, E::CroppingFinished(cutouts)) => S::PreviewingCutouts {
            products: products.clone(),
            cutouts,
            fallback_reason: None,
            last_error: None,
        },

        (S::FallbackCroppingOriginals { products, reason }, E::CroppingFinished(cutouts)) => {
            S::PreviewingCutouts {
                products: products.clone(),
                cutouts,
                fallback_reason: Some(reason.clone()),
                last_error: None,
            }
        }

        (S::PreviewingCutouts { products, cutouts, fallback_reason, .. }, E::RequestComposite) => {
            S::Compositing {
                products: products.clone(),
                cutouts: cutouts.clone(),
                fallback_reason: fallback_reason.clone(),
            }
        }

        (S::Compositing { products, cutouts, fallback_reason }, E::CompositingFinished(composites)) => S::Ready {
            products: products.clone(),
            cutouts: cutouts.clone(),
            fallback_reason: fallback_reason.clone(),
            composites,
        },

        // Halts in place: the cutouts stay up and the user can ask again
        (S::Compositing { products, cutouts, fallback_reason }, E::CompositingFailed(error)) => {
            S::PreviewingCutouts {
                products: products.clone(),
                cutouts: cutouts.clone(),
                fallback_reason: fallback_reason.clone(),
                last_error: Some(error),
            }
        }

        (state, event) => {
            return Err(TransitionError {
                stage: state.stage(),
                event: event.name(),
            })
        }
    };

    Ok(next)
}
