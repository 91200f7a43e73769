//! Collaborator contracts
//!
//! The pipeline never talks to the network directly. It goes through these
//! traits so the webhook implementations can be swapped for test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{SizeCategory, SourceImage};

// ============================================================================
// Error Types
// ============================================================================

/// Collaborator error types
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// The collaborator answered but reported `success: false`
    #[error("{0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Result type for collaborator operations
pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// Wire Types
// ============================================================================

/// Body sent to the extraction webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub url: String,
}

/// Answer from the extraction webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub success: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub size_category: Option<SizeCategory>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body sent to the background-removal webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemovalRequest {
    pub main_image_url: String,
    pub second_image_url: String,
}

/// Answer from the background-removal webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundRemovalResponse {
    pub success: bool,
    /// PNG data URI
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub second_image: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Domain Results
// ============================================================================

/// Product image located on a product page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub image_url: String,
    /// Medium when the collaborator did not classify the product
    pub size_category: SizeCategory,
}

impl ExtractionResponse {
    /// Interpret the webhook answer
    pub fn into_result(self) -> ProviderResult<ExtractedImage> {
        if !self.success {
            return Err(ProviderError::Rejected(
                self.error.unwrap_or_else(|| "Image extraction failed".to_string()),
            ));
        }

        let image_url = self
            .image_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::ParseError("Extraction succeeded without an imageUrl".to_string()))?;

        Ok(ExtractedImage {
            image_url,
            size_category: self.size_category.unwrap_or_default(),
        })
    }
}

/// Background-removed cutouts as data URIs, main first
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedBackgrounds {
    pub main: String,
    pub second: String,
}

impl BackgroundRemovalResponse {
    /// Interpret the webhook answer
    pub fn into_result(self) -> ProviderResult<RemovedBackgrounds> {
        if !self.success {
            return Err(ProviderError::Rejected(
                self.error.unwrap_or_else(|| "Background removal failed".to_string()),
            ));
        }

        match (self.main_image, self.second_image) {
            (Some(main), Some(second)) => Ok(RemovedBackgrounds { main, second }),
            _ => Err(ProviderError::ParseError(
                "Background removal succeeded without both images".to_string(),
            )),
        }
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Finds the main product image on a product page
#[async_trait]
pub trait ImageExtractor: Send + Sync {
    async fn extract(&self, product_url: &str) -> ProviderResult<ExtractedImage>;
}

/// Removes the background from both product images in one call
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_backgrounds(
        &self,
        main_image_url: &str,
        second_image_url: &str,
    ) -> ProviderResult<RemovedBackgrounds>;
}

/// Turns an image reference (URL or data URI) into decoded pixels
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, reference: &str) -> ProviderResult<SourceImage>;
}
