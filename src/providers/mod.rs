//! Collaborator integration
//!
//! The composition pipeline depends on three outside services:
//!
//! ```text
//!   product URL ──► ImageExtractor ──► image URL + size class
//!   image URLs  ──► BackgroundRemover ──► cutout data URIs
//!   URL / data URI ──► ImageLoader ──► decoded pixels
//! ```
//!
//! Each is a trait; the production implementations call webhooks through a
//! shared rate-limited client.

pub mod traits;
pub mod http_client;
pub mod loader;
pub mod webhook;

pub use traits::{
    BackgroundRemover,
    ExtractedImage,
    ImageExtractor,
    ImageLoader,
    ProviderError,
    ProviderResult,
    RemovedBackgrounds,
};
pub use http_client::RateLimitedClient;
pub use loader::HttpImageLoader;
pub use webhook::{WebhookBackgroundRemover, WebhookExtractor};
