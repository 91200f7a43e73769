//! Image loading from URLs and data URIs

use async_trait::async_trait;
use base64::Engine;
use image::GenericImageView;
use tracing::debug;
use url::Url;

use crate::domain::SourceImage;
use crate::providers::traits::{ImageLoader, ProviderError, ProviderResult};

/// Loads images over HTTP(S) or straight from `data:` URIs
#[derive(Clone)]
pub struct HttpImageLoader {
    http_client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageLoader {
    pub fn new(http_client: reqwest::Client, max_bytes: usize) -> Self {
        HttpImageLoader { http_client, max_bytes }
    }

    async fn fetch(&self, url: &Url) -> ProviderResult<Vec<u8>> {
        debug!(url = %url, "Fetching image");

        let mut response = self.http_client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::ApiError {
                status: response.status().as_u16(),
                message: format!("Image fetch failed: {}", url),
            });
        }

        let limit = self.max_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ProviderError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong, so the body is bounded as it streams
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(ProviderError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, reference: &str) -> ProviderResult<SourceImage> {
        let bytes = if reference.starts_with("data:") {
            decode_data_uri(reference)?
        } else {
            let url = Url::parse(reference)
                .map_err(|e| ProviderError::Decode(format!("Invalid image URL '{}': {}", reference, e)))?;
            match url.scheme() {
                "http" | "https" => self.fetch(&url).await?,
                other => {
                    return Err(ProviderError::Decode(format!("Unsupported URL scheme: {}", other)));
                }
            }
        };

        decode_image(&bytes)
    }
}

/// Extract the payload of a base64 `data:` URI
pub fn decode_data_uri(uri: &str) -> ProviderResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ProviderError::Decode("Not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ProviderError::Decode("Data URI has no payload".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(ProviderError::Decode("Only base64 data URIs are supported".to_string()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ProviderError::Decode(format!("Invalid base64 payload: {}", e)))
}

/// Decode encoded bytes, rejecting zero-sized images
pub fn decode_image(bytes: &[u8]) -> ProviderResult<SourceImage> {
    let image = image::load_from_memory(bytes).map_err(|e| ProviderError::Decode(e.to_string()))?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ProviderError::Decode(format!("Image has zero size ({}x{})", width, height)));
    }

    debug!(width, height, "Image decoded");
    Ok(SourceImage::new(image))
}
