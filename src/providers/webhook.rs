//! Webhook-backed collaborators
//!
//! Both the extraction and background-removal steps are edge functions that
//! take a small JSON body and answer with `{ success, ... }`.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::config::ProviderSettings;
use crate::providers::http_client::RateLimitedClient;
use crate::providers::traits::{
    BackgroundRemovalRequest, BackgroundRemovalResponse, BackgroundRemover, ExtractedImage,
    ExtractionRequest, ExtractionResponse, ImageExtractor, ProviderError, ProviderResult,
    RemovedBackgrounds,
};

/// One configured webhook endpoint
#[derive(Clone)]
struct Endpoint {
    client: RateLimitedClient,
    url: String,
    api_key: Option<String>,
    name: &'static str,
}

impl Endpoint {
    fn new(client: RateLimitedClient, url: &str, api_key: Option<String>, name: &'static str) -> Self {
        Endpoint {
            client,
            url: url.to_string(),
            // Blank keys count as unset
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            name,
        }
    }

    async fn call<B, R>(&self, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        if self.url.is_empty() {
            return Err(ProviderError::NotConfigured(format!("{} webhook URL is not set", self.name)));
        }

        debug!(url = %self.url, webhook = self.name, "Calling webhook");

        let response = self
            .client
            .post(&self.url)
            .maybe_bearer_auth(self.api_key.as_deref())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(webhook = self.name, status = status.as_u16(), "Webhook returned error status");
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::ParseError(format!(
                "JSON parse error: {} - Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }
}

/// Product image extraction through the extraction webhook
pub struct WebhookExtractor {
    endpoint: Endpoint,
}

impl WebhookExtractor {
    pub fn new(client: RateLimitedClient, settings: &ProviderSettings) -> Self {
        WebhookExtractor {
            endpoint: Endpoint::new(client, &settings.extraction_url, settings.api_key.clone(), "extraction"),
        }
    }
}

#[async_trait]
impl ImageExtractor for WebhookExtractor {
    async fn extract(&self, product_url: &str) -> ProviderResult<ExtractedImage> {
        let response: ExtractionResponse = self
            .endpoint
            .call(&ExtractionRequest { url: product_url.to_string() })
            .await?;

        let extracted = response.into_result()?;
        info!(
            product_url = %product_url,
            size_category = extracted.size_category.code(),
            "Extracted product image"
        );
        Ok(extracted)
    }
}

/// Background removal through the background-removal webhook
pub struct WebhookBackgroundRemover {
    endpoint: Endpoint,
}

impl WebhookBackgroundRemover {
    pub fn new(client: RateLimitedClient, settings: &ProviderSettings) -> Self {
        WebhookBackgroundRemover {
            endpoint: Endpoint::new(
                client,
                &settings.background_removal_url,
                settings.api_key.clone(),
                "background removal",
            ),
        }
    }
}

#[async_trait]
impl BackgroundRemover for WebhookBackgroundRemover {
    async fn remove_backgrounds(
        &self,
        main_image_url: &str,
        second_image_url: &str,
    ) -> ProviderResult<RemovedBackgrounds> {
        let response: BackgroundRemovalResponse = self
            .endpoint
            .call(&BackgroundRemovalRequest {
                main_image_url: main_image_url.to_string(),
                second_image_url: second_image_url.to_string(),
            })
            .await?;

        response.into_result()
    }
}
