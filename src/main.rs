//! Twin Crew Compositor
//!
//! Places two product cutouts side by side (or stacked) with a "+" between
//! them on fixed-size marketing canvases. Product images come from page URLs
//! through an extraction webhook and get their backgrounds removed by a
//! second webhook before compositing.

use actix_web::{web, App, HttpServer, middleware};
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_actix_web::TracingLogger;

mod api;
mod domain;
mod engine;
mod config;
mod pipeline;
mod providers;

use crate::config::Settings;
use crate::pipeline::{PipelineContext, SessionStore};
use crate::providers::{HttpImageLoader, RateLimitedClient, WebhookBackgroundRemover, WebhookExtractor};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub sessions: SessionStore,
    pub pipeline: PipelineContext,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, pipeline: PipelineContext) -> Self {
        AppState {
            sessions: SessionStore::new(settings.pipeline.session_ttl()),
            pipeline,
            settings,
            started_at: Instant::now(),
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("twin_crew_compositor=info".parse()?)
                .add_directive("actix_web=info".parse()?)
        )
        .json()
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Twin Crew Compositor v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    let timeout = Duration::from_secs(settings.providers.timeout_secs);
    let webhook_client = RateLimitedClient::new(settings.providers.rate_limit_per_minute, timeout)
        .context("Failed to build webhook client")?;
    let image_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build image client")?;

    if settings.providers.extraction_url.is_empty() || settings.providers.background_removal_url.is_empty() {
        tracing::warn!("Webhook URLs are not fully configured; wizard sessions will fail at that step");
    }

    let pipeline = PipelineContext::new(
        Arc::new(WebhookExtractor::new(webhook_client.clone(), &settings.providers)),
        Arc::new(WebhookBackgroundRemover::new(webhook_client, &settings.providers)),
        Arc::new(HttpImageLoader::new(image_client, settings.providers.max_image_bytes)),
        &settings.pipeline,
    );

    if let Some(dir) = &settings.export.directory {
        info!(directory = %dir.display(), "Mirroring downloads to export directory");
    }

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);
    let app_state = web::Data::new(AppState::new(settings, pipeline));

    // Idle sessions are also swept whenever a new one is created
    let sweep_state = app_state.clone();
    let sweep_every = sweep_state.settings.pipeline.session_ttl().min(Duration::from_secs(60));
    actix_rt::spawn(async move {
        let mut ticker = actix_rt::time::interval(sweep_every);
        loop {
            ticker.tick().await;
            let expired = sweep_state.sessions.sweep_expired();
            if expired > 0 {
                info!(expired, remaining = sweep_state.sessions.len(), "Swept idle sessions");
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Composite requests carry inline images
            .app_data(web::JsonConfig::default().limit(32 * 1024 * 1024))
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "twin-crew-compositor"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
