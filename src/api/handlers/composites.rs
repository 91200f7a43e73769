//! One-shot composite endpoint
//!
//! Takes two cutouts that are already background-removed and returns both
//! marketing canvases in a single call, without going through a session.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::AppState;
use crate::domain::{CanvasFormat, CroppedImage, ProductPair, ScalePair, SizeCategory};
use crate::engine::{compose_all, crop_transparent_with, export, Orientation};

/// One product in a composite request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductInput {
    /// Image URL or `data:` URI of the cutout
    pub image: String,
    /// Relative size class (L, M or S). Defaults to M
    #[serde(default)]
    pub size_category: SizeCategory,
}

/// Request body for one-shot compositing
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompositeRequest {
    pub main: ProductInput,
    pub second: ProductInput,
    /// Trim transparent borders before layout (default true)
    #[serde(default = "default_crop")]
    pub crop: bool,
}

fn default_crop() -> bool { true }

/// One rendered canvas
#[derive(Serialize, ToSchema)]
pub struct CompositeOutput {
    pub format: CanvasFormat,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    /// PNG as a `data:` URI
    pub data_uri: String,
}

/// Response for successful compositing
#[derive(Serialize, ToSchema)]
pub struct CompositeResponse {
    pub success: bool,
    pub scales: ScalePair,
    pub composites: Vec<CompositeOutput>,
    pub generation_time_ms: u64,
}

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        ErrorResponse {
            success: false,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

/// POST /api/v1/composites - Compose two cutouts onto both canvases
#[utoipa::path(
    post,
    path = "/api/v1/composites",
    tag = "composites",
    request_body = CompositeRequest,
    responses(
        (status = 200, description = "Composites generated", body = CompositeResponse),
        (status = 422, description = "An image could not be loaded", body = ErrorResponse),
        (status = 500, description = "Compositing failed", body = ErrorResponse)
    )
)]
pub async fn create_composite(
    state: web::Data<AppState>,
    body: web::Json<CompositeRequest>,
) -> HttpResponse {
    let start = Instant::now();
    let body = body.into_inner();

    info!(
        main_size = body.main.size_category.code(),
        second_size = body.second.size_category.code(),
        crop = body.crop,
        "Processing composite request"
    );

    let loader = &state.pipeline.loader;
    let (main, second) = futures::join!(loader.load(&body.main.image), loader.load(&body.second.image));
    let images = match ProductPair::new(main, second).transpose() {
        Ok(images) => images,
        Err(e) => {
            error!(error = %e, "Failed to load composite input");
            return HttpResponse::UnprocessableEntity()
                .json(ErrorResponse::new("IMAGE_LOAD_FAILED", e.to_string()));
        }
    };

    let scales = state
        .pipeline
        .scales
        .resolve(body.main.size_category, body.second.size_category);
    let threshold = state.pipeline.alpha_threshold;
    let crop = body.crop;

    let rendered = web::block(move || {
        let cutouts = images.map(|image| {
            if crop {
                crop_transparent_with(&image, threshold)
            } else {
                CroppedImage::uncropped(image)
            }
        });
        compose_all(&cutouts, scales)
    })
    .await;

    let set = match rendered {
        Ok(Ok(set)) => set,
        Ok(Err(e)) => {
            error!(error = %e, "Compositing failed");
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("COMPOSITE_FAILED", e.to_string()));
        }
        Err(e) => {
            error!(error = %e, "Compositing task failed");
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("COMPOSITE_FAILED", "Compositing was interrupted"));
        }
    };

    let composites = CanvasFormat::ALL
        .into_iter()
        .map(|format| {
            let canvas = set.get(format);
            let exported = export(canvas, format.as_str());
            CompositeOutput {
                format,
                filename: exported.filename.clone(),
                width: canvas.width(),
                height: canvas.height(),
                orientation: canvas.layout.orientation,
                data_uri: exported.data_uri(),
            }
        })
        .collect();

    let elapsed = start.elapsed().as_millis() as u64;
    info!(generation_time_ms = elapsed, "Composites generated");

    HttpResponse::Ok().json(CompositeResponse {
        success: true,
        scales,
        composites,
        generation_time_ms: elapsed,
    })
}
