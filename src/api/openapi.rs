//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    health::HealthResponse,
    composites::{
        CompositeRequest, ProductInput, CompositeResponse, CompositeOutput,
        ErrorResponse, ApiError,
    },
    sessions::{
        ExtractRequest, SessionView, SlotView, CutoutView, DownloadView,
    },
};
use crate::domain::{CanvasFormat, ScalePair, SizeCategory};
use crate::engine::Orientation;
use crate::pipeline::Stage;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Twin Crew Compositor API",
        version = "1.0.0",
        description = "Two-product composite generation for fixed-size marketing canvases",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "composites", description = "One-shot composite generation"),
        (name = "sessions", description = "Step-by-step composition wizard")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::composites::create_composite,
        crate::api::handlers::sessions::create_session,
        crate::api::handlers::sessions::get_session,
        crate::api::handlers::sessions::extract_images,
        crate::api::handlers::sessions::go_back,
        crate::api::handlers::sessions::confirm,
        crate::api::handlers::sessions::composite,
        crate::api::handlers::sessions::reset,
        crate::api::handlers::sessions::download,
        crate::api::handlers::sessions::delete_session,
    ),
    components(
        schemas(
            // Health schemas
            HealthResponse,
            // Composite schemas
            CompositeRequest,
            ProductInput,
            CompositeResponse,
            CompositeOutput,
            ErrorResponse,
            ApiError,
            // Session schemas
            ExtractRequest,
            SessionView,
            SlotView,
            CutoutView,
            DownloadView,
            // Domain schemas
            CanvasFormat,
            ScalePair,
            SizeCategory,
            Orientation,
            Stage,
        )
    )
)]
pub struct ApiDoc;
