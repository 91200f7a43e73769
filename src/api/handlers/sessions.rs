//! Composition wizard endpoints
//!
//! Each endpoint dispatches one user action into a session and answers with
//! the session's resulting view.

use actix_web::{http::header, web, HttpResponse};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::domain::{CanvasFormat, ProductPair, ScalePair, SizeCategory};
use crate::engine::export::{export_filename, save_to_dir};
use crate::pipeline::{PipelineSession, PipelineState, Product, SessionError, SlotOutcome, Stage};
use super::composites::ErrorResponse;

/// Product page URLs to extract images from
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExtractRequest {
    pub main_url: String,
    pub second_url: String,
}

/// What the user sees for one product slot
#[derive(Serialize, ToSchema)]
pub struct SlotView {
    /// "main" or "second"
    pub slot: String,
    pub page_url: Option<String>,
    pub image_url: Option<String>,
    pub size_category: Option<SizeCategory>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Inline extraction error for this slot
    pub error: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CutoutView {
    pub slot: String,
    pub width: u32,
    pub height: u32,
    /// False when nothing was cropped
    pub trimmed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DownloadView {
    pub format: CanvasFormat,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// Full session state as rendered to clients
#[derive(Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub stage: Stage,
    pub status: String,
    pub slots: Vec<SlotView>,
    pub scales: Option<ScalePair>,
    /// True when cutouts come from the original images because background removal failed
    pub fallback_used: bool,
    pub cutouts: Vec<CutoutView>,
    pub downloads: Vec<DownloadView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionView {
    fn from_session(session: &PipelineSession, state: &AppState) -> Self {
        let pipeline_state = session.state();

        SessionView {
            id: session.id(),
            stage: session.stage(),
            status: pipeline_state.status_message(),
            slots: slot_views(pipeline_state),
            scales: pipeline_state.scales(&state.pipeline.scales),
            fallback_used: pipeline_state.fallback_reason().is_some(),
            cutouts: pipeline_state
                .cutouts()
                .map(|cutouts| {
                    labelled(cutouts.by_ref())
                        .map(|(slot, cutout)| {
                            let (width, height) = cutout.dimensions();
                            CutoutView { slot: slot.to_string(), width, height, trimmed: cutout.was_trimmed() }
                        })
                        .collect()
                })
                .unwrap_or_default(),
            downloads: pipeline_state
                .composites()
                .map(|set| {
                    let today = Local::now().date_naive();
                    CanvasFormat::ALL
                        .into_iter()
                        .map(|format| {
                            let canvas = set.get(format);
                            DownloadView {
                                format,
                                filename: export_filename(today, canvas.width(), canvas.height()),
                                width: canvas.width(),
                                height: canvas.height(),
                                url: format!("/api/v1/sessions/{}/downloads/{}", session.id(), format.as_str()),
                            }
                        })
                        .collect()
                })
                .unwrap_or_default(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}

fn labelled<T>(pair: ProductPair<T>) -> impl Iterator<Item = (&'static str, T)> {
    [("main", pair.main), ("second", pair.second)].into_iter()
}

fn slot_views(state: &PipelineState) -> Vec<SlotView> {
    let product_view = |slot: &str, product: &Product| SlotView {
        slot: slot.to_string(),
        page_url: Some(product.page_url.clone()),
        image_url: Some(product.image_url.clone()),
        size_category: Some(product.size),
        width: Some(product.image.width()),
        height: Some(product.image.height()),
        error: None,
    };

    match state {
        PipelineState::Idle => Vec::new(),
        PipelineState::ExtractingImages { urls } => labelled(urls.by_ref())
            .map(|(slot, url)| SlotView {
                slot: slot.to_string(),
                page_url: Some(url.clone()),
                image_url: None,
                size_category: None,
                width: None,
                height: None,
                error: None,
            })
            .collect(),
        PipelineState::ExtractionFailed { outcomes } => labelled(outcomes.by_ref())
            .map(|(slot, outcome)| match outcome {
                SlotOutcome::Extracted(product) => product_view(slot, product),
                SlotOutcome::Failed { page_url, message } => SlotView {
                    slot: slot.to_string(),
                    page_url: Some(page_url.clone()),
                    image_url: None,
                    size_category: None,
                    width: None,
                    height: None,
                    error: Some(message.clone()),
                },
            })
            .collect(),
        other => other
            .products()
            .map(|products| {
                labelled(products.by_ref())
                    .map(|(slot, product)| product_view(slot, product))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn session_not_found(id: &Uuid) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse::new(
        "SESSION_NOT_FOUND",
        format!("Session '{}' does not exist", id),
    ))
}

fn session_error(e: &SessionError) -> HttpResponse {
    let code = match e {
        SessionError::Transition(_) => "INVALID_TRANSITION",
        SessionError::NotReady(_) => "NOT_READY",
    };
    HttpResponse::Conflict().json(ErrorResponse::new(code, e.to_string()))
}

fn respond(session: &PipelineSession, state: &AppState, result: Result<(), SessionError>) -> HttpResponse {
    match result {
        Ok(()) => HttpResponse::Ok().json(SessionView::from_session(session, state)),
        Err(e) => {
            warn!(session_id = %session.id(), error = %e, "Rejected session action");
            session_error(&e)
        }
    }
}

/// POST /api/v1/sessions - Start a composition wizard session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    responses(
        (status = 201, description = "Session created", body = SessionView)
    )
)]
pub async fn create_session(state: web::Data<AppState>) -> HttpResponse {
    let session = state.sessions.create();
    let view = SessionView::from_session(&session.lock(), &state);
    HttpResponse::Created().json(view)
}

/// GET /api/v1/sessions/{id} - Current session state
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let view = SessionView::from_session(&session.lock(), &state);
    HttpResponse::Ok().json(view)
}

/// POST /api/v1/sessions/{id}/extract - Extract both product images
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/extract",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Extraction finished; per-slot errors are inline", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not accepting URLs in this stage", body = ErrorResponse)
    )
)]
pub async fn extract_images(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ExtractRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let body = body.into_inner();

    let result = state
        .pipeline
        .submit_urls(&session, ProductPair::new(body.main_url, body.second_url))
        .await;
    let response = respond(&session.lock(), &state, result);
    response
}

/// POST /api/v1/sessions/{id}/back - Return to URL entry
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/back",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Back at URL entry", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Nothing to go back from", body = ErrorResponse)
    )
)]
pub async fn go_back(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let mut session = session.lock();
    let result = session.go_back();
    respond(&session, &state, result)
}

/// POST /api/v1/sessions/{id}/confirm - Remove backgrounds and crop
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/confirm",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Cutouts ready for preview", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Nothing to confirm", body = ErrorResponse)
    )
)]
pub async fn confirm(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let result = state.pipeline.confirm(&session).await;
    let response = respond(&session.lock(), &state, result);
    response
}

/// POST /api/v1/sessions/{id}/composite - Render both canvases
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/composite",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Composites ready, or back at preview with the failure in status", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "No cutouts to compose", body = ErrorResponse)
    )
)]
pub async fn composite(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let result = state.pipeline.composite(&session).await;
    let response = respond(&session.lock(), &state, result);
    response
}

/// POST /api/v1/sessions/{id}/reset - Discard all derived state
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/reset",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session is idle", body = SessionView),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn reset(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };
    let mut session = session.lock();
    let result = session.reset();
    respond(&session, &state, result)
}

/// GET /api/v1/sessions/{id}/downloads/{format} - Download a finished canvas
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}/downloads/{format}",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session ID"),
        ("format" = String, Path, description = "Canvas format: pbp or square")
    ),
    responses(
        (status = 200, description = "PNG file", content_type = "image/png"),
        (status = 400, description = "Unknown format", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Composites not ready", body = ErrorResponse)
    )
)]
pub async fn download(state: web::Data<AppState>, path: web::Path<(Uuid, String)>) -> HttpResponse {
    let (id, format) = path.into_inner();
    let Some(format) = CanvasFormat::parse(&format) else {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "INVALID_FORMAT",
            format!("Unknown canvas format '{}', expected pbp or square", format),
        ));
    };
    let Some(session) = state.sessions.get(&id) else {
        return session_not_found(&id);
    };

    let exported = session.lock().export(format);
    let exported = match exported {
        Ok(exported) => exported,
        Err(e) => return session_error(&e),
    };

    if let Some(dir) = &state.settings.export.directory {
        if let Err(e) = save_to_dir(dir, &exported).await {
            warn!(error = %e, "Failed to mirror download to export directory");
        }
    }

    info!(session_id = %id, filename = %exported.filename, "Serving download");

    HttpResponse::Ok()
        .content_type(exported.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", exported.filename),
        ))
        .body(exported.bytes)
}

/// DELETE /api/v1/sessions/{id} - Discard a session
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn delete_session(state: web::Data<AppState>, path: web::Path<Uuid>) -> HttpResponse {
    let id = path.into_inner();
    if state.sessions.remove(&id) {
        HttpResponse::NoContent().finish()
    } else {
        session_not_found(&id)
    }
}
