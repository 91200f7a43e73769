//! API module - HTTP routes and handlers

pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/composites", web::post().to(handlers::composites::create_composite))
            .service(
                web::scope("/sessions")
                    .route("", web::post().to(handlers::sessions::create_session))
                    .route("/{id}", web::get().to(handlers::sessions::get_session))
                    .route("/{id}", web::delete().to(handlers::sessions::delete_session))
                    .route("/{id}/extract", web::post().to(handlers::sessions::extract_images))
                    .route("/{id}/back", web::post().to(handlers::sessions::go_back))
                    .route("/{id}/confirm", web::post().to(handlers::sessions::confirm))
                    .route("/{id}/composite", web::post().to(handlers::sessions::composite))
                    .route("/{id}/reset", web::post().to(handlers::sessions::reset))
                    .route("/{id}/downloads/{format}", web::get().to(handlers::sessions::download))
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::AppState;
    use crate::config::{PipelineSettings, Settings};
    use crate::domain::{SizeCategory, SourceImage};
    use crate::engine::export::png_data_uri;
    use crate::pipeline::PipelineContext;
    use crate::providers::loader::decode_data_uri;
    use crate::providers::{
        BackgroundRemover, ExtractedImage, ImageExtractor, ImageLoader, ProviderError,
        ProviderResult, RemovedBackgrounds,
    };

    fn cutout_png(width: u32, height: u32) -> Vec<u8> {
        use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgba, RgbaImage};

        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for y in 2..height - 2 {
            for x in 2..width - 2 {
                img.put_pixel(x, y, Rgba([240, 30, 30, 255]));
            }
        }
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), width, height, ColorType::Rgba8)
            .unwrap();
        bytes
    }

    /// Every product page yields the same image; pages containing "missing"
    /// fail and pages containing "slow" take a moment
    struct StubExtractor;

    #[async_trait]
    impl ImageExtractor for StubExtractor {
        async fn extract(&self, product_url: &str) -> ProviderResult<ExtractedImage> {
            if product_url.contains("slow") {
                actix_rt::time::sleep(Duration::from_millis(300)).await;
            }
            if product_url.contains("missing") {
                return Err(ProviderError::Rejected("No product image found".to_string()));
            }
            Ok(ExtractedImage {
                image_url: png_data_uri(&cutout_png(30, 20)),
                size_category: SizeCategory::Medium,
            })
        }
    }

    struct FailingRemover;

    #[async_trait]
    impl BackgroundRemover for FailingRemover {
        async fn remove_backgrounds(&self, _main: &str, _second: &str) -> ProviderResult<RemovedBackgrounds> {
            Err(ProviderError::Rejected("Background removal failed".to_string()))
        }
    }

    struct DataUriLoader;

    #[async_trait]
    impl ImageLoader for DataUriLoader {
        async fn load(&self, reference: &str) -> ProviderResult<SourceImage> {
            let bytes = decode_data_uri(reference)?;
            crate::providers::loader::decode_image(&bytes)
        }
    }

    fn app_state() -> web::Data<AppState> {
        let settings = Settings {
            pipeline: PipelineSettings { finalize_delay_ms: 0, ..PipelineSettings::default() },
            ..Settings::default()
        };
        let pipeline = PipelineContext::new(
            Arc::new(StubExtractor),
            Arc::new(FailingRemover),
            Arc::new(DataUriLoader),
            &settings.pipeline,
        );
        web::Data::new(AppState::new(settings, pipeline))
    }

    #[actix_rt::test]
    async fn test_health() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let resp: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp["status"], "healthy");
        assert_eq!(resp["active_sessions"], 0);
    }

    #[actix_rt::test]
    async fn test_one_shot_composite() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/composites")
            .set_json(json!({
                "main": { "image": png_data_uri(&cutout_png(40, 40)), "size_category": "L" },
                "second": { "image": png_data_uri(&cutout_png(40, 40)), "size_category": "S" }
            }))
            .to_request();

        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["success"], true);
        assert_eq!(resp["scales"]["main"], 1.0);
        assert_eq!(resp["scales"]["second"], 0.55);
        assert_eq!(resp["composites"][0]["format"], "pbp");
        assert_eq!(resp["composites"][0]["width"], 2010);
        assert_eq!(resp["composites"][1]["format"], "square");
        assert!(resp["composites"][1]["filename"].as_str().unwrap().ends_with("_450x450.png"));
    }

    #[actix_rt::test]
    async fn test_one_shot_rejects_bad_image() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/composites")
            .set_json(json!({
                "main": { "image": "data:image/png;base64,AAAA" },
                "second": { "image": png_data_uri(&cutout_png(10, 10)) }
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_rt::test]
    async fn test_wizard_with_removal_fallback() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;

        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/sessions").to_request(),
        )
        .await;
        assert_eq!(created["stage"], "idle");
        let id = created["id"].as_str().unwrap().to_string();

        let extracted: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/sessions/{}/extract", id))
                .set_json(json!({
                    "main_url": "https://shop.example/a",
                    "second_url": "https://shop.example/b"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(extracted["stage"], "awaiting_confirmation");
        assert_eq!(extracted["slots"][0]["size_category"], "M");

        let confirmed: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri(&format!("/api/v1/sessions/{}/confirm", id)).to_request(),
        )
        .await;
        assert_eq!(confirmed["stage"], "previewing_cutouts");
        assert_eq!(confirmed["fallback_used"], true);
        assert_eq!(confirmed["cutouts"][0]["width"], 26);
        assert_eq!(confirmed["cutouts"][0]["height"], 16);

        let ready: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri(&format!("/api/v1/sessions/{}/composite", id)).to_request(),
        )
        .await;
        assert_eq!(ready["stage"], "ready");
        assert_eq!(ready["downloads"].as_array().unwrap().len(), 2);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/sessions/{}/downloads/pbp", id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.ends_with("_2010x1334.png\""));
        let body = test::read_body(resp).await;
        assert_eq!(image::load_from_memory(&body).unwrap().width(), 2010);
    }

    #[actix_rt::test]
    async fn test_session_readable_while_action_runs() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/sessions").to_request(),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let extract_request = || {
            test::TestRequest::post()
                .uri(&format!("/api/v1/sessions/{}/extract", id))
                .set_json(json!({
                    "main_url": "https://shop.example/slow",
                    "second_url": "https://shop.example/b"
                }))
                .to_request()
        };

        let (extracted, observed, concurrent) = futures::join!(
            async {
                let body: Value = test::call_and_read_body_json(&app, extract_request()).await;
                body
            },
            async {
                actix_rt::time::sleep(Duration::from_millis(50)).await;
                let body: Value = test::call_and_read_body_json(
                    &app,
                    test::TestRequest::get().uri(&format!("/api/v1/sessions/{}", id)).to_request(),
                )
                .await;
                body
            },
            async {
                actix_rt::time::sleep(Duration::from_millis(50)).await;
                test::call_service(&app, extract_request()).await.status()
            }
        );

        assert_eq!(observed["stage"], "extracting_images");
        assert_eq!(observed["status"], "Extracting product images...");
        assert_eq!(concurrent, StatusCode::CONFLICT);
        assert_eq!(extracted["stage"], "awaiting_confirmation");
    }

    #[actix_rt::test]
    async fn test_inline_extraction_error() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/sessions").to_request(),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let resp: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/sessions/{}/extract", id))
                .set_json(json!({
                    "main_url": "https://shop.example/a",
                    "second_url": "https://shop.example/missing"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp["stage"], "extraction_failed");
        assert!(resp["slots"][0]["error"].is_null());
        assert_eq!(resp["slots"][1]["error"], "No product image found");
    }

    #[actix_rt::test]
    async fn test_out_of_order_and_unknown_session() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/sessions").to_request(),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri(&format!("/api/v1/sessions/{}/composite", id)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/sessions/{}/downloads/banner", id))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/sessions/{}", uuid::Uuid::new_v4()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri(&format!("/api/v1/sessions/{}", id)).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
