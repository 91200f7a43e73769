//! Session driver for the composition wizard
//!
//! Runs the collaborator calls and pixel work each stage needs, then feeds the
//! outcome to the stage machine. Collaborator failures never escape as errors:
//! they become events (per-slot extraction failure, background-removal
//! fallback, compositing failure) and show up in the session state.
//!
//! The session lock is only taken for the synchronous transitions around each
//! await, so the in-flight stage is visible to readers and a second action on
//! the same session is refused by the stage machine. If an action's future is
//! dropped before it completes, the session returns to the state the action
//! started from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::domain::{CanvasFormat, CroppedImage, ProductPair, ScaleTable, SourceImage};
use crate::engine::{compose_all, crop_transparent_with, export, ExportedImage};
use crate::providers::{BackgroundRemover, ImageExtractor, ImageLoader, ProviderResult};
use super::state::{transition, PipelineEvent, PipelineState, Product, SlotOutcome, Stage, TransitionError};

pub type SharedSession = Arc<Mutex<PipelineSession>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Composites are not ready yet (stage: {})", .0.as_str())]
    NotReady(Stage),
}

/// Collaborators and settings shared by every session
#[derive(Clone)]
pub struct PipelineContext {
    pub extractor: Arc<dyn ImageExtractor>,
    pub remover: Arc<dyn BackgroundRemover>,
    pub loader: Arc<dyn ImageLoader>,
    pub scales: ScaleTable,
    pub alpha_threshold: u8,
    pub finalize_delay: Duration,
}

impl PipelineContext {
    pub fn new(
        extractor: Arc<dyn ImageExtractor>,
        remover: Arc<dyn BackgroundRemover>,
        loader: Arc<dyn ImageLoader>,
        settings: &PipelineSettings,
    ) -> Self {
        PipelineContext {
            extractor,
            remover,
            loader,
            scales: settings.scales,
            alpha_threshold: settings.alpha_threshold,
            finalize_delay: Duration::from_millis(settings.finalize_delay_ms),
        }
    }

    /// Extract both product images concurrently.
    ///
    /// Each slot fails independently; the session ends in either
    /// `AwaitingConfirmation` or `ExtractionFailed`.
    pub async fn submit_urls(
        &self,
        session: &SharedSession,
        urls: ProductPair<String>,
    ) -> Result<(), SessionError> {
        let action = InFlight::begin(session, PipelineEvent::SubmitUrls(urls.clone()))?;

        let (main, second) = futures::join!(
            extract_slot(self, &urls.main),
            extract_slot(self, &urls.second)
        );

        action.finish(PipelineEvent::ExtractionFinished(ProductPair::new(main, second)))
    }

    /// Remove backgrounds, then crop. Falls back to cropping the original
    /// images when background removal fails in any way.
    pub async fn confirm(&self, session: &SharedSession) -> Result<(), SessionError> {
        let mut action = InFlight::begin(session, PipelineEvent::Confirm)?;

        let event = match action.read(|state| state.products().cloned()) {
            Some(products) => match remove_backgrounds(self, &products).await {
                Ok(removed) => PipelineEvent::BackgroundRemoved(removed),
                Err(e) => {
                    warn!(session_id = %action.session_id, error = %e, "Background removal failed, falling back to originals");
                    PipelineEvent::BackgroundRemovalFailed(e.to_string())
                }
            },
            None => PipelineEvent::BackgroundRemovalFailed("No products to process".to_string()),
        };
        if !action.advance(event)? {
            return Ok(());
        }

        let Some(images) = action.read(PipelineState::images_to_crop) else {
            let stage = action.read(PipelineState::stage);
            return Err(TransitionError { stage, event: "cropping_finished" }.into());
        };
        let cutouts = crop_pair(images, self.alpha_threshold).await;

        action.finish(PipelineEvent::CroppingFinished(cutouts))
    }

    /// Render both canvases, then pause before exposing them.
    ///
    /// A rendering failure returns the session to the cutout preview with the
    /// error in its status; it is not reported as an `Err`.
    pub async fn composite(&self, session: &SharedSession) -> Result<(), SessionError> {
        let action = InFlight::begin(session, PipelineEvent::RequestComposite)?;

        let (cutouts, scales) = action.read(|state| (state.cutouts().cloned(), state.scales(&self.scales)));
        let (Some(cutouts), Some(scales)) = (cutouts, scales) else {
            return action.finish(PipelineEvent::CompositingFailed("No cutouts to compose".to_string()));
        };

        let started = Instant::now();
        let rendered = tokio::task::spawn_blocking(move || compose_all(&cutouts, scales)).await;

        let event = match rendered {
            Ok(Ok(composites)) => {
                info!(
                    session_id = %action.session_id,
                    main_scale = scales.main,
                    second_scale = scales.second,
                    render_ms = started.elapsed().as_millis() as u64,
                    "Composites rendered"
                );
                tokio::time::sleep(self.finalize_delay).await;
                PipelineEvent::CompositingFinished(composites)
            }
            Ok(Err(e)) => {
                warn!(session_id = %action.session_id, error = %e, "Compositing failed");
                PipelineEvent::CompositingFailed(e.to_string())
            }
            Err(e) => {
                warn!(session_id = %action.session_id, error = %e, "Compositing task failed");
                PipelineEvent::CompositingFailed("Compositing was interrupted".to_string())
            }
        };

        action.finish(event)
    }
}

/// One user's walk through the wizard
#[derive(Debug)]
pub struct PipelineSession {
    id: Uuid,
    state: PipelineState,
    /// Bumped on every state change
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PipelineSession {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        PipelineSession {
            id,
            state: PipelineState::Idle,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Feed one event to the stage machine
    pub fn apply(&mut self, event: PipelineEvent) -> Result<(), SessionError> {
        let event_name = event.name();
        let from = self.state.stage();
        let next = transition(&self.state, event)?;
        self.replace_state(next);

        info!(
            session_id = %self.id,
            event = event_name,
            from = from.as_str(),
            to = self.state.stage().as_str(),
            "Stage transition"
        );
        Ok(())
    }

    pub fn go_back(&mut self) -> Result<(), SessionError> {
        self.apply(PipelineEvent::GoBack)
    }

    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.apply(PipelineEvent::Reset)
    }

    /// Package one finished canvas for download
    pub fn export(&self, format: CanvasFormat) -> Result<ExportedImage, SessionError> {
        let composites = self
            .state
            .composites()
            .ok_or(SessionError::NotReady(self.stage()))?;
        Ok(export(composites.get(format), format.as_str()))
    }

    fn replace_state(&mut self, state: PipelineState) {
        self.state = state;
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

/// An action whose in-flight stage is committed but whose outcome is pending.
///
/// Dropping it before `finish` puts back the state the action started from,
/// unless something else (a reset) changed the session in the meantime.
struct InFlight<'a> {
    session: &'a SharedSession,
    session_id: Uuid,
    /// Pre-action state; `None` once the action has completed or been superseded
    previous: Option<PipelineState>,
    revision: u64,
}

impl<'a> InFlight<'a> {
    fn begin(session: &'a SharedSession, event: PipelineEvent) -> Result<Self, SessionError> {
        let mut guard = session.lock();
        let previous = guard.state.clone();
        guard.apply(event)?;

        Ok(InFlight {
            session,
            session_id: guard.id,
            previous: Some(previous),
            revision: guard.revision,
        })
    }

    fn read<R>(&self, f: impl FnOnce(&PipelineState) -> R) -> R {
        f(&self.session.lock().state)
    }

    /// Apply an intermediate event. Returns false when the session moved on
    /// without this action, in which case the action should stop.
    fn advance(&mut self, event: PipelineEvent) -> Result<bool, SessionError> {
        let mut guard = self.session.lock();
        if guard.revision != self.revision {
            self.previous = None;
            info!(session_id = %self.session_id, event = event.name(), "Session changed during action, dropping result");
            return Ok(false);
        }

        guard.apply(event)?;
        self.revision = guard.revision;
        Ok(true)
    }

    fn finish(mut self, event: PipelineEvent) -> Result<(), SessionError> {
        let previous = self.previous.take();
        let mut guard = self.session.lock();
        if guard.revision != self.revision {
            info!(session_id = %self.session_id, event = event.name(), "Session changed during action, dropping result");
            return Ok(());
        }

        let result = guard.apply(event);
        if result.is_err() {
            if let Some(previous) = previous {
                guard.replace_state(previous);
            }
        }
        result
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };

        let mut guard = self.session.lock();
        if guard.revision == self.revision {
            warn!(
                session_id = %self.session_id,
                abandoned = guard.stage().as_str(),
                restored = previous.stage().as_str(),
                "Action abandoned, restoring previous stage"
            );
            guard.replace_state(previous);
        }
    }
}

/// Extract and decode one product image, folding every failure into the outcome
async fn extract_slot(ctx: &PipelineContext, page_url: &str) -> SlotOutcome {
    let page_url = page_url.trim().to_string();

    match load_product(ctx, &page_url).await {
        Ok(product) => SlotOutcome::Extracted(product),
        Err(message) => {
            warn!(page_url = %page_url, error = %message, "Product extraction failed");
            SlotOutcome::Failed { page_url, message }
        }
    }
}

async fn load_product(ctx: &PipelineContext, page_url: &str) -> Result<Product, String> {
    Url::parse(page_url).map_err(|e| format!("Invalid product URL: {}", e))?;

    let extracted = ctx.extractor.extract(page_url).await.map_err(|e| e.to_string())?;
    let image = ctx
        .loader
        .load(&extracted.image_url)
        .await
        .map_err(|e| e.to_string())?;

    Ok(Product {
        page_url: page_url.to_string(),
        image_url: extracted.image_url,
        image,
        size: extracted.size_category,
    })
}

async fn remove_backgrounds(
    ctx: &PipelineContext,
    products: &ProductPair<Product>,
) -> ProviderResult<ProductPair<SourceImage>> {
    let removed = ctx
        .remover
        .remove_backgrounds(&products.main.image_url, &products.second.image_url)
        .await?;

    let (main, second) = futures::join!(ctx.loader.load(&removed.main), ctx.loader.load(&removed.second));
    ProductPair::new(main, second).transpose()
}

/// Crop both images off the async executor
async fn crop_pair(images: ProductPair<SourceImage>, threshold: u8) -> ProductPair<CroppedImage> {
    let fallback = images.clone();
    match tokio::task::spawn_blocking(move || images.map(|image| crop_transparent_with(&image, threshold))).await {
        Ok(cutouts) => cutouts,
        Err(e) => {
            warn!(error = %e, "Cropping task failed, keeping uncropped images");
            fallback.map(CroppedImage::uncropped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ScalePair, SizeCategory};
    use crate::engine::export::png_data_uri;
    use crate::providers::loader::decode_data_uri;
    use crate::providers::{ExtractedImage, ProviderError, RemovedBackgrounds};
    use async_trait::async_trait;
    use image::codecs::png::PngEncoder;
    use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    const HANG: Duration = Duration::from_secs(30);

    /// Opaque block centered on a transparent canvas
    fn cutout_png(width: u32, height: u32, inset: u32) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for y in inset..height - inset {
            for x in inset..width - inset {
                img.put_pixel(x, y, Rgba([30, 120, 200, 255]));
            }
        }
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), width, height, ColorType::Rgba8)
            .unwrap();
        bytes
    }

    /// Known product pages; pages containing "slow" answer after `slow_delay`
    struct MockExtractor {
        products: HashMap<String, (String, Option<SizeCategory>)>,
        slow_delay: Duration,
    }

    #[async_trait]
    impl ImageExtractor for MockExtractor {
        async fn extract(&self, product_url: &str) -> ProviderResult<ExtractedImage> {
            let key = if product_url.contains("slow") {
                tokio::time::sleep(self.slow_delay).await;
                product_url.replace("slow-", "")
            } else {
                product_url.to_string()
            };

            match self.products.get(&key) {
                Some((image_url, size)) => Ok(ExtractedImage {
                    image_url: image_url.clone(),
                    size_category: size.unwrap_or_default(),
                }),
                None => Err(ProviderError::Rejected("No product image found".to_string())),
            }
        }
    }

    struct MockRemover {
        result: Option<RemovedBackgrounds>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BackgroundRemover for MockRemover {
        async fn remove_backgrounds(&self, _main: &str, _second: &str) -> ProviderResult<RemovedBackgrounds> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result
                .clone()
                .ok_or_else(|| ProviderError::Rejected("removal service unavailable".to_string()))
        }
    }

    /// Decodes data URIs only; anything else is a network failure
    struct DataUriLoader;

    #[async_trait]
    impl ImageLoader for DataUriLoader {
        async fn load(&self, reference: &str) -> ProviderResult<SourceImage> {
            let bytes = decode_data_uri(reference)?;
            let image = image::load_from_memory(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))?;
            Ok(SourceImage::new(image))
        }
    }

    struct Fixture {
        ctx: PipelineContext,
        remover: Arc<MockRemover>,
    }

    fn fixture(removal: Option<RemovedBackgrounds>) -> Fixture {
        fixture_with(removal, HANG, Duration::ZERO)
    }

    fn fixture_with(removal: Option<RemovedBackgrounds>, slow_delay: Duration, removal_delay: Duration) -> Fixture {
        let mut products = HashMap::new();
        products.insert(
            "https://shop.example/fridge".to_string(),
            (png_data_uri(&cutout_png(60, 100, 10)), Some(SizeCategory::Large)),
        );
        products.insert(
            "https://shop.example/speaker".to_string(),
            (png_data_uri(&cutout_png(50, 50, 5)), Some(SizeCategory::Small)),
        );
        products.insert(
            "https://shop.example/broken".to_string(),
            ("https://cdn.example/missing.png".to_string(), None),
        );

        let remover = Arc::new(MockRemover {
            result: removal,
            delay: removal_delay,
            calls: AtomicUsize::new(0),
        });

        let ctx = PipelineContext {
            extractor: Arc::new(MockExtractor { products, slow_delay }),
            remover: remover.clone(),
            loader: Arc::new(DataUriLoader),
            scales: ScaleTable::default(),
            alpha_threshold: 20,
            finalize_delay: Duration::ZERO,
        };

        Fixture { ctx, remover }
    }

    fn new_session() -> SharedSession {
        Arc::new(Mutex::new(PipelineSession::new(Uuid::new_v4())))
    }

    fn stage(session: &SharedSession) -> Stage {
        session.lock().stage()
    }

    fn urls(main: &str, second: &str) -> ProductPair<String> {
        ProductPair::new(
            format!("https://shop.example/{}", main),
            format!("https://shop.example/{}", second),
        )
    }

    fn removal_output() -> RemovedBackgrounds {
        RemovedBackgrounds {
            main: png_data_uri(&cutout_png(80, 80, 20)),
            second: png_data_uri(&cutout_png(40, 40, 10)),
        }
    }

    /// Poll until the session reaches `expected`
    async fn wait_for_stage(session: &SharedSession, expected: Stage) {
        for _ in 0..200 {
            if stage(session) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached {:?}, stuck at {:?}", expected, stage(session));
    }

    #[tokio::test]
    async fn test_full_wizard_run() {
        let fx = fixture(Some(removal_output()));
        let session = new_session();

        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();
        assert_eq!(stage(&session), Stage::AwaitingConfirmation);
        assert_eq!(
            session.lock().state().scales(&fx.ctx.scales),
            Some(ScalePair { main: 1.0, second: 0.55 })
        );

        fx.ctx.confirm(&session).await.unwrap();
        assert_eq!(stage(&session), Stage::PreviewingCutouts);
        {
            let session = session.lock();
            let cutouts = session.state().cutouts().unwrap();
            // Removal output was cropped, not the originals
            assert_eq!(cutouts.main.dimensions(), (40, 40));
            assert_eq!(cutouts.second.dimensions(), (20, 20));
        }

        fx.ctx.composite(&session).await.unwrap();
        assert_eq!(stage(&session), Stage::Ready);

        let pbp = session.lock().export(CanvasFormat::Pbp).unwrap();
        assert!(pbp.filename.ends_with("_2010x1334.png"));
        let square = session.lock().export(CanvasFormat::Square).unwrap();
        assert!(square.filename.ends_with("_450x450.png"));

        session.lock().reset().unwrap();
        assert_eq!(stage(&session), Stage::Idle);
        assert!(session.lock().export(CanvasFormat::Pbp).is_err());
    }

    #[tokio::test]
    async fn test_removal_failure_crops_originals() {
        let fx = fixture(None);
        let session = new_session();

        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();
        fx.ctx.confirm(&session).await.unwrap();

        assert_eq!(fx.remover.calls.load(Ordering::SeqCst), 1);
        match session.lock().state() {
            PipelineState::PreviewingCutouts { cutouts, fallback_reason, .. } => {
                assert!(fallback_reason.as_deref().unwrap().contains("unavailable"));
                // Originals: 60x100 with a 10px inset, 50x50 with a 5px inset
                assert_eq!(cutouts.main.dimensions(), (40, 80));
                assert_eq!(cutouts.second.dimensions(), (40, 40));
            }
            other => panic!("unexpected state: {:?}", other.stage()),
        }

        fx.ctx.composite(&session).await.unwrap();
        assert!(session.lock().state().fallback_reason().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_removal_output_falls_back() {
        let fx = fixture(Some(RemovedBackgrounds {
            main: "data:image/png;base64,AAAA".to_string(),
            second: png_data_uri(&cutout_png(10, 10, 2)),
        }));
        let session = new_session();

        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();
        fx.ctx.confirm(&session).await.unwrap();

        assert!(matches!(
            session.lock().state(),
            PipelineState::PreviewingCutouts { fallback_reason: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_one_failed_slot_does_not_block_the_other() {
        let fx = fixture(None);
        let session = new_session();

        fx.ctx.submit_urls(&session, urls("fridge", "broken")).await.unwrap();
        assert_eq!(stage(&session), Stage::ExtractionFailed);

        match session.lock().state() {
            PipelineState::ExtractionFailed { outcomes } => {
                assert_eq!(outcomes.main.product().unwrap().size, SizeCategory::Large);
                match &outcomes.second {
                    SlotOutcome::Failed { page_url, .. } => assert_eq!(page_url, "https://shop.example/broken"),
                    SlotOutcome::Extracted(_) => panic!("second slot should have failed"),
                }
            }
            other => panic!("unexpected state: {:?}", other.stage()),
        }

        // Retrying with new URLs is allowed from here
        fx.ctx.submit_urls(&session, urls("speaker", "fridge")).await.unwrap();
        assert_eq!(stage(&session), Stage::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_slot_failure() {
        let fx = fixture(None);
        let session = new_session();

        fx.ctx
            .submit_urls(&session, ProductPair::new("not a url".to_string(), "https://shop.example/fridge".to_string()))
            .await
            .unwrap();

        match session.lock().state() {
            PipelineState::ExtractionFailed { outcomes } => match &outcomes.main {
                SlotOutcome::Failed { message, .. } => assert!(message.starts_with("Invalid product URL")),
                SlotOutcome::Extracted(_) => panic!("main slot should have failed"),
            },
            other => panic!("unexpected state: {:?}", other.stage()),
        };
    }

    #[tokio::test]
    async fn test_out_of_order_actions_are_rejected() {
        let fx = fixture(None);
        let session = new_session();

        assert!(matches!(fx.ctx.confirm(&session).await, Err(SessionError::Transition(_))));
        assert!(matches!(fx.ctx.composite(&session).await, Err(SessionError::Transition(_))));
        assert_eq!(fx.remover.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stage(&session), Stage::Idle);
    }

    #[test]
    fn test_go_back_from_confirmation() {
        let fx = fixture(None);
        let session = new_session();

        tokio_test::block_on(fx.ctx.submit_urls(&session, urls("fridge", "speaker"))).unwrap();
        session.lock().go_back().unwrap();
        assert_eq!(stage(&session), Stage::Idle);
    }

    #[tokio::test]
    async fn test_dropped_extraction_restores_url_entry() {
        let fx = fixture(None);
        let session = new_session();

        let dropped = timeout(Duration::from_millis(50), fx.ctx.submit_urls(&session, urls("slow-fridge", "speaker"))).await;
        assert!(dropped.is_err());
        assert_eq!(stage(&session), Stage::Idle);

        // The same action is accepted again
        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();
        assert_eq!(stage(&session), Stage::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_dropped_confirm_keeps_extracted_products() {
        let fx = fixture_with(Some(removal_output()), HANG, HANG);
        let session = new_session();
        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();

        let dropped = timeout(Duration::from_millis(50), fx.ctx.confirm(&session)).await;
        assert!(dropped.is_err());
        assert_eq!(fx.remover.calls.load(Ordering::SeqCst), 1);

        let session = session.lock();
        assert_eq!(session.stage(), Stage::AwaitingConfirmation);
        assert_eq!(session.state().products().unwrap().main.size, SizeCategory::Large);
    }

    #[tokio::test]
    async fn test_dropped_composite_returns_to_preview() {
        let mut fx = fixture(Some(removal_output()));
        let session = new_session();
        fx.ctx.submit_urls(&session, urls("fridge", "speaker")).await.unwrap();
        fx.ctx.confirm(&session).await.unwrap();

        fx.ctx.finalize_delay = HANG;
        let dropped = timeout(Duration::from_millis(100), fx.ctx.composite(&session)).await;
        assert!(dropped.is_err());
        assert_eq!(stage(&session), Stage::PreviewingCutouts);
        assert!(session.lock().state().cutouts().is_some());

        fx.ctx.finalize_delay = Duration::ZERO;
        fx.ctx.composite(&session).await.unwrap();
        assert_eq!(stage(&session), Stage::Ready);
    }

    #[tokio::test]
    async fn test_in_flight_stage_is_observable() {
        let fx = fixture(None);
        let session = new_session();

        let task = {
            let ctx = fx.ctx.clone();
            let session = session.clone();
            tokio::spawn(async move { ctx.submit_urls(&session, urls("slow-fridge", "speaker")).await })
        };

        wait_for_stage(&session, Stage::ExtractingImages).await;
        assert!(session.lock().state().status_message().starts_with("Extracting"));

        // A concurrent action is refused by the stage machine, not queued behind a lock
        let second = timeout(Duration::from_secs(1), fx.ctx.submit_urls(&session, urls("fridge", "speaker"))).await;
        assert!(matches!(second, Ok(Err(SessionError::Transition(_)))));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(stage(&session), Stage::Idle);
    }

    #[tokio::test]
    async fn test_reset_during_action_wins() {
        let fx = fixture_with(None, Duration::from_millis(100), Duration::ZERO);
        let session = new_session();

        let task = {
            let ctx = fx.ctx.clone();
            let session = session.clone();
            tokio::spawn(async move { ctx.submit_urls(&session, urls("slow-fridge", "speaker")).await })
        };

        wait_for_stage(&session, Stage::ExtractingImages).await;
        session.lock().reset().unwrap();

        // The late extraction result is discarded
        task.await.unwrap().unwrap();
        assert_eq!(stage(&session), Stage::Idle);
    }
}
