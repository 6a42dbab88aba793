//! End-to-end pipeline tests with mocked generator and notifier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use petstory_core::{Config, DeliveryOutcome, Order, PhotoUpload, PipelineOutcome};
use petstory_services::{ImageGenerator, KitNotifier, TransformError};
use petstory_worker::OrderPipeline;

const TS: &str = "20241223_101530";

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 150, 100]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Counts calls and fails those whose 1-based index is listed.
struct MockGenerator {
    calls: AtomicUsize,
    failing_calls: Vec<usize>,
    output: Vec<u8>,
}

impl MockGenerator {
    fn new(failing_calls: Vec<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing_calls,
            output: png_bytes(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for MockGenerator {
    async fn generate(&self, _photo: &[u8], _prompt: &str) -> Result<Vec<u8>, TransformError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&call) {
            Err(TransformError::TransformFailed("simulated outage".into()))
        } else {
            Ok(self.output.clone())
        }
    }
}

/// Records send arguments and answers with a fixed outcome.
struct MockNotifier {
    outcome: DeliveryOutcome,
    sends: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    fn new(outcome: DeliveryOutcome) -> Self {
        Self {
            outcome,
            sends: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl KitNotifier for MockNotifier {
    async fn send_kit(
        &self,
        to: &str,
        _pet_name: &str,
        pdf_bytes: Vec<u8>,
        pdf_filename: &str,
        _tribute_html: &str,
    ) -> DeliveryOutcome {
        assert!(pdf_bytes.starts_with(b"%PDF"));
        self.sends
            .lock()
            .await
            .push((to.to_string(), pdf_filename.to_string()));
        self.outcome.clone()
    }
}

fn config(temp_dir: &std::path::Path, stickers: bool, delay: Duration) -> Config {
    Config {
        gemini_api_key: "test-key".to_string(),
        gemini_image_model: "test-model".to_string(),
        coloring_prompt: "coloring page".to_string(),
        sticker_prompt: stickers.then(|| "sticker".to_string()),
        generation_delay: delay,
        temp_dir: temp_dir.to_path_buf(),
        smtp_server: "smtp.example.com".to_string(),
        smtp_port: 587,
        smtp_user: None,
        smtp_password: None,
        email_from: "noreply@petstory.com".to_string(),
        email_from_name: "PetStory".to_string(),
        payment_required: false,
        payment_freshness_hours: 24,
    }
}

fn order(photo_count: usize) -> Order {
    let photos = (0..photo_count)
        .map(|i| PhotoUpload {
            bytes: png_bytes(),
            original_filename: format!("photo_{i}.png"),
            content_type: "image/png".to_string(),
        })
        .collect();
    Order::new(
        "user@example.com".to_string(),
        "Spike".to_string(),
        "23 de dezembro de 2024".to_string(),
        "Spike é um cão muito brincalhão.".to_string(),
        photos,
    )
    .with_timestamp(TS)
}

#[tokio::test]
async fn end_to_end_with_two_photos() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator.clone(),
        notifier.clone(),
    );

    let result = pipeline.process(&order(2)).await;

    // One transform call per photo with stickers disabled.
    assert_eq!(generator.call_count(), 2);

    let PipelineOutcome::Success {
        pdf_path,
        tribute_path,
        photos_received,
        arts_generated,
        delivery,
    } = &result.outcome
    else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(*photos_received, 2);
    assert_eq!(*arts_generated, 2);
    assert_eq!(*delivery, DeliveryOutcome::Delivered);

    // All artifacts live in the slug-derived working directory.
    let work_dir = dir.path().join("user-example-com").join(format!("spike_{TS}"));
    assert!(work_dir.is_dir());
    assert_eq!(pdf_path.parent().unwrap(), work_dir);
    assert_eq!(
        pdf_path.file_name().unwrap(),
        format!("kit_digital_spike_{TS}.pdf").as_str()
    );
    assert_eq!(
        tribute_path.file_name().unwrap(),
        format!("homenagem_{TS}.html").as_str()
    );
    assert!(work_dir.join(format!("foto_1_{TS}.png")).is_file());
    assert!(work_dir.join(format!("foto_2_{TS}.png")).is_file());
    assert!(work_dir.join(format!("arte_1_{TS}.png")).is_file());
    assert!(work_dir.join(format!("arte_2_{TS}.png")).is_file());

    let sends = notifier.sends.lock().await;
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].0, "user@example.com");
}

#[tokio::test]
async fn sticker_variant_doubles_the_calls() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), true, Duration::ZERO),
        generator.clone(),
        notifier,
    );

    let result = pipeline.process(&order(2)).await;
    assert!(result.is_success());
    assert_eq!(generator.call_count(), 4);

    let work_dir = dir.path().join("user-example-com").join(format!("spike_{TS}"));
    assert!(work_dir.join(format!("adesivo_1_{TS}.png")).is_file());
    assert!(work_dir.join(format!("adesivo_2_{TS}.png")).is_file());
}

#[tokio::test]
async fn calls_are_separated_by_the_configured_delay() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::from_millis(80)),
        generator.clone(),
        notifier,
    );

    let start = Instant::now();
    let result = pipeline.process(&order(2)).await;
    assert!(result.is_success());
    // Two calls, one inter-call delay; no delay before the first.
    assert!(start.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn failed_photo_is_skipped_not_fatal() {
    let dir = tempfile::TempDir::new().unwrap();
    // Photo 2 of 3 fails its transform call.
    let generator = Arc::new(MockGenerator::new(vec![2]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator.clone(),
        notifier,
    );

    let result = pipeline.process(&order(3)).await;

    let PipelineOutcome::Success {
        photos_received,
        arts_generated,
        ..
    } = &result.outcome
    else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(*photos_received, 3);
    assert_eq!(*arts_generated, 2);

    let work_dir = dir.path().join("user-example-com").join(format!("spike_{TS}"));
    assert!(work_dir.join(format!("arte_1_{TS}.png")).is_file());
    assert!(!work_dir.join(format!("arte_2_{TS}.png")).exists());
    assert!(work_dir.join(format!("arte_3_{TS}.png")).is_file());
}

#[tokio::test]
async fn zero_artifacts_is_a_hard_failure() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![1, 2]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator,
        notifier.clone(),
    );

    let result = pipeline.process(&order(2)).await;

    let PipelineOutcome::Failure { stage, reason } = &result.outcome else {
        panic!("expected failure, got {:?}", result.outcome);
    };
    assert_eq!(*stage, petstory_core::PipelineStage::GeneratingArt);
    assert_eq!(reason, "no artwork generated");
    // Nothing reached the dispatcher and no kit was written.
    assert!(notifier.sends.lock().await.is_empty());
    let work_dir = dir.path().join("user-example-com").join(format!("spike_{TS}"));
    assert!(!work_dir.join(format!("kit_digital_spike_{TS}.pdf")).exists());
}

#[tokio::test]
async fn delivery_outcome_never_fails_the_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::NotConfigured));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator,
        notifier,
    );

    let result = pipeline.process(&order(1)).await;

    let PipelineOutcome::Success {
        pdf_path, delivery, ..
    } = &result.outcome
    else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert_eq!(*delivery, DeliveryOutcome::NotConfigured);
    assert!(pdf_path.is_file());
}

#[tokio::test]
async fn failed_delivery_still_succeeds() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Failed(
        "rejected by smtp server".to_string(),
    )));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator,
        notifier,
    );

    let result = pipeline.process(&order(1)).await;

    // No failure record carries the notification stage; the outcome rides
    // on the success record instead.
    let PipelineOutcome::Success { delivery, .. } = &result.outcome else {
        panic!("expected success, got {:?}", result.outcome);
    };
    assert!(matches!(delivery, DeliveryOutcome::Failed(_)));
}

// Composition and rendering run off the executor; the whole order must
// complete even when the runtime has a single worker thread.
#[tokio::test(flavor = "current_thread")]
async fn completes_on_a_single_threaded_runtime() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), true, Duration::ZERO),
        generator,
        notifier,
    );

    let result = pipeline.process(&order(2)).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn submit_runs_the_order_in_the_background() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = Arc::new(OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator,
        notifier,
    ));

    let handle = pipeline.submit(order(1));
    let result = handle.await.unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn tribute_embeds_the_first_artifact() {
    let dir = tempfile::TempDir::new().unwrap();
    let generator = Arc::new(MockGenerator::new(vec![]));
    let notifier = Arc::new(MockNotifier::new(DeliveryOutcome::Delivered));
    let pipeline = OrderPipeline::new(
        &config(dir.path(), false, Duration::ZERO),
        generator.clone(),
        notifier,
    );

    let result = pipeline.process(&order(2)).await;
    let PipelineOutcome::Success { tribute_path, .. } = &result.outcome else {
        panic!("expected success");
    };

    let html = std::fs::read_to_string(tribute_path).unwrap();
    assert!(html.contains("Spike"));
    assert!(html.contains("data:image/png;base64,"));
    // Self-contained page: the generated art travels inline, not by path.
    assert!(!html.contains("arte_1"));
}
