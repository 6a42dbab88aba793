//! Order pipeline: GeneratingArt -> Composing -> Rendering -> Notifying.
//!
//! Drives one order end to end inside its own working directory. Photo
//! failures are isolated per photo; the only hard failures are ending the
//! generation stage with zero artifacts, or a compose/render error. A failed
//! or skipped email never fails an order whose artifacts were produced.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use petstory_core::{slug, Config, Order, PipelineOutcome, PipelineResult, PipelineStage};
use petstory_processing::{compose_digital_kit, KitSpec, TributeRenderer};
use petstory_services::{ImageGenerator, KitNotifier};

pub struct OrderPipeline {
    generator: Arc<dyn ImageGenerator>,
    notifier: Arc<dyn KitNotifier>,
    tribute: TributeRenderer,
    base_dir: PathBuf,
    coloring_prompt: String,
    sticker_prompt: Option<String>,
    generation_delay: Duration,
}

impl OrderPipeline {
    pub fn new(
        config: &Config,
        generator: Arc<dyn ImageGenerator>,
        notifier: Arc<dyn KitNotifier>,
    ) -> Self {
        Self {
            generator,
            notifier,
            tribute: TributeRenderer::new(),
            base_dir: config.temp_dir.clone(),
            coloring_prompt: config.coloring_prompt.clone(),
            sticker_prompt: config.sticker_prompt.clone(),
            generation_delay: config.generation_delay,
        }
    }

    /// Hand the order to the background runtime. The caller gets no result
    /// channel; the pipeline's outcome is observable only through its side
    /// effects (email, disk state, logs) and the returned handle, which
    /// request boundaries are expected to drop.
    pub fn submit(self: &Arc<Self>, order: Order) -> JoinHandle<PipelineResult> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.process(&order).await })
    }

    /// Run one order to completion. Exactly one [`PipelineResult`] comes
    /// back, whatever happens in between.
    pub async fn process(&self, order: &Order) -> PipelineResult {
        let result = self.run(order).await;
        match &result.outcome {
            PipelineOutcome::Success {
                arts_generated,
                photos_received,
                delivery,
                ..
            } => info!(
                pet_name = %order.pet_name,
                email = %order.email,
                arts_generated,
                photos_received,
                delivery = ?delivery,
                "order completed"
            ),
            PipelineOutcome::Failure { stage, reason } => error!(
                pet_name = %order.pet_name,
                email = %order.email,
                stage = ?stage,
                %reason,
                "order failed"
            ),
        }
        result
    }

    async fn run(&self, order: &Order) -> PipelineResult {
        let fail = |stage: PipelineStage, reason: String| PipelineResult {
            pet_name: order.pet_name.clone(),
            email: order.email.clone(),
            outcome: PipelineOutcome::Failure { stage, reason },
        };

        let dir = slug::order_dir(&self.base_dir, &order.email, &order.pet_name, &order.timestamp);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            return fail(
                PipelineStage::GeneratingArt,
                format!("could not create working directory {}: {e}", dir.display()),
            );
        }
        info!(dir = %dir.display(), photos = order.photos.len(), "order accepted");

        // GeneratingArt: persist each original, then transform it. One photo's
        // failure never stops the next photo.
        let mut originals = Vec::new();
        let mut arts = Vec::new();
        let mut stickers = Vec::new();
        let mut first_call = true;

        for (idx, photo) in order.photos.iter().enumerate() {
            let n = idx + 1;
            let photo_path = dir.join(format!("foto_{n}_{}.{}", order.timestamp, photo.extension()));
            match tokio::fs::write(&photo_path, &photo.bytes).await {
                Ok(()) => originals.push(photo_path),
                Err(e) => warn!(photo = n, error = %e, "original photo could not be saved"),
            }

            if !first_call {
                tokio::time::sleep(self.generation_delay).await;
            }
            first_call = false;

            match self.generator.generate(&photo.bytes, &self.coloring_prompt).await {
                Ok(bytes) => {
                    let art_path = dir.join(format!("arte_{n}_{}.png", order.timestamp));
                    match tokio::fs::write(&art_path, bytes).await {
                        Ok(()) => arts.push(art_path),
                        Err(e) => warn!(photo = n, error = %e, "art image could not be saved"),
                    }
                }
                Err(e) => {
                    warn!(photo = n, error = %e, "coloring transform failed, skipping photo");
                    continue;
                }
            }

            if let Some(prompt) = &self.sticker_prompt {
                tokio::time::sleep(self.generation_delay).await;
                match self.generator.generate(&photo.bytes, prompt).await {
                    Ok(bytes) => {
                        let sticker_path = dir.join(format!("adesivo_{n}_{}.png", order.timestamp));
                        match tokio::fs::write(&sticker_path, bytes).await {
                            Ok(()) => stickers.push(sticker_path),
                            Err(e) => {
                                warn!(photo = n, error = %e, "sticker image could not be saved")
                            }
                        }
                    }
                    // The coloring art stands on its own without the sticker.
                    Err(e) => warn!(photo = n, error = %e, "sticker transform failed"),
                }
            }
        }

        if arts.is_empty() {
            return fail(PipelineStage::GeneratingArt, "no artwork generated".to_string());
        }

        // Composing. PDF assembly decodes every image; run it off the
        // executor so concurrent orders keep making progress.
        let compose = {
            let pet_name = order.pet_name.clone();
            let pet_date = order.pet_date.clone();
            let pet_story = order.pet_story.clone();
            let arts = arts.clone();
            let originals = originals.clone();
            let stickers = stickers.clone();
            let out_dir = dir.clone();
            let timestamp = order.timestamp.clone();
            tokio::task::spawn_blocking(move || {
                let spec = KitSpec {
                    pet_name: &pet_name,
                    pet_date: &pet_date,
                    pet_story: &pet_story,
                    art_images: &arts,
                    original_images: &originals,
                    sticker_images: &stickers,
                };
                compose_digital_kit(&spec, &out_dir, &timestamp)
            })
        };
        let pdf_path = match compose.await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => return fail(PipelineStage::Composing, e.to_string()),
            Err(e) => return fail(PipelineStage::Composing, format!("compose task failed: {e}")),
        };

        // Rendering: the tribute always shows the first successful artifact.
        let render = {
            let renderer = self.tribute.clone();
            let pet_name = order.pet_name.clone();
            let pet_date = order.pet_date.clone();
            let pet_story = order.pet_story.clone();
            let first_art = arts[0].clone();
            let out_dir = dir.clone();
            let timestamp = order.timestamp.clone();
            tokio::task::spawn_blocking(move || {
                renderer.render(&pet_name, &pet_date, &pet_story, &first_art, &out_dir, &timestamp)
            })
        };
        let tribute_path = match render.await {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => return fail(PipelineStage::Rendering, e.to_string()),
            Err(e) => return fail(PipelineStage::Rendering, format!("render task failed: {e}")),
        };

        // Notifying: one attempt, outcome recorded but never fatal.
        let delivery = match (
            tokio::fs::read(&pdf_path).await,
            tokio::fs::read_to_string(&tribute_path).await,
        ) {
            (Ok(pdf_bytes), Ok(tribute_html)) => {
                let pdf_filename = pdf_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("kit_digital.pdf")
                    .to_string();
                self.notifier
                    .send_kit(
                        &order.email,
                        &order.pet_name,
                        pdf_bytes,
                        &pdf_filename,
                        &tribute_html,
                    )
                    .await
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "finished artifacts could not be read back for delivery");
                petstory_core::DeliveryOutcome::Failed(format!("artifact read failed: {e}"))
            }
        };

        PipelineResult {
            pet_name: order.pet_name.clone(),
            email: order.email.clone(),
            outcome: PipelineOutcome::Success {
                pdf_path,
                tribute_path,
                photos_received: order.photos.len(),
                arts_generated: arts.len(),
                delivery,
            },
        }
    }
}
