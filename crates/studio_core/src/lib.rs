use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use futures::future::try_join;
use image_api::ImageGenerator;
use serde::Serialize;
use shared::{
    domain::{
        BattleContender, BattleRequest, BattleResult, GeneratedImage, GenerationOptions,
        ImageCount, ImageId,
    },
    error::{StudioError, BATTLE_PROMPTS_REQUIRED, PROMPT_REQUIRED, UPSCALE_FAILED},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

mod gallery;
pub use gallery::ImageGallery;

const NO_IMAGES_RETURNED: &str = "The image service returned no images.";
const BATTLE_EXPECTED_IMAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudioMode {
    Forge,
    Battle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioEvent {
    GenerationStarted {
        mode: StudioMode,
        expected_images: usize,
    },
    ForgeCompleted {
        images: Vec<GeneratedImage>,
    },
    BattleCompleted(BattleResult),
    GenerationFailed(String),
    UpscaleStarted(ImageId),
    UpscaleCompleted(ImageId),
    UpscaleFailed {
        image_id: ImageId,
        message: String,
    },
    Cleared,
}

/// How a forge or battle submission settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    Completed(T),
    Failed(String),
    /// A newer submission or a clear superseded this one; state was not touched.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpscaleOutcome {
    Upscaled { source: String },
    Failed { message: String },
    /// Unknown id, or the image is already upscaling or upscaled.
    Skipped,
    /// The image left the gallery while the call was in flight.
    Discarded,
}

/// Read-only view of the orchestrator state handed to presentation code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudioSnapshot {
    pub images: Vec<GeneratedImage>,
    pub battle_result: Option<BattleResult>,
    pub loading: bool,
    pub error: Option<String>,
    pub expected_image_count: usize,
}

#[derive(Default)]
struct StudioState {
    images: ImageGallery,
    battle_result: Option<BattleResult>,
    loading: bool,
    error: Option<String>,
    expected_image_count: usize,
    active_submission: Option<u64>,
    last_submission: u64,
}

impl StudioState {
    fn snapshot(&self) -> StudioSnapshot {
        StudioSnapshot {
            images: self.images.to_vec(),
            battle_result: self.battle_result.clone(),
            loading: self.loading,
            error: self.error.clone(),
            expected_image_count: self.expected_image_count,
        }
    }

    /// Returns false when `submission` was superseded; otherwise ends loading.
    fn settle(&mut self, submission: u64) -> bool {
        if self.active_submission != Some(submission) {
            return false;
        }
        self.active_submission = None;
        self.loading = false;
        true
    }
}

pub struct Studio {
    generator: Arc<dyn ImageGenerator>,
    inner: Mutex<StudioState>,
    events: broadcast::Sender<StudioEvent>,
}

impl Studio {
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            generator,
            inner: Mutex::new(StudioState {
                expected_image_count: 1,
                ..StudioState::default()
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> StudioSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn image(&self, image_id: &ImageId) -> Option<GeneratedImage> {
        self.inner.lock().await.images.get(image_id).cloned()
    }

    async fn reject(&self, error: StudioError) -> StudioError {
        warn!(kind = ?error.kind(), error = %error, "rejected generation request");
        self.inner.lock().await.error = Some(error.to_string());
        error
    }

    /// Resets results and marks loading; returns the submission sequence
    /// number that must still be current when the request settles.
    async fn begin_submission(&self, mode: StudioMode, expected_images: usize) -> u64 {
        let submission = {
            let mut state = self.inner.lock().await;
            state.last_submission += 1;
            let submission = state.last_submission;
            state.active_submission = Some(submission);
            state.loading = true;
            state.error = None;
            state.images.clear();
            state.battle_result = None;
            state.expected_image_count = expected_images;
            submission
        };
        let _ = self.events.send(StudioEvent::GenerationStarted {
            mode,
            expected_images,
        });
        submission
    }

    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> anyhow::Result<Vec<String>> {
        if options.model.supports_batches() {
            self.generator
                .batch_generate(prompt, options.image_count, options.aspect_ratio)
                .await
        } else {
            self.generator.single_generate(prompt).await
        }
    }

    async fn generate_contender(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> anyhow::Result<String> {
        let options = GenerationOptions {
            image_count: ImageCount::ONE,
            ..options
        };
        self.generate(prompt, options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!(NO_IMAGES_RETURNED))
    }

    pub async fn submit_forge(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<Settlement<Vec<GeneratedImage>>, StudioError> {
        if prompt.trim().is_empty() {
            return Err(self
                .reject(StudioError::Validation(PROMPT_REQUIRED.to_string()))
                .await);
        }

        let submitted_at = Utc::now().timestamp_millis();
        let submission = self
            .begin_submission(StudioMode::Forge, options.expected_image_count())
            .await;
        info!(
            submission,
            model = %options.model,
            count = options.expected_image_count(),
            "forge request dispatched"
        );

        let outcome = match self.generate(prompt, options).await {
            Ok(uris) if uris.is_empty() => Err(StudioError::upstream(NO_IMAGES_RETURNED)),
            Ok(uris) => Ok(uris),
            Err(err) => {
                error!(submission, error = %err, "forge request failed");
                Err(StudioError::upstream(err.to_string()))
            }
        };

        let mut state = self.inner.lock().await;
        if !state.settle(submission) {
            info!(submission, "discarding superseded forge result");
            return Ok(Settlement::Discarded);
        }

        match outcome {
            Ok(uris) => {
                let images: Vec<GeneratedImage> = uris
                    .into_iter()
                    .enumerate()
                    .map(|(index, uri)| {
                        GeneratedImage::new(
                            ImageId::for_batch(submitted_at, submission, index),
                            uri,
                            prompt,
                            options,
                        )
                    })
                    .collect();
                state.error = None;
                state.images.replace_all(images.clone());
                let stored = state.images.len();
                drop(state);

                info!(submission, images = stored, "forge request completed");
                let _ = self.events.send(StudioEvent::ForgeCompleted {
                    images: images.clone(),
                });
                Ok(Settlement::Completed(images))
            }
            Err(err) => {
                let message = err.to_string();
                state.error = Some(message.clone());
                drop(state);

                let _ = self
                    .events
                    .send(StudioEvent::GenerationFailed(message.clone()));
                Ok(Settlement::Failed(message))
            }
        }
    }

    pub async fn submit_battle(
        &self,
        request: BattleRequest,
    ) -> Result<Settlement<BattleResult>, StudioError> {
        if request.prompt_a.trim().is_empty() || request.prompt_b.trim().is_empty() {
            return Err(self
                .reject(StudioError::Validation(BATTLE_PROMPTS_REQUIRED.to_string()))
                .await);
        }

        let submission = self
            .begin_submission(StudioMode::Battle, BATTLE_EXPECTED_IMAGES)
            .await;
        info!(
            submission,
            model_a = %request.options_a.model,
            model_b = %request.options_b.model,
            "battle request dispatched"
        );

        // Both contenders are polled together; the first failure drops the other.
        let joined = try_join(
            self.generate_contender(&request.prompt_a, request.options_a),
            self.generate_contender(&request.prompt_b, request.options_b),
        )
        .await;

        let mut state = self.inner.lock().await;
        if !state.settle(submission) {
            info!(submission, "discarding superseded battle result");
            return Ok(Settlement::Discarded);
        }

        match joined {
            Ok((image_a, image_b)) => {
                let result = BattleResult {
                    contender_a: BattleContender {
                        image: image_a,
                        prompt: request.prompt_a,
                        options: request.options_a,
                    },
                    contender_b: BattleContender {
                        image: image_b,
                        prompt: request.prompt_b,
                        options: request.options_b,
                    },
                };
                state.error = None;
                state.battle_result = Some(result.clone());
                drop(state);

                info!(submission, "battle request completed");
                let _ = self.events.send(StudioEvent::BattleCompleted(result.clone()));
                Ok(Settlement::Completed(result))
            }
            Err(err) => {
                error!(submission, error = %err, "battle request failed");
                let message = StudioError::upstream(err.to_string()).to_string();
                state.error = Some(message.clone());
                drop(state);

                let _ = self
                    .events
                    .send(StudioEvent::GenerationFailed(message.clone()));
                Ok(Settlement::Failed(message))
            }
        }
    }

    /// Regenerates one gallery image with the high-fidelity model. Failures
    /// stay on the card and never reach the global error field.
    pub async fn upscale(&self, image_id: &ImageId) -> UpscaleOutcome {
        let (prompt, aspect_ratio) = {
            let mut state = self.inner.lock().await;
            let Some(entry) = state.images.get_mut(image_id) else {
                debug!(%image_id, "upscale requested for unknown image");
                return UpscaleOutcome::Skipped;
            };
            if entry.upscaling || entry.upscaled {
                debug!(%image_id, "upscale already in flight or done");
                return UpscaleOutcome::Skipped;
            }
            entry.upscaling = true;
            entry.upscale_error = None;
            (entry.prompt.clone(), entry.options.aspect_ratio)
        };
        let _ = self.events.send(StudioEvent::UpscaleStarted(image_id.clone()));
        info!(%image_id, "upscale dispatched");

        let result = self
            .generator
            .batch_generate(&prompt, ImageCount::ONE, aspect_ratio)
            .await
            .and_then(|uris| {
                uris.into_iter()
                    .next()
                    .ok_or_else(|| anyhow!(NO_IMAGES_RETURNED))
            });

        let mut state = self.inner.lock().await;
        let Some(entry) = state
            .images
            .get_mut(image_id)
            .filter(|entry| entry.upscaling)
        else {
            info!(%image_id, "discarding upscale for image no longer in gallery");
            return UpscaleOutcome::Discarded;
        };

        entry.upscaling = false;
        match result {
            Ok(source) => {
                entry.source = source.clone();
                entry.upscaled = true;
                drop(state);

                let _ = self
                    .events
                    .send(StudioEvent::UpscaleCompleted(image_id.clone()));
                UpscaleOutcome::Upscaled { source }
            }
            Err(err) => {
                error!(%image_id, error = %err, "upscale failed");
                let message = StudioError::Upscale(UPSCALE_FAILED.to_string()).to_string();
                entry.upscale_error = Some(message.clone());
                drop(state);

                let _ = self.events.send(StudioEvent::UpscaleFailed {
                    image_id: image_id.clone(),
                    message: message.clone(),
                });
                UpscaleOutcome::Failed { message }
            }
        }
    }

    /// Empties the gallery and battle result, dismisses the error and
    /// abandons any in-flight forge or battle submission.
    pub async fn clear(&self) {
        let had_images = {
            let mut state = self.inner.lock().await;
            let had_images = !state.images.is_empty();
            state.images.clear();
            state.battle_result = None;
            state.error = None;
            state.loading = false;
            state.active_submission = None;
            had_images
        };
        debug!(had_images, "gallery cleared");
        let _ = self.events.send(StudioEvent::Cleared);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
