//! Site generation orchestration.
//!
//! Coordinates prompting, extraction, image localization and persistence for
//! one request. Every request is staged in its own directory and only renamed
//! to `<output>/<id>/` once all three artifacts exist, so a failed request
//! never leaves a partial bundle behind and never touches earlier bundles.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use promptsite_core::{
    ArtifactKind, Config, GeneratedArtifact, GenerationRequest, ImageReference, OutputBundle,
    artifact::IMAGES_DIR, config::RetryConfig,
};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{BackendError, GeminiBackend, TextBackend},
    extract::extract_with_outcome,
    images::{FetchError, HttpImageFetcher, ImageLocalizer},
    prompt::prompt_for,
};

/// Default upper bound for one backend call.
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// A backend call failed.
    #[error("{kind} generation failed: {source}")]
    Backend {
        /// Artifact whose call failed.
        kind: ArtifactKind,
        /// Underlying backend error.
        #[source]
        source: BackendError,
    },

    /// The backend answered but nothing usable could be extracted.
    #[error("backend returned no usable {kind} text")]
    Unusable {
        /// Artifact with an empty result.
        kind: ArtifactKind,
    },

    /// The backend client could not be constructed.
    #[error("backend setup failed: {0}")]
    BackendSetup(#[source] BackendError),

    /// The image client could not be constructed.
    #[error("image fetcher setup failed: {0}")]
    FetcherSetup(#[source] FetchError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Generates websites from topics.
pub struct SiteGenerator {
    backend: Arc<dyn TextBackend>,
    localizer: Option<ImageLocalizer>,
    output_dir: PathBuf,
    concurrent: bool,
    backend_timeout: Duration,
    retry: RetryConfig,
}

impl SiteGenerator {
    /// Create a generator writing bundles under `output_dir`.
    ///
    /// Images are left untouched until a localizer is attached.
    #[must_use]
    pub fn new(backend: Arc<dyn TextBackend>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            localizer: None,
            output_dir: output_dir.into(),
            concurrent: true,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Build a generator with the Gemini backend and HTTP image fetcher.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = GeminiBackend::new(&config.backend).map_err(GenerationError::BackendSetup)?;

        let mut generator = Self::new(Arc::new(backend), config.output_dir())
            .with_concurrency(config.generation.concurrent)
            .with_timeout(config.backend.timeout())
            .with_retry(config.retry.clone());

        if config.images.enabled {
            let fetcher =
                HttpImageFetcher::new(&config.images).map_err(GenerationError::FetcherSetup)?;
            generator =
                generator.with_localizer(ImageLocalizer::new(Arc::new(fetcher), &config.images));
        }

        Ok(generator)
    }

    /// Localize markup images with `localizer`.
    #[must_use]
    pub fn with_localizer(mut self, localizer: ImageLocalizer) -> Self {
        self.localizer = Some(localizer);
        self
    }

    /// Run the three backend calls concurrently (`true`) or in pipeline order.
    #[must_use]
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Bound each backend call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Retry policy for retryable backend errors.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Directory holding generated bundles.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate, persist and return a bundle for `request`.
    pub async fn generate_site(&self, request: &GenerationRequest) -> Result<OutputBundle> {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let staging = self.output_dir.join(format!(".staging-{id}"));
        let root = OutputBundle::dir_for(&self.output_dir, id);

        info!(%id, topic = request.topic(), "starting generation");

        fs::create_dir_all(&staging).await?;

        let (artifacts, images) = match self.publish(request.topic(), &staging, &root).await {
            Ok(published) => published,
            Err(e) => {
                discard(&staging).await;
                warn!(%id, error = %e, "generation failed, staged files removed");
                return Err(e);
            }
        };

        info!(
            %id,
            images = images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            root = %root.display(),
            "generation complete"
        );

        Ok(OutputBundle {
            id,
            topic: request.topic().to_string(),
            root,
            artifacts,
            images,
            created_at: Utc::now(),
        })
    }

    /// Stage every artifact, then move the staging directory to `root`.
    async fn publish(
        &self,
        topic: &str,
        staging: &Path,
        root: &Path,
    ) -> Result<(Vec<GeneratedArtifact>, Vec<ImageReference>)> {
        let staged = self.stage(topic, staging).await?;
        fs::rename(staging, root).await?;
        Ok(staged)
    }

    /// Produce all artifacts into `staging`.
    async fn stage(
        &self,
        topic: &str,
        staging: &Path,
    ) -> Result<(Vec<GeneratedArtifact>, Vec<ImageReference>)> {
        let texts = self.generate_texts(topic).await?;

        let mut artifacts = Vec::with_capacity(ArtifactKind::ALL.len());
        let mut images = Vec::new();

        for (kind, raw_text) in ArtifactKind::ALL.into_iter().zip(texts) {
            let outcome = extract_with_outcome(&raw_text, kind);
            if !outcome.matched {
                warn!(%kind, "no clean code block in response, using fallback text");
            }

            let mut text = outcome.text;
            if text.is_empty() {
                return Err(GenerationError::Unusable { kind });
            }

            if kind == ArtifactKind::Markup {
                if let Some(localizer) = &self.localizer {
                    let localized = localizer
                        .localize(&text, topic, &staging.join(IMAGES_DIR))
                        .await;
                    if !localized.failures.is_empty() {
                        warn!(
                            failed = localized.failures.len(),
                            "some images kept their original references"
                        );
                    }
                    text = localized.markup;
                    images = localized.images;
                }
            }

            let path = staging.join(kind.file_name());
            fs::write(&path, &text).await?;
            debug!(%kind, path = %path.display(), bytes = text.len(), "wrote artifact");

            artifacts.push(GeneratedArtifact {
                kind,
                raw_text,
                extracted_text: text,
            });
        }

        Ok((artifacts, images))
    }

    /// Backend responses for markup, style and script, in that order.
    async fn generate_texts(&self, topic: &str) -> Result<[String; 3]> {
        if self.concurrent {
            let (markup, style, script) = tokio::try_join!(
                self.call_backend(ArtifactKind::Markup, topic),
                self.call_backend(ArtifactKind::Style, topic),
                self.call_backend(ArtifactKind::Script, topic),
            )?;
            return Ok([markup, style, script]);
        }

        let markup = self.call_backend(ArtifactKind::Markup, topic).await?;
        let style = self.call_backend(ArtifactKind::Style, topic).await?;
        let script = self.call_backend(ArtifactKind::Script, topic).await?;
        Ok([markup, style, script])
    }

    /// One backend call with timeout and retry.
    async fn call_backend(&self, kind: ArtifactKind, topic: &str) -> Result<String> {
        let prompt = prompt_for(kind, topic);
        let mut attempt = 1;

        loop {
            let result = tokio::time::timeout(self.backend_timeout, self.backend.generate(&prompt))
                .await
                .unwrap_or(Err(BackendError::Timeout {
                    secs: self.backend_timeout.as_secs(),
                }));

            match result {
                Ok(text) => {
                    debug!(%kind, attempt, chars = text.len(), "backend responded");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    // A rate-limit hint never waits longer than one call may take.
                    let delay = match &e {
                        BackendError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).min(self.backend_timeout)
                        }
                        _ => self.retry.delay_for(attempt),
                    };
                    warn!(%kind, attempt, error = %e, ?delay, "backend call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => return Err(GenerationError::Backend { kind, source }),
            }
        }
    }
}

/// Remove a staging directory, logging instead of failing.
async fn discard(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging).await {
        warn!(dir = %staging.display(), error = %e, "failed to remove staging directory");
    }
}
