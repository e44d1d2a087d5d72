//! Image localization.
//!
//! Generated markup points at arbitrary, often nonexistent, images: remote
//! URLs as well as relative names like `hero.jpg`. Every `<img src>` is
//! replaced by a placeholder picture downloaded for the site topic and stored
//! next to the markup. Inline `data:` URIs already carry their pixels and are
//! left alone.
//!
//! Rewriting is positional: the `src` value of the n-th localized tag is
//! replaced in place by `./images/img{n}.jpg`, so repeated URLs each get their
//! own file and identical text elsewhere in the document is left alone. A
//! failed download leaves that one reference unmodified; its ordinal is still
//! consumed so file names always match tag positions.

use std::{
    path::Path,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use promptsite_core::{ImageReference, config::ImagesConfig};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http::{ResponseError, ensure_success};

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]+)"|'([^']+)')[^>]*>"#)
        .expect("img pattern is valid")
});

/// Errors from fetching or storing one image.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The image source answered with a non-success status.
    #[error("image source returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The image source answered with an empty body.
    #[error("image source returned an empty body")]
    Empty,

    /// Writing the image to disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ResponseError> for FetchError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::RateLimited { .. } => Self::Status { status: 429 },
            ResponseError::Status { status, .. } => Self::Status { status },
        }
    }
}

/// Downloads image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the payload at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`ImageFetcher`] over HTTP.
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    /// Build a fetcher with the configured timeout.
    pub fn new(config: &ImagesConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("promptsite/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.http.get(url).send().await?;
        let resp = ensure_success(resp).await?;
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(bytes.to_vec())
    }
}

/// An image that could not be localized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFailure {
    /// Slot of the failed image.
    pub ordinal: u32,
    /// The reference that was left in place.
    pub original_url: String,
    /// Why the slot failed.
    pub reason: String,
}

/// Result of localizing one document.
#[derive(Debug, Clone, Default)]
pub struct Localized {
    /// Markup with localized references.
    pub markup: String,
    /// Successfully stored images, in ordinal order.
    pub images: Vec<ImageReference>,
    /// Slots left pointing at their original URL.
    pub failures: Vec<ImageFailure>,
}

/// An image reference found in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImageMatch {
    start: usize,
    end: usize,
    url: String,
}

/// Rewrites image references to downloaded placeholder images.
pub struct ImageLocalizer {
    fetcher: Arc<dyn ImageFetcher>,
    source_url: String,
    width: u32,
    height: u32,
}

impl ImageLocalizer {
    /// Create a localizer using `fetcher` for downloads.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>, config: &ImagesConfig) -> Self {
        Self {
            fetcher,
            source_url: config.source_url.clone(),
            width: config.width,
            height: config.height,
        }
    }

    /// Placeholder query URL for slot `ordinal` of `topic`.
    #[must_use]
    pub fn query_url(&self, topic: &str, ordinal: u32) -> String {
        self.source_url
            .replace("{query}", &urlencoding::encode(topic))
            .replace("{index}", &ordinal.to_string())
            .replace("{width}", &self.width.to_string())
            .replace("{height}", &self.height.to_string())
    }

    /// Localize every image of `markup` into `images_dir`.
    ///
    /// Downloads run one at a time in document order.
    pub async fn localize(&self, markup: &str, topic: &str, images_dir: &Path) -> Localized {
        let matches = find_images(markup);
        if matches.is_empty() {
            debug!("no images to localize");
            return Localized {
                markup: markup.to_string(),
                ..Localized::default()
            };
        }

        info!(count = matches.len(), "localizing images");

        let mut images = Vec::new();
        let mut failures = Vec::new();
        let mut rewritten = String::with_capacity(markup.len());
        let mut cursor = 0;

        for (ordinal, found) in (1u32..).zip(&matches) {
            rewritten.push_str(&markup[cursor..found.start]);
            cursor = found.end;

            match self.store(topic, ordinal, images_dir).await {
                Ok(()) => {
                    let image = ImageReference::new(&found.url, ordinal);
                    debug!(ordinal, url = %found.url, local = %image.local_path, "image localized");
                    rewritten.push_str(&image.local_path);
                    images.push(image);
                }
                Err(e) => {
                    warn!(ordinal, url = %found.url, error = %e, "image fetch failed, keeping original reference");
                    rewritten.push_str(&found.url);
                    failures.push(ImageFailure {
                        ordinal,
                        original_url: found.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        rewritten.push_str(&markup[cursor..]);

        Localized {
            markup: rewritten,
            images,
            failures,
        }
    }

    /// Fetch the placeholder for `ordinal` and write it under `images_dir`.
    async fn store(&self, topic: &str, ordinal: u32, images_dir: &Path) -> Result<(), FetchError> {
        let url = self.query_url(topic, ordinal);
        let bytes = self.fetcher.fetch(&url).await?;
        tokio::fs::create_dir_all(images_dir).await?;
        tokio::fs::write(images_dir.join(ImageReference::file_name(ordinal)), bytes).await?;
        Ok(())
    }
}

/// Whether `src` embeds the image itself.
fn is_inline_data(src: &str) -> bool {
    src.trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// `<img src>` values in document order, with their byte spans.
fn find_images(markup: &str) -> Vec<ImageMatch> {
    IMG_SRC
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter(|value| !is_inline_data(value.as_str()))
        .map(|value| ImageMatch {
            start: value.start(),
            end: value.end(),
            url: value.as_str().to_string(),
        })
        .collect()
}
