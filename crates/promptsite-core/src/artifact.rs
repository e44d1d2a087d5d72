//! Generation data model.
//!
//! Every value here lives for the duration of one generation request. Only the
//! files an [`OutputBundle`] points at outlive it.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Subdirectory of a bundle holding localized images.
pub const IMAGES_DIR: &str = "images";

/// The three artifacts produced for every site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// HTML page structure.
    Markup,
    /// CSS presentation.
    Style,
    /// JavaScript behavior.
    Script,
}

impl ArtifactKind {
    /// Pipeline order.
    pub const ALL: [ArtifactKind; 3] = [Self::Markup, Self::Style, Self::Script];

    /// Conventional file name inside a bundle.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Markup => "index.html",
            Self::Style => "style.css",
            Self::Script => "script.js",
        }
    }

    /// Language tags accepted on a fenced code block for this kind.
    #[must_use]
    pub fn fence_tags(self) -> &'static [&'static str] {
        match self {
            Self::Markup => &["html"],
            Self::Style => &["css"],
            Self::Script => &["javascript", "js"],
        }
    }

    /// Lowercase name used in logs and JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Style => "style",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's request to generate a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    topic: String,
}

impl GenerationRequest {
    /// Create a request, rejecting blank topics.
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyTopic);
        }
        Ok(Self {
            topic: trimmed.to_string(),
        })
    }

    /// The site description supplied by the user.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// One backend response and the code extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Which artifact this is.
    pub kind: ArtifactKind,
    /// Unmodified backend response.
    pub raw_text: String,
    /// Extracted code, images already localized for markup.
    pub extracted_text: String,
}

/// An external image reference rewritten to a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The `src` value found in the markup.
    pub original_url: String,
    /// 1-based position among localized images.
    pub ordinal: u32,
    /// Path written into the markup in place of `original_url`.
    pub local_path: String,
}

impl ImageReference {
    /// Create a reference for the given slot.
    #[must_use]
    pub fn new(original_url: impl Into<String>, ordinal: u32) -> Self {
        Self {
            original_url: original_url.into(),
            ordinal,
            local_path: format!("./{IMAGES_DIR}/{}", Self::file_name(ordinal)),
        }
    }

    /// File name for an ordinal, e.g. `img3.jpg`.
    #[must_use]
    pub fn file_name(ordinal: u32) -> String {
        format!("img{ordinal}.jpg")
    }
}

/// The persisted result of one successful generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBundle {
    /// Request identifier, also the bundle directory name.
    pub id: Uuid,
    /// Topic the site was generated for.
    pub topic: String,
    /// Directory holding the bundle files.
    pub root: PathBuf,
    /// Markup, style and script, in pipeline order.
    pub artifacts: Vec<GeneratedArtifact>,
    /// Images written under `images/`.
    pub images: Vec<ImageReference>,
    /// Completion time.
    pub created_at: DateTime<Utc>,
}

impl OutputBundle {
    /// On-disk location of an artifact.
    #[must_use]
    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// Directory holding the localized images.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// Look up an artifact by kind.
    #[must_use]
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Bundle directory for `id` under `output_dir`.
    #[must_use]
    pub fn dir_for(output_dir: &Path, id: Uuid) -> PathBuf {
        output_dir.join(id.to_string())
    }
}
