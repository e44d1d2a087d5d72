//! promptsite Generator Library
//!
//! Website generation engine for promptsite.
//!
//! # Modules
//!
//! - [`extract`] - Code extraction from free-form backend responses
//! - [`prompt`] - Backend instructions per artifact kind
//! - [`backend`] - Text-generation backend seam and the Gemini client
//! - [`images`] - Placeholder image download and markup rewriting
//! - [`generate`] - Generation orchestration
//! - [`archive`] - Zip packaging of generated bundles

pub mod archive;
pub mod backend;
pub mod extract;
pub mod generate;
mod http;
pub mod images;
pub mod prompt;

pub use archive::{ArchiveError, write_zip, zip_bundle};
pub use backend::{BackendError, GeminiBackend, TextBackend};
pub use extract::{Extraction, extract, extract_with_outcome};
pub use generate::{GenerationError, SiteGenerator};
pub use images::{
    FetchError, HttpImageFetcher, ImageFailure, ImageFetcher, ImageLocalizer, Localized,
};
pub use prompt::prompt_for;
