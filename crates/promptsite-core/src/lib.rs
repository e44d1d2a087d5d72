//! promptsite Core Library
//!
//! Data model, configuration, and error handling for the promptsite website generator.

pub mod artifact;
pub mod config;
pub mod error;

pub use artifact::{ArtifactKind, GeneratedArtifact, GenerationRequest, ImageReference, OutputBundle};
pub use config::Config;
pub use error::{CoreError, Result};
