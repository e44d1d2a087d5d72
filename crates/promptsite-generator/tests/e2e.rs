//! End-to-end tests for the generation pipeline.
//!
//! These tests run the full generator against canned backend responses and a
//! local image fetcher, and verify what ends up on disk.

use std::{
    fs,
    io::Cursor,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use promptsite_core::{ArtifactKind, GenerationRequest, config::ImagesConfig};
use promptsite_generator::{
    BackendError, FetchError, GenerationError, ImageFetcher, ImageLocalizer, SiteGenerator,
    TextBackend, extract, prompt_for, zip_bundle,
};
use tempfile::TempDir;

const TOPIC: &str = "mountain bike rental";

const MARKUP_RESPONSE: &str = r#"Here is the page you asked for:

```html
<!DOCTYPE html>
<html lang="en">
<head><link rel="stylesheet" href="style.css"></head>
<body>
  <header><h1>Ride On</h1></header>
  <img src="https://images.example.com/hero.jpg" alt="hero">
  <img src="https://images.example.com/bike.jpg" alt="bike">
  <script src="script.js"></script>
</body>
</html>
```

Let me know if you need changes."#;

const STYLE_RESPONSE: &str = "```css\nbody { font-family: 'Poppins', sans-serif; }\n```";

const SCRIPT_RESPONSE: &str = "Sure:\n```javascript\ndocument.querySelectorAll('a').forEach(a => a.addEventListener('click', e => e.preventDefault()));\n```";

/// Backend answering each prompt role with a fixed response.
struct CannedBackend {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl CannedBackend {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }
}

#[async_trait]
impl TextBackend for CannedBackend {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(BackendError::Api {
                status: 500,
                message: "quota exceeded".to_string(),
            });
        }

        let response = if prompt == prompt_for(ArtifactKind::Markup, TOPIC) {
            MARKUP_RESPONSE
        } else if prompt == prompt_for(ArtifactKind::Style, TOPIC) {
            STYLE_RESPONSE
        } else if prompt == prompt_for(ArtifactKind::Script, TOPIC) {
            SCRIPT_RESPONSE
        } else {
            return Err(BackendError::Parse(format!("unexpected prompt: {prompt}")));
        };
        Ok(response.to_string())
    }
}

/// Fetcher returning a tiny fake JPEG.
struct FakeJpegFetcher;

#[async_trait]
impl ImageFetcher for FakeJpegFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(vec![0xff, 0xd8, 0xff, 0xd9])
    }
}

fn generator(backend: CannedBackend, output: &Path) -> SiteGenerator {
    let localizer = ImageLocalizer::new(Arc::new(FakeJpegFetcher), &ImagesConfig::default());
    SiteGenerator::new(Arc::new(backend), output).with_localizer(localizer)
}

fn request() -> GenerationRequest {
    GenerationRequest::new(TOPIC).expect("topic is not blank")
}

/// Entries of `dir`, sorted.
fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read output dir")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_bundle_matches_independent_extraction() {
    let output = TempDir::new().unwrap();
    let bundle = generator(CannedBackend::new(), output.path())
        .generate_site(&request())
        .await
        .expect("generation succeeds");

    assert_eq!(bundle.root, output.path().join(bundle.id.to_string()));
    assert_eq!(bundle.topic, TOPIC);

    let style = extract(STYLE_RESPONSE, ArtifactKind::Style);
    let script = extract(SCRIPT_RESPONSE, ArtifactKind::Script);
    assert_eq!(style, "body { font-family: 'Poppins', sans-serif; }");
    assert_eq!(
        bundle.artifact(ArtifactKind::Style).unwrap().extracted_text,
        style
    );
    assert_eq!(
        bundle.artifact(ArtifactKind::Script).unwrap().extracted_text,
        script
    );
    assert_eq!(
        fs::read_to_string(bundle.path_of(ArtifactKind::Style)).unwrap(),
        style
    );
    assert_eq!(
        fs::read_to_string(bundle.path_of(ArtifactKind::Script)).unwrap(),
        script
    );

    let expected_markup = extract(MARKUP_RESPONSE, ArtifactKind::Markup)
        .replacen("https://images.example.com/hero.jpg", "./images/img1.jpg", 1)
        .replacen("https://images.example.com/bike.jpg", "./images/img2.jpg", 1);
    assert_eq!(
        fs::read_to_string(bundle.path_of(ArtifactKind::Markup)).unwrap(),
        expected_markup
    );
    assert_eq!(
        bundle.artifact(ArtifactKind::Markup).unwrap().raw_text,
        MARKUP_RESPONSE
    );

    for kind in ArtifactKind::ALL {
        assert!(bundle.root.join(kind.file_name()).exists());
    }
    assert_eq!(bundle.images.len(), 2);
    assert!(bundle.images_dir().join("img1.jpg").exists());
    assert!(bundle.images_dir().join("img2.jpg").exists());
}

#[tokio::test]
async fn test_sequential_and_concurrent_agree() {
    let output = TempDir::new().unwrap();

    let concurrent = generator(CannedBackend::new(), output.path())
        .with_concurrency(true)
        .generate_site(&request())
        .await
        .unwrap();
    let sequential = generator(CannedBackend::new(), output.path())
        .with_concurrency(false)
        .generate_site(&request())
        .await
        .unwrap();

    assert_ne!(concurrent.id, sequential.id);
    for kind in ArtifactKind::ALL {
        assert_eq!(
            fs::read_to_string(concurrent.path_of(kind)).unwrap(),
            fs::read_to_string(sequential.path_of(kind)).unwrap()
        );
    }
}

#[tokio::test]
async fn test_backend_failure_rolls_back_and_keeps_prior_bundle() {
    let output = TempDir::new().unwrap();

    let prior = generator(CannedBackend::new(), output.path())
        .generate_site(&request())
        .await
        .unwrap();
    let prior_markup = fs::read_to_string(prior.path_of(ArtifactKind::Markup)).unwrap();

    let err = generator(CannedBackend::failing_on(2), output.path())
        .with_concurrency(false)
        .generate_site(&request())
        .await
        .unwrap_err();

    match err {
        GenerationError::Backend { kind, ref source } => {
            assert_eq!(kind, ArtifactKind::Style);
            assert!(matches!(source, BackendError::Api { status: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(entries(output.path()), vec![prior.id.to_string()]);
    assert_eq!(
        fs::read_to_string(prior.path_of(ArtifactKind::Markup)).unwrap(),
        prior_markup
    );
}

#[tokio::test]
async fn test_output_directory_created_on_first_use() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("nested").join("generated");

    let bundle = generator(CannedBackend::new(), &output)
        .generate_site(&request())
        .await
        .unwrap();

    assert!(output.is_dir());
    assert_eq!(entries(&output), vec![bundle.id.to_string()]);
}

#[tokio::test]
async fn test_bundle_zips_all_files() {
    let output = TempDir::new().unwrap();
    let bundle = generator(CannedBackend::new(), output.path())
        .generate_site(&request())
        .await
        .unwrap();

    let bytes = zip_bundle(&bundle.root).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();

    assert_eq!(
        names,
        vec![
            "images/img1.jpg",
            "images/img2.jpg",
            "index.html",
            "script.js",
            "style.css"
        ]
    );
}
