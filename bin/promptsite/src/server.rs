//! Delivery server: generation endpoint, bundle preview and zip download

use std::{convert::Infallible, path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use promptsite_core::{ArtifactKind, GenerationRequest, OutputBundle};
use promptsite_generator::{ArchiveError, SiteGenerator, zip_bundle};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tower_http::{services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

/// Single-page UI served at `/`.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// File name offered for downloaded archives.
const ARCHIVE_NAME: &str = "website.zip";

/// Events pushed to connected browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteEvent {
    /// A new bundle was published.
    Generated(Uuid),
}

/// Server state shared by all handlers.
pub struct ServerState {
    generator: SiteGenerator,
    output_dir: PathBuf,
    latest: RwLock<Option<Uuid>>,
    /// Broadcast channel for site events.
    pub events_tx: broadcast::Sender<SiteEvent>,
}

impl ServerState {
    /// Create a new server state around `generator`.
    pub fn new(generator: SiteGenerator) -> Self {
        let (events_tx, _) = broadcast::channel(16);
        Self {
            output_dir: generator.output_dir().to_path_buf(),
            generator,
            latest: RwLock::new(None),
            events_tx,
        }
    }

    /// Record `id` as the latest bundle and notify connected clients.
    pub async fn publish(&self, id: Uuid) {
        *self.latest.write().await = Some(id);
        let _ = self.events_tx.send(SiteEvent::Generated(id));
    }

    /// The most recently published bundle.
    pub async fn latest(&self) -> Option<Uuid> {
        *self.latest.read().await
    }
}

/// Create the delivery server router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/generate", post(generate_handler))
        .route("/download", get(download_latest_handler))
        .route("/download/{id}", get(download_handler))
        .route("/__events", get(events_handler))
        .nest_service("/generated", ServeDir::new(&state.output_dir))
        .layer(middleware::from_fn(hide_dot_segments))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Request body of `POST /generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Description of the website.
    pub prompt: String,
}

/// A downloadable file of a bundle.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileLink {
    /// Display name.
    pub name: String,
    /// URL path.
    pub url: String,
}

/// Response body of `POST /generate`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Bundle identifier.
    pub id: Uuid,
    /// The three artifacts plus the archive.
    pub files: Vec<FileLink>,
    /// URL of the generated page.
    pub preview_url: String,
    /// URL of the zip archive.
    pub download_url: String,
}

impl GenerateResponse {
    fn for_bundle(id: Uuid) -> Self {
        let file_url = |kind: ArtifactKind| format!("/generated/{id}/{}", kind.file_name());
        let download_url = format!("/download/{id}");

        let mut files: Vec<FileLink> = ArtifactKind::ALL
            .into_iter()
            .map(|kind| FileLink {
                name: kind.file_name().to_string(),
                url: file_url(kind),
            })
            .collect();
        files.push(FileLink {
            name: "Download ZIP".to_string(),
            url: download_url.clone(),
        });

        Self {
            id,
            files,
            preview_url: file_url(ArtifactKind::Markup),
            download_url,
        }
    }
}

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Answer 404 for any path segment starting with a dot.
///
/// In-progress bundles live in `.staging-<id>` under the served directory.
async fn hide_dot_segments(req: Request, next: Next) -> Response {
    let hidden = req.uri().path().split('/').any(|segment| {
        segment.starts_with('.')
            || segment
                .get(..3)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("%2e"))
    });
    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Run the pipeline for the submitted prompt.
async fn generate_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = GenerationRequest::new(body.prompt)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let bundle = state.generator.generate_site(&request).await.map_err(|e| {
        tracing::error!(error = %e, "generation failed");
        ApiError::new(StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    state.publish(bundle.id).await;
    tracing::info!(id = %bundle.id, "bundle published");

    Ok(Json(GenerateResponse::for_bundle(bundle.id)))
}

async fn download_latest_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Response, ApiError> {
    let id = state
        .latest()
        .await
        .ok_or_else(|| ApiError::not_found("no website has been generated yet"))?;
    zip_response(&state, id).await
}

async fn download_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    zip_response(&state, id).await
}

/// Zip bundle `id` and return it as an attachment.
async fn zip_response(state: &ServerState, id: Uuid) -> Result<Response, ApiError> {
    let dir = OutputBundle::dir_for(&state.output_dir, id);

    let bytes = tokio::task::spawn_blocking(move || zip_bundle(&dir))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| match e {
            ArchiveError::NotFound(_) => ApiError::not_found(format!("unknown bundle {id}")),
            other => {
                tracing::error!(%id, error = %other, "archive failed");
                ApiError::internal(other.to_string())
            }
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARCHIVE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Server-Sent Events handler announcing new bundles.
async fn events_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(SiteEvent::Generated(id)) => Some(Ok(Event::default().data(format!("generated:{id}")))),
        Err(_) => None, // Ignore lagged messages
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use promptsite_generator::{BackendError, TextBackend};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    struct FixedBackend {
        fail: bool,
    }

    #[async_trait]
    impl TextBackend for FixedBackend {
        async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
            if self.fail {
                return Err(BackendError::Api {
                    status: 401,
                    message: "invalid key".to_string(),
                });
            }
            let text = if prompt.contains("FULL HTML5") {
                "<html><body><h1>Hello</h1></body></html>"
            } else if prompt.contains("Respond ONLY with CSS") {
                "```css\nh1 { color: teal; }\n```"
            } else {
                "```js\nconsole.log('ready');\n```"
            };
            Ok(text.to_string())
        }
    }

    fn state(output: &TempDir, fail: bool) -> Arc<ServerState> {
        let generator = SiteGenerator::new(Arc::new(FixedBackend { fail }), output.path());
        Arc::new(ServerState::new(generator))
    }

    fn generate_request(prompt: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "prompt": prompt }).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_generate_then_preview_and_download() {
        let output = TempDir::new().unwrap();
        let state = state(&output, false);
        let mut events = state.events_tx.subscribe();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(generate_request("plant shop"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: GenerateResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body.preview_url, format!("/generated/{}/index.html", body.id));
        assert_eq!(body.download_url, format!("/download/{}", body.id));
        assert_eq!(body.files.len(), 4);
        assert_eq!(state.latest().await, Some(body.id));
        assert_eq!(events.try_recv().unwrap(), SiteEvent::Generated(body.id));

        let css = app
            .clone()
            .oneshot(get(&format!("/generated/{}/style.css", body.id)))
            .await
            .unwrap();
        assert_eq!(css.status(), StatusCode::OK);
        assert_eq!(body_bytes(css).await, b"h1 { color: teal; }");

        let zip = app.clone().oneshot(get("/download")).await.unwrap();
        assert_eq!(zip.status(), StatusCode::OK);
        assert_eq!(zip.headers()[header::CONTENT_TYPE], "application/zip");
        assert!(
            zip.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains(ARCHIVE_NAME)
        );

        let archive = zip::ZipArchive::new(Cursor::new(body_bytes(zip).await)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["index.html", "script.js", "style.css"]);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let output = TempDir::new().unwrap();
        let app = create_router(state(&output, false));

        let response = app.oneshot(generate_request("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_bad_gateway() {
        let output = TempDir::new().unwrap();
        let state = state(&output, true);
        let app = create_router(state.clone());

        let response = app.oneshot(generate_request("plant shop")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid key"));
        assert!(state.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_download_without_bundle_is_not_found() {
        let output = TempDir::new().unwrap();
        let app = create_router(state(&output, false));

        let latest = app.clone().oneshot(get("/download")).await.unwrap();
        assert_eq!(latest.status(), StatusCode::NOT_FOUND);

        let unknown = app
            .oneshot(get(&format!("/download/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_staging_directories_are_not_served() {
        let output = TempDir::new().unwrap();
        let staging = output.path().join(".staging-1234");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("index.html"), "<html>half done</html>").unwrap();
        let app = create_router(state(&output, false));

        for uri in [
            "/generated/.staging-1234/index.html",
            "/generated/%2Estaging-1234/index.html",
        ] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_index_page() {
        let output = TempDir::new().unwrap();
        let app = create_router(state(&output, false));

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("/generate"));
    }
}
