//! JSON search API.
//!
//! Endpoints:
//! - GET  /api/health        - liveness and backend names
//! - GET  /api/collections   - mapped collections with their point counts
//! - POST /api/search/text   - `{"query", "top"}`, searches audio and images
//! - POST /api/search/audio  - raw audio body, `?top=N`
//! - POST /api/search/image  - raw image body, `?top=N`
//!
//! Uploaded files are written to a temporary file first so the embedding
//! dispatch sees an existing path and embeds them as media.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::caption::Captioner;
use crate::error::{MenagerieError, Result as MenagerieResult};
use crate::manager::VectorManager;
use crate::model::Model;
use crate::rag::{self, CrossModalResults};
use crate::vector::point::ScoredPoint;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: VectorManager,
    pub captioner: Option<Arc<dyn Captioner>>,
    pub default_top: usize,
}

impl AppState {
    fn top(&self, requested: Option<usize>) -> usize {
        requested.filter(|&n| n > 0).unwrap_or(self.default_top)
    }
}

/// Error returned by handlers, rendered as `{"error", "code"}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(MenagerieError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => match e {
                MenagerieError::Embedding(_)
                | MenagerieError::Caption(_)
                | MenagerieError::VectorStore(_)
                | MenagerieError::Http(_) => StatusCode::BAD_GATEWAY,
                MenagerieError::NotFound(_) => StatusCode::NOT_FOUND,
                MenagerieError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Internal(e) => {
                log::warn!("request failed: {e}");
                e.to_string()
            }
        };
        let body = ErrorBody {
            error: message,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<MenagerieError> for ApiError {
    fn from(e: MenagerieError) -> Self {
        ApiError::Internal(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(MenagerieError::Io(e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub captioning: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub model: Model,
    pub exists: bool,
    pub points: u64,
}

#[derive(Debug, Deserialize)]
pub struct TextSearchRequest {
    pub query: String,
    pub top: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TextSearchResponse {
    pub query: String,
    pub audio: Vec<ScoredPoint>,
    pub image: Vec<ScoredPoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParam {
    pub top: Option<usize>,
}

/// Build the router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/collections", get(collections))
        .route("/api/search/text", post(search_text))
        .route("/api/search/audio", post(search_audio))
        .route("/api/search/image", post(search_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Serve the API on `host:port` until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> MenagerieResult<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| MenagerieError::config(format!("invalid listen address {host}:{port}: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        store: state.manager.store().name().to_string(),
        captioning: state.captioner.is_some(),
    })
}

async fn collections(
    State(state): State<AppState>,
) -> Result<Json<Vec<CollectionInfo>>, ApiError> {
    let manager = &state.manager;
    let mut infos = Vec::new();
    for model in Model::ALL {
        let name = manager.collections().collection_for(model)?.to_string();
        let exists = manager.check_collection(&name).await?;
        let points = if exists { manager.count(&name).await? } else { 0 };
        infos.push(CollectionInfo {
            name,
            model,
            exists,
            points,
        });
    }
    Ok(Json(infos))
}

async fn search_text(
    State(state): State<AppState>,
    payload: Result<Json<TextSearchRequest>, JsonRejection>,
) -> Result<Json<TextSearchResponse>, ApiError> {
    let Json(req) = payload?;
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let top = state.top(req.top);
    let manager = &state.manager;

    let audio_collection = manager.collections().collection_for(Model::Clap)?;
    let image_collection = manager.collections().collection_for(Model::Clip)?;
    let audio = manager
        .search_text_vectors(audio_collection, query, top)
        .await?;
    let image = manager
        .search_text_vectors(image_collection, query, top)
        .await?;

    Ok(Json(TextSearchResponse {
        query: query.to_string(),
        audio,
        image,
    }))
}

async fn search_audio(
    State(state): State<AppState>,
    params: Result<Query<TopParam>, QueryRejection>,
    body: Bytes,
) -> Result<Json<CrossModalResults>, ApiError> {
    let Query(params) = params?;
    search_upload(&state, Model::Clap, ".wav", params.top, body).await
}

async fn search_image(
    State(state): State<AppState>,
    params: Result<Query<TopParam>, QueryRejection>,
    body: Bytes,
) -> Result<Json<CrossModalResults>, ApiError> {
    let Query(params) = params?;
    search_upload(&state, Model::Clip, ".jpg", params.top, body).await
}

async fn search_upload(
    state: &AppState,
    model: Model,
    suffix: &str,
    top: Option<usize>,
    body: Bytes,
) -> Result<Json<CrossModalResults>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "upload a {} file as the request body",
            model.media_modality()
        )));
    }

    let upload = stage_upload(suffix, body).await?;

    let results = rag::cross_modal_search(
        &state.manager,
        state.captioner.as_deref(),
        model,
        upload.path(),
        state.top(top),
    )
    .await?;
    Ok(Json(results))
}

/// Write an upload to a temp file off the async runtime. The file is removed
/// when the returned handle is dropped.
async fn stage_upload(suffix: &str, body: Bytes) -> MenagerieResult<NamedTempFile> {
    let suffix = suffix.to_string();
    tokio::task::spawn_blocking(move || -> MenagerieResult<NamedTempFile> {
        let mut upload = tempfile::Builder::new()
            .prefix("menagerie-upload-")
            .suffix(&suffix)
            .tempfile()?;
        upload.write_all(&body)?;
        Ok(upload)
    })
    .await
    .map_err(|e| MenagerieError::internal(format!("upload staging task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::data::DataToUpsert;
    use crate::embedding::embedder::{EmbedInput, Embedder};
    use crate::embedding::registry::EmbedderRegistry;
    use crate::error::Result;
    use crate::model::{CollectionRegistry, Modality};
    use crate::vector::core::vector::Vector;
    use crate::vector::point::VectorParams;
    use crate::test_support::spawn_stub;
    use crate::vector::MemoryStore;

    /// Text containing "dog" points one way, everything else the other; media
    /// files embed from their contents.
    #[derive(Debug)]
    struct ContentEmbedder;

    #[async_trait]
    impl Embedder for ContentEmbedder {
        async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
            let text = match input {
                EmbedInput::Text(text) => text.to_string(),
                EmbedInput::AudioPath(p) | EmbedInput::ImagePath(p) => {
                    std::fs::read_to_string(p)?
                }
            };
            Ok(Vector::new(if text.contains("dog") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            }))
        }

        fn supported_modalities(&self) -> Vec<Modality> {
            vec![Modality::Text, Modality::Audio, Modality::Image]
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[derive(Debug)]
    struct FixedCaptioner;

    #[async_trait]
    impl Captioner for FixedCaptioner {
        async fn caption(&self, _modality: Modality, _path: &std::path::Path) -> Result<String> {
            Ok("a dog".to_string())
        }
    }

    #[derive(Debug)]
    struct DownCaptioner;

    #[async_trait]
    impl Captioner for DownCaptioner {
        async fn caption(&self, _modality: Modality, _path: &std::path::Path) -> Result<String> {
            Err(MenagerieError::caption("caption service error (status 503): model down"))
        }
    }

    fn point(filename: &str) -> DataToUpsert {
        DataToUpsert::new(
            filename,
            json!({ "filename": filename }).as_object().unwrap().clone(),
        )
    }

    async fn state(captioner: Option<Arc<dyn Captioner>>) -> AppState {
        let embedders = EmbedderRegistry::new()
            .with_embedder(Model::Clap, Arc::new(ContentEmbedder))
            .with_embedder(Model::Clip, Arc::new(ContentEmbedder));
        let collections =
            CollectionRegistry::new([(Model::Clap, "audios"), (Model::Clip, "images")]).unwrap();
        let manager = VectorManager::new(Arc::new(MemoryStore::new()), embedders, collections);
        for (collection, files) in [
            ("audios", ["dog_bark.wav", "cat_meow.wav"]),
            ("images", ["dog.jpg", "cat.jpg"]),
        ] {
            manager
                .create_collection(collection, VectorParams::cosine(2))
                .await
                .unwrap();
            manager
                .upsert_vectors(collection, files.iter().map(|f| point(f)))
                .await
                .unwrap();
        }
        AppState {
            manager,
            captioner,
            default_top: 1,
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(health) = health(State(state(None).await)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.store, "memory");
        assert!(!health.captioning);
    }

    #[tokio::test]
    async fn test_collections_lists_counts() {
        let Json(infos) = collections(State(state(None).await)).await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "audios");
        assert_eq!(infos[0].points, 2);
        assert_eq!(infos[1].model, Model::Clip);
    }

    #[tokio::test]
    async fn test_search_text_hits_both_collections() {
        let request = TextSearchRequest {
            query: "  a dog  ".into(),
            top: None,
        };
        let Json(response) = search_text(State(state(None).await), Ok(Json(request)))
            .await
            .unwrap();
        assert_eq!(response.query, "a dog");
        assert_eq!(response.audio.len(), 1);
        assert_eq!(response.audio[0].filename(), Some("dog_bark.wav"));
        assert_eq!(response.image[0].filename(), Some("dog.jpg"));
    }

    #[tokio::test]
    async fn test_search_text_rejects_empty_query() {
        let request = TextSearchRequest {
            query: " ".into(),
            top: Some(3),
        };
        let err = search_text(State(state(None).await), Ok(Json(request)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_audio_with_caption() {
        let state = state(Some(Arc::new(FixedCaptioner))).await;
        let Json(results) = search_audio(
            State(state),
            Ok(Query(TopParam { top: Some(2) })),
            Bytes::from_static(b"cat noises"),
        )
        .await
        .unwrap();

        assert_eq!(results.collection, "audios");
        assert_eq!(results.results.len(), 2);
        assert_eq!(results.results[0].filename(), Some("cat_meow.wav"));

        let cross = results.cross.unwrap();
        assert_eq!(cross.caption, "a dog");
        assert_eq!(cross.collection, "images");
        assert_eq!(cross.results[0].filename(), Some("dog.jpg"));
    }

    #[tokio::test]
    async fn test_search_image_without_captioner() {
        let Json(results) = search_image(
            State(state(None).await),
            Ok(Query(TopParam::default())),
            Bytes::from_static(b"dog picture"),
        )
        .await
        .unwrap();
        assert_eq!(results.collection, "images");
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].filename(), Some("dog.jpg"));
        assert!(results.cross.is_none());
    }

    #[tokio::test]
    async fn test_empty_upload_is_bad_request() {
        let err = search_image(
            State(state(None).await),
            Ok(Query(TopParam::default())),
            Bytes::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = ApiError::from(MenagerieError::not_found("collection 'x'"));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let upstream = ApiError::from(MenagerieError::embedding("timeout"));
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        let caption = ApiError::from(MenagerieError::caption("status 503"));
        assert_eq!(caption.status(), StatusCode::BAD_GATEWAY);
        let invalid = ApiError::from(MenagerieError::invalid_argument("dimension"));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let other = ApiError::from(MenagerieError::config("bad"));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn serve_stub(captioner: Option<Arc<dyn Captioner>>) -> String {
        spawn_stub(router(state(captioner).await)).await
    }

    async fn error_body(response: reqwest::Response) -> (StatusCode, serde_json::Value) {
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        let body: serde_json::Value = response.json().await.unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let url = serve_stub(None).await;
        let response = reqwest::Client::new()
            .post(format!("{url}/api/search/text"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();

        let (status, body) = error_body(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn test_bad_top_is_json_error() {
        let url = serve_stub(None).await;
        let response = reqwest::Client::new()
            .post(format!("{url}/api/search/audio?top=abc"))
            .body("cat noises")
            .send()
            .await
            .unwrap();

        let (status, body) = error_body(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().unwrap().contains("top"));
    }

    #[tokio::test]
    async fn test_text_query_naming_a_file_is_embedded_as_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cat.txt");
        std::fs::write(&path, "dog").unwrap();

        let url = serve_stub(None).await;
        let response = reqwest::Client::new()
            .post(format!("{url}/api/search/text"))
            .json(&json!({ "query": path.to_str().unwrap() }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["audio"][0]["payload"]["filename"], "cat_meow.wav");
        assert_eq!(body["image"][0]["payload"]["filename"], "cat.jpg");
    }

    #[tokio::test]
    async fn test_caption_failure_is_bad_gateway() {
        let url = serve_stub(Some(Arc::new(DownCaptioner))).await;
        let response = reqwest::Client::new()
            .post(format!("{url}/api/search/image"))
            .body("dog picture")
            .send()
            .await
            .unwrap();

        let (status, body) = error_body(response).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], 502);
        assert!(body["error"].as_str().unwrap().contains("model down"));
    }
}
