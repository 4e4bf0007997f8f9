//! Vector store backed by a Qdrant server, spoken to over its REST API.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::VectorDbConfig;
use crate::error::{MenagerieError, Result};
use crate::vector::point::{PointStruct, ScoredPoint, VectorParams};
use crate::vector::store::VectorStore;

/// Characters left as-is in a collection name path segment.
const SEGMENT_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Body of `PUT /collections/{name}`.
#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    vectors: VectorsConfig,
}

#[derive(Debug, Serialize)]
struct VectorsConfig {
    size: usize,
    distance: &'static str,
}

/// Body of `PUT /collections/{name}/points`.
#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: &'a [PointStruct],
}

/// Body of `POST /collections/{name}/points/search`.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Serialize)]
struct CountRequest {
    exact: bool,
}

/// Envelope every Qdrant response is wrapped in.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
    #[serde(default)]
    status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

/// Qdrant REST client.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl QdrantStore {
    /// Create a client for the server at `url`.
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Create a client from the `vectordb` configuration section.
    pub fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Self::new(
            config.url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url,
            utf8_percent_encode(collection, SEGMENT_ENCODE),
            suffix
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        log::debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send a request and unwrap the `result` field of the response.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MenagerieError::vector_store(format!(
                "request failed with status {status}: {}",
                error_message(&body)
            )));
        }

        parse_result(&body)
    }
}

/// Extract `result` from a response envelope.
fn parse_result<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: ApiResponse<T> = serde_json::from_str(body)?;
    envelope.result.ok_or_else(|| {
        MenagerieError::vector_store(format!(
            "response has no result (status: {})",
            envelope
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "missing".to_string())
        ))
    })
}

/// Best-effort error text from a failed response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/status/error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let url = self.collection_url(collection, "/exists");
        let result: ExistsResult = self.send(self.request(Method::GET, &url)).await?;
        Ok(result.exists)
    }

    async fn create_collection(&self, collection: &str, params: VectorParams) -> Result<()> {
        let url = self.collection_url(collection, "");
        let body = CreateCollectionRequest {
            vectors: VectorsConfig {
                size: params.size,
                distance: params.distance.wire_name(),
            },
        };
        let _: bool = self
            .send(self.request(Method::PUT, &url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let url = self.collection_url(collection, "");
        let _: bool = self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let result: CollectionsResult = self.send(self.request(Method::GET, &url)).await?;
        let mut names: Vec<String> = result.collections.into_iter().map(|c| c.name).collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let url = self.collection_url(collection, "/points?wait=true");
        let body = UpsertRequest { points: &points };
        let _: serde_json::Value = self
            .send(self.request(Method::PUT, &url).json(&body))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let url = self.collection_url(collection, "/points/search");
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        self.send(self.request(Method::POST, &url).json(&body))
            .await
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let url = self.collection_url(collection, "/points/count");
        let result: CountResult = self
            .send(self.request(Method::POST, &url).json(&CountRequest { exact: true }))
            .await?;
        Ok(result.count)
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
