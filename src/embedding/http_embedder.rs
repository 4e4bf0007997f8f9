//! Embedder backed by a remote inference service.
//!
//! The service exposes `POST {url}/embed` and accepts
//!
//! ```json
//! {"model": "msclap-2023", "modality": "audio", "inputs": ["<base64 file bytes>"]}
//! ```
//!
//! Text inputs are sent verbatim, media inputs as base64-encoded file
//! contents. The response is `{"embeddings": [[f32, ...], ...]}` with one
//! vector per input.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::HttpEmbedderConfig;
use crate::embedding::embedder::{EmbedInput, Embedder, unsupported_input};
use crate::error::{MenagerieError, Result};
use crate::model::Modality;
use crate::vector::core::vector::Vector;

/// Request body of the embed endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    modality: Modality,
    inputs: Vec<String>,
}

/// Response body of the embed endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Remote embedder for one model family.
///
/// # Examples
///
/// ```no_run
/// use menagerie::config::HttpEmbedderConfig;
/// use menagerie::embedding::embedder::{EmbedInput, Embedder};
/// use menagerie::embedding::http_embedder::HttpEmbedder;
/// use menagerie::model::Modality;
///
/// # async fn example() -> menagerie::error::Result<()> {
/// let embedder = HttpEmbedder::new(
///     &HttpEmbedderConfig {
///         url: "http://localhost:8080".into(),
///         model: "msclap-2023".into(),
///         dimension: 1024,
///     },
///     Modality::Audio,
/// )?;
///
/// let vector = embedder.embed(&EmbedInput::Text("a dog barking")).await?;
/// assert_eq!(vector.dimension(), 1024);
/// # Ok(())
/// # }
/// ```
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    media: Modality,
    dimension: usize,
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("media", &self.media)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl HttpEmbedder {
    /// Create an embedder accepting text and `media` inputs.
    pub fn new(config: &HttpEmbedderConfig, media: Modality) -> Result<Self> {
        if media == Modality::Text {
            return Err(MenagerieError::invalid_argument(
                "the media modality of an HTTP embedder cannot be text",
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embed", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            media,
            dimension: config.dimension,
        })
    }

    /// Encode one input for the request body.
    async fn encode_input(&self, input: &EmbedInput<'_>) -> Result<String> {
        if !self.supports(input.modality()) {
            return Err(unsupported_input(&self.model, input));
        }
        match input {
            EmbedInput::Text(text) => Ok((*text).to_string()),
            EmbedInput::AudioPath(path) | EmbedInput::ImagePath(path) => encode_file(path).await,
        }
    }

    async fn request(&self, modality: Modality, inputs: Vec<String>) -> Result<Vec<Vector>> {
        let expected = inputs.len();
        let request = EmbeddingRequest {
            model: &self.model,
            modality,
            inputs,
        };

        log::debug!(
            "POST {} ({} {} input(s))",
            self.endpoint,
            expected,
            modality
        );
        let http_response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                MenagerieError::embedding(format!("embedding request failed: {e}"))
            })?;

        let status = http_response.status();
        let response_text = http_response.text().await?;

        if !status.is_success() {
            return Err(MenagerieError::embedding(format!(
                "embedding service error (status {status}): {response_text}"
            )));
        }

        self.parse_response(&response_text, expected)
    }

    fn parse_response(&self, body: &str, expected: usize) -> Result<Vec<Vector>> {
        let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
            MenagerieError::embedding(format!(
                "failed to parse embedding response: {e}. Response text: {body}"
            ))
        })?;

        if response.embeddings.len() != expected {
            return Err(MenagerieError::embedding(format!(
                "expected {expected} embedding(s), got {}",
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|data| {
                let vector = Vector::new(data);
                vector
                    .validate_dimension(self.dimension)
                    .map_err(|e| MenagerieError::embedding(e.to_string()))?;
                if !vector.is_valid() {
                    return Err(MenagerieError::embedding(
                        "embedding contains NaN or infinite values",
                    ));
                }
                Ok(vector)
            })
            .collect()
    }
}

async fn encode_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        MenagerieError::embedding(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(STANDARD.encode(bytes))
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        let encoded = self.encode_input(input).await?;
        self.request(input.modality(), vec![encoded])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MenagerieError::embedding("no embedding in response"))
    }

    /// Inputs of a single modality go out as one request; mixed batches fall
    /// back to one request per input.
    async fn embed_batch(&self, inputs: &[EmbedInput<'_>]) -> Result<Vec<Vector>> {
        let Some(first) = inputs.first() else {
            return Ok(Vec::new());
        };
        let modality = first.modality();
        if inputs.iter().any(|i| i.modality() != modality) {
            let mut results = Vec::with_capacity(inputs.len());
            for input in inputs {
                results.push(self.embed(input).await?);
            }
            return Ok(results);
        }

        let mut encoded = Vec::with_capacity(inputs.len());
        for input in inputs {
            encoded.push(self.encode_input(input).await?);
        }
        self.request(modality, encoded).await
    }

    fn supported_modalities(&self) -> Vec<Modality> {
        vec![Modality::Text, self.media]
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::test_support::spawn_stub;

    fn embedder_for(url: &str) -> HttpEmbedder {
        HttpEmbedder::new(
            &HttpEmbedderConfig {
                url: url.into(),
                model: "msclap-2023".into(),
                dimension: 3,
            },
            Modality::Audio,
        )
        .unwrap()
    }

    fn clap() -> HttpEmbedder {
        HttpEmbedder::new(
            &HttpEmbedderConfig {
                url: "http://localhost:8080/".into(),
                model: "msclap-2023".into(),
                dimension: 3,
            },
            Modality::Audio,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_and_modalities() {
        let embedder = clap();
        assert_eq!(embedder.endpoint, "http://localhost:8080/embed");
        assert!(embedder.supports(Modality::Text));
        assert!(embedder.supports(Modality::Audio));
        assert!(!embedder.supports(Modality::Image));
        assert_eq!(embedder.dimension(), 3);
        assert_eq!(embedder.name(), "msclap-2023");
    }

    #[test]
    fn test_text_media_modality_rejected() {
        let config = HttpEmbedderConfig {
            url: "http://localhost:8080".into(),
            model: "m".into(),
            dimension: 3,
        };
        assert!(HttpEmbedder::new(&config, Modality::Text).is_err());
    }

    #[tokio::test]
    async fn test_request_body_encodes_media_as_base64() {
        let embedder = clap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"RIFF").unwrap();

        let encoded = embedder
            .encode_input(&EmbedInput::AudioPath(file.path()))
            .await
            .unwrap();
        assert_eq!(encoded, "UklGRg==");

        let request = EmbeddingRequest {
            model: "msclap-2023",
            modality: Modality::Audio,
            inputs: vec![encoded],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"model": "msclap-2023", "modality": "audio", "inputs": ["UklGRg=="]})
        );
    }

    #[tokio::test]
    async fn test_encode_rejects_unsupported_modality() {
        let embedder = clap();
        let err = embedder
            .encode_input(&EmbedInput::ImagePath(Path::new("cat.jpg")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("image"));
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let embedder = clap();
        assert!(
            embedder
                .encode_input(&EmbedInput::AudioPath(Path::new("/no/such/file.wav")))
                .await
                .is_err()
        );
    }

    #[test]
    fn test_parse_response() {
        let embedder = clap();
        let vectors = embedder
            .parse_response(r#"{"embeddings": [[0.1, 0.2, 0.3]]}"#, 1)
            .unwrap();
        assert_eq!(vectors[0].data, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_parse_response_checks_count_and_dimension() {
        let embedder = clap();
        assert!(
            embedder
                .parse_response(r#"{"embeddings": [[0.1, 0.2, 0.3]]}"#, 2)
                .is_err()
        );
        assert!(
            embedder
                .parse_response(r#"{"embeddings": [[0.1, 0.2]]}"#, 1)
                .is_err()
        );
        assert!(embedder.parse_response("not json", 1).is_err());
    }

    #[test]
    fn test_parse_response_rejects_non_finite_values() {
        let embedder = clap();
        let err = embedder
            .parse_response(r#"{"embeddings": [[0.1, 1e39, 0.3]]}"#, 1)
            .unwrap_err();
        assert!(matches!(err, MenagerieError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let embedder = clap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_over_http() {
        let router = Router::new().route(
            "/embed",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "msclap-2023");
                assert_eq!(body["modality"], "text");
                let count = body["inputs"].as_array().map(Vec::len).unwrap_or(0);
                let embeddings: Vec<Vec<f32>> = (0..count).map(|i| vec![i as f32, 0.0, 1.0]).collect();
                Json(json!({ "embeddings": embeddings }))
            }),
        );
        let url = spawn_stub(router).await;
        let embedder = embedder_for(&url);

        let vectors = embedder
            .embed_batch(&[EmbedInput::Text("dog"), EmbedInput::Text("cat")])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1].data, vec![1.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_service_error_is_embedding_error() {
        let router = Router::new().route(
            "/embed",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
        let url = spawn_stub(router).await;
        let embedder = embedder_for(&url);

        let err = embedder.embed(&EmbedInput::Text("dog")).await.unwrap_err();
        match err {
            MenagerieError::Embedding(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("CUDA out of memory"));
            }
            other => panic!("expected embedding error, got {other:?}"),
        }
    }
}
