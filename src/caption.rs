//! Captioning of audio and images.
//!
//! A caption turns a media file into text, which is then embedded by the
//! *other* model so that an uploaded sound can retrieve images and an
//! uploaded image can retrieve sounds.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{MenagerieError, Result};
use crate::model::Modality;

/// Produces a short text description of a media file.
#[async_trait]
pub trait Captioner: Send + Sync + Debug {
    /// Caption the file at `path`, read as `modality`.
    async fn caption(&self, modality: Modality, path: &Path) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct CaptionRequest {
    modality: Modality,
    input: String,
}

#[derive(Debug, Deserialize)]
struct CaptionResponse {
    caption: String,
}

/// Captioner served by the inference endpoint at `POST {url}/caption`.
///
/// The request carries the base64 file contents:
/// `{"modality": "audio", "input": "<base64>"}`; the response is
/// `{"caption": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpCaptioner {
    client: Client,
    endpoint: String,
}

impl HttpCaptioner {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/caption", url.trim_end_matches('/')),
        })
    }

    async fn build_request(modality: Modality, path: &Path) -> Result<CaptionRequest> {
        if modality == Modality::Text {
            return Err(MenagerieError::invalid_argument(
                "captioning needs audio or image input",
            ));
        }
        let bytes = tokio::fs::read(path).await?;
        Ok(CaptionRequest {
            modality,
            input: STANDARD.encode(bytes),
        })
    }

    fn parse_response(body: &str) -> Result<String> {
        let response: CaptionResponse = serde_json::from_str(body).map_err(|e| {
            MenagerieError::caption(format!("failed to parse caption response: {e}"))
        })?;
        let caption = response.caption.trim();
        if caption.is_empty() {
            return Err(MenagerieError::caption("captioner returned an empty caption"));
        }
        Ok(caption.to_string())
    }
}

#[async_trait]
impl Captioner for HttpCaptioner {
    async fn caption(&self, modality: Modality, path: &Path) -> Result<String> {
        let request = Self::build_request(modality, path).await?;

        log::debug!("POST {} ({modality})", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| MenagerieError::caption(format!("caption request failed: {e}")))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MenagerieError::caption(format!(
                "caption service error (status {status}): {body}"
            )));
        }

        let caption = Self::parse_response(&body)?;
        log::info!("Caption for {}: {caption}", path.display());
        Ok(caption)
    }
}
