//! Per-model embedder lookup and input dispatch.

use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;

use crate::config::{ClipBackend, ModelsConfig};
use crate::embedding::embedder::{EmbedInput, Embedder};
use crate::embedding::http_embedder::HttpEmbedder;
use crate::error::{MenagerieError, Result};
use crate::model::{Modality, Model};
use crate::vector::core::vector::Vector;

/// Decide how `value` is embedded by `model`.
///
/// A value naming an existing filesystem path is read as the model's media
/// (audio for CLAP, images for CLIP). Anything else is embedded as text.
pub fn resolve_input(model: Model, value: &str) -> EmbedInput<'_> {
    let path = Path::new(value);
    if !path.exists() {
        return EmbedInput::Text(value);
    }
    match model.media_modality() {
        Modality::Audio => EmbedInput::AudioPath(path),
        Modality::Image => EmbedInput::ImagePath(path),
        Modality::Text => EmbedInput::Text(value),
    }
}

/// Embedders keyed by model.
///
/// Reuse one instance per model with `Arc::clone`; loaded models are large.
///
/// ```
/// use std::sync::Arc;
///
/// use menagerie::config::HttpEmbedderConfig;
/// use menagerie::embedding::http_embedder::HttpEmbedder;
/// use menagerie::embedding::registry::EmbedderRegistry;
/// use menagerie::model::{Modality, Model};
///
/// # fn example() -> menagerie::error::Result<()> {
/// let clap = HttpEmbedder::new(
///     &HttpEmbedderConfig {
///         url: "http://localhost:8080".into(),
///         model: "msclap-2023".into(),
///         dimension: 1024,
///     },
///     Modality::Audio,
/// )?;
///
/// let mut registry = EmbedderRegistry::new();
/// registry.add_embedder(Model::Clap, Arc::new(clap));
/// assert_eq!(registry.dimension(Model::Clap)?, 1024);
/// assert!(registry.get(Model::Clip).is_err());
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Clone, Default)]
pub struct EmbedderRegistry {
    embedders: AHashMap<Model, Arc<dyn Embedder>>,
}

impl std::fmt::Debug for EmbedderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<(Model, &str)> = self
            .models()
            .into_iter()
            .filter_map(|m| self.embedders.get(&m).map(|e| (m, e.name())))
            .collect();
        f.debug_struct("EmbedderRegistry")
            .field("embedders", &names)
            .finish()
    }
}

impl EmbedderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the CLAP and CLIP embedders described by the `models` section.
    pub fn from_config(config: &ModelsConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.add_embedder(
            Model::Clap,
            Arc::new(HttpEmbedder::new(&config.clap, Modality::Audio)?),
        );
        registry.add_embedder(Model::Clip, clip_embedder(config)?);
        Ok(registry)
    }

    /// Register (or replace) the embedder for `model`.
    pub fn add_embedder(&mut self, model: Model, embedder: Arc<dyn Embedder>) {
        self.embedders.insert(model, embedder);
    }

    /// Builder-style variant of [`add_embedder`](Self::add_embedder).
    pub fn with_embedder(mut self, model: Model, embedder: Arc<dyn Embedder>) -> Self {
        self.add_embedder(model, embedder);
        self
    }

    /// The embedder for `model`.
    pub fn get(&self, model: Model) -> Result<&Arc<dyn Embedder>> {
        self.embedders
            .get(&model)
            .ok_or_else(|| MenagerieError::unsupported_model(model.as_str()))
    }

    /// Registered models, in [`Model::ALL`] order.
    pub fn models(&self) -> Vec<Model> {
        Model::ALL
            .into_iter()
            .filter(|m| self.embedders.contains_key(m))
            .collect()
    }

    /// Output dimension of the embedder for `model`.
    pub fn dimension(&self, model: Model) -> Result<usize> {
        Ok(self.get(model)?.dimension())
    }

    /// Embed `value` with `model`, dispatching on [`resolve_input`].
    ///
    /// Returns the vector together with the modality it was computed from.
    pub async fn compute_embedding(&self, model: Model, value: &str) -> Result<(Vector, Modality)> {
        let embedder = self.get(model)?;
        let input = resolve_input(model, value);
        let vector = embedder.embed(&input).await?;
        Ok((vector, input.modality()))
    }

    /// Embed `text` with `model` as text, even if it happens to name a file.
    pub async fn compute_text_embedding(&self, model: Model, text: &str) -> Result<Vector> {
        self.get(model)?.embed(&EmbedInput::Text(text)).await
    }
}

#[cfg(feature = "embeddings-candle")]
fn clip_embedder(config: &ModelsConfig) -> Result<Arc<dyn Embedder>> {
    use crate::embedding::candle_clip_embedder::CandleClipEmbedder;

    Ok(match config.clip_backend {
        ClipBackend::Http => Arc::new(HttpEmbedder::new(&config.clip, Modality::Image)?),
        ClipBackend::Candle => Arc::new(CandleClipEmbedder::new(&config.clip_model)?),
    })
}

#[cfg(not(feature = "embeddings-candle"))]
fn clip_embedder(config: &ModelsConfig) -> Result<Arc<dyn Embedder>> {
    match config.clip_backend {
        ClipBackend::Http => Ok(Arc::new(HttpEmbedder::new(&config.clip, Modality::Image)?)),
        ClipBackend::Candle => Err(MenagerieError::config(
            "clip_backend 'candle' requires the embeddings-candle feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::NamedTempFile;

    use super::*;

    /// Encodes the input modality into the first component.
    #[derive(Debug)]
    struct ModalityEmbedder {
        media: Modality,
    }

    #[async_trait]
    impl Embedder for ModalityEmbedder {
        async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
            let tag = match input.modality() {
                Modality::Text => 0.0,
                Modality::Audio => 1.0,
                Modality::Image => 2.0,
            };
            Ok(Vector::new(vec![tag, 1.0]))
        }

        fn supported_modalities(&self) -> Vec<Modality> {
            vec![Modality::Text, self.media]
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "modality"
        }
    }

    fn registry() -> EmbedderRegistry {
        EmbedderRegistry::new()
            .with_embedder(
                Model::Clap,
                Arc::new(ModalityEmbedder {
                    media: Modality::Audio,
                }),
            )
            .with_embedder(
                Model::Clip,
                Arc::new(ModalityEmbedder {
                    media: Modality::Image,
                }),
            )
    }

    #[test]
    fn test_resolve_input_text_when_path_missing() {
        let input = resolve_input(Model::Clap, "a dog barking");
        assert_eq!(input.as_text(), Some("a dog barking"));
    }

    #[test]
    fn test_resolve_input_media_when_path_exists() {
        let file = NamedTempFile::new().unwrap();
        let value = file.path().to_str().unwrap();

        assert_eq!(resolve_input(Model::Clap, value).modality(), Modality::Audio);
        assert_eq!(resolve_input(Model::Clip, value).modality(), Modality::Image);
    }

    #[tokio::test]
    async fn test_compute_embedding_reports_modality() {
        let registry = registry();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let (vector, modality) = registry.compute_embedding(Model::Clip, path).await.unwrap();
        assert_eq!(modality, Modality::Image);
        assert_eq!(vector.data[0], 2.0);

        let (vector, modality) = registry
            .compute_embedding(Model::Clap, "rain on a roof")
            .await
            .unwrap();
        assert_eq!(modality, Modality::Text);
        assert_eq!(vector.data[0], 0.0);
    }

    #[tokio::test]
    async fn test_text_embedding_ignores_existing_paths() {
        let registry = registry();
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let vector = registry
            .compute_text_embedding(Model::Clap, path)
            .await
            .unwrap();
        assert_eq!(vector.data[0], 0.0);
    }

    #[tokio::test]
    async fn test_missing_model_is_unsupported() {
        let registry = EmbedderRegistry::new();
        let err = registry
            .compute_embedding(Model::Clap, "anything")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported model type: CLAP"));
    }

    #[test]
    fn test_models_and_dimension() {
        let registry = registry();
        assert_eq!(registry.models(), vec![Model::Clap, Model::Clip]);
        assert_eq!(registry.dimension(Model::Clip).unwrap(), 2);
    }

    #[test]
    fn test_from_config_http_backends() {
        let registry = EmbedderRegistry::from_config(&ModelsConfig::default()).unwrap();
        assert_eq!(registry.dimension(Model::Clap).unwrap(), 1024);
        assert_eq!(registry.dimension(Model::Clip).unwrap(), 512);
        assert!(registry.get(Model::Clap).unwrap().supports(Modality::Audio));
        assert!(registry.get(Model::Clip).unwrap().supports(Modality::Image));
    }

    #[cfg(not(feature = "embeddings-candle"))]
    #[test]
    fn test_candle_backend_needs_feature() {
        let config = ModelsConfig {
            clip_backend: ClipBackend::Candle,
            ..ModelsConfig::default()
        };
        assert!(EmbedderRegistry::from_config(&config).is_err());
    }
}
