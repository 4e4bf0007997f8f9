//! YAML configuration.
//!
//! The configuration file mirrors the layout used by the data scripts and the
//! search front end: one section for the vector database, one per media type,
//! one for local paths, one for the S3 bucket the dataset is fetched from,
//! one for the embedding/captioning endpoints and one for the HTTP server.
//!
//! Every section has defaults, so a partial file (or no file at all) is valid.
//!
//! ```
//! use menagerie::config::Config;
//!
//! let config = Config::from_yaml_str(
//!     "vectordb:\n  url: http://qdrant:6333\n  collection_audio: sounds\n",
//! ).unwrap();
//! assert_eq!(config.vectordb.collection_audio, "sounds");
//! assert_eq!(config.vectordb.collection_image, "images");
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MenagerieError, Result};
use crate::vector::DistanceMetric;

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV_VAR: &str = "MENAGERIE_CONFIG";

/// File name looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub vectordb: VectorDbConfig,
    #[serde(deserialize_with = "MediaConfig::deserialize_audio")]
    pub audio: MediaConfig,
    #[serde(deserialize_with = "MediaConfig::deserialize_image")]
    pub image: MediaConfig,
    pub local: LocalConfig,
    pub s3: S3Config,
    pub models: ModelsConfig,
    pub server: ServerConfig,
}

/// Vector database connection and collection names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Base URL of the vector database REST API.
    pub url: String,
    /// Optional API key sent as the `api-key` header.
    pub api_key: Option<String>,
    /// Collection holding audio (CLAP) vectors.
    pub collection_audio: String,
    /// Collection holding image (CLIP) vectors.
    pub collection_image: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Distance used when creating collections.
    pub distance: DistanceMetric,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection_audio: "audios".to_string(),
            collection_image: "images".to_string(),
            timeout_secs: 30,
            distance: DistanceMetric::Cosine,
        }
    }
}

/// Where media files of one type live on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub directory: PathBuf,
    pub file_extension: String,
}

impl MediaConfig {
    fn audio() -> Self {
        Self {
            directory: PathBuf::from("data/audio"),
            file_extension: ".wav".to_string(),
        }
    }

    fn image() -> Self {
        Self {
            directory: PathBuf::from("data/images"),
            file_extension: ".jpg".to_string(),
        }
    }

    fn deserialize_audio<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(MediaOverrides::deserialize(deserializer)?.apply(Self::audio()))
    }

    fn deserialize_image<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(MediaOverrides::deserialize(deserializer)?.apply(Self::image()))
    }
}

/// A media section as written in the file; missing keys keep the defaults of
/// the media type.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaOverrides {
    directory: Option<PathBuf>,
    file_extension: Option<String>,
}

impl MediaOverrides {
    fn apply(self, base: MediaConfig) -> MediaConfig {
        MediaConfig {
            directory: self.directory.unwrap_or(base.directory),
            file_extension: self.file_extension.unwrap_or(base.file_extension),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vectordb: VectorDbConfig::default(),
            audio: MediaConfig::audio(),
            image: MediaConfig::image(),
            local: LocalConfig::default(),
            s3: S3Config::default(),
            models: ModelsConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Local paths for downloads and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory downloaded objects are written into.
    pub path: PathBuf,
    /// CSV file with `filename` and `category` columns for the audio set.
    pub metadata_audios: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/audio"),
            metadata_audios: PathBuf::from("data/meta/esc50.csv"),
        }
    }
}

/// S3-compatible bucket the dataset is downloaded from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    /// Key prefix to list under.
    pub path: String,
    pub region: Option<String>,
    /// Overrides the virtual-hosted AWS endpoint (MinIO, localstack, ...).
    pub endpoint: Option<String>,
}

/// Remote embedding endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEmbedderConfig {
    /// Base URL of the inference service.
    pub url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Expected embedding dimension.
    pub dimension: usize,
}

/// Which backend computes CLIP embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipBackend {
    #[default]
    Http,
    /// Local Candle inference, requires the `embeddings-candle` feature.
    Candle,
}

/// Embedding and captioning model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    #[serde(deserialize_with = "HttpEmbedderConfig::deserialize_clap")]
    pub clap: HttpEmbedderConfig,
    #[serde(deserialize_with = "HttpEmbedderConfig::deserialize_clip")]
    pub clip: HttpEmbedderConfig,
    pub clip_backend: ClipBackend,
    /// HuggingFace repository used by the Candle CLIP backend.
    pub clip_model: String,
    /// Captioning endpoint; cross-modal search is disabled without it.
    pub caption_url: Option<String>,
}

impl HttpEmbedderConfig {
    fn clap() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            model: "msclap-2023".to_string(),
            dimension: 1024,
        }
    }

    fn clip() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            model: "openai/clip-vit-base-patch32".to_string(),
            dimension: 512,
        }
    }

    fn deserialize_clap<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(EmbedderOverrides::deserialize(deserializer)?.apply(Self::clap()))
    }

    fn deserialize_clip<'de, D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(EmbedderOverrides::deserialize(deserializer)?.apply(Self::clip()))
    }
}

/// An embedder section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmbedderOverrides {
    url: Option<String>,
    model: Option<String>,
    dimension: Option<usize>,
}

impl EmbedderOverrides {
    fn apply(self, base: HttpEmbedderConfig) -> HttpEmbedderConfig {
        HttpEmbedderConfig {
            url: self.url.unwrap_or(base.url),
            model: self.model.unwrap_or(base.model),
            dimension: self.dimension.unwrap_or(base.dimension),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            clap: HttpEmbedderConfig::clap(),
            clip: HttpEmbedderConfig::clip(),
            clip_backend: ClipBackend::Http,
            clip_model: "openai/clip-vit-base-patch32".to_string(),
            caption_url: None,
        }
    }
}

/// HTTP search server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of results returned per collection when the request omits `top`.
    pub default_top: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            default_top: 5,
        }
    }
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MenagerieError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&content)
    }

    /// Locate and load the configuration.
    ///
    /// Lookup order: `explicit`, then the `MENAGERIE_CONFIG` environment
    /// variable, then `config.yml` in the working directory. When no file is
    /// found the defaults are used.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(path);
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            return Self::load(fallback);
        }
        log::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Check invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        let db = &self.vectordb;
        if db.collection_audio.is_empty() || db.collection_image.is_empty() {
            return Err(MenagerieError::config("collection names must not be empty"));
        }
        if db.collection_audio == db.collection_image {
            return Err(MenagerieError::config(format!(
                "audio and image collections must differ (both are '{}')",
                db.collection_audio
            )));
        }
        for (name, media) in [("audio", &self.audio), ("image", &self.image)] {
            if !media.file_extension.starts_with('.') {
                return Err(MenagerieError::config(format!(
                    "{name}.file_extension must start with '.', got '{}'",
                    media.file_extension
                )));
            }
        }
        if self.models.clap.dimension == 0 || self.models.clip.dimension == 0 {
            return Err(MenagerieError::config("embedding dimensions must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SAMPLE: &str = r#"
vectordb:
  url: http://qdrant:6333
  collection_audio: sounds
  collection_image: pictures
audio:
  directory: data/audio
  file_extension: .wav
image:
  directory: data/images
  file_extension: .png
local:
  path: data/audio
  metadata_audios: data/meta/esc50.csv
s3:
  bucket: animal-sounds
  path: esc50/audio
models:
  clap:
    url: http://inference:8080
    model: msclap-2023
    dimension: 1024
  clip:
    url: http://inference:8080
    model: openai/clip-vit-base-patch32
    dimension: 512
  caption_url: http://inference:8080
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.vectordb.url, "http://qdrant:6333");
        assert_eq!(config.vectordb.collection_audio, "sounds");
        assert_eq!(config.vectordb.collection_image, "pictures");
        assert_eq!(config.image.file_extension, ".png");
        assert_eq!(config.s3.bucket, "animal-sounds");
        assert_eq!(config.models.clap.dimension, 1024);
        assert_eq!(
            config.models.caption_url.as_deref(),
            Some("http://inference:8080")
        );
        assert_eq!(config.models.clip_backend, ClipBackend::Http);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_yaml_str("vectordb:\n  collection_audio: sounds\n").unwrap();
        assert_eq!(config.vectordb.url, "http://localhost:6333");
        assert_eq!(config.vectordb.collection_image, "images");
        assert_eq!(config.audio.file_extension, ".wav");
        assert_eq!(config.image.file_extension, ".jpg");
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_partial_sections_keep_per_type_defaults() {
        let yaml = "audio:\n  directory: /srv/sounds\n\
                    image:\n  file_extension: .png\n\
                    models:\n  clap:\n    url: http://gpu:9000\n  clip:\n    dimension: 768\n";
        let config = Config::from_yaml_str(yaml).unwrap();

        assert_eq!(config.audio.directory, PathBuf::from("/srv/sounds"));
        assert_eq!(config.audio.file_extension, ".wav");
        assert_eq!(config.image.directory, PathBuf::from("data/images"));
        assert_eq!(config.image.file_extension, ".png");

        assert_eq!(config.models.clap.url, "http://gpu:9000");
        assert_eq!(config.models.clap.model, "msclap-2023");
        assert_eq!(config.models.clap.dimension, 1024);
        assert_eq!(config.models.clip.model, "openai/clip-vit-base-patch32");
        assert_eq!(config.models.clip.dimension, 768);
    }

    #[test]
    fn test_rejects_identical_collections() {
        let yaml = "vectordb:\n  collection_audio: same\n  collection_image: same\n";
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, MenagerieError::Config(_)));
    }

    #[test]
    fn test_rejects_extension_without_dot() {
        let yaml = "audio:\n  directory: data/audio\n  file_extension: wav\n";
        assert!(Config::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.vectordb.collection_audio, "sounds");

        let resolved = Config::resolve(Some(file.path())).unwrap();
        assert_eq!(resolved, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, MenagerieError::Config(_)));
    }
}
