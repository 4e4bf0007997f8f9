//! Media files to upsert and the payloads stored with them.
//!
//! A [`MediaSource`] names a directory, the file extension to pick up, the
//! model that embeds those files and a [`PayloadGenerator`] building the
//! metadata stored next to each vector.
//!
//! Audio payloads carry the sound category looked up in a CSV sheet with
//! `filename` and `category` columns (the ESC-50 `esc50.csv` layout):
//!
//! ```csv
//! filename,fold,target,category,esc10,src_file,take
//! 1-100032-A-0.wav,1,0,dog,True,100032,A
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use csv::ReaderBuilder;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{Config, MediaConfig};
use crate::error::{MenagerieError, Result};
use crate::model::{CollectionRegistry, Model};
use crate::vector::point::Payload;

/// Category recorded for files missing from the metadata sheet.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// One item to embed and store.
#[derive(Debug, Clone, PartialEq)]
pub struct DataToUpsert {
    /// Filesystem path, or free text, handed to the embedder.
    pub value: String,
    pub payload: Payload,
}

impl DataToUpsert {
    pub fn new(value: impl Into<String>, payload: Payload) -> Self {
        Self {
            value: value.into(),
            payload,
        }
    }

    /// The `filename` payload entry, falling back to the value itself.
    pub fn label(&self) -> &str {
        self.payload
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or(&self.value)
    }
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    filename: String,
    category: String,
}

/// Audio file name to category lookup.
#[derive(Debug, Clone, Default)]
pub struct AudioMetadata {
    categories: AHashMap<String, String>,
}

impl AudioMetadata {
    /// Read a metadata CSV. Extra columns are ignored.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                MenagerieError::config(format!(
                    "cannot read audio metadata {}: {e}",
                    path.display()
                ))
            })?;
        Self::from_reader(reader)
    }

    /// Parse metadata from CSV text.
    pub fn from_csv_str(csv: &str) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(csv.as_bytes());
        Self::from_reader(reader)
    }

    /// Load `path` when it exists, otherwise return an empty lookup so every
    /// file is labelled [`UNKNOWN_CATEGORY`].
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!(
                "Audio metadata {} not found; categories will be '{UNKNOWN_CATEGORY}'",
                path.display()
            );
            Ok(Self::default())
        }
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut categories = AHashMap::new();
        for row in reader.deserialize::<MetadataRow>() {
            let row = row?;
            // First occurrence wins.
            categories.entry(row.filename).or_insert(row.category);
        }
        Ok(Self { categories })
    }

    /// Category of `filename`, or [`UNKNOWN_CATEGORY`].
    pub fn category_for(&self, filename: &str) -> &str {
        self.categories
            .get(filename)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Builds the payload stored with a file.
pub trait PayloadGenerator: Send + Sync + std::fmt::Debug {
    fn payload(&self, filename: &str) -> Payload;
}

/// `{"type": "sound", "filename", "category"}`.
#[derive(Debug, Clone, Default)]
pub struct AudioPayloadGenerator {
    metadata: AudioMetadata,
}

impl AudioPayloadGenerator {
    pub fn new(metadata: AudioMetadata) -> Self {
        Self { metadata }
    }
}

impl PayloadGenerator for AudioPayloadGenerator {
    fn payload(&self, filename: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("type".into(), Value::from("sound"));
        payload.insert("filename".into(), Value::from(filename));
        payload.insert(
            "category".into(),
            Value::from(self.metadata.category_for(filename)),
        );
        payload
    }
}

/// `{"type": "image", "filename"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePayloadGenerator;

impl PayloadGenerator for ImagePayloadGenerator {
    fn payload(&self, filename: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("type".into(), Value::from("image"));
        payload.insert("filename".into(), Value::from(filename));
        payload
    }
}

/// Every file of `directory` whose name ends with `file_extension`, sorted by
/// name, with `value` set to the joined path.
pub fn create_data_to_upsert(
    directory: &Path,
    file_extension: &str,
    generator: &dyn PayloadGenerator,
) -> Result<Vec<DataToUpsert>> {
    let entries = std::fs::read_dir(directory).map_err(|e| {
        MenagerieError::other(format!(
            "cannot list media directory {}: {e}",
            directory.display()
        ))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(file_extension) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|file| {
            let value = directory.join(&file).to_string_lossy().into_owned();
            DataToUpsert::new(value, generator.payload(&file))
        })
        .collect())
}

/// A directory of media bound to the collection it is upserted into.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub collection: String,
    pub model: Model,
    pub directory: PathBuf,
    pub file_extension: String,
    pub generator: Arc<dyn PayloadGenerator>,
}

impl MediaSource {
    pub fn new(
        collection: impl Into<String>,
        model: Model,
        media: &MediaConfig,
        generator: Arc<dyn PayloadGenerator>,
    ) -> Self {
        Self {
            collection: collection.into(),
            model,
            directory: media.directory.clone(),
            file_extension: media.file_extension.clone(),
            generator,
        }
    }

    /// The audio and image sources described by `config`.
    pub fn from_config(config: &Config, registry: &CollectionRegistry) -> Result<Vec<Self>> {
        let metadata = AudioMetadata::load_or_empty(&config.local.metadata_audios)?;
        Ok(vec![
            Self::new(
                registry.collection_for(Model::Clap)?,
                Model::Clap,
                &config.audio,
                Arc::new(AudioPayloadGenerator::new(metadata)),
            ),
            Self::new(
                registry.collection_for(Model::Clip)?,
                Model::Clip,
                &config.image,
                Arc::new(ImagePayloadGenerator),
            ),
        ])
    }

    /// List the files of this source.
    pub fn data_to_upsert(&self) -> Result<Vec<DataToUpsert>> {
        create_data_to_upsert(&self.directory, &self.file_extension, self.generator.as_ref())
    }
}
