//! Model identifiers, modalities and the model/collection mapping.
//!
//! Every collection in the vector database holds vectors produced by exactly
//! one embedding model. [`CollectionRegistry`] keeps that mapping in both
//! directions so callers can go from a collection name to the model that must
//! embed queries for it, and from a model to the collection it writes into.

use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::VectorDbConfig;
use crate::error::{MenagerieError, Result};

/// Embedding model families used to build collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// Contrastive audio-text model.
    #[serde(rename = "CLAP")]
    Clap,
    /// Contrastive image-text model.
    #[serde(rename = "CLIP")]
    Clip,
}

impl Model {
    /// All known models, in collection creation order.
    pub const ALL: [Model; 2] = [Model::Clap, Model::Clip];

    /// Identifier used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Clap => "CLAP",
            Model::Clip => "CLIP",
        }
    }

    /// The non-text modality this model embeds.
    pub fn media_modality(&self) -> Modality {
        match self {
            Model::Clap => Modality::Audio,
            Model::Clip => Modality::Image,
        }
    }

    /// The other model, used to hop between collections in cross-modal search.
    pub fn counterpart(&self) -> Model {
        match self {
            Model::Clap => Model::Clip,
            Model::Clip => Model::Clap,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Model {
    type Err = MenagerieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CLAP" => Ok(Model::Clap),
            "CLIP" => Ok(Model::Clip),
            _ => Err(MenagerieError::unsupported_model(s)),
        }
    }
}

/// The kind of data being embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Bidirectional mapping between models and collection names.
#[derive(Debug, Clone)]
pub struct CollectionRegistry {
    collection_models: AHashMap<String, Model>,
    model_collections: AHashMap<Model, String>,
}

impl CollectionRegistry {
    /// Build a registry from `(model, collection)` pairs.
    ///
    /// Fails when a model or a collection name appears twice, since the
    /// mapping would no longer be invertible.
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Model, S)>,
        S: Into<String>,
    {
        let mut collection_models = AHashMap::new();
        let mut model_collections = AHashMap::new();

        for (model, collection) in pairs {
            let collection = collection.into();
            if collection.is_empty() {
                return Err(MenagerieError::config(format!(
                    "empty collection name for model {model}"
                )));
            }
            if collection_models.contains_key(&collection) {
                return Err(MenagerieError::config(format!(
                    "collection '{collection}' is mapped to more than one model"
                )));
            }
            if model_collections.contains_key(&model) {
                return Err(MenagerieError::config(format!(
                    "model {model} is mapped to more than one collection"
                )));
            }
            collection_models.insert(collection.clone(), model);
            model_collections.insert(model, collection);
        }

        Ok(Self {
            collection_models,
            model_collections,
        })
    }

    /// Registry for the audio and image collections named in the config.
    pub fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Self::new([
            (Model::Clap, config.collection_audio.clone()),
            (Model::Clip, config.collection_image.clone()),
        ])
    }

    /// The model whose vectors live in `collection`.
    pub fn model_for(&self, collection: &str) -> Result<Model> {
        self.collection_models
            .get(collection)
            .copied()
            .ok_or_else(|| {
                MenagerieError::not_found(format!(
                    "collection '{collection}' is not mapped to any model"
                ))
            })
    }

    /// The collection holding vectors produced by `model`.
    pub fn collection_for(&self, model: Model) -> Result<&str> {
        self.model_collections
            .get(&model)
            .map(String::as_str)
            .ok_or_else(|| MenagerieError::unsupported_model(model.as_str()))
    }

    /// Every mapped collection name, sorted.
    pub fn collections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collection_models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a user-supplied collection selector.
    ///
    /// Accepts a collection name, a model name (`clap`/`clip`) or a modality
    /// alias (`audio`/`image`).
    pub fn resolve(&self, selector: &str) -> Result<&str> {
        if let Some((name, _)) = self.collection_models.get_key_value(selector) {
            return Ok(name.as_str());
        }
        let model = match selector.to_ascii_lowercase().as_str() {
            "audio" | "audios" | "sound" => Model::Clap,
            "image" | "images" => Model::Clip,
            other => other.parse::<Model>().map_err(|_| {
                MenagerieError::not_found(format!("unknown collection '{selector}'"))
            })?,
        };
        self.collection_for(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CollectionRegistry {
        CollectionRegistry::new([(Model::Clap, "audios"), (Model::Clip, "images")]).unwrap()
    }

    #[test]
    fn test_model_round_trip_through_str() {
        assert_eq!("clap".parse::<Model>().unwrap(), Model::Clap);
        assert_eq!("CLIP".parse::<Model>().unwrap(), Model::Clip);
        assert!("bert".parse::<Model>().is_err());
        assert_eq!(Model::Clap.to_string(), "CLAP");
    }

    #[test]
    fn test_media_modality() {
        assert_eq!(Model::Clap.media_modality(), Modality::Audio);
        assert_eq!(Model::Clip.media_modality(), Modality::Image);
        assert_eq!(Model::Clap.counterpart(), Model::Clip);
    }

    #[test]
    fn test_registry_maps_both_directions() {
        let registry = registry();
        assert_eq!(registry.model_for("audios").unwrap(), Model::Clap);
        assert_eq!(registry.model_for("images").unwrap(), Model::Clip);
        assert_eq!(registry.collection_for(Model::Clap).unwrap(), "audios");
        assert_eq!(registry.collection_for(Model::Clip).unwrap(), "images");
        assert_eq!(registry.collections(), vec!["audios", "images"]);
    }

    #[test]
    fn test_registry_unknown_collection() {
        let err = registry().model_for("videos").unwrap_err();
        assert!(err.to_string().contains("videos"));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        assert!(CollectionRegistry::new([(Model::Clap, "same"), (Model::Clip, "same")]).is_err());
        assert!(CollectionRegistry::new([(Model::Clap, "a"), (Model::Clap, "b")]).is_err());
        assert!(CollectionRegistry::new([(Model::Clap, "")]).is_err());
    }

    #[test]
    fn test_registry_resolve_aliases() {
        let registry = registry();
        assert_eq!(registry.resolve("audios").unwrap(), "audios");
        assert_eq!(registry.resolve("audio").unwrap(), "audios");
        assert_eq!(registry.resolve("clip").unwrap(), "images");
        assert_eq!(registry.resolve("Image").unwrap(), "images");
        assert!(registry.resolve("videos").is_err());
    }

    #[test]
    fn test_registry_missing_model() {
        let registry = CollectionRegistry::new([(Model::Clap, "audios")]).unwrap();
        assert!(registry.collection_for(Model::Clip).is_err());
    }
}
