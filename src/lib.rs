//! # Menagerie
//!
//! Multimodal retrieval over a vector database: audio, images and text are
//! embedded into shared vector spaces and searched across modalities.
//!
//! ## Features
//!
//! - CLAP (audio/text) and CLIP (image/text) embedders behind one trait
//! - Path-or-text dispatch: existing files are embedded as media
//! - Qdrant REST client plus an in-process store
//! - Captioned cross-modal search (sound to images, image to sounds)
//! - Dataset download, CLI and JSON search API

pub mod caption;
pub mod cli;
pub mod config;
pub mod data;
pub mod download;
pub mod embedding;
pub mod error;
pub mod manager;
pub mod model;
pub mod rag;
pub mod server;
pub mod vector;

#[cfg(test)]
pub(crate) mod test_support;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::data::{DataToUpsert, MediaSource};
    pub use crate::embedding::{EmbedInput, Embedder, EmbedderRegistry};
    pub use crate::error::{MenagerieError, Result};
    pub use crate::manager::{UpsertReport, VectorManager};
    pub use crate::model::{CollectionRegistry, Modality, Model};
    pub use crate::vector::{MemoryStore, QdrantStore, ScoredPoint, VectorStore};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
