//! Unified embedder trait.
//!
//! Every model family implements [`Embedder`]. A CLAP embedder accepts text
//! and audio, a CLIP embedder accepts text and images; both put text into the
//! same space as their media so a text query can retrieve audio or images.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use menagerie::embedding::embedder::{Embedder, EmbedInput};
//! use menagerie::error::{MenagerieError, Result};
//! use menagerie::model::Modality;
//! use menagerie::vector::Vector;
//!
//! #[derive(Debug)]
//! struct ConstantEmbedder;
//!
//! #[async_trait]
//! impl Embedder for ConstantEmbedder {
//!     async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
//!         match input {
//!             EmbedInput::Text(_) => Ok(Vector::new(vec![1.0, 0.0])),
//!             _ => Err(MenagerieError::embedding("text only")),
//!         }
//!     }
//!
//!     fn supported_modalities(&self) -> Vec<Modality> {
//!         vec![Modality::Text]
//!     }
//!
//!     fn dimension(&self) -> usize {
//!         2
//!     }
//! }
//! ```

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{MenagerieError, Result};
use crate::model::Modality;
use crate::vector::core::vector::Vector;

/// Input to an embedding model.
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    /// Free text.
    Text(&'a str),
    /// Path to an audio file.
    AudioPath(&'a Path),
    /// Path to an image file.
    ImagePath(&'a Path),
}

impl<'a> EmbedInput<'a> {
    /// Get the modality of this input.
    pub fn modality(&self) -> Modality {
        match self {
            EmbedInput::Text(_) => Modality::Text,
            EmbedInput::AudioPath(_) => Modality::Audio,
            EmbedInput::ImagePath(_) => Modality::Image,
        }
    }

    /// Get the text content if this is a text input.
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            EmbedInput::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the file path if this is a media input.
    pub fn as_path(&self) -> Option<&'a Path> {
        match self {
            EmbedInput::AudioPath(path) | EmbedInput::ImagePath(path) => Some(path),
            EmbedInput::Text(_) => None,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            EmbedInput::Text(text) => (*text).to_string(),
            EmbedInput::AudioPath(path) | EmbedInput::ImagePath(path) => {
                path.display().to_string()
            }
        }
    }
}

/// Embedding model interface.
///
/// Implementations must be `Send + Sync`; a single instance is shared by the
/// CLI pipeline and every request handler of the search server.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Generate an embedding vector for the given input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input modality is not supported or the model
    /// call fails.
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector>;

    /// Generate embeddings for multiple inputs.
    ///
    /// The default implementation calls `embed` sequentially.
    async fn embed_batch(&self, inputs: &[EmbedInput<'_>]) -> Result<Vec<Vector>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.embed(input).await?);
        }
        Ok(results)
    }

    /// Modalities this embedder accepts.
    fn supported_modalities(&self) -> Vec<Modality>;

    /// Check if this embedder supports the given modality.
    fn supports(&self, modality: Modality) -> bool {
        self.supported_modalities().contains(&modality)
    }

    /// Dimension of the produced vectors.
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this embedder, for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Error for an input the embedder cannot handle.
pub fn unsupported_input(embedder: &str, input: &EmbedInput<'_>) -> MenagerieError {
    MenagerieError::embedding(format!(
        "{embedder} does not support {} input",
        input.modality()
    ))
}
