//! Embedding models for audio, images and text.
//!
//! Each [`Model`](crate::model::Model) owns one [`Embedder`] that maps both
//! text and its media modality into a shared vector space. Inputs are
//! dispatched by [`resolve_input`]: a value that names an existing file is
//! embedded as media, anything else as text.
//!
//! # Feature Flags
//!
//! - `embeddings-candle` - local CLIP inference with HuggingFace Candle
//!
//! Without it, both models are served by an inference endpoint through
//! [`HttpEmbedder`].
//!
//! # Usage
//!
//! ```no_run
//! use menagerie::config::ModelsConfig;
//! use menagerie::embedding::EmbedderRegistry;
//! use menagerie::model::Model;
//!
//! # async fn example() -> menagerie::error::Result<()> {
//! let registry = EmbedderRegistry::from_config(&ModelsConfig::default())?;
//! let (vector, modality) = registry
//!     .compute_embedding(Model::Clap, "a dog barking")
//!     .await?;
//! println!("{modality}: {} dims", vector.dimension());
//! # Ok(())
//! # }
//! ```

pub mod embedder;
pub mod http_embedder;
pub mod registry;

#[cfg(feature = "embeddings-candle")]
pub mod candle_clip_embedder;

pub use embedder::{EmbedInput, Embedder};
pub use http_embedder::HttpEmbedder;
pub use registry::{EmbedderRegistry, resolve_input};

#[cfg(feature = "embeddings-candle")]
pub use candle_clip_embedder::CandleClipEmbedder;
