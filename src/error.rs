//! Error types for the Menagerie library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`MenagerieError`] enum.
//!
//! # Examples
//!
//! ```
//! use menagerie::error::{MenagerieError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(MenagerieError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Menagerie operations.
#[derive(Error, Debug)]
pub enum MenagerieError {
    /// I/O errors (file operations, temp files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding model errors (unsupported modality, bad response, etc.)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Captioning model errors (service failure, unusable response)
    #[error("Caption error: {0}")]
    Caption(String),

    /// Vector database errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// A named resource (collection, model) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A caller-supplied value was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with MenagerieError.
pub type Result<T> = std::result::Result<T, MenagerieError>;

impl MenagerieError {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        MenagerieError::Config(msg.into())
    }

    /// Create a new embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        MenagerieError::Embedding(msg.into())
    }

    /// Create a new captioning error.
    pub fn caption<S: Into<String>>(msg: S) -> Self {
        MenagerieError::Caption(msg.into())
    }

    /// Create a new vector store error.
    pub fn vector_store<S: Into<String>>(msg: S) -> Self {
        MenagerieError::VectorStore(msg.into())
    }

    /// Create a new unsupported model error.
    pub fn unsupported_model<S: Into<String>>(model: S) -> Self {
        MenagerieError::Embedding(format!("Unsupported model type: {}", model.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        MenagerieError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        MenagerieError::InvalidArgument(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        MenagerieError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        MenagerieError::NotFound(msg.into())
    }
}
