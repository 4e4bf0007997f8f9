//! Command line argument parsing for the menagerie CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::manager::DEFAULT_TOP;

/// Menagerie - search animal sounds and pictures by text, sound or image
#[derive(Parser, Debug, Clone)]
#[command(name = "menagerie")]
#[command(about = "Multimodal similarity search over audio, images and text")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct MenagerieArgs {
    /// Configuration file (defaults to $MENAGERIE_CONFIG, then ./config.yml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl MenagerieArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the audio and image collections
    #[command(name = "create-collections")]
    CreateCollections(CreateCollectionsArgs),

    /// Delete a collection
    #[command(name = "delete-collection")]
    DeleteCollection(DeleteCollectionArgs),

    /// List collections and their point counts
    Collections,

    /// Embed the media directories and upsert them
    Upsert(UpsertArgs),

    /// Search by text or by a media file path
    Search(SearchArgs),

    /// Download the dataset from the configured bucket
    Download(DownloadArgs),

    /// Run the JSON search API
    Serve(ServeArgs),
}

/// Which media collection a command applies to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

/// Arguments for creating collections
#[derive(Parser, Debug, Clone)]
pub struct CreateCollectionsArgs {
    /// Delete and recreate collections that already exist
    #[arg(long)]
    pub force: bool,
}

/// Arguments for deleting a collection
#[derive(Parser, Debug, Clone)]
pub struct DeleteCollectionArgs {
    /// Collection name, or `audio`/`image`
    #[arg(value_name = "COLLECTION")]
    pub collection: String,
}

/// Arguments for upserting media
#[derive(Parser, Debug, Clone)]
pub struct UpsertArgs {
    /// Only upsert this media type
    #[arg(long)]
    pub only: Option<MediaKind>,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Query text, or a path to an audio/image file
    #[arg(value_name = "VALUE")]
    pub value: String,

    /// Collection to search (name, `audio` or `image`); all when omitted
    #[arg(long)]
    pub collection: Option<String>,

    /// Maximum number of results per collection
    #[arg(short, long, default_value_t = DEFAULT_TOP)]
    pub top: usize,
}

/// Arguments for downloading the dataset
#[derive(Parser, Debug, Clone)]
pub struct DownloadArgs {
    /// Only download keys containing this category
    #[arg(long)]
    pub category: Option<String>,
}

/// Arguments for the search server
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
