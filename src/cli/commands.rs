//! Command implementations for the menagerie CLI.

use std::sync::Arc;

use crate::caption::{Captioner, HttpCaptioner};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::Config;
use crate::data::MediaSource;
use crate::download::S3Downloader;
use crate::embedding::registry::EmbedderRegistry;
use crate::error::Result;
use crate::manager::VectorManager;
use crate::model::{CollectionRegistry, Model};
use crate::rag;
use crate::server::{self, AppState};
use crate::vector::point::VectorParams;
use crate::vector::qdrant::QdrantStore;

/// Execute a CLI command.
pub async fn execute_command(args: MenagerieArgs) -> Result<()> {
    let config = Config::resolve(args.config.as_deref())?;

    match &args.command {
        Command::CreateCollections(create_args) => {
            let manager = build_manager(&config)?;
            create_collections(create_args, &manager, &config, &args).await
        }
        Command::DeleteCollection(delete_args) => {
            delete_collection(delete_args, &build_manager(&config)?, &args).await
        }
        Command::Collections => list_collections(&build_manager(&config)?, &args).await,
        Command::Upsert(upsert_args) => {
            let manager = build_manager(&config)?;
            upsert(upsert_args, &manager, &config, &args).await
        }
        Command::Search(search_args) => search(search_args, &build_manager(&config)?, &args).await,
        Command::Download(download_args) => download(download_args, &config, &args).await,
        Command::Serve(serve_args) => serve(serve_args, build_manager(&config)?, &config).await,
    }
}

/// Wire the store, embedders and collection mapping described by `config`.
pub fn build_manager(config: &Config) -> Result<VectorManager> {
    let store = QdrantStore::from_config(&config.vectordb)?;
    let embedders = EmbedderRegistry::from_config(&config.models)?;
    let collections = CollectionRegistry::from_config(&config.vectordb)?;
    Ok(VectorManager::new(Arc::new(store), embedders, collections))
}

async fn create_collections(
    args: &CreateCollectionsArgs,
    manager: &VectorManager,
    config: &Config,
    cli_args: &MenagerieArgs,
) -> Result<()> {
    let mut collections = Vec::new();
    for model in Model::ALL {
        let collection = manager.collections().collection_for(model)?.to_string();
        let dimension = manager.embedders().dimension(model)?;
        if args.force {
            manager.delete_collection(&collection).await?;
        }
        let params = VectorParams::new(dimension, config.vectordb.distance);
        let created = rag::create_collections_with(manager, model, params).await?;
        collections.push(CollectionCreation {
            collection,
            model,
            dimension,
            created,
        });
    }

    output_result(
        "Collections ready",
        &CollectionsCreated { collections },
        cli_args,
    )
}

async fn delete_collection(
    args: &DeleteCollectionArgs,
    manager: &VectorManager,
    cli_args: &MenagerieArgs,
) -> Result<()> {
    let collection = manager
        .collections()
        .resolve(&args.collection)
        .map(str::to_string)
        .unwrap_or_else(|_| args.collection.clone());
    manager.delete_collection(&collection).await?;

    output_result(
        "Collection deleted",
        &CollectionDeleted { collection },
        cli_args,
    )
}

async fn list_collections(manager: &VectorManager, cli_args: &MenagerieArgs) -> Result<()> {
    let mut collections = Vec::new();
    for name in manager.list_collections().await? {
        let points = manager.count(&name).await?;
        let model = manager.collections().model_for(&name).ok();
        collections.push(CollectionSummary {
            name,
            model,
            points,
        });
    }

    output_result("Collections", &CollectionList { collections }, cli_args)
}

async fn upsert(
    args: &UpsertArgs,
    manager: &VectorManager,
    config: &Config,
    cli_args: &MenagerieArgs,
) -> Result<()> {
    let sources: Vec<MediaSource> = MediaSource::from_config(config, manager.collections())?
        .into_iter()
        .filter(|source| match args.only {
            Some(MediaKind::Audio) => source.model == Model::Clap,
            Some(MediaKind::Image) => source.model == Model::Clip,
            None => true,
        })
        .collect();

    let reports = rag::upsert_embeddings_with(manager, &sources, config.vectordb.distance).await?;
    output_result("Upsert finished", &UpsertSummary { reports }, cli_args)
}

async fn search(
    args: &SearchArgs,
    manager: &VectorManager,
    cli_args: &MenagerieArgs,
) -> Result<()> {
    let collections: Vec<String> = match &args.collection {
        Some(selector) => vec![manager.collections().resolve(selector)?.to_string()],
        None => Model::ALL
            .into_iter()
            .map(|m| manager.collections().collection_for(m).map(str::to_string))
            .collect::<Result<_>>()?,
    };

    let mut results = Vec::with_capacity(collections.len());
    for collection in collections {
        let hits = rag::search_similar_items(manager, &collection, &args.value, args.top).await?;
        results.push(CollectionHits { collection, hits });
    }

    output_result(
        &format!("Search results for: {}", args.value),
        &SearchResults {
            value: args.value.clone(),
            results,
        },
        cli_args,
    )
}

async fn download(args: &DownloadArgs, config: &Config, cli_args: &MenagerieArgs) -> Result<()> {
    let downloader = S3Downloader::new(&config.s3, &config.local)?;
    let report = downloader
        .download_objects(args.category.as_deref())
        .await?;
    output_result("Download finished", &report, cli_args)
}

async fn serve(args: &ServeArgs, manager: VectorManager, config: &Config) -> Result<()> {
    let captioner: Option<Arc<dyn Captioner>> = match &config.models.caption_url {
        Some(url) => Some(Arc::new(HttpCaptioner::new(url)?)),
        None => {
            log::warn!("models.caption_url is not set; cross-modal search is disabled");
            None
        }
    };
    let state = AppState {
        manager,
        captioner,
        default_top: config.server.default_top,
    };

    let host = args.host.as_deref().unwrap_or(&config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    server::serve(state, host, port).await
}
