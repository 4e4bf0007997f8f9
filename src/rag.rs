//! Pipeline operations built on [`VectorManager`].
//!
//! These are the steps the CLI and the search server run: create the
//! collections, fill them from the media directories, search one collection
//! and hop across modalities through a caption.

use std::path::Path;

use serde::Serialize;

use crate::caption::Captioner;
use crate::data::{DataToUpsert, MediaSource};
use crate::error::Result;
use crate::manager::{UpsertReport, VectorManager};
use crate::model::Model;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::point::{ScoredPoint, VectorParams};

/// Create the collection of `model` with `model_dim` cosine vectors unless it
/// already exists. Returns whether it was created.
pub async fn create_collections(
    manager: &VectorManager,
    model: Model,
    model_dim: usize,
) -> Result<bool> {
    create_collections_with(manager, model, VectorParams::cosine(model_dim)).await
}

/// [`create_collections`] with an explicit distance metric.
pub async fn create_collections_with(
    manager: &VectorManager,
    model: Model,
    params: VectorParams,
) -> Result<bool> {
    let collection = manager.collections().collection_for(model)?;
    if manager.check_collection(collection).await? {
        log::info!("Collection {collection} already exists");
        return Ok(false);
    }
    manager.create_collection(collection, params).await?;
    Ok(true)
}

/// Ensure `collection` exists with `model_dim` cosine vectors, then upsert
/// `data` into it.
pub async fn upsert_full_data<I>(
    manager: &VectorManager,
    collection: &str,
    model_dim: usize,
    data: I,
) -> Result<UpsertReport>
where
    I: IntoIterator<Item = DataToUpsert>,
{
    upsert_full_data_with(manager, collection, VectorParams::cosine(model_dim), data).await
}

/// [`upsert_full_data`] creating a missing collection with `params`.
pub async fn upsert_full_data_with<I>(
    manager: &VectorManager,
    collection: &str,
    params: VectorParams,
    data: I,
) -> Result<UpsertReport>
where
    I: IntoIterator<Item = DataToUpsert>,
{
    if !manager.check_collection(collection).await? {
        manager.create_collection(collection, params).await?;
    }
    manager.upsert_vectors(collection, data).await
}

/// Run [`upsert_full_data`] for each source, using the dimension of the
/// source's model.
pub async fn upsert_embeddings(
    manager: &VectorManager,
    sources: &[MediaSource],
) -> Result<Vec<UpsertReport>> {
    upsert_embeddings_with(manager, sources, DistanceMetric::Cosine).await
}

/// [`upsert_embeddings`] creating missing collections with `distance`.
pub async fn upsert_embeddings_with(
    manager: &VectorManager,
    sources: &[MediaSource],
    distance: DistanceMetric,
) -> Result<Vec<UpsertReport>> {
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        let params = VectorParams::new(manager.embedders().dimension(source.model)?, distance);
        let data = source.data_to_upsert()?;
        log::info!(
            "Upserting {} file(s) from {} into {}",
            data.len(),
            source.directory.display(),
            source.collection
        );
        reports.push(upsert_full_data_with(manager, &source.collection, params, data).await?);
    }
    Ok(reports)
}

/// Search `collection` for the items closest to `value`.
pub async fn search_similar_items(
    manager: &VectorManager,
    collection: &str,
    value: &str,
    top: usize,
) -> Result<Vec<ScoredPoint>> {
    manager.search_vectors(collection, value, top).await
}

/// Results of searching with a media file.
#[derive(Debug, Clone, Serialize)]
pub struct CrossModalResults {
    /// Collection of the file's own modality.
    pub collection: String,
    pub results: Vec<ScoredPoint>,
    /// Present when a captioner was available.
    pub cross: Option<CaptionedResults>,
}

/// Hits from the other collection, found through a caption.
#[derive(Debug, Clone, Serialize)]
pub struct CaptionedResults {
    pub caption: String,
    pub collection: String,
    pub results: Vec<ScoredPoint>,
}

/// Search with the media file at `path`.
///
/// The file is first matched against the collection of `model`. With a
/// captioner, its caption is then embedded by the counterpart model and
/// matched against the other collection.
pub async fn cross_modal_search(
    manager: &VectorManager,
    captioner: Option<&dyn Captioner>,
    model: Model,
    path: &Path,
    top: usize,
) -> Result<CrossModalResults> {
    let value = path.to_string_lossy();
    let collection = manager.collections().collection_for(model)?.to_string();
    let results = manager.search_vectors(&collection, &value, top).await?;

    let cross = match captioner {
        Some(captioner) => {
            let caption = captioner.caption(model.media_modality(), path).await?;
            let other = manager
                .collections()
                .collection_for(model.counterpart())?
                .to_string();
            let results = manager.search_vectors(&other, &caption, top).await?;
            Some(CaptionedResults {
                caption,
                collection: other,
                results,
            })
        }
        None => None,
    };

    Ok(CrossModalResults {
        collection,
        results,
        cross,
    })
}
