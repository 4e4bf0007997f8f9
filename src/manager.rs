//! Collection management, embedding and search over a [`VectorStore`].
//!
//! [`VectorManager`] ties the three pieces together: the store holding the
//! vectors, the embedder for each model and the mapping between models and
//! collection names. Callers only deal in collection names and raw values
//! (file paths or text); the manager picks the model for the collection and
//! the modality for the value.

use std::sync::Arc;

use serde::Serialize;

use crate::data::DataToUpsert;
use crate::embedding::registry::EmbedderRegistry;
use crate::error::Result;
use crate::model::{CollectionRegistry, Model};
use crate::vector::core::vector::Vector;
use crate::vector::point::{PointId, PointStruct, ScoredPoint, VectorParams};
use crate::vector::store::VectorStore;

/// Number of hits returned when the caller does not ask for a count.
pub const DEFAULT_TOP: usize = 5;

/// An item that could not be embedded or stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertFailure {
    pub value: String,
    pub error: String,
}

/// Outcome of [`VectorManager::upsert_vectors`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpsertReport {
    pub collection: String,
    pub upserted: usize,
    pub failures: Vec<UpsertFailure>,
}

impl UpsertReport {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Self::default()
        }
    }

    /// Items attempted.
    pub fn total(&self) -> usize {
        self.upserted + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Entry point for every vector database operation of the pipeline.
#[derive(Clone)]
pub struct VectorManager {
    store: Arc<dyn VectorStore>,
    embedders: EmbedderRegistry,
    collections: CollectionRegistry,
}

impl std::fmt::Debug for VectorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorManager")
            .field("store", &self.store.name())
            .field("embedders", &self.embedders)
            .field("collections", &self.collections.collections())
            .finish()
    }
}

impl VectorManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: EmbedderRegistry,
        collections: CollectionRegistry,
    ) -> Self {
        Self {
            store,
            embedders,
            collections,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedders(&self) -> &EmbedderRegistry {
        &self.embedders
    }

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    /// Drop `collection`. Missing collections are not an error.
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.store.delete_collection(collection).await?;
        log::info!("Deleted collection {collection}");
        Ok(())
    }

    pub async fn create_collection(&self, collection: &str, params: VectorParams) -> Result<()> {
        self.store.create_collection(collection, params).await?;
        log::info!(
            "Created collection {collection} ({} dims, {:?})",
            params.size,
            params.distance
        );
        Ok(())
    }

    /// Whether `collection` exists in the store.
    pub async fn check_collection(&self, collection: &str) -> Result<bool> {
        self.store.collection_exists(collection).await
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.store.list_collections().await
    }

    /// Number of points stored in `collection`.
    pub async fn count(&self, collection: &str) -> Result<u64> {
        self.store.count(collection).await
    }

    /// Embed `value` with `model`: media when it names an existing file,
    /// text otherwise.
    pub async fn compute_embeddings(&self, model: Model, value: &str) -> Result<Vector> {
        let (vector, modality) = self.embedders.compute_embedding(model, value).await?;
        log::info!("Computing {modality} embeddings for {value}");
        Ok(vector)
    }

    /// Embed `text` with `model` without path dispatch.
    pub async fn compute_text_embedding(&self, model: Model, text: &str) -> Result<Vector> {
        log::info!("Computing text embeddings for {text}");
        self.embedders.compute_text_embedding(model, text).await
    }

    /// Embed `data` and wrap it in a point with a fresh UUID.
    pub async fn create_point(&self, model: Model, data: &DataToUpsert) -> Result<PointStruct> {
        log::debug!("Creating embeddings for {}", data.value);
        let vector = self.compute_embeddings(model, &data.value).await?;
        Ok(PointStruct::new(
            PointId::random(),
            vector.into_inner(),
            data.payload.clone(),
        ))
    }

    /// Embed and store every item, one point per request.
    ///
    /// Fails up front when `collection` is not mapped to a model. After that
    /// an item that cannot be embedded or stored is logged and recorded in
    /// the report, and the remaining items are still processed.
    pub async fn upsert_vectors<I>(&self, collection: &str, data: I) -> Result<UpsertReport>
    where
        I: IntoIterator<Item = DataToUpsert>,
    {
        let model = self.collections.model_for(collection)?;
        let mut report = UpsertReport::new(collection);

        for item in data {
            match self.upsert_one(collection, model, &item).await {
                Ok(()) => {
                    report.upserted += 1;
                    log::info!("Upserted data to {collection}: {}", item.label());
                }
                Err(e) => {
                    log::warn!("Failed to upsert {} into {collection}: {e}", item.value);
                    report.failures.push(UpsertFailure {
                        value: item.value,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn upsert_one(&self, collection: &str, model: Model, item: &DataToUpsert) -> Result<()> {
        let point = self.create_point(model, item).await?;
        self.store.upsert(collection, vec![point]).await
    }

    /// Like [`search_vectors`](Self::search_vectors), but `text` is always
    /// embedded as text. Used for queries from remote callers, which must not
    /// reach the local filesystem.
    pub async fn search_text_vectors(
        &self,
        collection: &str,
        text: &str,
        top: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let model = self.collections.model_for(collection)?;
        let vector = self.compute_text_embedding(model, text).await?;
        self.store.search(collection, &vector.data, top).await
    }

    /// Nearest `top` points of `collection` to `value`, embedded with the
    /// collection's model.
    pub async fn search_vectors(
        &self,
        collection: &str,
        value: &str,
        top: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let model = self.collections.model_for(collection)?;
        let vector = self.compute_embeddings(model, value).await?;
        self.store.search(collection, &vector.data, top).await
    }
}
