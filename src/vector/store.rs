//! Vector store trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::vector::point::{PointStruct, ScoredPoint, VectorParams};

/// Collection-level operations on a vector database.
///
/// Implementations are thin: indexing, ranking and persistence belong to the
/// database behind them. [`QdrantStore`](crate::vector::qdrant::QdrantStore)
/// talks to a running server, [`MemoryStore`](crate::vector::memory::MemoryStore)
/// keeps everything in process.
#[async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Whether `collection` exists.
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create `collection`. Fails if it already exists.
    async fn create_collection(&self, collection: &str, params: VectorParams) -> Result<()>;

    /// Delete `collection`. Deleting a missing collection is not an error.
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Insert or replace points by id.
    async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> Result<()>;

    /// The `limit` closest points to `vector`, best first.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Number of points stored in `collection`.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Name of this backend, for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}
