//! In-process vector store.
//!
//! Exhaustive search over every point of a collection. Used by the test suite
//! and for running the pipeline without a vector database server.

use std::cmp::Ordering;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{MenagerieError, Result};
use crate::vector::point::{PointId, PointStruct, ScoredPoint, VectorParams};
use crate::vector::store::VectorStore;

#[derive(Debug)]
struct MemoryCollection {
    params: VectorParams,
    /// Insertion order is kept so that ties rank deterministically.
    points: Vec<PointStruct>,
    positions: AHashMap<PointId, usize>,
}

impl MemoryCollection {
    fn new(params: VectorParams) -> Self {
        Self {
            params,
            points: Vec::new(),
            positions: AHashMap::new(),
        }
    }

    fn upsert(&mut self, point: PointStruct) {
        match self.positions.get(&point.id) {
            Some(&pos) => self.points[pos] = point,
            None => {
                self.positions.insert(point.id.clone(), self.points.len());
                self.points.push(point);
            }
        }
    }
}

/// Vector store keeping all collections in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<AHashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters `collection` was created with.
    pub fn params(&self, collection: &str) -> Option<VectorParams> {
        self.collections.read().get(collection).map(|c| c.params)
    }

    fn missing(collection: &str) -> MenagerieError {
        MenagerieError::vector_store(format!("collection '{collection}' does not exist"))
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, params: VectorParams) -> Result<()> {
        if params.size == 0 {
            return Err(MenagerieError::invalid_argument(
                "vector size must be greater than zero",
            ));
        }
        let mut collections = self.collections.write();
        if collections.contains_key(collection) {
            return Err(MenagerieError::vector_store(format!(
                "collection '{collection}' already exists"
            )));
        }
        collections.insert(collection.to_string(), MemoryCollection::new(params));
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().remove(collection);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> Result<()> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Self::missing(collection))?;

        // Validate the whole batch first so a bad point leaves nothing behind.
        for point in &points {
            if point.vector.len() != target.params.size {
                return Err(MenagerieError::vector_store(format!(
                    "wrong vector dimension for point {} in '{collection}': expected {}, got {}",
                    point.id,
                    target.params.size,
                    point.vector.len()
                )));
            }
        }
        for point in points {
            target.upsert(point);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;

        if vector.len() != target.params.size {
            return Err(MenagerieError::vector_store(format!(
                "wrong query dimension for '{collection}': expected {}, got {}",
                target.params.size,
                vector.len()
            )));
        }

        let metric = target.params.distance;
        let refs: Vec<&[f32]> = target.points.iter().map(|p| p.vector.as_slice()).collect();
        let scores = metric.batch_score_parallel(vector, &refs)?;

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            let ord = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
            let ord = if metric.higher_is_better() {
                ord.reverse()
            } else {
                ord
            };
            ord.then(a.0.cmp(&b.0))
        });
        ranked.truncate(limit);

        Ok(ranked
            .into_iter()
            .map(|(pos, score)| {
                let point = &target.points[pos];
                ScoredPoint {
                    id: point.id.clone(),
                    score,
                    payload: point.payload.clone(),
                }
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| Self::missing(collection))?;
        Ok(target.points.len() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
