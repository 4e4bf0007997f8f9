//! Vector storage.
//!
//! # Module Structure
//!
//! - `core`: the vector type and distance metrics
//! - `point`: points, payloads and collection parameters
//! - `store`: the [`VectorStore`] trait
//! - `qdrant`: REST client for a Qdrant server
//! - `memory`: in-process store

pub mod core;
pub mod memory;
pub mod point;
pub mod qdrant;
pub mod store;

pub use self::core::distance::DistanceMetric;
pub use self::core::vector::Vector;
pub use self::memory::MemoryStore;
pub use self::point::{Payload, PointId, PointStruct, ScoredPoint, VectorParams};
pub use self::qdrant::QdrantStore;
pub use self::store::VectorStore;
