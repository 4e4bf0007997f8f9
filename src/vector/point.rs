//! Points, payloads and collection parameters exchanged with a vector store.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::vector::DistanceMetric;

/// Arbitrary JSON metadata stored next to a vector.
pub type Payload = serde_json::Map<String, serde_json::Value>;

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Point identifier. The vector database accepts unsigned integers or UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(Uuid),
}

impl PointId {
    /// A fresh random identifier.
    pub fn random() -> Self {
        PointId::Uuid(Uuid::new_v4())
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<u64> for PointId {
    fn from(value: u64) -> Self {
        PointId::Num(value)
    }
}

impl From<Uuid> for PointId {
    fn from(value: Uuid) -> Self {
        PointId::Uuid(value)
    }
}

/// Vector parameters of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorParams {
    pub size: usize,
    pub distance: DistanceMetric,
}

impl VectorParams {
    pub fn new(size: usize, distance: DistanceMetric) -> Self {
        Self { size, distance }
    }

    /// Cosine-distance parameters, the default for every collection.
    pub fn cosine(size: usize) -> Self {
        Self::new(size, DistanceMetric::Cosine)
    }
}

/// A vector with its id and payload, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStruct {
    pub id: PointId,
    pub vector: Vec<f32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Payload,
}

impl PointStruct {
    pub fn new(id: impl Into<PointId>, vector: Vec<f32>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Payload,
}

impl ScoredPoint {
    /// Convenience accessor for a string payload field.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// The `filename` payload field most hits carry.
    pub fn filename(&self) -> Option<&str> {
        self.payload_str("filename")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_point_id_untagged_serde() {
        let id: PointId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, PointId::Num(42));

        let uuid = Uuid::new_v4();
        let id: PointId = serde_json::from_value(json!(uuid.to_string())).unwrap();
        assert_eq!(id, PointId::Uuid(uuid));
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_scored_point_payload_accessors() {
        let point: ScoredPoint = serde_json::from_value(json!({
            "id": 7,
            "score": 0.93,
            "payload": {"type": "sound", "filename": "1-100032-A-0.wav", "category": "dog"}
        }))
        .unwrap();

        assert_eq!(point.filename(), Some("1-100032-A-0.wav"));
        assert_eq!(point.payload_str("category"), Some("dog"));
        assert_eq!(point.payload_str("missing"), None);
    }

    #[test]
    fn test_scored_point_without_payload() {
        let point: ScoredPoint =
            serde_json::from_value(json!({"id": 1, "score": 0.5})).unwrap();
        assert!(point.payload.is_empty());

        let point: ScoredPoint =
            serde_json::from_value(json!({"id": 1, "score": 0.5, "payload": null})).unwrap();
        assert!(point.payload.is_empty());
    }
}
