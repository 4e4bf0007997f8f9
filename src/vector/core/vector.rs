//! Core vector data structure.

use serde::{Deserialize, Serialize};

use crate::error::{MenagerieError, Result};

/// A dense embedding produced by one of the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    /// The vector dimensions as floating point values.
    pub data: Vec<f32>,
}

impl Vector {
    /// Create a new vector with the given dimensions.
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimensionality of this vector.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Calculate the L2 norm (magnitude) of this vector.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize this vector to unit length.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.data {
                *value /= norm;
            }
        }
    }

    /// Get a normalized copy of this vector.
    pub fn normalized(&self) -> Self {
        let mut normalized = self.clone();
        normalized.normalize();
        normalized
    }

    /// Validate that this vector has the expected dimension.
    pub fn validate_dimension(&self, expected_dim: usize) -> Result<()> {
        if self.data.len() != expected_dim {
            return Err(MenagerieError::InvalidOperation(format!(
                "Vector dimension mismatch: expected {}, got {}",
                expected_dim,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Check if this vector contains any NaN or infinite values.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Consume the vector and return the raw values.
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_and_normalize() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        assert_eq!(v.norm(), 5.0);
        v.normalize();
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.data[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_normalize_is_noop() {
        let v = Vector::new(vec![0.0, 0.0, 0.0]).normalized();
        assert_eq!(v.data, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_validate_dimension() {
        let v = Vector::new(vec![1.0; 4]);
        assert!(v.validate_dimension(4).is_ok());
        assert!(v.validate_dimension(3).is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(Vector::new(vec![1.0, 2.0]).is_valid());
        assert!(!Vector::new(vec![1.0, f32::NAN]).is_valid());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let v = Vector::new(vec![0.5, 1.5]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[0.5,1.5]");
    }
}
