//! Vector index implementation using HNSW
//!
//! This module provides a wrapper around the hnsw_rs library for
//! approximate nearest neighbor search over cosine distance.

use crate::vector::{VectorError, VectorResult};
use hnsw_rs::prelude::*;

/// Cosine distance implementation for hnsw_rs
#[derive(Clone, Copy, Debug, Default)]
pub struct CosineDistance;

impl Distance<f32> for CosineDistance {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        let mut dot = 0.0;
        let mut norm_a = 0.0;
        let mut norm_b = 0.0;

        for (a, b) in va.iter().zip(vb.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        if norm_a <= 0.0 || norm_b <= 0.0 {
            return 1.0;
        }

        // Cosine distance = 1.0 - cosine similarity; hnsw_rs requires >= 0
        let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
        (1.0 - sim).max(0.0)
    }
}

/// Convert a cosine distance into a similarity score in [0, 1].
///
/// Matches the scale Neo4j reports for cosine vector indexes: `(1 + cos) / 2`.
pub fn cosine_score(distance: f32) -> f32 {
    ((2.0 - distance) / 2.0).clamp(0.0, 1.0)
}

/// Wrapper around HNSW index keyed by caller-chosen ids
pub struct VectorIndex {
    /// Number of dimensions
    dimensions: usize,
    /// Number of inserted vectors
    len: usize,
    /// The actual HNSW index
    hnsw: Hnsw<'static, f32, CosineDistance>,
}

// Implement Debug manually because Hnsw doesn't implement it
impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .field("len", &self.len)
            .finish()
    }
}

impl VectorIndex {
    /// Create a new vector index
    pub fn new(dimensions: usize) -> Self {
        // HNSW parameters
        let max_elements = 100_000;
        let m = 16;
        let ef_construction = 200;

        let hnsw = Hnsw::new(m, max_elements, 16, ef_construction, CosineDistance);

        Self {
            dimensions,
            len: 0,
            hnsw,
        }
    }

    /// Add a vector to the index
    pub fn add(&mut self, id: usize, vector: &Vec<f32>) -> VectorResult<()> {
        if vector.len() != self.dimensions {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        self.hnsw.insert((vector, id));
        self.len += 1;

        Ok(())
    }

    /// Search for nearest neighbors: `(id, cosine distance)`, closest first
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }

        let ef_search = (k * 2).max(32);
        let results = self.hnsw.search(query, k, ef_search);

        let mut neighbors: Vec<(usize, f32)> = results.into_iter().map(|res| (res.d_id, res.distance)).collect();
        neighbors.sort_by(|a, b| a.1.total_cmp(&b.1));
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Get dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
