//! Flat (exhaustive) nearest-neighbour index over squared Euclidean distance.
//!
//! Vectors are stored row-major in one contiguous buffer. A search scores
//! every row, so a query costs O(N·D); there is no approximation and results
//! are exact. Positions returned by [`FlatIndex::search`] are build-time row
//! numbers, which is what keeps the index aligned with its payload array.
//!
//! # On-disk format
//!
//! ```text
//! magic   4 bytes   b"EXFL"
//! version u32 LE    1
//! dims    u32 LE
//! count   u64 LE
//! data    count × dims × f32 LE
//! ```

use std::cmp::Ordering;

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"EXFL";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// One search hit: a build-time row number and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    /// Squared Euclidean distance.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    /// Build an index whose row `i` is `vectors[i]`.
    pub fn build(dims: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dims);
        index.data.reserve(dims * vectors.len());
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dims)?;
        let end = start.checked_add(self.dims)?;
        self.data.get(start..end)
    }

    /// Up to `k` nearest rows for `query`, ascending by distance.
    ///
    /// Ties are broken by row number so results are fully deterministic.
    /// Asking for more neighbours than there are rows returns every row.
    pub fn search_one(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        let by_distance = |a: &Neighbor, b: &Neighbor| -> Ordering {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_by(by_distance);
        Ok(scored)
    }

    /// Batched [`search_one`](Self::search_one): one result list per query row.
    pub fn search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<Neighbor>>> {
        queries.iter().map(|q| self.search_one(q, k)).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&vec_to_blob(&self.data));
        bytes
    }

    /// Decode an index written by [`to_bytes`](Self::to_bytes).
    ///
    /// Errors carry a human-readable reason; the caller attaches the path.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!("file is {} bytes, shorter than header", bytes.len()));
        }
        if &bytes[0..4] != MAGIC {
            return Err("bad magic, not an index file".to_string());
        }
        let version = read_u32(&bytes[4..8]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", version));
        }
        let dims = read_u32(&bytes[8..12]) as usize;
        let count = read_u64(&bytes[12..20]) as usize;

        let expected = count
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| "header sizes overflow".to_string())?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(format!(
                "expected {} data bytes for {} × {} vectors, found {}",
                expected,
                count,
                dims,
                body.len()
            ));
        }

        Ok(Self {
            dims,
            data: blob_to_vec(body),
        })
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 2.0],
            vec![3.0, 3.0],
        ]
    }

    #[test]
    fn test_search_sorted_ascending() {
        let index = FlatIndex::build(2, &sample()).unwrap();
        let hits = index.search_one(&[0.9, 0.1], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 0, 2]);
        assert!((hits[0].distance - 0.02).abs() < 1e-6);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_k_larger_than_index_returns_all() {
        let index = FlatIndex::build(2, &sample()).unwrap();
        let hits = index.search_one(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_self_query_is_nearest() {
        let vectors = sample();
        let index = FlatIndex::build(2, &vectors).unwrap();
        let results = index.search(&vectors, 1).unwrap();
        for (i, hits) in results.iter().enumerate() {
            assert_eq!(hits[0].position, i);
            assert_eq!(hits[0].distance, 0.0);
        }
    }

    #[test]
    fn test_vector_out_of_range_is_none() {
        let index = FlatIndex::build(2, &sample()).unwrap();
        assert_eq!(index.vector(3), Some(&[3.0, 3.0][..]));
        assert_eq!(index.vector(4), None);
        // start fits in usize but start + dims does not.
        assert_eq!(index.vector(usize::MAX / 2), None);
        assert_eq!(index.vector(usize::MAX), None);
    }

    #[test]
    fn test_ties_broken_by_position() {
        let index = FlatIndex::build(1, &[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let hits = index.search_one(&[0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = FlatIndex::new(3);
        assert!(index.search_one(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
        let index = FlatIndex::build(2, &sample()).unwrap();
        assert!(index.search_one(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatIndex::new(2);
        assert!(index.add(&[1.0, 2.0, 3.0]).is_err());
        index.add(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            index.search_one(&[1.0], 1),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let index = FlatIndex::build(2, &sample()).unwrap();
        let restored = FlatIndex::from_bytes(&index.to_bytes()).unwrap();
        assert_eq!(restored, index);
        assert_eq!(restored.vector(3), Some(&[3.0f32, 3.0][..]));
        assert_eq!(restored.vector(4), None);
    }

    #[test]
    fn test_from_bytes_rejects_truncated() {
        let bytes = FlatIndex::build(2, &sample()).unwrap().to_bytes();
        assert!(FlatIndex::from_bytes(&bytes[..bytes.len() - 4]).is_err());
        assert!(FlatIndex::from_bytes(&bytes[..10]).is_err());
        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(FlatIndex::from_bytes(&bad).is_err());
    }
}
