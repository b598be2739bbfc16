use std::collections::HashMap;

use async_trait::async_trait;

use super::client::VectorDb;
use super::error::VectorDbError;
use super::model::{ChunkPoint, ScoredChunk};

#[derive(Default)]
pub struct MockVectorDb {
    collections: std::sync::RwLock<HashMap<String, MockCollection>>,
}

#[derive(Default, Clone)]
struct MockCollection {
    dim: u64,
    points: Vec<StoredPoint>,
}

#[derive(Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    source: String,
    text: String,
}

impl MockVectorDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .ok()?
            .get(collection)
            .map(|c| c.points.len())
    }
}

#[async_trait]
impl VectorDb for MockVectorDb {
    async fn ensure_collection(&self, name: &str, dim: u64) -> Result<(), VectorDbError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| VectorDbError::CreateCollectionFailed {
                    collection: name.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        collections.entry(name.to_string()).or_insert(MockCollection {
            dim,
            points: Vec::new(),
        });

        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<ChunkPoint>) -> Result<(), VectorDbError> {
        let mut collections =
            self.collections
                .write()
                .map_err(|_| VectorDbError::UpsertFailed {
                    collection: collection.to_string(),
                    message: "lock poisoned".to_string(),
                })?;

        let coll =
            collections
                .get_mut(collection)
                .ok_or_else(|| VectorDbError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        for point in points {
            if point.vector.len() as u64 != coll.dim {
                return Err(VectorDbError::InvalidDimension {
                    expected: coll.dim as usize,
                    actual: point.vector.len(),
                });
            }

            coll.points.retain(|p| p.id != point.id);
            coll.points.push(StoredPoint {
                id: point.id,
                vector: point.vector,
                source: point.source,
                text: point.text,
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredChunk>, VectorDbError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message: "lock poisoned".to_string(),
            })?;

        let coll =
            collections
                .get(collection)
                .ok_or_else(|| VectorDbError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        let mut results: Vec<ScoredChunk> = coll
            .points
            .iter()
            .map(|p| ScoredChunk {
                id: p.id.clone(),
                score: cosine_similarity(&query, &p.vector),
                source: p.source.clone(),
                text: p.text.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results.truncate(top_k as usize);
        Ok(results)
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
