use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};

use super::error::VectorDbError;
use super::model::{ChunkPoint, ScoredChunk};

/// Minimal async interface used by the retrieval layer and startup checks.
#[async_trait]
pub trait VectorDb: Send + Sync {
    /// Makes sure a collection exists with the given dimension. Safe to
    /// call concurrently; losing the creation race still succeeds.
    async fn ensure_collection(&self, name: &str, dim: u64) -> Result<(), VectorDbError>;

    /// Upserts chunk points into a collection.
    async fn upsert(&self, collection: &str, points: Vec<ChunkPoint>) -> Result<(), VectorDbError>;

    /// Searches a collection by cosine similarity, best first.
    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredChunk>, VectorDbError>;

    /// Performs a basic liveness check.
    async fn health_check(&self) -> Result<(), VectorDbError>;
}

/// Qdrant-backed [`VectorDb`].
#[derive(Clone)]
pub struct QdrantDb {
    client: Arc<Qdrant>,
    url: String,
}

impl QdrantDb {
    /// Connects to `url` and round-trips a liveness check before handing
    /// the client out, so a bad endpoint fails at boot rather than on the
    /// first query.
    pub async fn connect(url: &str) -> Result<Self, VectorDbError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let db = Self {
            client: Arc::new(client),
            url: url.to_string(),
        };
        db.health_check().await?;
        Ok(db)
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VectorDb for QdrantDb {
    async fn ensure_collection(&self, name: &str, dim: u64) -> Result<(), VectorDbError> {
        // Create optimistically instead of probing first: on a cold boot
        // that is one round trip, and two racing creators both end up with
        // the collection in place. Only a creation failure is followed by
        // an existence probe to tell "already there" apart from a real
        // fault.
        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim, Distance::Cosine))
                    .on_disk_payload(true),
            )
            .await;

        let create_err = match created {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };

        match self.client.collection_exists(name).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: create_err.to_string(),
            }),
            Err(probe_err) => Err(VectorDbError::CreateCollectionFailed {
                collection: name.to_string(),
                message: format!("{create_err} (existence probe also failed: {probe_err})"),
            }),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<ChunkPoint>) -> Result<(), VectorDbError> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("source".to_string(), p.source.into());
                payload.insert("text".to_string(), p.text.into());

                PointStruct::new(p.id, p.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(true))
            .await
            .map_err(|e| VectorDbError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<ScoredChunk>, VectorDbError> {
        let search_builder =
            SearchPointsBuilder::new(collection, query, top_k).with_payload(true);

        let search_result = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        let results = search_result
            .result
            .into_iter()
            .filter_map(ScoredChunk::from_scored_point)
            .collect();

        Ok(results)
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        self.client
            .health_check()
            .await
            .map(drop)
            .map_err(|e| VectorDbError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }
}
