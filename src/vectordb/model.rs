use qdrant_client::qdrant::ScoredPoint;
use qdrant_client::qdrant::point_id::PointIdOptions;

/// One chunk to be indexed: embedding plus provenance payload.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    /// Point identifier (UUID string).
    pub id: String,
    /// Embedding of the chunk text.
    pub vector: Vec<f32>,
    /// Origin document of the chunk.
    pub source: String,
    /// Chunk body.
    pub text: String,
}

impl ChunkPoint {
    /// Creates a point with a fresh UUID identifier.
    pub fn new(vector: Vec<f32>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            source: source.into(),
            text: text.into(),
        }
    }
}

/// One search hit: similarity score plus the stored payload.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Point identifier as stored.
    pub id: String,
    /// Cosine similarity in [0, 1], higher is more similar.
    pub score: f32,
    /// Origin document of the chunk.
    pub source: String,
    /// Chunk body.
    pub text: String,
}

impl ScoredChunk {
    /// Extracts a hit from a Qdrant scored point. Points without an id are
    /// dropped; missing payload fields decay to empty strings rather than
    /// failing the whole search.
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let id = match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Uuid(s)) => s,
            Some(PointIdOptions::Num(n)) => n.to_string(),
            None => return None,
        };

        let payload = point.payload;

        let source = payload
            .get("source")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let text = payload
            .get("text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default();

        Some(ScoredChunk {
            id,
            score: point.score,
            source,
            text,
        })
    }
}
