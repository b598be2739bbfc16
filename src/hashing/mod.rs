//! Request fingerprinting.
//!
//! All cache addressing goes through [`cache_fingerprint`] so that every
//! input affecting an answer enters the digest exactly once.

/// Normalizes a question for fingerprinting: surrounding whitespace is
/// stripped and the text lowercased.
///
/// Session history is deliberately excluded from the fingerprint so cached
/// answers are shared across sessions.
#[inline]
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Computes the stable fingerprint of `(rag_id, question, top_k)`.
///
/// The digest is BLAKE3 over `rag_id + ":" + normalize(question) + ":" +
/// top_k`, truncated to 32 hex characters. 128 bits of the digest is ample
/// collision resistance for a per-RAG key space; a collision degrades to a
/// wrong cached answer for one TTL window, never to corruption.
pub fn cache_fingerprint(rag_id: &str, question: &str, top_k: u64) -> String {
    let material = format!("{rag_id}:{}:{top_k}", normalize_question(question));
    let hash = blake3::hash(material.as_bytes());
    let mut hex = hash.to_hex().to_string();
    hex.truncate(crate::constants::FINGERPRINT_HEX_LEN);
    hex
}

/// Builds the KV key of a cached response.
pub fn cache_key(rag_id: &str, fingerprint: &str) -> String {
    format!("{}{rag_id}:{fingerprint}", crate::constants::CACHE_KEY_PREFIX)
}

/// Builds the KV key of a session history list.
pub fn session_key(session_id: &str) -> String {
    format!("{}{session_id}", crate::constants::SESSION_KEY_PREFIX)
}

/// Builds the KV key of a token bucket for `(rag_id, client)`.
pub fn bucket_key(rag_id: &str, client: &str) -> String {
    format!(
        "{}{rag_id}:{client}",
        crate::constants::RATELIMIT_KEY_PREFIX
    )
}
