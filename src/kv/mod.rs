//! Shared key-value backend.
//!
//! One Redis database carries three concerns behind the [`KvStore`] seam:
//! cached responses (plain values with TTL), session histories (lists with a
//! sliding TTL), and token buckets (hashes mutated atomically). The trait is
//! the contract the pipeline components program against; [`RedisKv`] is the
//! production implementation and [`MemoryKv`] the mock.

pub mod error;
pub mod memory;
pub mod redis;

pub use error::KvError;
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryKv;
pub use self::redis::RedisKv;

use std::time::Duration;

use async_trait::async_trait;

/// Minimal async KV interface used by the cache, session, and admission
/// components.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value at `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Stores `value` at `key` with an absolute TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Deletes `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Deletes every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, KvError>;

    /// Appends `value` to the list at `key`, trims the list to its newest
    /// `max_len` elements, and resets the key's TTL (sliding window).
    async fn list_push(
        &self,
        key: &str,
        value: &str,
        max_len: i64,
        ttl: Duration,
    ) -> Result<(), KvError>;

    /// Returns the newest `count` elements of the list at `key`, oldest
    /// first.
    async fn list_tail(&self, key: &str, count: i64) -> Result<Vec<String>, KvError>;

    /// Atomically takes one token from the bucket at `key`.
    ///
    /// Bucket state is `{tokens, last_update}`. A missing bucket is
    /// initialized to `burst - 1` tokens and admits. Otherwise the bucket is
    /// refilled by `elapsed * rps` up to `burst` and one token is subtracted;
    /// a negative result rejects without writing back. The whole
    /// read-modify-write is serialized per key, so two concurrent takers can
    /// never both spend the last token.
    async fn bucket_take(
        &self,
        key: &str,
        now_s: f64,
        rps: f64,
        burst: f64,
        idle_ttl: Duration,
    ) -> Result<bool, KvError>;

    /// Round-trips the backend to verify liveness.
    async fn ping(&self) -> Result<(), KvError>;
}
