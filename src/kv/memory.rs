//! In-memory [`KvStore`] for tests and examples.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{KvError, KvStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
    Bucket { tokens: f64, last_update: f64 },
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Mock KV store with real TTL semantics and an outage switch.
///
/// The single mutex makes every operation, including the token-bucket
/// read-modify-write, trivially atomic.
/// [`set_unavailable`](MemoryKv::set_unavailable) flips the store into a
/// failing state so degradation paths can be exercised.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with [`KvError::Unavailable`]
    /// until flipped back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.expired(now))
            .count()
    }

    /// Returns `true` when no live keys exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of `key`, if the key exists and carries one.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|e| !e.expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    fn check_available(&self) -> Result<(), KvError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable {
                message: "injected outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.check_available()?;
        let now = Instant::now();
        let entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.expired(now) => match &entry.value {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(KvError::DecodeFailed {
                    key: key.to_string(),
                    message: "wrong value kind".to_string(),
                }),
            },
            _ => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.check_available()?;
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.check_available()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, KvError> {
        self.check_available()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        max_len: i64,
        ttl: Duration,
    ) -> Result<(), KvError> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.expired(now) {
                    e.value = Value::List(Vec::new());
                }
            })
            .or_insert_with(|| Entry {
                value: Value::List(Vec::new()),
                expires_at: None,
            });

        let Value::List(list) = &mut entry.value else {
            return Err(KvError::DecodeFailed {
                key: key.to_string(),
                message: "wrong value kind".to_string(),
            });
        };

        list.push(value.to_string());
        let max_len = max_len.max(0) as usize;
        if list.len() > max_len {
            let drop = list.len() - max_len;
            list.drain(..drop);
        }
        entry.expires_at = Some(now + ttl);
        Ok(())
    }

    async fn list_tail(&self, key: &str, count: i64) -> Result<Vec<String>, KvError> {
        self.check_available()?;
        let now = Instant::now();
        let entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if !entry.expired(now) => match &entry.value {
                Value::List(list) => {
                    let count = count.max(0) as usize;
                    let start = list.len().saturating_sub(count);
                    Ok(list[start..].to_vec())
                }
                _ => Err(KvError::DecodeFailed {
                    key: key.to_string(),
                    message: "wrong value kind".to_string(),
                }),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn bucket_take(
        &self,
        key: &str,
        now_s: f64,
        rps: f64,
        burst: f64,
        idle_ttl: Duration,
    ) -> Result<bool, KvError> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let state = match entries.get(key) {
            Some(entry) if !entry.expired(now) => match &entry.value {
                Value::Bucket {
                    tokens,
                    last_update,
                } => Some((*tokens, *last_update)),
                _ => {
                    return Err(KvError::DecodeFailed {
                        key: key.to_string(),
                        message: "wrong value kind".to_string(),
                    });
                }
            },
            _ => None,
        };

        let tokens = match state {
            None => burst - 1.0,
            Some((tokens, last_update)) => {
                let elapsed = (now_s - last_update).max(0.0);
                (burst.min(tokens + elapsed * rps)) - 1.0
            }
        };

        if tokens < 0.0 {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bucket {
                    tokens,
                    last_update: now_s,
                },
                expires_at: Some(now + idle_ttl),
            },
        );
        Ok(true)
    }

    async fn ping(&self) -> Result<(), KvError> {
        self.check_available()
    }
}
