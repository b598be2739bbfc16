//! Redis-backed [`KvStore`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::{KvError, KvStore};

/// Token-bucket take, executed server-side so the read-modify-write is
/// atomic per key. KEYS[1] = bucket key; ARGV = now_s, rps, burst,
/// idle_ttl_s. Returns 1 to admit, 0 to reject.
const BUCKET_TAKE_SCRIPT: &str = r#"
local tokens = tonumber(redis.call('HGET', KEYS[1], 'tokens'))
local last = tonumber(redis.call('HGET', KEYS[1], 'last_update'))
local now = tonumber(ARGV[1])
local rps = tonumber(ARGV[2])
local burst = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

if tokens == nil or last == nil then
    tokens = burst - 1
else
    local elapsed = now - last
    if elapsed < 0 then
        elapsed = 0
    end
    tokens = math.min(burst, tokens + elapsed * rps) - 1
end

if tokens < 0 then
    return 0
end

redis.call('HSET', KEYS[1], 'tokens', tokens, 'last_update', now)
redis.call('EXPIRE', KEYS[1], ttl)
return 1
"#;

/// Production KV store over a shared Redis connection manager.
///
/// `ConnectionManager` multiplexes one connection and reconnects on failure;
/// clones are cheap handles onto it.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    url: String,
    bucket_take: Script,
}

impl RedisKv {
    /// Connects to `url` and verifies the connection with a ping.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError::ConnectionFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| KvError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let kv = Self {
            conn,
            url: url.to_string(),
            bucket_take: Script::new(BUCKET_TAKE_SCRIPT),
        };
        kv.ping().await?;
        Ok(kv)
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn command_err(key: &str, e: redis::RedisError) -> KvError {
        KvError::CommandFailed {
            key: key.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| Self::command_err(key, e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| Self::command_err(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: u64 = conn.del(key).await.map_err(|e| Self::command_err(key, e))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, KvError> {
        let mut scan_conn = self.conn.clone();
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = {
            let mut iter = scan_conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| Self::command_err(prefix, e))?;

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let deleted: u64 = conn
            .del(&keys)
            .await
            .map_err(|e| Self::command_err(prefix, e))?;
        Ok(deleted)
    }

    async fn list_push(
        &self,
        key: &str,
        value: &str,
        max_len: i64,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let mut conn = self.conn.clone();

        // RPUSH + LTRIM + EXPIRE in one round trip; trim keeps the newest
        // max_len elements, expire slides the session window.
        redis::pipe()
            .rpush(key, value)
            .ignore()
            .ltrim(key, -(max_len as isize), -1)
            .ignore()
            .expire(key, ttl.as_secs().max(1) as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Self::command_err(key, e))
    }

    async fn list_tail(&self, key: &str, count: i64) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.lrange(key, -(count as isize), -1)
            .await
            .map_err(|e| Self::command_err(key, e))
    }

    async fn bucket_take(
        &self,
        key: &str,
        now_s: f64,
        rps: f64,
        burst: f64,
        idle_ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let admitted: i64 = self
            .bucket_take
            .key(key)
            .arg(now_s)
            .arg(rps)
            .arg(burst)
            .arg(idle_ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Self::command_err(key, e))?;
        Ok(admitted == 1)
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| KvError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }
}
