use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use crate::models::{OtpError, OtpRecord};

/// Short-lived storage for pending OTPs, keyed by phone number.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Stores a fresh record, replacing any pending one and resetting its TTL.
    async fn put(&self, phone_number: &str, record: OtpRecord, ttl: Duration) -> Result<(), OtpError>;

    async fn get(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError>;

    /// Atomically counts one verification attempt against a pending record
    /// and returns the record with the new count. Returns `None` without
    /// creating anything when no record is pending.
    async fn reserve_attempt(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError>;

    /// Deletes the record. Returns `false` if nothing was pending, which lets
    /// concurrent verifications agree on a single winner.
    async fn remove(&self, phone_number: &str) -> Result<bool, OtpError>;
}

// ==============================================================================
// REDIS
// ==============================================================================

// Increments only an existing hash, so a key that was deleted or expired
// is never recreated without its code and TTL.
const RESERVE_ATTEMPT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return false
end
local code = redis.call('HGET', KEYS[1], 'code')
if not code then
    return false
end
local attempts = redis.call('HINCRBY', KEYS[1], 'attempts', 1)
return {code, attempts}
"#;

pub struct RedisOtpStore {
    pool: Pool,
    reserve_script: Script,
}

fn storage_error(context: &str, err: impl std::fmt::Display) -> OtpError {
    OtpError::Storage(format!("{}: {}", context, err))
}

impl RedisOtpStore {
    pub async fn connect(redis_url: &str) -> Result<Self, OtpError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| storage_error("Failed to create Redis pool", e))?;

        let mut conn = pool.get().await.map_err(|e| storage_error("Failed to connect to Redis", e))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error("Redis PING failed", e))?;

        info!("Redis OTP store initialized successfully");
        Ok(Self { pool, reserve_script: Script::new(RESERVE_ATTEMPT_SCRIPT) })
    }

    async fn connection(&self) -> Result<Connection, OtpError> {
        self.pool.get().await.map_err(|e| storage_error("Failed to get Redis connection", e))
    }

    fn key(phone_number: &str) -> String {
        format!("otp:{}", phone_number)
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, phone_number: &str, record: OtpRecord, ttl: Duration) -> Result<(), OtpError> {
        let mut conn = self.connection().await?;
        let key = Self::key(phone_number);

        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL").arg(&key).ignore()
            .cmd("HSET").arg(&key)
                .arg("code").arg(&record.code)
                .arg("attempts").arg(record.attempts)
                .ignore()
            .cmd("EXPIRE").arg(&key).arg(ttl.as_secs().max(1)).ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error("Failed to store OTP", e))?;

        debug!("Stored OTP for {} with TTL {:?}", phone_number, ttl);
        Ok(())
    }

    async fn get(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = conn
            .hgetall(Self::key(phone_number))
            .await
            .map_err(|e| storage_error("Failed to read OTP", e))?;

        let Some(code) = fields.get("code") else {
            return Ok(None);
        };
        let attempts = fields
            .get("attempts")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        Ok(Some(OtpRecord { code: code.clone(), attempts }))
    }

    async fn reserve_attempt(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError> {
        let mut conn = self.connection().await?;
        let reserved: Option<(String, u32)> = self.reserve_script
            .key(Self::key(phone_number))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| storage_error("Failed to count OTP attempt", e))?;

        Ok(reserved.map(|(code, attempts)| OtpRecord { code, attempts }))
    }

    async fn remove(&self, phone_number: &str) -> Result<bool, OtpError> {
        let mut conn = self.connection().await?;
        let removed: u32 = conn
            .del(Self::key(phone_number))
            .await
            .map_err(|e| storage_error("Failed to delete OTP", e))?;
        Ok(removed > 0)
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Process-local store for development and tests. Expired entries are
/// treated as absent and pruned on access.
#[derive(Default)]
pub struct InMemoryOtpStore {
    entries: Mutex<HashMap<String, (OtpRecord, Instant)>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, (OtpRecord, Instant)>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        f(&mut entries)
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, phone_number: &str, record: OtpRecord, ttl: Duration) -> Result<(), OtpError> {
        self.with_entries(|entries| {
            entries.insert(phone_number.to_string(), (record, Instant::now() + ttl));
        });
        Ok(())
    }

    async fn get(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError> {
        Ok(self.with_entries(|entries| entries.get(phone_number).map(|(record, _)| record.clone())))
    }

    async fn reserve_attempt(&self, phone_number: &str) -> Result<Option<OtpRecord>, OtpError> {
        Ok(self.with_entries(|entries| {
            entries.get_mut(phone_number).map(|(record, _)| {
                record.attempts += 1;
                record.clone()
            })
        }))
    }

    async fn remove(&self, phone_number: &str) -> Result<bool, OtpError> {
        Ok(self.with_entries(|entries| entries.remove(phone_number).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_expire() {
        let store = InMemoryOtpStore::new();
        store.put("+15550001111", OtpRecord::fresh("123456"), Duration::from_millis(20)).await.unwrap();
        assert!(store.get("+15550001111").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("+15550001111").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_resets_attempts() {
        let store = InMemoryOtpStore::new();
        let ttl = Duration::from_secs(60);

        store.put("+15550001111", OtpRecord::fresh("123456"), ttl).await.unwrap();
        assert_eq!(store.reserve_attempt("+15550001111").await.unwrap().unwrap().attempts, 1);
        assert_eq!(store.reserve_attempt("+15550001111").await.unwrap().unwrap().attempts, 2);

        store.put("+15550001111", OtpRecord::fresh("654321"), ttl).await.unwrap();
        let record = store.get("+15550001111").await.unwrap().unwrap();
        assert_eq!(record, OtpRecord::fresh("654321"));
    }

    #[tokio::test]
    async fn test_remove_has_one_winner() {
        let store = InMemoryOtpStore::new();
        store.put("+15550001111", OtpRecord::fresh("123456"), Duration::from_secs(60)).await.unwrap();

        assert!(store.remove("+15550001111").await.unwrap());
        assert!(!store.remove("+15550001111").await.unwrap());
    }

    #[tokio::test]
    async fn test_reserve_attempt_never_recreates_missing_record() {
        let store = InMemoryOtpStore::new();
        assert!(store.reserve_attempt("+15550001111").await.unwrap().is_none());
        assert!(store.get("+15550001111").await.unwrap().is_none());

        store.put("+15550001111", OtpRecord::fresh("123456"), Duration::from_secs(60)).await.unwrap();
        let reserved = store.reserve_attempt("+15550001111").await.unwrap().unwrap();
        assert_eq!(reserved.code, "123456");
        assert_eq!(reserved.attempts, 1);

        // A guess that lands after the winning verification removed the code
        assert!(store.remove("+15550001111").await.unwrap());
        assert!(store.reserve_attempt("+15550001111").await.unwrap().is_none());
        assert!(store.get("+15550001111").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reserve_attempt_skips_expired_record() {
        let store = InMemoryOtpStore::new();
        store.put("+15550001111", OtpRecord::fresh("123456"), Duration::from_millis(20)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.reserve_attempt("+15550001111").await.unwrap().is_none());
        assert!(store.with_entries(|entries| entries.is_empty()));
    }
}
