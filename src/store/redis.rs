use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{StoreError, TokenStore};
use crate::models::token::{Token, TokenStatus};

const KEY_PREFIX: &str = "token:";

/// Sentinel returned by the delete script for a mid-ring record. Records
/// themselves are JSON objects, so this can never collide with one.
const IN_USE_SENTINEL: &str = "#INUSE";

/// Durable backend over Redis. Records are stored as JSON under
/// `token:<id>`; the conditional writes run as Lua scripts so the
/// check-and-set is atomic on the server, exactly like the in-memory
/// backend's shard-locked swap.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn key(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    fn encode(token: &Token) -> Result<String, StoreError> {
        serde_json::to_string(token).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn decode(raw: &str) -> Result<Token, StoreError> {
        serde_json::from_str(raw)
            .map_err(|e| StoreError::Unavailable(format!("corrupt token record: {e}")))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Token>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(id)).await?;
        raw.as_deref().map(Self::decode).transpose()
    }

    async fn create(&self, token: &Token) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let stored: bool = conn.set_nx(Self::key(&token.id), Self::encode(token)?).await?;
        if stored {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists)
        }
    }

    async fn compare_and_swap(
        &self,
        token: &Token,
        expected: TokenStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // 1 = swapped, 0 = status moved underneath us, -1 = record gone
        let script = redis::Script::new(
            r#"
            local raw = redis.call("GET", KEYS[1])
            if not raw then return -1 end
            if cjson.decode(raw)["status"] ~= ARGV[1] then return 0 end
            redis.call("SET", KEYS[1], ARGV[2])
            return 1
        "#,
        );
        let verdict: i64 = script
            .key(Self::key(&token.id))
            .arg(expected.to_string())
            .arg(Self::encode(token)?)
            .invoke_async(&mut conn)
            .await?;
        match verdict {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &str) -> Result<Token, StoreError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(&format!(
            r#"
            local raw = redis.call("GET", KEYS[1])
            if not raw then return nil end
            if cjson.decode(raw)["status"] == "USING" then return "{IN_USE_SENTINEL}" end
            redis.call("DEL", KEYS[1])
            return raw
        "#
        ));
        let removed: Option<String> = script
            .key(Self::key(id))
            .invoke_async(&mut conn)
            .await?;
        match removed.as_deref() {
            None => Err(StoreError::NotFound),
            Some(IN_USE_SENTINEL) => Err(StoreError::InUse),
            Some(raw) => Self::decode(raw),
        }
    }

    async fn list(&self) -> Result<Vec<Token>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{KEY_PREFIX}*")).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let raws: Vec<Option<String>> = conn.mget(&keys).await?;
        // a key expiring between KEYS and MGET leaves a hole; skip it
        raws.iter()
            .flatten()
            .map(|raw| Self::decode(raw))
            .collect()
    }
}
