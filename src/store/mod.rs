pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::token::{Token, TokenStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token not found")]
    NotFound,

    #[error("token already exists")]
    AlreadyExists,

    #[error("token is in use")]
    InUse,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Abstraction over token persistence backends.
/// Implementations: `MemoryStore` (process-local), `RedisStore`.
///
/// `compare_and_swap` is the only mutation primitive the admission and
/// completion paths use. Both backends must give it identical semantics:
/// the record is replaced only if its stored status still equals
/// `expected`; otherwise nothing is written and `false` comes back.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Token>, StoreError>;

    /// Insert a new record. `AlreadyExists` if the id is taken.
    async fn create(&self, token: &Token) -> Result<(), StoreError>;

    /// Conditionally replace the record for `token.id`.
    async fn compare_and_swap(
        &self,
        token: &Token,
        expected: TokenStatus,
    ) -> Result<bool, StoreError>;

    /// Remove a record and return it. A record that is mid-ring is
    /// protected: deleting it would orphan the in-flight completion
    /// write, so the store answers `InUse` instead.
    async fn delete(&self, id: &str) -> Result<Token, StoreError>;

    async fn list(&self) -> Result<Vec<Token>, StoreError>;
}
