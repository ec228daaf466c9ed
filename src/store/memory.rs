use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{StoreError, TokenStore};
use crate::models::token::{Token, TokenStatus};

/// Volatile in-process backend. The dashmap shard lock makes each
/// per-record operation atomic, which is all the compare-and-swap
/// contract needs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, token: &Token) -> Result<(), StoreError> {
        match self.records.entry(token.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }

    async fn compare_and_swap(
        &self,
        token: &Token,
        expected: TokenStatus,
    ) -> Result<bool, StoreError> {
        match self.records.get_mut(&token.id) {
            Some(mut entry) => {
                if entry.status != expected {
                    return Ok(false);
                }
                *entry = token.clone();
                Ok(true)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete(&self, id: &str) -> Result<Token, StoreError> {
        if let Some((_, token)) = self.records.remove_if(id, |_, t| !t.is_using()) {
            return Ok(token);
        }
        if self.records.contains_key(id) {
            Err(StoreError::InUse)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn list(&self) -> Result<Vec<Token>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
