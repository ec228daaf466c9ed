pub mod admission;
pub mod finalizer;
pub mod runner;
pub mod worker;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::AppError;
use crate::models::token::{Token, TokenStatus};
use crate::samples;
use crate::store::{StoreError, TokenStore};
use self::worker::{RingJob, RingQueue};

/// Parameters for minting a new token.
#[derive(Debug, Clone, Default)]
pub struct TokenParams {
    pub duration_ms: u64,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sticky: bool,
    pub skip_verification: bool,
}

/// Facade over the token lifecycle: creation, lookup, admission to the
/// bell queue, deletion, and the sample reset. The HTTP handlers and the
/// CLI both go through this.
#[derive(Clone)]
pub struct BellService {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    queue: RingQueue,
}

impl BellService {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>, queue: RingQueue) -> Self {
        Self {
            store,
            clock,
            queue,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_token(&self, params: TokenParams) -> Result<Token, AppError> {
        if params.duration_ms == 0 {
            return Err(AppError::InvalidParameters(
                "duration_ms must be positive".into(),
            ));
        }
        if let (Some(not_before), Some(not_after)) = (params.not_before, params.not_after) {
            if not_before >= not_after {
                return Err(AppError::InvalidParameters(format!(
                    "expected not_before < not_after, got {not_before} >= {not_after}"
                )));
            }
        }

        let now = self.clock.now();
        let token = Token {
            id: Uuid::new_v4().to_string(),
            duration_ms: params.duration_ms,
            not_before: params.not_before,
            not_after: params.not_after,
            sticky: params.sticky,
            skip_verification: params.skip_verification,
            status: TokenStatus::Unused,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.create(&token).await?;
        tracing::info!(token = %token.id, duration_ms = token.duration_ms, "token created");
        Ok(token)
    }

    pub async fn get_token(&self, id: &str) -> Result<Token, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or(AppError::UnknownToken)
    }

    pub async fn list_tokens(&self) -> Result<Vec<Token>, AppError> {
        Ok(self.store.list().await?)
    }

    pub async fn list_token_ids(&self) -> Result<Vec<String>, AppError> {
        Ok(self.store.list().await?.into_iter().map(|t| t.id).collect())
    }

    /// Admit a ring request and queue it for the bell worker. Returns the
    /// claimed (now USING) record; the outcome is only observable through
    /// later `get_token` polls.
    pub async fn ring_token(&self, id: &str) -> Result<Token, AppError> {
        let claimed = admission::admit(self.store.as_ref(), self.clock.as_ref(), id).await?;

        let job = RingJob {
            token_id: claimed.id.clone(),
            duration_ms: claimed.duration_ms,
        };
        if self.queue.send(job).is_err() {
            // the worker is gone; undo the claim so the token is not
            // stranded in USING
            let mut restored = claimed.clone();
            restored.status = TokenStatus::Unused;
            restored.updated_at = self.clock.now();
            if let Err(err) = self
                .store
                .compare_and_swap(&restored, TokenStatus::Using)
                .await
            {
                tracing::error!(token = id, "failed to roll back orphaned claim: {}", err);
            }
            return Err(AppError::Internal(anyhow::anyhow!(
                "bell worker is not running"
            )));
        }

        tracing::info!(token = %claimed.id, duration_ms = claimed.duration_ms, "ring queued");
        Ok(claimed)
    }

    pub async fn delete_token(&self, id: &str) -> Result<Token, AppError> {
        let removed = self.store.delete(id).await?;
        tracing::info!(token = id, "token deleted");
        Ok(removed)
    }

    /// Delete and recreate the built-in sample set with default values.
    pub async fn reset_sample_tokens(&self) -> Result<Vec<Token>, AppError> {
        let now = self.clock.now();
        let mut created = Vec::with_capacity(samples::SAMPLE_IDS.len());
        for token in samples::sample_tokens(now) {
            match self.store.delete(&token.id).await {
                Ok(_) | Err(StoreError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
            self.store.create(&token).await?;
            created.push(token);
        }
        tracing::info!(count = created.len(), "sample tokens reset");
        Ok(created)
    }
}
