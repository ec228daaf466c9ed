use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::models::token::TokenStatus;
use crate::ring::runner::RingOutcome;
use crate::store::{StoreError, TokenStore};

/// Attempts for the completion write before giving up.
const WRITE_ATTEMPTS: u32 = 5;
const BACKOFF_START: Duration = Duration::from_millis(100);

/// A token racking up this many failures points at a hardware problem.
const FAILURE_WARN_THRESHOLD: u32 = 3;

/// Writes the terminal state for a completed ring attempt:
/// USING → UNUSED for sticky tokens, USING → USED otherwise, with
/// `failed_count` bumped when the bell did not ring cleanly.
pub struct Finalizer {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl Finalizer {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply `outcome` to the token, moving it out of `Using`.
    ///
    /// The write is retried with backoff while the store is unreachable.
    /// A token must never stay `Using` because of a transient outage, so
    /// exhausting the retries is escalated as an error.
    pub async fn complete(&self, id: &str, outcome: RingOutcome) -> anyhow::Result<()> {
        let mut backoff = BACKOFF_START;
        let mut last_err = String::new();
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.try_complete(id, outcome).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Unavailable(err)) => {
                    tracing::warn!(token = id, attempt, "completion write failed: {}", err);
                    last_err = err;
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::error!(
            token = id,
            attempts = WRITE_ATTEMPTS,
            "completion write exhausted retries; token may be stuck in USING"
        );
        anyhow::bail!("completion write failed after {WRITE_ATTEMPTS} attempts: {last_err}")
    }

    async fn try_complete(&self, id: &str, outcome: RingOutcome) -> Result<(), StoreError> {
        let Some(mut token) = self.store.get(id).await? else {
            tracing::warn!(token = id, "token vanished before its completion write");
            return Ok(());
        };
        if !token.is_using() {
            tracing::warn!(token = id, status = ?token.status, "token left USING without us");
            return Ok(());
        }

        token.status = if token.sticky {
            TokenStatus::Unused
        } else {
            TokenStatus::Used
        };
        if !outcome.is_success() {
            token.failed_count += 1;
            if token.failed_count >= FAILURE_WARN_THRESHOLD {
                tracing::warn!(
                    token = id,
                    failed_count = token.failed_count,
                    "token keeps failing to ring"
                );
            }
        }
        token.updated_at = self.clock.now();

        if !self
            .store
            .compare_and_swap(&token, TokenStatus::Using)
            .await?
        {
            // only the finalizer writes a USING record, so this is a
            // concurrent reset or restore, not a lost race with admission
            tracing::warn!(token = id, "completion write lost to a concurrent status change");
        }
        Ok(())
    }
}
