use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ring::finalizer::Finalizer;
use crate::ring::runner::Ringer;

/// One admitted ring request waiting its turn at the bell.
#[derive(Debug)]
pub struct RingJob {
    pub token_id: String,
    pub duration_ms: u64,
}

/// Handle the admission path uses to enqueue jobs.
pub type RingQueue = mpsc::UnboundedSender<RingJob>;

/// Spawn the bell worker. Call this once at startup.
///
/// The bell is one shared physical device, so there is exactly one worker:
/// jobs run strictly in enqueue order, one at a time, regardless of how
/// many tokens are concurrently USING. Each job rings and is then
/// finalized before the next job is taken.
pub fn spawn(ringer: Arc<dyn Ringer>, finalizer: Finalizer) -> RingQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<RingJob>();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            tracing::debug!(token = %job.token_id, duration_ms = job.duration_ms, "ringing bell");
            let outcome = ringer.ring(job.duration_ms).await;
            tracing::debug!(token = %job.token_id, ?outcome, "ring finished");
            if let Err(err) = finalizer.complete(&job.token_id, outcome).await {
                tracing::error!(token = %job.token_id, "ring completion failed: {:#}", err);
            }
        }
    });
    tx
}
