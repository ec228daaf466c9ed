use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Outcome of one physical ring attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingOutcome {
    Success,
    Failure,
    Timeout,
}

impl RingOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, RingOutcome::Success)
    }
}

/// Abstraction over the physical bell. Production shells out to an
/// external command; tests substitute a scripted implementation.
#[async_trait]
pub trait Ringer: Send + Sync {
    async fn ring(&self, duration_ms: u64) -> RingOutcome;
}

/// Runs `<command> <duration_ms>` and classifies the result. The command
/// is expected to hold the relay closed for roughly the requested
/// duration, so the deadline is that duration plus a grace margin.
pub struct CommandRinger {
    command: String,
    grace: Duration,
}

impl CommandRinger {
    pub fn new(command: impl Into<String>, grace_ms: u64) -> Self {
        Self {
            command: command.into(),
            grace: Duration::from_millis(grace_ms),
        }
    }
}

#[async_trait]
impl Ringer for CommandRinger {
    async fn ring(&self, duration_ms: u64) -> RingOutcome {
        let deadline = Duration::from_millis(duration_ms) + self.grace;
        let status = Command::new(&self.command)
            .arg(duration_ms.to_string())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(deadline, status).await {
            Ok(Ok(exit)) if exit.success() => RingOutcome::Success,
            Ok(Ok(exit)) => {
                tracing::warn!(command = %self.command, code = ?exit.code(), "ring command exited nonzero");
                RingOutcome::Failure
            }
            Ok(Err(err)) => {
                tracing::warn!(command = %self.command, "ring command could not run: {}", err);
                RingOutcome::Failure
            }
            Err(_) => {
                tracing::warn!(
                    command = %self.command,
                    duration_ms,
                    grace_ms = self.grace.as_millis() as u64,
                    "ring command timed out"
                );
                RingOutcome::Timeout
            }
        }
    }
}
