//! Integration tests for the token lifecycle and bell serialization.
//!
//! Everything runs against the in-memory store with a scripted ringer and
//! a manual clock, so no Redis, hardware, or wall-clock waiting is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;

use bellgate::clock::{Clock, ManualClock};
use bellgate::errors::AppError;
use bellgate::models::token::{DenyReason, Token, TokenStatus};
use bellgate::ring::finalizer::Finalizer;
use bellgate::ring::runner::{RingOutcome, Ringer};
use bellgate::ring::{worker, BellService, TokenParams};
use bellgate::samples;
use bellgate::store::memory::MemoryStore;
use bellgate::store::TokenStore;

/// Ringer whose outcome is chosen by the test. `hold()` makes every ring
/// block until `release()` hands out a permit, which keeps tokens in
/// USING for as long as a test needs.
struct ScriptedRinger {
    outcome: Mutex<RingOutcome>,
    rang: Mutex<Vec<u64>>,
    holding: AtomicBool,
    permits: Semaphore,
}

impl ScriptedRinger {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(RingOutcome::Success),
            rang: Mutex::new(Vec::new()),
            holding: AtomicBool::new(false),
            permits: Semaphore::new(0),
        }
    }

    fn set_outcome(&self, outcome: RingOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    fn rang(&self) -> Vec<u64> {
        self.rang.lock().unwrap().clone()
    }
}

#[async_trait]
impl Ringer for ScriptedRinger {
    async fn ring(&self, duration_ms: u64) -> RingOutcome {
        if self.holding.load(Ordering::SeqCst) {
            self.permits.acquire().await.unwrap().forget();
        }
        self.rang.lock().unwrap().push(duration_ms);
        *self.outcome.lock().unwrap()
    }
}

struct TestBell {
    service: BellService,
    clock: Arc<ManualClock>,
    ringer: Arc<ScriptedRinger>,
}

fn bell() -> TestBell {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let ringer = Arc::new(ScriptedRinger::new());
    let queue = worker::spawn(
        ringer.clone(),
        Finalizer::new(
            store.clone() as Arc<dyn TokenStore>,
            clock.clone() as Arc<dyn Clock>,
        ),
    );
    let service = BellService::new(store, clock.clone(), queue);
    TestBell {
        service,
        clock,
        ringer,
    }
}

fn params(duration_ms: u64) -> TokenParams {
    TokenParams {
        duration_ms,
        ..TokenParams::default()
    }
}

/// Poll until the worker has finalized the token.
async fn wait_until_settled(service: &BellService, id: &str) -> Token {
    for _ in 0..400 {
        let token = service.get_token(id).await.unwrap();
        if !token.is_using() {
            return token;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("token {id} never left USING");
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get_roundtrip() {
        let bell = bell();
        let not_after = bell.clock.now() + chrono::Duration::days(7);
        let created = bell
            .service
            .create_token(TokenParams {
                duration_ms: 1500,
                not_before: None,
                not_after: Some(not_after),
                sticky: true,
                skip_verification: true,
            })
            .await
            .unwrap();

        let got = bell.service.get_token(&created.id).await.unwrap();
        assert_eq!(got.duration_ms, 1500);
        assert_eq!(got.not_before, None);
        assert_eq!(got.not_after, Some(not_after));
        assert!(got.sticky);
        assert!(got.skip_verification);
        assert_eq!(got.status, TokenStatus::Unused);
        assert_eq!(got.failed_count, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_zero_duration() {
        let bell = bell();
        let err = bell.service.create_token(params(0)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_window() {
        let bell = bell();
        let now = bell.clock.now();
        let err = bell
            .service
            .create_token(TokenParams {
                duration_ms: 1000,
                not_before: Some(now + chrono::Duration::hours(2)),
                not_after: Some(now + chrono::Duration::hours(1)),
                ..TokenParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_plain_token_is_consumed_by_one_successful_ring() {
        let bell = bell();
        let token = bell.service.create_token(params(1000)).await.unwrap();

        let claimed = bell.service.ring_token(&token.id).await.unwrap();
        assert_eq!(claimed.status, TokenStatus::Using);

        let settled = wait_until_settled(&bell.service, &token.id).await;
        assert_eq!(settled.status, TokenStatus::Used);
        assert_eq!(settled.failed_count, 0);
        assert_eq!(bell.ringer.rang(), vec![1000]);

        let err = bell.service.ring_token(&token.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::NotActivatable(DenyReason::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn test_sticky_token_survives_rings_and_accumulates_failures() {
        let bell = bell();
        let token = bell
            .service
            .create_token(TokenParams {
                duration_ms: 500,
                sticky: true,
                ..TokenParams::default()
            })
            .await
            .unwrap();

        bell.ringer.set_outcome(RingOutcome::Failure);
        for expected_failures in 1..=2u32 {
            bell.service.ring_token(&token.id).await.unwrap();
            let settled = wait_until_settled(&bell.service, &token.id).await;
            assert_eq!(settled.status, TokenStatus::Unused);
            assert_eq!(settled.failed_count, expected_failures);
        }

        // a later success keeps the tally: failed_count never goes down
        bell.ringer.set_outcome(RingOutcome::Success);
        bell.service.ring_token(&token.id).await.unwrap();
        let settled = wait_until_settled(&bell.service, &token.id).await;
        assert_eq!(settled.status, TokenStatus::Unused);
        assert_eq!(settled.failed_count, 2);
    }

    #[tokio::test]
    async fn test_timeout_reaches_terminal_state_with_failure_recorded() {
        let bell = bell();
        let token = bell.service.create_token(params(1000)).await.unwrap();

        bell.ringer.set_outcome(RingOutcome::Timeout);
        bell.service.ring_token(&token.id).await.unwrap();

        let settled = wait_until_settled(&bell.service, &token.id).await;
        assert_eq!(settled.status, TokenStatus::Used);
        assert_eq!(settled.failed_count, 1);
    }

    #[tokio::test]
    async fn test_ring_before_window_opens_is_denied() {
        let bell = bell();
        let token = bell
            .service
            .create_token(TokenParams {
                duration_ms: 1000,
                not_before: Some(bell.clock.now() + chrono::Duration::hours(1)),
                ..TokenParams::default()
            })
            .await
            .unwrap();

        let err = bell.service.ring_token(&token.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::NotActivatable(DenyReason::BeforePeriod)
        ));

        bell.clock.advance(chrono::Duration::hours(2));
        assert!(bell.service.ring_token(&token.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_token_is_denied_even_when_sticky() {
        let bell = bell();
        let token = bell
            .service
            .create_token(TokenParams {
                duration_ms: 1000,
                not_after: Some(bell.clock.now() + chrono::Duration::hours(1)),
                sticky: true,
                ..TokenParams::default()
            })
            .await
            .unwrap();

        bell.clock.advance(chrono::Duration::hours(2));
        let err = bell.service.ring_token(&token.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::NotActivatable(DenyReason::AfterPeriod)
        ));
    }

    #[tokio::test]
    async fn test_ring_unknown_token() {
        let bell = bell();
        let err = bell.service.ring_token("no-such-token").await.unwrap_err();
        assert!(matches!(err, AppError::UnknownToken));
    }

    #[tokio::test]
    async fn test_delete_is_not_idempotent() {
        let bell = bell();
        let token = bell.service.create_token(params(1000)).await.unwrap();

        bell.service.delete_token(&token.id).await.unwrap();
        let err = bell.service.delete_token(&token.id).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownToken));
    }

    #[tokio::test]
    async fn test_delete_while_ringing_is_rejected() {
        let bell = bell();
        let token = bell.service.create_token(params(1000)).await.unwrap();

        bell.ringer.hold();
        bell.service.ring_token(&token.id).await.unwrap();

        let err = bell.service.delete_token(&token.id).await.unwrap_err();
        assert!(matches!(err, AppError::TokenInUse));

        bell.ringer.release(1);
        wait_until_settled(&bell.service, &token.id).await;
        assert!(bell.service.delete_token(&token.id).await.is_ok());
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_racing_rings_admit_exactly_one_caller() {
        let bell = bell();
        let token = bell.service.create_token(params(1000)).await.unwrap();

        // keep the winner in USING until every loser has been answered
        bell.ringer.hold();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = bell.service.clone();
            let id = token.id.clone();
            handles.push(tokio::spawn(
                async move { service.ring_token(&id).await },
            ));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::AlreadyInProgress) => {}
                Err(other) => panic!("unexpected ring error: {other}"),
            }
        }
        assert_eq!(accepted, 1);

        bell.ringer.release(1);
        let settled = wait_until_settled(&bell.service, &token.id).await;
        assert_eq!(settled.status, TokenStatus::Used);
    }

    #[tokio::test]
    async fn test_rings_execute_in_admission_order() {
        let bell = bell();
        let mut ids = Vec::new();
        for duration in [101u64, 202, 303] {
            let token = bell.service.create_token(params(duration)).await.unwrap();
            ids.push(token.id);
        }

        // stall the bell so all three rings pile up in the queue
        bell.ringer.hold();
        for id in &ids {
            bell.service.ring_token(id).await.unwrap();
        }
        bell.ringer.release(3);

        for id in &ids {
            wait_until_settled(&bell.service, id).await;
        }
        assert_eq!(bell.ringer.rang(), vec![101, 202, 303]);
    }
}

mod sample_tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_recreates_the_sample_set() {
        let bell = bell();
        let created = bell.service.reset_sample_tokens().await.unwrap();
        let ids: Vec<&str> = created.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, samples::SAMPLE_IDS.to_vec());

        // consume the plain sample, then reset: it must come back fresh
        bell.service.ring_token(samples::SAMPLE_PLAIN).await.unwrap();
        let settled = wait_until_settled(&bell.service, samples::SAMPLE_PLAIN).await;
        assert_eq!(settled.status, TokenStatus::Used);

        bell.service.reset_sample_tokens().await.unwrap();
        let fresh = bell.service.get_token(samples::SAMPLE_PLAIN).await.unwrap();
        assert_eq!(fresh.status, TokenStatus::Unused);
        assert_eq!(fresh.failed_count, 0);
    }

    #[tokio::test]
    async fn test_not_yet_valid_sample_stays_blocked() {
        let bell = bell();
        bell.service.reset_sample_tokens().await.unwrap();

        let err = bell
            .service
            .ring_token(samples::SAMPLE_NOT_YET_VALID)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotActivatable(DenyReason::BeforePeriod)
        ));
    }

    #[tokio::test]
    async fn test_consumed_sample_reports_already_used() {
        let bell = bell();
        bell.service.reset_sample_tokens().await.unwrap();

        let err = bell
            .service
            .ring_token(samples::SAMPLE_CONSUMED)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotActivatable(DenyReason::AlreadyUsed)
        ));
    }
}
