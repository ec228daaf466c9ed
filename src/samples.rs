//! Built-in sample tokens for demos and manual testing. The reset
//! operation deletes and recreates exactly this set.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::token::{Token, TokenStatus};

pub const SAMPLE_PLAIN: &str = "00000000-0000-0000-0000-000000000000";
pub const SAMPLE_STICKY: &str = "11111111-1111-1111-1111-111111111111";
pub const SAMPLE_MACHINE: &str = "22222222-2222-2222-2222-222222222222";
pub const SAMPLE_STICKY_MACHINE: &str = "33333333-3333-3333-3333-333333333333";
pub const SAMPLE_CONSUMED: &str = "44444444-4444-4444-4444-444444444444";
pub const SAMPLE_NOT_YET_VALID: &str = "55555555-5555-5555-5555-555555555555";

pub const SAMPLE_IDS: [&str; 6] = [
    SAMPLE_PLAIN,
    SAMPLE_STICKY,
    SAMPLE_MACHINE,
    SAMPLE_STICKY_MACHINE,
    SAMPLE_CONSUMED,
    SAMPLE_NOT_YET_VALID,
];

/// The default sample set: one of each interesting shape, all ringing
/// for one second.
pub fn sample_tokens(now: DateTime<Utc>) -> Vec<Token> {
    let base = |id: &str| Token {
        id: id.into(),
        duration_ms: 1000,
        not_before: None,
        not_after: None,
        sticky: false,
        skip_verification: false,
        status: TokenStatus::Unused,
        failed_count: 0,
        created_at: now,
        updated_at: now,
    };

    let mut sticky = base(SAMPLE_STICKY);
    sticky.sticky = true;

    let mut machine = base(SAMPLE_MACHINE);
    machine.skip_verification = true;

    let mut sticky_machine = base(SAMPLE_STICKY_MACHINE);
    sticky_machine.sticky = true;
    sticky_machine.skip_verification = true;

    let mut consumed = base(SAMPLE_CONSUMED);
    consumed.status = TokenStatus::Used;

    let mut not_yet_valid = base(SAMPLE_NOT_YET_VALID);
    not_yet_valid.not_before = Some(far_future());

    vec![
        base(SAMPLE_PLAIN),
        sticky,
        machine,
        sticky_machine,
        consumed,
        not_yet_valid,
    ]
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_set_matches_the_published_ids() {
        let now = Utc::now();
        let ids: Vec<String> = sample_tokens(now).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, SAMPLE_IDS.to_vec());
    }

    #[test]
    fn test_not_yet_valid_sample_is_blocked() {
        let now = Utc::now();
        let tokens = sample_tokens(now);
        let blocked = tokens
            .iter()
            .find(|t| t.id == SAMPLE_NOT_YET_VALID)
            .unwrap();
        assert!(!blocked.is_valid(now));
    }
}
