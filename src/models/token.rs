use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a ring token.
///
/// `Using` is always transient: once the bell command finishes, the
/// finalizer moves the token back to `Unused` (sticky) or on to `Used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenStatus {
    Unused,
    Using,
    Used,
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TokenStatus::Unused => "UNUSED",
            TokenStatus::Using => "USING",
            TokenStatus::Used => "USED",
        })
    }
}

/// The specific predicate that blocked a ring request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    BeforePeriod,
    AfterPeriod,
    AlreadyUsing,
    AlreadyUsed,
}

impl DenyReason {
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::BeforePeriod => "before_period",
            DenyReason::AfterPeriod => "after_period",
            DenyReason::AlreadyUsing => "already_using",
            DenyReason::AlreadyUsed => "already_used",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DenyReason::BeforePeriod => "this token is not valid yet",
            DenyReason::AfterPeriod => "this token has expired",
            DenyReason::AlreadyUsing => "this token is already ringing the bell",
            DenyReason::AlreadyUsed => "this token has already been used",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A single grant of permission to ring the bell.
///
/// The id is the external capability: a v4 UUID string, unguessable by
/// construction. Status mutations go exclusively through the store's
/// compare-and-swap, driven by the admission and completion paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub duration_ms: u64,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub sticky: bool,
    /// Machine callers may ring without presenting the admin key.
    /// Read by the web layer only; the core never consults it.
    pub skip_verification: bool,
    pub status: TokenStatus,
    pub failed_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    pub fn is_before_period(&self, now: DateTime<Utc>) -> bool {
        self.not_before.is_some_and(|nb| now < nb)
    }

    pub fn is_within_period(&self, now: DateTime<Utc>) -> bool {
        self.not_after.is_none_or(|na| now <= na)
    }

    pub fn is_unused(&self) -> bool {
        self.status == TokenStatus::Unused
    }

    pub fn is_using(&self) -> bool {
        self.status == TokenStatus::Using
    }

    pub fn is_used(&self) -> bool {
        self.status == TokenStatus::Used
    }

    /// Whether a ring request would be admitted right now.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_unused() && !self.is_before_period(now) && self.is_within_period(now)
    }

    /// The predicate that currently blocks this token, if any.
    /// `None` means a ring request would be admitted.
    pub fn deny_reason(&self, now: DateTime<Utc>) -> Option<DenyReason> {
        if self.is_before_period(now) {
            Some(DenyReason::BeforePeriod)
        } else if !self.is_within_period(now) {
            Some(DenyReason::AfterPeriod)
        } else if self.is_using() {
            Some(DenyReason::AlreadyUsing)
        } else if self.is_used() {
            Some(DenyReason::AlreadyUsed)
        } else {
            None
        }
    }
}
