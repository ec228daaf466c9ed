use crate::clock::Clock;
use crate::errors::AppError;
use crate::models::token::{DenyReason, Token, TokenStatus};
use crate::store::TokenStore;

/// Claim a token for one ring: read, evaluate the validity window, then
/// flip UNUSED → USING with a single conditional write.
///
/// The compare-and-swap is what makes "at most one concurrent ring per
/// token" hold. Losing it means another caller won the race between our
/// read and our write; that surfaces as `AlreadyInProgress` with no
/// retry, same as finding the token already USING.
pub async fn admit(
    store: &dyn TokenStore,
    clock: &dyn Clock,
    id: &str,
) -> Result<Token, AppError> {
    let Some(token) = store.get(id).await? else {
        return Err(AppError::UnknownToken);
    };

    let now = clock.now();
    if let Some(reason) = token.deny_reason(now) {
        return Err(match reason {
            DenyReason::AlreadyUsing => AppError::AlreadyInProgress,
            blocked => AppError::NotActivatable(blocked),
        });
    }

    let mut claimed = token;
    claimed.status = TokenStatus::Using;
    claimed.updated_at = now;

    if store.compare_and_swap(&claimed, TokenStatus::Unused).await? {
        Ok(claimed)
    } else {
        Err(AppError::AlreadyInProgress)
    }
}
