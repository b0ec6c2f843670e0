// src/billing/entitlement.rs

use chrono::{DateTime, Duration, Utc};

use crate::{error::AppError, models::user::User, store::Store};

/// Length of a grant when the caller does not say otherwise.
pub const DEFAULT_GRANT_DAYS: i64 = 120;

/// A grant is active when it has no expiry or the expiry is still ahead.
pub fn effective_is_pro(
    is_pro: bool,
    pro_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    is_pro && pro_expires_at.is_none_or(|exp| exp > now)
}

pub fn grant_expiry(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now + Duration::days(days)
}

/// Sets `is_pro` and resets the expiry to `now + days`.
///
/// Grants replace each other rather than stack, so repeating one is harmless.
/// Returns `None` when the user does not exist.
pub async fn grant_pro(
    store: &dyn Store,
    user_id: i64,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Option<User>, AppError> {
    let expires_at = grant_expiry(now, days);
    let user = store.set_pro(user_id, true, Some(expires_at)).await?;
    if user.is_some() {
        tracing::info!(user_id, %expires_at, "Pro granted");
    }
    Ok(user)
}

/// Manual revoke from the admin dashboard. The payment flow never calls this.
pub async fn revoke_pro(store: &dyn Store, user_id: i64) -> Result<Option<User>, AppError> {
    let user = store.set_pro(user_id, false, None).await?;
    if user.is_some() {
        tracing::info!(user_id, "Pro revoked");
    }
    Ok(user)
}

/// Persists `is_pro = false` for every grant that expired before `now`.
/// Runs as a side effect of bulk user reads; there is no scheduler.
pub async fn sweep_expired(store: &dyn Store, now: DateTime<Utc>) -> Result<u64, AppError> {
    let swept = store.expire_pro_grants(now).await?;
    if swept > 0 {
        tracing::info!(swept, "Expired Pro grants cleared");
    }
    Ok(swept)
}
