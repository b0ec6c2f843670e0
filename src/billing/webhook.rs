// src/billing/webhook.rs

//! Payment gateway event processing.
//!
//! `Received -> Authenticated | Rejected`, then the payment row is upserted,
//! then a Pro grant happens only for an approved transaction with a known
//! user. The upsert and the grant are separate writes.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    billing::{
        entitlement::grant_pro,
        signature::{user_id_from_reference, verify_event_checksum},
    },
    error::AppError,
    models::payment::{GatewayTransaction, NewPayment, Payment, STATUS_APPROVED},
    store::Store,
};

pub const CHECKSUM_HEADER: &str = "x-event-checksum";
pub const FALLBACK_CHECKSUM_HEADER: &str = "x-signature";

/// What a processed event did.
#[derive(Debug)]
pub struct WebhookOutcome {
    pub payment: Payment,
    pub pro_granted: bool,
}

/// Checksum from the primary header, else the fallback one.
pub fn checksum_from_headers(headers: &HeaderMap) -> Option<&str> {
    [CHECKSUM_HEADER, FALLBACK_CHECKSUM_HEADER]
        .into_iter()
        .find_map(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Pulls the transaction out of `data.transaction`, falling back to a
/// top-level `transaction`. Returns it with its id rendered as a string.
pub fn extract_transaction(payload: &Value) -> Result<(String, GatewayTransaction), AppError> {
    let tx = payload
        .pointer("/data/transaction")
        .filter(|v| v.is_object())
        .or_else(|| payload.get("transaction").filter(|v| v.is_object()))
        .ok_or(AppError::BadRequest("Missing transaction".to_string()))?;

    let tx: GatewayTransaction = serde_json::from_value(tx.clone())?;

    let id = match &tx.id {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(AppError::BadRequest("Missing transaction id".to_string())),
    };

    Ok((id, tx))
}

/// Authenticates and applies one gateway event.
///
/// Nothing is written unless the checksum matches. Redelivering the same
/// event leaves the same state behind.
pub async fn handle_event(
    store: &dyn Store,
    secret: &str,
    grant_days: i64,
    checksum: Option<&str>,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<WebhookOutcome, AppError> {
    let checksum = checksum
        .ok_or_else(|| AppError::InvalidSignature("missing checksum header".to_string()))?;
    if !verify_event_checksum(body, secret, checksum) {
        return Err(AppError::InvalidSignature("checksum mismatch".to_string()));
    }

    let payload: Value = serde_json::from_slice(body)?;
    let (transaction_id, tx) = extract_transaction(&payload)?;

    let user_id = match user_id_from_reference(&tx.reference) {
        Some(candidate) => store.find_user(candidate).await?.map(|u| u.id),
        None => None,
    };
    if user_id.is_none() {
        tracing::warn!(
            %transaction_id,
            reference = %tx.reference,
            "Payment reference does not resolve to a user"
        );
    }

    let payment = store
        .upsert_payment(NewPayment {
            transaction_id: transaction_id.clone(),
            reference: tx.reference,
            status: tx.status,
            amount_in_cents: tx.amount_in_cents,
            currency: tx.currency,
            payment_method: tx.payment_method_type,
            user_id,
            raw: payload,
        })
        .await?;

    tracing::info!(
        %transaction_id,
        status = %payment.status,
        user_id = ?payment.user_id,
        "Payment recorded"
    );

    let mut pro_granted = false;
    if payment.status == STATUS_APPROVED {
        if let Some(uid) = user_id {
            pro_granted = grant_pro(store, uid, grant_days, now).await?.is_some();
        }
    }

    Ok(WebhookOutcome {
        payment,
        pro_granted,
    })
}
