// src/models/payment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Gateway status that activates a Pro grant.
pub const STATUS_APPROVED: &str = "APPROVED";

/// Represents the 'payments' table: one row per gateway transaction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,

    /// External gateway id, unique.
    pub transaction_id: String,

    /// `PRO-<userId>-<timestamp>`.
    pub reference: String,

    /// Free-form gateway status, stored verbatim.
    pub status: String,

    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,

    /// Resolved from `reference`; `None` when no such user exists.
    pub user_id: Option<i64>,

    /// Whole event payload as delivered by the gateway.
    pub raw: Json<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert input, keyed on `transaction_id`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub transaction_id: String,
    pub reference: String,
    pub status: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub user_id: Option<i64>,
    pub raw: serde_json::Value,
}

/// Transaction object nested in a gateway event.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTransaction {
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount_in_cents: i64,
    #[serde(default)]
    pub currency: String,
    pub payment_method_type: Option<String>,
}

/// DTO for the integrity-signature endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct SignatureRequest {
    #[validate(length(min = 1, max = 100))]
    pub reference: String,
    #[validate(range(min = 1))]
    pub amount_in_cents: i64,
    #[validate(custom(function = validate_currency))]
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct SignatureResponse {
    pub signature: String,
}

/// DTO returned to start a Pro checkout on the gateway widget.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub signature: String,
    pub public_key: String,
    pub redirect_url: String,
}

/// DTO acknowledging a webhook delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub transaction_id: String,
    pub status: String,
    pub pro_granted: bool,
}

/// ISO 4217 style: three uppercase letters.
fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    static CURRENCY: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"^[A-Z]{3}$").expect("valid regex"));
    if !CURRENCY.is_match(currency) {
        return Err(validator::ValidationError::new("invalid_currency"));
    }
    Ok(())
}
