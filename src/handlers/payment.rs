// src/handlers/payment.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use url::Url;
use validator::Validate;

use crate::{
    billing::{
        signature::{integrity_signature, pro_reference},
        webhook::{self, checksum_from_headers},
    },
    config::{Config, PAYMENT_CURRENCY},
    error::AppError,
    handlers::{current_user, settings::pro_price},
    models::payment::{CheckoutResponse, SignatureRequest, SignatureResponse, WebhookAck},
    store::DynStore,
    utils::jwt::Claims,
};

/// Path the gateway sends the browser back to after paying.
const CHECKOUT_RETURN_PATH: &str = "payment/result";

/// Everything the client needs to open the gateway widget for a Pro purchase.
pub async fn checkout(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(store.as_ref(), &claims).await?;

    let amount_in_cents = pro_price(store.as_ref()).await? * 100;
    let reference = pro_reference(user.id, Utc::now());
    let signature = integrity_signature(
        &reference,
        amount_in_cents,
        PAYMENT_CURRENCY,
        &config.payment_integrity_secret,
    );

    let redirect_url = Url::parse(&config.app_base_url)
        .and_then(|base| base.join(CHECKOUT_RETURN_PATH))
        .map_err(|e| AppError::InternalServerError(format!("Invalid APP_BASE_URL: {}", e)))?;

    tracing::info!(user_id = user.id, %reference, amount_in_cents, "Checkout created");

    Ok(Json(CheckoutResponse {
        reference,
        amount_in_cents,
        currency: PAYMENT_CURRENCY.to_string(),
        signature,
        public_key: config.payment_public_key.clone(),
        redirect_url: redirect_url.to_string(),
    }))
}

/// Integrity signature for an arbitrary reference and amount.
pub async fn sign(
    State(config): State<Config>,
    Json(payload): Json<SignatureRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let signature = integrity_signature(
        &payload.reference,
        payload.amount_in_cents,
        &payload.currency,
        &config.payment_integrity_secret,
    );
    Ok(Json(SignatureResponse { signature }))
}

/// Gateway event receiver. The body is read raw so the checksum covers
/// exactly the bytes that were sent.
pub async fn webhook(
    State(store): State<DynStore>,
    State(config): State<Config>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let outcome = webhook::handle_event(
        store.as_ref(),
        &config.payment_events_secret,
        config.pro_grant_days,
        checksum_from_headers(&headers),
        &body,
        Utc::now(),
    )
    .await?;

    Ok(Json(WebhookAck {
        received: true,
        transaction_id: outcome.payment.transaction_id,
        status: outcome.payment.status,
        pro_granted: outcome.pro_granted,
    }))
}
