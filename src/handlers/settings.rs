// src/handlers/settings.rs

use axum::{Json, extract::State, response::IntoResponse};

use crate::{
    config::{DEFAULT_PRO_PRICE_COP, PRO_PRICE_SETTING_KEY},
    error::AppError,
    models::setting::ProPriceResponse,
    store::{DynStore, Store},
};

/// Pro price in pesos, falling back to the default when never set.
pub(crate) async fn pro_price(store: &dyn Store) -> Result<i64, AppError> {
    Ok(store
        .get_setting(PRO_PRICE_SETTING_KEY)
        .await?
        .unwrap_or(DEFAULT_PRO_PRICE_COP))
}

/// Public: the price shown on the upgrade page.
pub async fn get_pro_price(State(store): State<DynStore>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ProPriceResponse {
        pro_price_cop: pro_price(store.as_ref()).await?,
    }))
}
