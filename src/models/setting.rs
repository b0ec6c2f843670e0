// src/models/setting.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Current Pro price in Colombian pesos.
#[derive(Debug, Serialize)]
pub struct ProPriceResponse {
    pub pro_price_cop: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProPriceRequest {
    #[validate(range(min = 1, max = 100_000_000))]
    pub pro_price_cop: i64,
}
