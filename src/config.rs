// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Questions drawn for a standard exam when the user has no active Pro grant.
pub const TRIAL_QUESTION_COUNT: usize = 15;
/// Questions drawn for a standard exam when the user is Pro.
pub const PRO_QUESTION_COUNT: usize = 40;

pub const TRIAL_DURATION_SECS: i64 = 900;
pub const PRO_DURATION_SECS: i64 = 3000;

/// How many previous results feed the "avoid recently seen" set.
pub const RECENT_RESULTS_WINDOW: i64 = 3;

/// Fallback for the `pro_price_cop` setting.
pub const DEFAULT_PRO_PRICE_COP: i64 = 20_000;
pub const PRO_PRICE_SETTING_KEY: &str = "pro_price_cop";
pub const PAYMENT_CURRENCY: &str = "COP";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    /// Shared secret appended to webhook bodies before hashing.
    pub payment_events_secret: String,
    /// Shared secret used for checkout integrity signatures.
    pub payment_integrity_secret: String,
    pub payment_public_key: String,
    pub app_base_url: String,
    pub pro_grant_days: i64,

    /// Offset of the calendar used for the daily attempt cap.
    pub local_utc_offset_hours: i32,

    /// Seconds it takes one auth request slot to replenish, per client IP.
    pub auth_rate_per_second: u64,
    pub auth_rate_burst: u32,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 86_400),
            rust_log,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            payment_events_secret: env::var("PAYMENT_EVENTS_SECRET").unwrap_or_default(),
            payment_integrity_secret: env::var("PAYMENT_INTEGRITY_SECRET").unwrap_or_default(),
            payment_public_key: env::var("PAYMENT_PUBLIC_KEY").unwrap_or_default(),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            pro_grant_days: parse_or("PRO_GRANT_DAYS", 120),
            local_utc_offset_hours: parse_or("LOCAL_UTC_OFFSET_HOURS", -5),
            auth_rate_per_second: parse_or("AUTH_RATE_PER_SECOND", 2),
            auth_rate_burst: parse_or("AUTH_RATE_BURST", 10),
            cors_origins,
        }
    }
}

/// Reads an env var, falling back to `default` when absent or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
