// config.rs
use std::str::FromStr;

use chrono::Duration;

use crate::service::visibility::LeadCountScope;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    // Payment provider configuration
    pub active_payment_provider: String,
    pub stripe_secret_key: String,
    pub payment_currency: String,
    pub contact_policy: ContactPolicy,
}

/// Tunables of the contact request engine.
#[derive(Debug, Clone)]
pub struct ContactPolicy {
    pub request_ttl_hours: i64,
    pub trial_lead_quota: i64,
    pub lead_count_scope: LeadCountScope,
    pub gated_hot_consumes_trial: bool,
    pub transition_lease_secs: i64,
    pub expiry_sweep_interval_secs: u64,
    pub expiry_sweep_batch: i64,
    pub void_retry_attempts: u32,
    pub hot_severance_threshold: i64,
    pub hot_years_of_service_threshold: i32,
    pub hot_risk_score_threshold: f64,
}

impl Default for ContactPolicy {
    fn default() -> Self {
        Self {
            request_ttl_hours: 48,
            trial_lead_quota: 3,
            lead_count_scope: LeadCountScope::AllTime,
            gated_hot_consumes_trial: true,
            transition_lease_secs: 120,
            expiry_sweep_interval_secs: 600,
            expiry_sweep_batch: 100,
            void_retry_attempts: 3,
            hot_severance_threshold: 150_000,
            hot_years_of_service_threshold: 3,
            hot_risk_score_threshold: 0.7,
        }
    }
}

impl ContactPolicy {
    pub fn request_ttl(&self) -> Duration {
        Duration::hours(self.request_ttl_hours)
    }

    pub fn transition_lease(&self) -> Duration {
        Duration::seconds(self.transition_lease_secs)
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            request_ttl_hours: env_or("REQUEST_TTL_HOURS", defaults.request_ttl_hours),
            trial_lead_quota: env_or("TRIAL_LEAD_QUOTA", defaults.trial_lead_quota),
            lead_count_scope: env_or("LEAD_COUNT_SCOPE", defaults.lead_count_scope),
            gated_hot_consumes_trial: env_or("GATED_HOT_CONSUMES_TRIAL", defaults.gated_hot_consumes_trial),
            transition_lease_secs: env_or("TRANSITION_LEASE_SECS", defaults.transition_lease_secs),
            expiry_sweep_interval_secs: env_or("EXPIRY_SWEEP_INTERVAL_SECS", defaults.expiry_sweep_interval_secs),
            expiry_sweep_batch: env_or("EXPIRY_SWEEP_BATCH", defaults.expiry_sweep_batch),
            void_retry_attempts: env_or("VOID_RETRY_ATTEMPTS", defaults.void_retry_attempts),
            hot_severance_threshold: env_or("HOT_SEVERANCE_THRESHOLD", defaults.hot_severance_threshold),
            hot_years_of_service_threshold: env_or(
                "HOT_YEARS_OF_SERVICE_THRESHOLD",
                defaults.hot_years_of_service_threshold,
            ),
            hot_risk_score_threshold: env_or("HOT_RISK_SCORE_THRESHOLD", defaults.hot_risk_score_threshold),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let port = env_or("PORT", 8000u16);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8081".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        // Payment provider configurations (with defaults)
        let active_payment_provider = std::env::var("ACTIVE_PAYMENT_PROVIDER")
            .unwrap_or_else(|_| "sandbox".to_string());
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .unwrap_or_else(|_| "".to_string());
        let payment_currency = std::env::var("PAYMENT_CURRENCY")
            .unwrap_or_else(|_| "MXN".to_string());

        Config {
            database_url,
            jwt_secret,
            port,
            cors_origins,
            active_payment_provider,
            stripe_secret_key,
            payment_currency,
            contact_policy: ContactPolicy::from_env(),
        }
    }
}
