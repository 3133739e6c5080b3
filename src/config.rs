use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub heartbeat_interval_secs: u64,
    pub provider_timeout_secs: u64,
    pub push_retry_attempts: u32,
    pub offer: OfferPolicy,
    pub offer_sweep_interval_secs: u64,
    pub routing: RoutingConfig,
    pub web_push: Option<VapidConfig>,
    pub mobile_push: Option<FcmConfig>,
}

/// How long offers live and how far re-broadcasts reach.
#[derive(Debug, Clone)]
pub struct OfferPolicy {
    pub ttl: Duration,
    pub max_rounds: u32,
    pub initial_radius_km: f64,
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120),
            max_rounds: 3,
            initial_radius_km: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key_pem: String,
    pub public_key: String,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    pub access_token: String,
    pub base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let web_push = match (optional("VAPID_PRIVATE_KEY_PEM"), optional("VAPID_PUBLIC_KEY")) {
            (Some(private_key_pem), Some(public_key)) => Some(VapidConfig {
                private_key_pem,
                public_key,
                subject: env::var("VAPID_SUBJECT")
                    .unwrap_or_else(|_| "mailto:ops@example.com".to_string()),
            }),
            _ => None,
        };

        let mobile_push = match (optional("FCM_PROJECT_ID"), optional("FCM_ACCESS_TOKEN")) {
            (Some(project_id), Some(access_token)) => Some(FcmConfig {
                project_id,
                access_token,
                base_url: env::var("FCM_BASE_URL")
                    .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_or_default("LOG_JSON", false)?,
            heartbeat_interval_secs: parse_or_default("HEARTBEAT_INTERVAL_SECS", 30)?,
            provider_timeout_secs: parse_or_default("PROVIDER_TIMEOUT_SECS", 5)?,
            push_retry_attempts: parse_or_default("PUSH_RETRY_ATTEMPTS", 2)?,
            offer: OfferPolicy {
                ttl: Duration::from_secs(parse_or_default("OFFER_TTL_SECS", 120)?),
                max_rounds: parse_or_default("OFFER_MAX_ROUNDS", 3)?,
                initial_radius_km: parse_or_default("OFFER_RADIUS_KM", 10.0)?,
            },
            offer_sweep_interval_secs: parse_or_default("OFFER_SWEEP_INTERVAL_SECS", 15)?,
            routing: RoutingConfig {
                api_key: optional("ROUTING_API_KEY"),
                base_url: env::var("ROUTING_BASE_URL")
                    .unwrap_or_else(|_| "https://maps.googleapis.com".to_string()),
            },
            web_push,
            mobile_push,
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for Config {
    /// Offline defaults: no provider credentials, so routing falls back and
    /// push channels are skipped.
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_json: false,
            heartbeat_interval_secs: 30,
            provider_timeout_secs: 5,
            push_retry_attempts: 2,
            offer: OfferPolicy::default(),
            offer_sweep_interval_secs: 15,
            routing: RoutingConfig {
                api_key: None,
                base_url: "https://maps.googleapis.com".to_string(),
            },
            web_push: None,
            mobile_push: None,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
