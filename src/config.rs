use std::path::PathBuf;

use serde::Deserialize;

use crate::payments::phone::normalize_phone;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Daraja-style provider settings. The five credential fields are required
/// before any initiation; the rest carry sandbox defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub shortcode: String,
    pub party_b: String,
    pub callback_url: String,
    pub transaction_type: String,
    pub receiver_msisdn: String,
}

impl MpesaConfig {
    pub fn from_env() -> Self {
        let env = std::env::var("MPESA_ENV").unwrap_or_else(|_| "sandbox".into());
        let base_url = if env == "production" {
            "https://api.safaricom.co.ke".to_string()
        } else {
            "https://sandbox.safaricom.co.ke".to_string()
        };
        let shortcode = std::env::var("MPESA_SHORTCODE").unwrap_or_else(|_| "174379".into());
        let party_b = std::env::var("MPESA_PARTY_B").unwrap_or_else(|_| shortcode.clone());
        let receiver = std::env::var("MPESA_RECEIVER_MSISDN").unwrap_or_else(|_| "0710236087".into());
        let receiver_msisdn =
            normalize_phone(&receiver).unwrap_or_else(|| "254710236087".to_string());

        Self {
            base_url,
            consumer_key: std::env::var("MPESA_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: std::env::var("MPESA_CONSUMER_SECRET").unwrap_or_default(),
            passkey: std::env::var("MPESA_PASSKEY").unwrap_or_default(),
            shortcode,
            party_b,
            callback_url: std::env::var("MPESA_CALLBACK_URL").unwrap_or_default(),
            transaction_type: std::env::var("MPESA_TRANSACTION_TYPE")
                .unwrap_or_else(|_| "CustomerPayBillOnline".into()),
            receiver_msisdn,
        }
    }

    /// Env-var names of required credentials that are unset. Values are never
    /// reported, only the names.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.consumer_key.is_empty() {
            missing.push("MPESA_CONSUMER_KEY");
        }
        if self.consumer_secret.is_empty() {
            missing.push("MPESA_CONSUMER_SECRET");
        }
        if self.passkey.is_empty() {
            missing.push("MPESA_PASSKEY");
        }
        if self.shortcode.is_empty() {
            missing.push("MPESA_SHORTCODE");
        }
        if self.callback_url.is_empty() {
            missing.push("MPESA_CALLBACK_URL");
        }
        missing
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub jwt: JwtConfig,
    pub mpesa: MpesaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_dir = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "data".into())
            .into();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "urbancart".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "urbancart-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        Ok(Self {
            data_dir,
            jwt,
            mpesa: MpesaConfig::from_env(),
        })
    }
}
