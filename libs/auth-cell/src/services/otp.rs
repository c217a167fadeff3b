use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};

use shared_cache::CacheStore;
use shared_config::AppConfig;
use shared_utils::validators::{is_valid_phone, normalize_phone};

use crate::error::AuthError;
use crate::models::OtpDispatch;
use crate::services::sms::{mask, SmsGateway};

type HmacSha256 = Hmac<Sha256>;

const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub code_ttl: Duration,
    pub resend_cooldown: Duration,
    pub send_window: Duration,
    pub max_sends: i64,
    pub max_attempts: i64,
}

impl From<&AppConfig> for OtpSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            code_ttl: Duration::from_secs(config.otp_ttl_seconds),
            resend_cooldown: Duration::from_secs(config.otp_resend_cooldown_seconds),
            send_window: Duration::from_secs(config.otp_send_window_seconds),
            max_sends: config.otp_max_sends,
            max_attempts: config.otp_max_attempts,
        }
    }
}

fn code_key(phone: &str) -> String {
    format!("otp:code:{}", phone)
}

fn cooldown_key(phone: &str) -> String {
    format!("otp:cooldown:{}", phone)
}

fn sends_key(phone: &str) -> String {
    format!("otp:sends:{}", phone)
}

fn attempts_key(phone: &str) -> String {
    format!("otp:attempts:{}", phone)
}

pub fn parse_phone(raw: &str) -> Result<String, AuthError> {
    let phone = normalize_phone(raw);
    if is_valid_phone(&phone) {
        Ok(phone)
    } else {
        Err(AuthError::InvalidPhone)
    }
}

pub struct OtpService {
    cache: Arc<dyn CacheStore>,
    sms: Arc<dyn SmsGateway>,
    secret: String,
    settings: OtpSettings,
}

impl OtpService {
    pub fn new(config: &AppConfig, cache: Arc<dyn CacheStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self {
            cache,
            sms,
            secret: config.supabase_jwt_secret.clone(),
            settings: OtpSettings::from(config),
        }
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    /// Codes are stored as a keyed digest bound to the phone number.
    fn digest(&self, phone: &str, code: &str) -> Result<String, AuthError> {
        let mac = self.keyed_mac(phone, code)?;
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn keyed_mac(&self, phone: &str, code: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AuthError::Token(e.to_string()))?;
        mac.update(phone.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        Ok(mac)
    }

    fn matches(&self, phone: &str, code: &str, stored: &str) -> Result<bool, AuthError> {
        let Ok(expected) = general_purpose::STANDARD.decode(stored) else {
            warn!("Discarding undecodable OTP digest");
            return Ok(false);
        };
        Ok(self.keyed_mac(phone, code)?.verify_slice(&expected).is_ok())
    }

    fn generate_code() -> String {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{:0width$}", n, width = CODE_LENGTH)
    }

    #[instrument(skip_all)]
    pub async fn request_code(&self, raw_phone: &str) -> Result<OtpDispatch, AuthError> {
        let phone = parse_phone(raw_phone)?;
        debug!("OTP requested for {}", mask(&phone, 4));

        let cooldown = cooldown_key(&phone);
        if !self
            .cache
            .set_if_absent(&cooldown, "1", self.settings.resend_cooldown)
            .await?
        {
            let retry_after = self
                .cache
                .ttl(&cooldown)
                .await?
                .map(|left| left.as_secs().max(1))
                .unwrap_or(self.settings.resend_cooldown.as_secs());
            warn!("OTP resend inside cooldown for {}", mask(&phone, 4));
            return Err(AuthError::Cooldown { retry_after });
        }

        let sent = self
            .cache
            .get(&sends_key(&phone))
            .await?
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(0);
        if sent >= self.settings.max_sends {
            warn!("OTP send limit reached for {}", mask(&phone, 4));
            return Err(AuthError::SendLimit);
        }

        let code = Self::generate_code();
        self.cache
            .set(&code_key(&phone), &self.digest(&phone, &code)?, self.settings.code_ttl)
            .await?;
        self.cache.delete(&attempts_key(&phone)).await?;
        self.cache.incr(&sends_key(&phone), self.settings.send_window).await?;

        if let Err(e) = self.sms.send_otp(&phone, &code).await {
            self.cache.delete(&code_key(&phone)).await?;
            self.cache.delete(&cooldown).await?;
            return Err(AuthError::Sms(e));
        }

        info!("OTP issued for {}", mask(&phone, 4));
        Ok(OtpDispatch {
            message: "OTP sent".to_string(),
            expires_in: self.settings.code_ttl.as_secs(),
            resend_after: self.settings.resend_cooldown.as_secs(),
        })
    }

    /// Consume a code. On success the phone number is returned normalized.
    #[instrument(skip_all)]
    pub async fn verify_code(&self, raw_phone: &str, code: Option<&str>) -> Result<String, AuthError> {
        let phone = parse_phone(raw_phone)?;
        let code = code.map(str::trim).unwrap_or_default();
        if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::MalformedCode);
        }

        let stored = self
            .cache
            .get(&code_key(&phone))
            .await?
            .ok_or(AuthError::CodeExpired)?;

        if !self.matches(&phone, code, &stored)? {
            let attempts = self
                .cache
                .incr(&attempts_key(&phone), self.settings.code_ttl)
                .await?;
            if attempts >= self.settings.max_attempts {
                self.cache.delete(&code_key(&phone)).await?;
                self.cache.delete(&attempts_key(&phone)).await?;
                warn!("OTP locked after {} failed attempts for {}", attempts, mask(&phone, 4));
                return Err(AuthError::TooManyAttempts);
            }
            return Err(AuthError::InvalidCode {
                remaining: self.settings.max_attempts - attempts,
            });
        }

        self.cache.delete(&code_key(&phone)).await?;
        self.cache.delete(&attempts_key(&phone)).await?;
        info!("OTP verified for {}", mask(&phone, 4));
        Ok(phone)
    }
}
