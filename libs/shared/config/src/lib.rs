use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub server_port: u16,
    pub access_token_ttl_minutes: i64,
    pub otp_ttl_seconds: u64,
    pub otp_resend_cooldown_seconds: u64,
    pub otp_send_window_seconds: u64,
    pub otp_max_sends: i64,
    pub otp_max_attempts: i64,
    pub slot_cache_ttl_seconds: u64,
    /// Offset of clinic-local wall time from UTC, used for "is this slot in the past".
    pub clinic_utc_offset_minutes: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            redis_url: None,
            server_port: 3000,
            access_token_ttl_minutes: 24 * 60,
            otp_ttl_seconds: 60,
            otp_resend_cooldown_seconds: 30,
            otp_send_window_seconds: 600,
            otp_max_sends: 5,
            otp_max_attempts: 5,
            slot_cache_ttl_seconds: 30,
            clinic_utc_offset_minutes: 330,
        }
    }
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            server_port: parsed("SERVER_PORT", defaults.server_port),
            access_token_ttl_minutes: parsed("ACCESS_TOKEN_TTL_MINUTES", defaults.access_token_ttl_minutes),
            otp_ttl_seconds: parsed("OTP_TTL_SECONDS", defaults.otp_ttl_seconds),
            otp_resend_cooldown_seconds: parsed("OTP_RESEND_COOLDOWN_SECONDS", defaults.otp_resend_cooldown_seconds),
            otp_send_window_seconds: parsed("OTP_SEND_WINDOW_SECONDS", defaults.otp_send_window_seconds),
            otp_max_sends: parsed("OTP_MAX_SENDS", defaults.otp_max_sends),
            otp_max_attempts: parsed("OTP_MAX_ATTEMPTS", defaults.otp_max_attempts),
            slot_cache_ttl_seconds: parsed("SLOT_CACHE_TTL_SECONDS", defaults.slot_cache_ttl_seconds),
            clinic_utc_offset_minutes: parsed("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, falling back to in-process cache");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn has_service_role(&self) -> bool {
        !self.supabase_service_role_key.is_empty()
    }
}
