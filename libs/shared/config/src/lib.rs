use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentStoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub redis_url: Option<String>,
    pub whatsapp_api_url: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_access_token: String,
    pub otp_ttl_seconds: u64,
    pub otp_max_attempts: u32,
    pub session_ttl_hours: i64,
    pub store_timeout_ms: u64,
    pub appointment_store: AppointmentStoreBackend,
    pub verify_participants: bool,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            jwt_secret: String::new(),
            redis_url: None,
            whatsapp_api_url: "https://graph.facebook.com/v19.0".to_string(),
            whatsapp_phone_number_id: String::new(),
            whatsapp_access_token: String::new(),
            otp_ttl_seconds: 300,
            otp_max_attempts: 5,
            session_ttl_hours: 24,
            store_timeout_ms: 5000,
            appointment_store: AppointmentStoreBackend::Memory,
            verify_participants: false,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        // Fall back to the in-memory store only when there is no document store to talk to
        let appointment_store = match env::var("APPOINTMENT_STORE").ok().as_deref() {
            Some("supabase") => AppointmentStoreBackend::Supabase,
            Some("memory") => AppointmentStoreBackend::Memory,
            Some(other) => {
                warn!("Unknown APPOINTMENT_STORE value '{}', choosing from SUPABASE_URL", other);
                Self::backend_for(&supabase_url)
            }
            None => Self::backend_for(&supabase_url),
        };

        let config = Self {
            supabase_url,
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok(),
            whatsapp_api_url: env::var("WHATSAPP_API_URL")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_API_URL not set, using default");
                    defaults.whatsapp_api_url.clone()
                }),
            whatsapp_phone_number_id: env::var("WHATSAPP_PHONE_NUMBER_ID")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_PHONE_NUMBER_ID not set, using empty value");
                    String::new()
                }),
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_ACCESS_TOKEN not set, using empty value");
                    String::new()
                }),
            otp_ttl_seconds: parse_var("OTP_TTL_SECONDS", defaults.otp_ttl_seconds),
            otp_max_attempts: parse_var("OTP_MAX_ATTEMPTS", defaults.otp_max_attempts),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours),
            store_timeout_ms: parse_var("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            appointment_store,
            verify_participants: parse_var("VERIFY_PARTICIPANTS", defaults.verify_participants),
            port: parse_var("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    fn backend_for(supabase_url: &str) -> AppointmentStoreBackend {
        if supabase_url.is_empty() {
            AppointmentStoreBackend::Memory
        } else {
            AppointmentStoreBackend::Supabase
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.whatsapp_api_url.is_empty()
            && !self.whatsapp_phone_number_id.is_empty()
            && !self.whatsapp_access_token.is_empty()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_seconds)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
