use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use tracing::{info, instrument, warn};

use shared_config::AppConfig;
use shared_models::auth::SessionToken;
use shared_utils::jwt::TokenSubject;
use shared_utils::session::JwtSessionIssuer;

use crate::models::{OtpError, OtpRecord};
use crate::services::otp_store::OtpStore;
use crate::services::sender::MessageSender;

const E164_PATTERN: &str = r"^\+[1-9]\d{7,14}$";
const SESSION_ROLE: &str = "patient";

fn phone_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(E164_PATTERN).ok()).as_ref()
}

/// Normalizes and validates an E.164 phone number such as `+919876543210`.
pub fn normalize_phone_number(raw: &str) -> Result<String, OtpError> {
    let phone_number: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

    match phone_pattern() {
        Some(pattern) if pattern.is_match(&phone_number) => Ok(phone_number),
        _ => Err(OtpError::InvalidPhoneNumber(raw.to_string())),
    }
}

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Phone-number login: sends one-time codes and exchanges a correct code for
/// a session token.
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    sender: Arc<dyn MessageSender>,
    issuer: JwtSessionIssuer,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        sender: Arc<dyn MessageSender>,
        issuer: JwtSessionIssuer,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            sender,
            issuer,
            ttl: config.otp_ttl(),
            max_attempts: config.otp_max_attempts.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates, stores and delivers a fresh code. Returns the number of
    /// seconds the code stays valid.
    #[instrument(skip(self))]
    pub async fn send_otp(&self, phone_number: &str) -> Result<u64, OtpError> {
        let phone_number = normalize_phone_number(phone_number)?;
        let code = generate_code();

        self.store.put(&phone_number, OtpRecord::fresh(code.clone()), self.ttl).await?;

        let message = format!("Your OTP is {}", code);
        if let Err(e) = self.sender.send_text(&phone_number, &message).await {
            warn!("OTP delivery to {} failed: {}", phone_number, e);
            if let Err(cleanup) = self.store.remove(&phone_number).await {
                warn!("Failed to discard undelivered OTP for {}: {}", phone_number, cleanup);
            }
            return Err(e);
        }

        info!("OTP sent to {}", phone_number);
        Ok(self.ttl.as_secs())
    }

    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, phone_number: &str, otp: &str) -> Result<SessionToken, OtpError> {
        let phone_number = normalize_phone_number(phone_number)?;

        // The attempt is counted before the code is compared, so parallel
        // guesses each consume one of the allowed attempts.
        let record = self.store
            .reserve_attempt(&phone_number)
            .await?
            .ok_or(OtpError::Expired)?;

        if record.attempts > self.max_attempts {
            self.store.remove(&phone_number).await?;
            return Err(OtpError::TooManyAttempts);
        }

        if record.code != otp.trim() {
            warn!("Incorrect OTP for {} (attempt {}/{})", phone_number, record.attempts, self.max_attempts);

            if record.attempts >= self.max_attempts {
                self.store.remove(&phone_number).await?;
                return Err(OtpError::TooManyAttempts);
            }
            return Err(OtpError::InvalidCode);
        }

        // Only the caller that actually deletes the record gets a session
        if !self.store.remove(&phone_number).await? {
            return Err(OtpError::Expired);
        }

        let access_token = self.issuer
            .issue(&TokenSubject {
                subject: &phone_number,
                role: SESSION_ROLE,
                phone: Some(&phone_number),
            })
            .map_err(OtpError::Session)?;

        info!("OTP verified for {}", phone_number);
        Ok(SessionToken {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.issuer.ttl().num_seconds(),
        })
    }
}
