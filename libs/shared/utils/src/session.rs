use chrono::Duration;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::jwt::{issue_token, validate_token, TokenSubject};

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Turns a bearer credential into the caller's identity.
///
/// `None` means the credential is missing, malformed, forged or expired; callers
/// treat it as unauthorized and stop before touching any store.
pub trait SessionIssuer: Send + Sync {
    fn verify(&self, credential: &str) -> Option<User>;
}

/// HS256 session tokens signed with the configured secret.
#[derive(Debug, Clone)]
pub struct JwtSessionIssuer {
    secret: String,
    ttl: Duration,
}

impl JwtSessionIssuer {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self { secret: secret.into(), ttl }
    }

    /// Out-of-range or non-positive `SESSION_TTL_HOURS` falls back to the default lifetime.
    pub fn from_config(config: &AppConfig) -> Self {
        let ttl = Duration::try_hours(config.session_ttl_hours)
            .filter(|ttl| *ttl > Duration::zero())
            .unwrap_or_else(|| {
                warn!("SESSION_TTL_HOURS={} is out of range, using {} hours",
                      config.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
                Duration::hours(DEFAULT_SESSION_TTL_HOURS)
            });
        Self::new(config.jwt_secret.clone(), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &TokenSubject<'_>) -> Result<String, String> {
        issue_token(subject, &self.secret, self.ttl)
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn verify(&self, credential: &str) -> Option<User> {
        match validate_token(credential, &self.secret) {
            Ok(user) => Some(user),
            Err(reason) => {
                debug!("Rejected bearer credential: {}", reason);
                None
            }
        }
    }
}
