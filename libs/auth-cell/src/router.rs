use std::sync::Arc;

use axum::{routing::post, Router};
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_utils::session::{JwtSessionIssuer, SessionIssuer};

use crate::handlers;
use crate::services::{
    InMemoryOtpStore, LoggingSender, MessageSender, OtpService, OtpStore, RedisOtpStore, WhatsAppSender,
};

#[derive(Clone)]
pub struct AuthState {
    pub otp: Arc<OtpService>,
    pub issuer: Arc<dyn SessionIssuer>,
}

impl AuthState {
    /// Wires the OTP service from configuration. Falls back to the in-memory
    /// store when Redis is unset or unreachable, and to the logging sender
    /// when WhatsApp credentials are missing.
    pub async fn from_config(config: &AppConfig) -> Self {
        let store: Arc<dyn OtpStore> = match config.redis_url.as_deref() {
            Some(url) => match RedisOtpStore::connect(url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!("{}; falling back to in-memory OTP store", e);
                    Arc::new(InMemoryOtpStore::new())
                }
            },
            None => {
                info!("REDIS_URL not set, using in-memory OTP store");
                Arc::new(InMemoryOtpStore::new())
            }
        };

        let sender: Arc<dyn MessageSender> = if config.is_whatsapp_configured() {
            Arc::new(WhatsAppSender::new(config))
        } else {
            warn!("WhatsApp credentials not set, OTPs will only be logged");
            Arc::new(LoggingSender)
        };

        let issuer = JwtSessionIssuer::from_config(config);

        Self {
            otp: Arc::new(OtpService::new(store, sender, issuer.clone(), config)),
            issuer: Arc::new(issuer),
        }
    }
}

pub fn auth_routes(state: AuthState) -> Router {
    Router::new()
        .route("/send-otp", post(handlers::send_otp))
        .route("/verify-otp", post(handlers::verify_otp))
        .route("/validate", post(handlers::validate_token))
        .with_state(state)
}
