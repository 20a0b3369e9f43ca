use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::OtpError;

/// Delivers a text message to a phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), OtpError>;
}

/// Sends messages through the WhatsApp Cloud API.
pub struct WhatsAppSender {
    client: Client,
    api_url: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppSender {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build WhatsApp HTTP client, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            api_url: config.whatsapp_api_url.trim_end_matches('/').to_string(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
            access_token: config.whatsapp_access_token.clone(),
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppSender {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), OtpError> {
        let url = format!("{}/{}/messages", self.api_url, self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": phone_number.trim_start_matches('+'),
            "type": "text",
            "text": { "body": body }
        });

        debug!("Sending WhatsApp message to {}", phone_number);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| OtpError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("WhatsApp API error ({}): {}", status, error_text);
            return Err(OtpError::Delivery(format!("WhatsApp API returned {}", status)));
        }

        info!("WhatsApp message delivered to {}", phone_number);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them. Used when no
/// messaging provider is configured.
pub struct LoggingSender;

#[async_trait]
impl MessageSender for LoggingSender {
    async fn send_text(&self, phone_number: &str, body: &str) -> Result<(), OtpError> {
        warn!("No message provider configured; message to {} not delivered", phone_number);
        debug!("Undelivered message to {}: {}", phone_number, body);
        Ok(())
    }
}
