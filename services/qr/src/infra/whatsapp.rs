//! WhatsApp Business Cloud API client.

use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::domain::repository::WhatsAppPort;
use crate::domain::types::DeliveryError;

/// Timeout for a single send request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    api_url: String,
    phone_number_id: String,
    access_token: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl WhatsAppClient {
    pub fn new(
        api_url: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build whatsapp http client")?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.api_url.trim_end_matches('/'),
            self.phone_number_id
        )
    }
}

/// Provider phone format: digits only, no leading `+`.
fn normalize_recipient(to: &str) -> String {
    to.chars().filter(char::is_ascii_digit).collect()
}

/// Map a non-success response to a delivery error. 429 and 5xx are worth retrying.
fn classify(status: StatusCode, body: &str) -> DeliveryError {
    let message = serde_json::from_str::<SendResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::Transient(message)
    } else {
        DeliveryError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn message_id(body: &str) -> Result<String, DeliveryError> {
    let parsed: SendResponse = serde_json::from_str(body)
        .map_err(|e| DeliveryError::Transient(format!("unreadable provider response: {e}")))?;
    if let Some(error) = parsed.error {
        return Err(DeliveryError::Rejected {
            status: 200,
            message: error.message,
        });
    }
    parsed
        .messages
        .into_iter()
        .next()
        .map(|m| m.id)
        .ok_or_else(|| DeliveryError::Transient("provider response has no message id".to_owned()))
}

impl WhatsAppPort for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, DeliveryError> {
        if self.access_token.is_empty() || self.phone_number_id.is_empty() {
            return Err(DeliveryError::Rejected {
                status: 0,
                message: "whatsapp delivery is not configured".to_owned(),
            });
        }

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": normalize_recipient(to),
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(classify(status, &text));
        }
        message_id(&text)
    }
}
