//! Messaging gateway — outbound side of the WhatsApp Business Cloud API.
//!
//! Provides the `MessagingGateway` trait consumed by the orchestrator and
//! `WhatsAppClient`, a thin Graph API implementation over `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::WhatsAppConfig;
use crate::models::SendReceipt;

// ============================================================================
// MessagingGateway trait
// ============================================================================

/// Send, fetch and upload operations against the messaging channel.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError>;

    async fn send_audio(&self, recipient: &str, media_id: &str)
        -> Result<SendReceipt, GatewayError>;

    /// Resolve a short-lived download URL for an inbound media id.
    async fn resolve_media_url(&self, media_id: &str) -> Result<String, GatewayError>;

    async fn download(&self, url: &str) -> Result<Bytes, GatewayError>;

    /// Upload a buffer and return the new media id.
    async fn upload(&self, data: Bytes, mime_type: &str) -> Result<String, GatewayError>;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Graph API response missing '{0}'")]
    MissingField(&'static str),

    #[error("Missing access token")]
    MissingAccessToken,
}

// ============================================================================
// Graph API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(flatten)]
    body: OutboundBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutboundBody<'a> {
    Text { text: TextBody<'a> },
    Audio { audio: MediaRef<'a> },
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct MediaRef<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUrlResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: Option<GraphErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    message: String,
}

// ============================================================================
// WhatsAppClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, GatewayError> {
        Self::with_base_url(config, config.base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &WhatsAppConfig, base_url: String) -> Result<Self, GatewayError> {
        if config.access_token.is_empty() {
            return Err(GatewayError::MissingAccessToken);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.access_token)
    }

    async fn send(&self, message: OutboundMessage<'_>) -> Result<SendReceipt, GatewayError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let response = self
            .authed(self.client.post(&url))
            .json(&message)
            .send()
            .await?;

        let body: SendResponse = check_status(response).await?.json().await?;
        Ok(SendReceipt {
            message_id: body.messages.into_iter().next().map(|m| m.id),
        })
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppClient {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        tracing::debug!(recipient, chars = text.len(), "Sending text message");
        self.send(OutboundMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: recipient,
            body: OutboundBody::Text {
                text: TextBody { body: text },
            },
        })
        .await
    }

    async fn send_audio(
        &self,
        recipient: &str,
        media_id: &str,
    ) -> Result<SendReceipt, GatewayError> {
        tracing::debug!(recipient, media_id, "Sending audio message");
        self.send(OutboundMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: recipient,
            body: OutboundBody::Audio {
                audio: MediaRef { id: media_id },
            },
        })
        .await
    }

    async fn resolve_media_url(&self, media_id: &str) -> Result<String, GatewayError> {
        let url = format!("{}/{}", self.base_url, media_id);
        let response = self.authed(self.client.get(&url)).send().await?;
        let body: MediaUrlResponse = check_status(response).await?.json().await?;
        body.url.ok_or(GatewayError::MissingField("url"))
    }

    async fn download(&self, url: &str) -> Result<Bytes, GatewayError> {
        let response = self.authed(self.client.get(url)).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        tracing::debug!(bytes = bytes.len(), "Downloaded media");
        Ok(bytes)
    }

    async fn upload(&self, data: Bytes, mime_type: &str) -> Result<String, GatewayError> {
        let url = format!("{}/{}/media", self.base_url, self.phone_number_id);
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name("audio")
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("type", mime_type.to_string())
            .text("messaging_product", "whatsapp");

        let response = self
            .authed(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = check_status(response).await?.json().await?;
        body.id.ok_or(GatewayError::MissingField("id"))
    }
}

/// Turn a non-success response into `GatewayError::Api`, preferring the
/// Graph API's own error message over the raw body.
async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorResponse>(&error_body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or(error_body);

    tracing::error!(code = status.as_u16(), message = %message, "Graph API error");

    Err(GatewayError::Api {
        code: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_shape() {
        let message = OutboundMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: "5511",
            body: OutboundBody::Text {
                text: TextBody { body: "olá" },
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["to"], "5511");
        assert_eq!(json["text"]["body"], "olá");
        assert_eq!(json["messaging_product"], "whatsapp");
    }

    #[test]
    fn test_audio_message_shape() {
        let message = OutboundMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: "5511",
            body: OutboundBody::Audio {
                audio: MediaRef { id: "media-9" },
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["audio"]["id"], "media-9");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_client_requires_token() {
        let config = WhatsAppConfig::default();
        let err = WhatsAppClient::new(&config).unwrap_err();
        assert!(matches!(err, GatewayError::MissingAccessToken));
    }
}
