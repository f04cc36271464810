//! Conversational agent — Dialogflow CX intent detection.
//!
//! `DialogflowClient` wraps the `sessions/{id}:detectIntent` REST endpoint and
//! returns the agent's first text reply. `DialogflowAgent` composes it with a
//! [`SpeechSynthesizer`] so that audio queries are answered with audio.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthError, TokenSource};
use crate::config::DialogflowConfig;
use crate::speech::{SpeechError, SpeechSynthesizer};

// ============================================================================
// ConversationalAgent trait
// ============================================================================

#[async_trait]
pub trait ConversationalAgent: Send + Sync {
    async fn detect_intent_text(&self, session_id: &str, text: &str) -> Result<String, AgentError>;

    /// Detect intent from an encoded voice query and return synthesized reply audio.
    async fn detect_intent_audio(&self, session_id: &str, audio: Bytes)
        -> Result<Bytes, AgentError>;

    /// MIME type of the buffers returned by `detect_intent_audio`.
    fn reply_mime_type(&self) -> &str {
        "audio/mpeg"
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dialogflow API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Dialogflow returned no text response")]
    NoReply,

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

// ============================================================================
// Dialogflow REST structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest {
    query_input: QueryInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<AudioInput>,
    language_code: String,
}

#[derive(Debug, Serialize)]
struct TextInput {
    text: String,
}

#[derive(Debug, Serialize)]
struct AudioInput {
    config: InputAudioConfig,
    /// base64 in the JSON mapping
    audio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputAudioConfig {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    response_messages: Vec<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    text: Option<ResponseText>,
}

#[derive(Debug, Deserialize)]
struct ResponseText {
    #[serde(default)]
    text: Vec<String>,
}

impl DetectIntentResponse {
    /// First text fragment of the first text response message.
    fn first_text(self) -> Option<String> {
        self.query_result?
            .response_messages
            .into_iter()
            .filter_map(|m| m.text)
            .find_map(|t| t.text.into_iter().next())
    }
}

// ============================================================================
// DialogflowClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct DialogflowClient {
    client: Client,
    config: DialogflowConfig,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
}

impl DialogflowClient {
    pub fn new(config: DialogflowConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, AgentError> {
        let base_url = config.endpoint();
        Self::with_base_url(config, tokens, base_url)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: DialogflowConfig,
        tokens: Arc<dyn TokenSource>,
        base_url: String,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn session_path(&self, session_id: &str) -> String {
        format!(
            "projects/{}/locations/{}/agents/{}/sessions/{}",
            self.config.project_id, self.config.location, self.config.agent_id, session_id
        )
    }

    pub async fn detect_text(&self, session_id: &str, text: &str) -> Result<String, AgentError> {
        self.detect(
            session_id,
            QueryInput {
                text: Some(TextInput {
                    text: text.to_string(),
                }),
                audio: None,
                language_code: self.config.language_code.clone(),
            },
        )
        .await
    }

    /// Audio must be Ogg/Opus at `sample_rate` Hz.
    pub async fn detect_audio(
        &self,
        session_id: &str,
        audio: &[u8],
        sample_rate: u32,
    ) -> Result<String, AgentError> {
        self.detect(
            session_id,
            QueryInput {
                text: None,
                audio: Some(AudioInput {
                    config: InputAudioConfig {
                        audio_encoding: "AUDIO_ENCODING_OGG_OPUS",
                        sample_rate_hertz: sample_rate,
                    },
                    audio: base64::engine::general_purpose::STANDARD.encode(audio),
                }),
                language_code: self.config.language_code.clone(),
            },
        )
        .await
    }

    async fn detect(&self, session_id: &str, query_input: QueryInput) -> Result<String, AgentError> {
        let url = format!(
            "{}/{}:detectIntent",
            self.base_url,
            self.session_path(session_id)
        );

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&DetectIntentRequest { query_input })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Dialogflow API error");
            return Err(AgentError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: DetectIntentResponse = response.json().await?;
        body.first_text().ok_or(AgentError::NoReply)
    }
}

// ============================================================================
// DialogflowAgent
// ============================================================================

/// Dialogflow for intent detection plus a synthesizer for voice replies.
pub struct DialogflowAgent {
    client: DialogflowClient,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sample_rate: u32,
}

impl DialogflowAgent {
    pub fn new(
        client: DialogflowClient,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sample_rate: u32,
    ) -> Self {
        Self {
            client,
            synthesizer,
            sample_rate,
        }
    }
}

#[async_trait]
impl ConversationalAgent for DialogflowAgent {
    async fn detect_intent_text(&self, session_id: &str, text: &str) -> Result<String, AgentError> {
        self.client.detect_text(session_id, text).await
    }

    async fn detect_intent_audio(
        &self,
        session_id: &str,
        audio: Bytes,
    ) -> Result<Bytes, AgentError> {
        let reply = self
            .client
            .detect_audio(session_id, &audio, self.sample_rate)
            .await?;
        tracing::debug!(session_id, chars = reply.len(), "Synthesizing voice reply");
        Ok(self.synthesizer.synthesize(&reply).await?)
    }

    fn reply_mime_type(&self) -> &str {
        self.synthesizer.mime_type()
    }
}
