//! Speech synthesis via the Google Cloud Text-to-Speech REST API.

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthError, TokenSource};
use crate::config::TtsConfig;

/// Turns reply text into an audio buffer.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;

    /// MIME type of the buffers returned by `synthesize`.
    fn mime_type(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Text-to-Speech API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid audio content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

#[derive(Debug, Clone)]
pub struct TextToSpeechClient {
    client: Client,
    config: TtsConfig,
    tokens: Arc<dyn TokenSource>,
}

impl TextToSpeechClient {
    pub fn new(config: TtsConfig, tokens: Arc<dyn TokenSource>) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            tokens,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        let url = format!("{}/text:synthesize", self.config.base_url.trim_end_matches('/'));
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &self.config.voice_name,
                ssml_gender: &self.config.ssml_gender,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.config.audio_encoding,
            },
        };

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Text-to-Speech API error");
            return Err(SpeechError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: SynthesizeResponse = response.json().await?;
        let audio = base64::engine::general_purpose::STANDARD.decode(body.audio_content)?;
        tracing::debug!(bytes = audio.len(), "Synthesized reply audio");
        Ok(Bytes::from(audio))
    }

    fn mime_type(&self) -> &str {
        match self.config.audio_encoding.as_str() {
            "OGG_OPUS" => "audio/ogg",
            "LINEAR16" => "audio/wav",
            _ => "audio/mpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    #[test]
    fn test_request_shape() {
        let request = SynthesizeRequest {
            input: SynthesisInput { text: "Olá" },
            voice: VoiceSelection {
                language_code: "pt-BR",
                name: "pt-BR-Wavenet-D",
                ssml_gender: "FEMALE",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"]["text"], "Olá");
        assert_eq!(json["voice"]["languageCode"], "pt-BR");
        assert_eq!(json["voice"]["ssmlGender"], "FEMALE");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
    }

    #[test]
    fn test_mime_type_follows_encoding() {
        let tokens = Arc::new(StaticToken::new("token").unwrap());
        let client = TextToSpeechClient::new(TtsConfig::default(), tokens.clone()).unwrap();
        assert_eq!(client.mime_type(), "audio/mpeg");

        let config = TtsConfig {
            audio_encoding: "OGG_OPUS".to_string(),
            ..Default::default()
        };
        let client = TextToSpeechClient::new(config, tokens).unwrap();
        assert_eq!(client.mime_type(), "audio/ogg");
    }
}
