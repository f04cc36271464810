//! Message orchestration — one inbound event in, at most one reply out.
//!
//! Routing by message type:
//! - text:  session → agent (text) → send text
//! - audio: resolve url → download → transcode → session → agent (audio)
//!          → upload reply → send audio
//! - other: dropped without a reply
//!
//! Steps run strictly in order, each consuming the previous step's output.
//! The first failing step aborts the event and nothing is sent to the
//! sender; the error goes back to the caller untouched.

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use wabridge_core::{
    AgentError, ConversationalAgent, GatewayError, InboundEvent, Message, MessageKind,
    MessagingGateway, Outcome, SendReceipt,
};

use super::session_store::SessionStore;
use super::transcode::{AudioTranscoder, TranscodeError};

#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("messaging gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("conversational agent: {0}")]
    Agent(#[from] AgentError),

    #[error("transcoding: {0}")]
    Transcode(#[from] TranscodeError),
}

pub struct MessageOrchestrator {
    sessions: Arc<SessionStore>,
    transcoder: Arc<dyn AudioTranscoder>,
    agent: Arc<dyn ConversationalAgent>,
    gateway: Arc<dyn MessagingGateway>,
    target_sample_rate: u32,
}

impl MessageOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        transcoder: Arc<dyn AudioTranscoder>,
        agent: Arc<dyn ConversationalAgent>,
        gateway: Arc<dyn MessagingGateway>,
        target_sample_rate: u32,
    ) -> Self {
        Self {
            sessions,
            transcoder,
            agent,
            gateway,
            target_sample_rate,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn process(&self, event: InboundEvent) -> Result<Outcome, OrchestrationError> {
        let (contact, inbound) = match event.first_pair() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(reason = %e, "Nothing to process");
                return Ok(Outcome::idle(e));
            }
        };

        let message = match inbound.classify() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(reason = %e, message_id = ?inbound.id, "Malformed message");
                return Ok(Outcome::idle(e));
            }
        };

        if event.contacts.len() > 1 || event.messages.len() > 1 {
            tracing::debug!(
                extra_contacts = event.contacts.len() - 1,
                extra_messages = event.messages.len() - 1,
                "Only the first contact/message pair is processed"
            );
        }

        let sender_id = contact.wa_id.as_str();
        let span = tracing::info_span!("process", sender_id, kind = %message.kind());

        async move {
            match message {
                Message::Text { body } => {
                    let receipt = self.handle_text(sender_id, &body).await?;
                    Ok(replied(sender_id, MessageKind::Text, receipt))
                }
                Message::Audio { media_id, mime_type } => {
                    let receipt = self.handle_audio(sender_id, &media_id, &mime_type).await?;
                    Ok(replied(sender_id, MessageKind::Audio, receipt))
                }
                Message::Unsupported { kind } => {
                    tracing::warn!(message_type = %kind, "Unsupported message type ignored");
                    Ok(Outcome::Ignored {
                        sender_id: sender_id.to_string(),
                        kind,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_text(
        &self,
        sender_id: &str,
        body: &str,
    ) -> Result<SendReceipt, OrchestrationError> {
        let session_id = self.sessions.get_or_create(sender_id);
        let reply = self.agent.detect_intent_text(&session_id, body).await?;
        tracing::debug!(session_id = %session_id, chars = reply.len(), "Agent replied");

        let receipt = self.gateway.send_text(sender_id, &reply).await?;
        tracing::info!(message_id = ?receipt.message_id, "Text reply sent");
        Ok(receipt)
    }

    async fn handle_audio(
        &self,
        sender_id: &str,
        media_id: &str,
        mime_type: &str,
    ) -> Result<SendReceipt, OrchestrationError> {
        let url = self.gateway.resolve_media_url(media_id).await?;
        let audio = self.gateway.download(&url).await?;
        tracing::debug!(media_id, mime_type, bytes = audio.len(), "Voice note downloaded");

        let transcoded = self
            .transcoder
            .transcode(audio, self.target_sample_rate)
            .await?;

        let session_id = self.sessions.get_or_create(sender_id);
        let reply_audio = self
            .agent
            .detect_intent_audio(&session_id, transcoded)
            .await?;
        tracing::debug!(session_id = %session_id, bytes = reply_audio.len(), "Agent replied with audio");

        let reply_media_id = self
            .gateway
            .upload(reply_audio, self.agent.reply_mime_type())
            .await?;

        let receipt = self.gateway.send_audio(sender_id, &reply_media_id).await?;
        tracing::info!(media_id = %reply_media_id, message_id = ?receipt.message_id, "Audio reply sent");
        Ok(receipt)
    }
}

fn replied(sender_id: &str, kind: MessageKind, receipt: SendReceipt) -> Outcome {
    Outcome::Replied {
        sender_id: sender_id.to_string(),
        kind,
        receipt,
    }
}
