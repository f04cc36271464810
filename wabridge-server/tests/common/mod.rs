//! Recording test doubles for the orchestrator's collaborators.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use wabridge_core::{AgentError, ConversationalAgent, GatewayError, MessagingGateway, SendReceipt};
use wabridge_server::subsystems::orchestrator::MessageOrchestrator;
use wabridge_server::subsystems::session_store::SessionStore;
use wabridge_server::subsystems::transcode::{AudioTranscoder, TranscodeError};

pub const SAMPLE_RATE: u32 = 48_000;

/// Ordered log of every collaborator call, shared by all doubles.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Call names without their arguments.
    pub fn names(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| e.split('(').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }
}

/// Which collaborator call should fail, if any.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum FailAt {
    #[default]
    Nothing,
    Resolve,
    Download,
    Transcode,
    Agent,
    Upload,
    Send,
}

pub struct MockGateway {
    log: CallLog,
    fail: FailAt,
}

#[async_trait]
impl MessagingGateway for MockGateway {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SendReceipt, GatewayError> {
        self.log.push(format!("send_text({recipient},{text})"));
        if self.fail == FailAt::Send {
            return Err(api_error());
        }
        Ok(SendReceipt {
            message_id: Some("wamid.text".to_string()),
        })
    }

    async fn send_audio(
        &self,
        recipient: &str,
        media_id: &str,
    ) -> Result<SendReceipt, GatewayError> {
        self.log.push(format!("send_audio({recipient},{media_id})"));
        if self.fail == FailAt::Send {
            return Err(api_error());
        }
        Ok(SendReceipt {
            message_id: Some("wamid.audio".to_string()),
        })
    }

    async fn resolve_media_url(&self, media_id: &str) -> Result<String, GatewayError> {
        self.log.push(format!("resolve_media_url({media_id})"));
        if self.fail == FailAt::Resolve {
            return Err(GatewayError::MissingField("url"));
        }
        Ok(format!("https://media.example/{media_id}"))
    }

    async fn download(&self, url: &str) -> Result<Bytes, GatewayError> {
        self.log.push(format!("download({url})"));
        if self.fail == FailAt::Download {
            return Err(api_error());
        }
        Ok(Bytes::from_static(b"raw-ogg"))
    }

    async fn upload(&self, data: Bytes, mime_type: &str) -> Result<String, GatewayError> {
        self.log.push(format!(
            "upload({},{mime_type})",
            String::from_utf8_lossy(&data)
        ));
        if self.fail == FailAt::Upload {
            return Err(api_error());
        }
        Ok("media-reply".to_string())
    }
}

pub struct MockAgent {
    log: CallLog,
    fail: FailAt,
}

#[async_trait]
impl ConversationalAgent for MockAgent {
    async fn detect_intent_text(&self, session_id: &str, text: &str) -> Result<String, AgentError> {
        self.log.push(format!("detect_intent_text({session_id},{text})"));
        if self.fail == FailAt::Agent {
            return Err(AgentError::NoReply);
        }
        Ok(format!("reply to {text}"))
    }

    async fn detect_intent_audio(
        &self,
        session_id: &str,
        audio: Bytes,
    ) -> Result<Bytes, AgentError> {
        self.log.push(format!(
            "detect_intent_audio({session_id},{})",
            String::from_utf8_lossy(&audio)
        ));
        if self.fail == FailAt::Agent {
            return Err(AgentError::Api {
                code: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(Bytes::from_static(b"reply-mp3"))
    }
}

pub struct MockTranscoder {
    log: CallLog,
    fail: FailAt,
}

#[async_trait]
impl AudioTranscoder for MockTranscoder {
    async fn transcode(
        &self,
        audio: Bytes,
        target_sample_rate: u32,
    ) -> Result<Bytes, TranscodeError> {
        self.log.push(format!(
            "transcode({},{target_sample_rate})",
            String::from_utf8_lossy(&audio)
        ));
        if self.fail == FailAt::Transcode {
            return Err(TranscodeError::EmptyOutput);
        }
        Ok(Bytes::from(format!("opus[{}]", String::from_utf8_lossy(&audio))))
    }
}

fn api_error() -> GatewayError {
    GatewayError::Api {
        code: 500,
        message: "boom".to_string(),
    }
}

pub struct Harness {
    pub log: CallLog,
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<MessageOrchestrator>,
}

pub fn harness(fail: FailAt) -> Harness {
    let log = CallLog::default();
    let sessions = Arc::new(SessionStore::new());
    let orchestrator = Arc::new(MessageOrchestrator::new(
        Arc::clone(&sessions),
        Arc::new(MockTranscoder {
            log: log.clone(),
            fail,
        }),
        Arc::new(MockAgent {
            log: log.clone(),
            fail,
        }),
        Arc::new(MockGateway {
            log: log.clone(),
            fail,
        }),
        SAMPLE_RATE,
    ));
    Harness {
        log,
        sessions,
        orchestrator,
    }
}
