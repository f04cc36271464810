pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod speech;

pub use agent::{AgentError, ConversationalAgent, DialogflowAgent, DialogflowClient};
pub use auth::{AuthError, GoogleTokenSource, StaticToken, TokenSource};
pub use config::BridgeConfig;
pub use error::{BridgeError, ValidationError};
pub use gateway::{GatewayError, MessagingGateway, WhatsAppClient};
pub use models::{
    Contact, InboundEvent, InboundMessage, Message, MessageKind, Outcome, SendReceipt, Session,
    WebhookPayload,
};
pub use speech::{SpeechError, SpeechSynthesizer, TextToSpeechClient};
