use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Reasons an inbound event carries nothing actionable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event has no contacts")]
    MissingContacts,

    #[error("event has no messages")]
    MissingMessages,

    #[error("contact has no wa_id")]
    MalformedContact,

    #[error("message has no type")]
    MissingMessageType,

    #[error("message of type '{kind}' is missing its '{kind}' payload")]
    MalformedMessage { kind: String },
}
