//! Inbound webhook shapes and the classified message variants.
//!
//! Wire structs are lenient so that a webhook with unexpected content still
//! deserializes: scalar fields are optional or defaulted, `null` arrays read
//! as empty, and an array element that does not parse becomes its empty
//! default instead of failing the whole delivery. Presence checks in
//! [`InboundEvent::first_pair`] and classification into [`Message`] are where
//! missing or empty values are caught.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ============================================================================
// Webhook envelope
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<InboundEvent>,
}

/// Any array (or `null`/absent/non-array) into a `Vec`, element by element.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Unreadable webhook element");
                T::default()
            })
        })
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl WebhookPayload {
    /// The event at `entry[0].changes[0].value`, if present.
    pub fn into_first_event(self) -> Option<InboundEvent> {
        self.entry
            .into_iter()
            .next()?
            .changes
            .into_iter()
            .next()?
            .value
    }
}

// ============================================================================
// Event
// ============================================================================

/// One webhook delivery. Only the first contact and first message are acted on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub contacts: Vec<Contact>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub messages: Vec<InboundMessage>,
}

impl InboundEvent {
    /// Presence check on both arrays and the sender id, before any destructuring.
    pub fn first_pair(&self) -> Result<(&Contact, &InboundMessage), ValidationError> {
        let contact = self.contacts.first().ok_or(ValidationError::MissingContacts)?;
        let message = self.messages.first().ok_or(ValidationError::MissingMessages)?;
        if contact.wa_id.trim().is_empty() {
            return Err(ValidationError::MalformedContact);
        }
        Ok((contact, message))
    }

    pub fn text(from: &str, body: &str) -> Self {
        Self {
            contacts: vec![Contact::new(from, "")],
            messages: vec![InboundMessage {
                from: Some(from.to_string()),
                kind: "text".to_string(),
                text: Some(TextPayload {
                    body: body.to_string(),
                }),
                ..Default::default()
            }],
        }
    }

    pub fn audio(from: &str, media_id: &str, mime_type: &str) -> Self {
        Self {
            contacts: vec![Contact::new(from, "")],
            messages: vec![InboundMessage {
                from: Some(from.to_string()),
                kind: "audio".to_string(),
                audio: Some(AudioPayload {
                    id: media_id.to_string(),
                    mime_type: mime_type.to_string(),
                    sha256: None,
                    voice: Some(true),
                }),
                ..Default::default()
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ContactWire")]
pub struct Contact {
    pub wa_id: String,
    pub display_name: String,
}

impl Contact {
    pub fn new(wa_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            wa_id: wa_id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Deserialize)]
struct ContactWire {
    #[serde(default, deserialize_with = "null_as_default")]
    wa_id: String,
    #[serde(default)]
    profile: Option<ProfileWire>,
}

#[derive(Deserialize)]
struct ProfileWire {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
}

impl From<ContactWire> for Contact {
    fn from(wire: ContactWire) -> Self {
        Self {
            wa_id: wire.wa_id,
            display_name: wire.profile.map(|p| p.name).unwrap_or_default(),
        }
    }
}

/// A message as delivered; `kind` selects which payload should be populated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextPayload>,
    #[serde(default)]
    pub audio: Option<AudioPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mime_type: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub voice: Option<bool>,
}

impl InboundMessage {
    pub fn classify(&self) -> Result<Message, ValidationError> {
        let malformed = || ValidationError::MalformedMessage {
            kind: self.kind.clone(),
        };

        match self.kind.as_str() {
            "" => Err(ValidationError::MissingMessageType),
            "text" => match &self.text {
                Some(t) if !t.body.is_empty() => Ok(Message::Text {
                    body: t.body.clone(),
                }),
                _ => Err(malformed()),
            },
            "audio" => match &self.audio {
                Some(a) if !a.id.is_empty() => Ok(Message::Audio {
                    media_id: a.id.clone(),
                    mime_type: a.mime_type.clone(),
                }),
                _ => Err(malformed()),
            },
            other => Ok(Message::Unsupported {
                kind: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Classified message
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text { body: String },
    Audio { media_id: String, mime_type: String },
    Unsupported { kind: String },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text { .. } => MessageKind::Text,
            Message::Audio { .. } => MessageKind::Audio,
            Message::Unsupported { .. } => MessageKind::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Audio,
    Unsupported,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Text => "text",
            MessageKind::Audio => "audio",
            MessageKind::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}
