pub mod event;
pub mod outcome;
pub mod session;

pub use event::{Contact, InboundEvent, InboundMessage, Message, MessageKind, WebhookPayload};
pub use outcome::{Outcome, SendReceipt};
pub use session::Session;
