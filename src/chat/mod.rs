//! Conversation state for one chat session.
//!
//! The controller owns an append-only message list and the count of
//! outstanding dispatches. The input form's single pending attachment is
//! modelled by [`AttachmentSlot`].

pub mod attachment;
pub mod controller;
pub mod errors;
pub mod ids;
pub mod message;

pub use attachment::{Attachment, AttachmentSlot};
pub use controller::{ConversationController, ConversationSnapshot, SubmitOutcome};
pub use errors::ChatError;
pub use ids::ChatId;
pub use message::{Message, MessageText};
