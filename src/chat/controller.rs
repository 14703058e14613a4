//! Conversation controller: the user-message / bot-reply sequencing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::chat::attachment::Attachment;
use crate::chat::errors::ChatError;
use crate::chat::message::Message;
use crate::dispatch::{ChatMode, Dispatcher};

/// How a submission settled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    /// A bot reply was appended.
    Delivered,
    /// The dispatch failed and was logged. Only the user message was appended.
    NoReply,
}

/// Point-in-time view of a conversation for rendering.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationSnapshot {
    /// Collaborator routing for this conversation.
    pub mode: ChatMode,
    /// Whether any loading indicator is shown.
    pub loading: bool,
    /// Number of loading indicators (one per outstanding dispatch).
    pub pending: usize,
    /// Messages in append order.
    pub messages: Vec<Message>,
}

/// Owns the message list and the outstanding-dispatch count for one chat.
pub struct ConversationController {
    mode: ChatMode,
    dispatcher: Arc<Dispatcher>,
    messages: RwLock<Vec<Message>>,
    outstanding: AtomicUsize,
}

/// One loading indicator; removed when the dispatch settles or is dropped.
struct LoadingIndicator<'a>(&'a AtomicUsize);

impl<'a> LoadingIndicator<'a> {
    fn raise(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingIndicator<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConversationController {
    /// Create an empty conversation routed by `mode`.
    #[must_use]
    pub fn new(mode: ChatMode, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            mode,
            dispatcher,
            messages: RwLock::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// The fixed chat mode.
    #[must_use]
    pub const fn mode(&self) -> ChatMode {
        self.mode
    }

    /// Number of dispatches still in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Whether a loading indicator is shown.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending() > 0
    }

    /// Copy of the message list.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Messages plus loading state.
    pub async fn snapshot(&self) -> ConversationSnapshot {
        let messages = self.messages().await;
        let pending = self.pending();
        ConversationSnapshot {
            mode: self.mode,
            loading: pending > 0,
            pending,
            messages,
        }
    }

    /// Submit user input.
    ///
    /// The user message is appended before any network I/O. A successful
    /// dispatch appends one bot message; a failed one is logged and leaves
    /// the conversation showing only the user message.
    ///
    /// # Errors
    /// Returns [`ChatError::EmptySubmission`] when there is neither
    /// non-blank text nor an attachment. Nothing is appended in that case.
    pub async fn submit(
        &self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<SubmitOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(ChatError::EmptySubmission);
        }

        let file_url = attachment.as_ref().map(Attachment::data_uri);
        self.messages
            .write()
            .await
            .push(Message::user(text, file_url));

        let _indicator = LoadingIndicator::raise(&self.outstanding);
        debug!(
            mode = %self.mode,
            has_attachment = attachment.is_some(),
            "dispatching user message"
        );

        match self.dispatcher.send(text, attachment, self.mode).await {
            Ok(reply) => {
                self.messages.write().await.push(Message::bot(reply));
                info!(mode = %self.mode, "bot reply delivered");
                Ok(SubmitOutcome::Delivered)
            }
            Err(e) => {
                error!(mode = %self.mode, kind = e.kind(), "Error sending message: {e}");
                Ok(SubmitOutcome::NoReply)
            }
        }
    }
}
