//! Image attachments and the single-attachment slot of the input form.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// An uploaded file as received from the browser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Attachment {
    /// Original file name.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Create an attachment.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Inline `data:` URI used as the message preview.
    #[must_use]
    pub fn data_uri(&self) -> String {
        let content_type = if self.content_type.is_empty() {
            "application/octet-stream"
        } else {
            &self.content_type
        };
        format!("data:{content_type};base64,{}", STANDARD.encode(&self.bytes))
    }
}

/// Holds at most one pending attachment until send or removal.
#[derive(Debug, Default)]
pub struct AttachmentSlot {
    current: Option<Attachment>,
}

impl AttachmentSlot {
    /// Select a file, replacing any previous selection.
    ///
    /// Returns the replaced attachment.
    pub const fn select(&mut self, attachment: Attachment) -> Option<Attachment> {
        self.current.replace(attachment)
    }

    /// Cancel the selection. Returns whether something was removed.
    pub fn remove(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// Empty the slot for sending.
    pub const fn take(&mut self) -> Option<Attachment> {
        self.current.take()
    }

    /// Borrow the current selection.
    #[must_use]
    pub const fn peek(&self) -> Option<&Attachment> {
        self.current.as_ref()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let attachment = Attachment::new("a.png", "image/png", vec![0, 1, 2]);
        assert_eq!(attachment.data_uri(), "data:image/png;base64,AAEC");

        let untyped = Attachment::new("a", "", vec![]);
        assert_eq!(untyped.data_uri(), "data:application/octet-stream;base64,");
    }

    #[test]
    fn test_slot_holds_at_most_one() {
        let mut slot = AttachmentSlot::default();
        assert!(slot.is_empty());

        assert!(slot.select(Attachment::new("a.png", "image/png", vec![1])).is_none());
        let replaced = slot.select(Attachment::new("b.png", "image/png", vec![2]));
        assert_eq!(replaced.map(|a| a.file_name), Some("a.png".to_string()));
        assert_eq!(slot.peek().map(|a| a.file_name.as_str()), Some("b.png"));
    }

    #[test]
    fn test_slot_take_and_remove_clear() {
        let mut slot = AttachmentSlot::default();
        slot.select(Attachment::new("a.png", "image/png", vec![1]));
        assert!(slot.take().is_some());
        assert!(slot.is_empty());
        assert!(slot.take().is_none());

        slot.select(Attachment::new("b.png", "image/png", vec![2]));
        assert!(slot.remove());
        assert!(!slot.remove());
        assert!(slot.is_empty());
    }
}
