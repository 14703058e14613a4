//! Translation of the asterisk markup returned by both collaborators into
//! the HTML fragment stored as bot message text.
//!
//! Supported dialect:
//! - `* item` / `- item` at line start: list item
//! - `**bold**` and `**label**:` (the colon moves inside the bold)
//! - `*emphasis*`
//! - newlines: `<br>`
//!
//! Raw text is HTML-escaped first; stray asterisks are dropped.

use regex::Regex;

/// Compiled inline patterns of the markup dialect.
#[derive(Clone, Debug)]
pub struct Markup {
    bold_label: Regex,
    bold: Regex,
    emphasis: Regex,
}

impl Markup {
    /// Compile the markup patterns.
    ///
    /// # Errors
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bold_label: Regex::new(r"\*\*(.+?)\*\*:")?,
            bold: Regex::new(r"\*\*(.+?)\*\*")?,
            emphasis: Regex::new(r"\*([^*\s][^*]*?)\*")?,
        })
    }

    /// Convert raw collaborator text to display HTML.
    #[must_use]
    pub fn to_html(&self, raw: &str) -> String {
        let escaped = escape_html(raw.trim_end());
        escaped
            .lines()
            .map(|line| self.render_line(line))
            .collect::<Vec<_>>()
            .join("<br>")
    }

    fn render_line(&self, line: &str) -> String {
        let trimmed = line.trim_start();
        let item = trimmed
            .strip_prefix("* ")
            .or_else(|| trimmed.strip_prefix("- "));

        match item {
            Some(content) => format!("<li>{}</li>", self.render_inline(content.trim())),
            None => self.render_inline(line),
        }
    }

    fn render_inline(&self, text: &str) -> String {
        let text = self.bold_label.replace_all(text, "<strong>${1}:</strong>");
        let text = self.bold.replace_all(&text, "<strong>${1}</strong>");
        let text = self.emphasis.replace_all(&text, "<em>${1}</em>");
        text.replace('*', "")
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
