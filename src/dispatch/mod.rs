//! Outbound dispatch of user messages.
//!
//! A message goes through three steps:
//! - an attached image is rescaled and re-encoded as JPEG
//! - the message is routed by [`ChatMode`] to the generative-text service
//!   or to the prediction service
//! - the reply is translated from asterisk markup to HTML
//!
//! Every call is a single attempt. Failures are returned to the caller.

pub mod error;
pub mod generative;
pub mod markup;
pub mod predict;
pub mod resize;

pub use error::{DispatchError, DispatchResult};
pub use generative::{GeminiClient, GenerativeService};
pub use markup::Markup;
pub use predict::{PredictClient, PredictionService};
pub use resize::PreparedImage;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chat::attachment::Attachment;
use crate::config::AppConfig;

/// Boxed future type for collaborator calls.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persona prefix prepended to every free-chat prompt.
pub const TRIAGE_PERSONA_PROMPT: &str = "You are Doctor Chat Bot, a virtual health assistant. \
Only discuss medical symptoms and health concerns. Ask short follow-up questions about the \
user's symptoms, suggest possible common causes and sensible self-care, and say clearly when \
the user should see a doctor or seek emergency care. Never claim a definitive diagnosis. \
If the message is not about health, politely steer the conversation back to symptoms.\n\n\
User message: ";

/// Which external collaborator handles a chat. Fixed for the life of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Free text to the generative-language service with the triage persona.
    FreeChat,
    /// Text and optional image to the prediction service.
    Predict,
}

impl ChatMode {
    /// Map the `is_free_chat` navigation flag to a mode.
    #[must_use]
    pub const fn from_free_chat(is_free_chat: bool) -> Self {
        if is_free_chat { Self::FreeChat } else { Self::Predict }
    }

    /// Stable string form for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeChat => "free_chat",
            Self::Predict => "predict",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the free-chat prompt for `text`.
#[must_use]
pub fn triage_prompt(text: &str) -> String {
    let mut prompt = String::with_capacity(TRIAGE_PERSONA_PROMPT.len() + text.len());
    prompt.push_str(TRIAGE_PERSONA_PROMPT);
    prompt.push_str(text);
    prompt
}

/// Routes messages to the collaborator for their chat mode.
pub struct Dispatcher {
    generative: Arc<dyn GenerativeService>,
    prediction: Arc<dyn PredictionService>,
    markup: Markup,
}

impl Dispatcher {
    /// Create a dispatcher over the given collaborators.
    ///
    /// # Errors
    /// Returns an error if the markup patterns fail to compile.
    pub fn new(
        generative: Arc<dyn GenerativeService>,
        prediction: Arc<dyn PredictionService>,
    ) -> DispatchResult<Self> {
        Ok(Self {
            generative,
            prediction,
            markup: Markup::new()?,
        })
    }

    /// Build the HTTP collaborators described by `config`. Both share one client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        let generative = GeminiClient::from_config(client.clone(), config);
        let prediction = PredictClient::new(client, config.predict_url.clone());
        Self::new(Arc::new(generative), Arc::new(prediction))
    }

    /// Send one message and return the reply as display HTML.
    ///
    /// Image decoding and re-encoding run on the blocking pool.
    ///
    /// # Errors
    /// Returns the first image, transport, status or decoding failure.
    pub async fn send(
        &self,
        text: &str,
        attachment: Option<Attachment>,
        mode: ChatMode,
    ) -> DispatchResult<String> {
        let started = Instant::now();
        let image = match attachment {
            Some(attachment) => Some(
                tokio::task::spawn_blocking(move || {
                    resize::rescale_to_jpeg(&attachment.bytes, &attachment.file_name)
                })
                .await??,
            ),
            None => None,
        };

        let raw = match mode {
            ChatMode::FreeChat => self.generative.generate(&triage_prompt(text)).await?,
            ChatMode::Predict => self.prediction.predict(text, image.as_ref()).await?,
        };

        tracing::debug!(
            mode = %mode,
            elapsed = ?started.elapsed(),
            "collaborator replied"
        );
        Ok(self.markup.to_html(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
        predictions: Mutex<Vec<(String, Option<(u32, u32)>)>>,
    }

    impl GenerativeService for Recorder {
        fn generate<'a>(&'a self, prompt: &'a str) -> ServiceFuture<'a, DispatchResult<String>> {
            Box::pin(async move {
                self.prompts.lock().unwrap().push(prompt.to_string());
                Ok("**Rest**: stay hydrated".to_string())
            })
        }
    }

    impl PredictionService for Recorder {
        fn predict<'a>(
            &'a self,
            text: &'a str,
            image: Option<&'a PreparedImage>,
        ) -> ServiceFuture<'a, DispatchResult<String>> {
            Box::pin(async move {
                self.predictions
                    .lock()
                    .unwrap()
                    .push((text.to_string(), image.map(|i| (i.width, i.height))));
                Ok("* Likely *eczema*".to_string())
            })
        }
    }

    fn png_attachment(width: u32, height: u32) -> Attachment {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 10]));
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        Attachment::new("skin.png", "image/png", buf.into_inner())
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(ChatMode::from_free_chat(true), ChatMode::FreeChat);
        assert_eq!(ChatMode::from_free_chat(false), ChatMode::Predict);
        assert_eq!(ChatMode::Predict.to_string(), "predict");
    }

    #[test]
    fn test_triage_prompt_has_persona_prefix() {
        let prompt = triage_prompt("I have a headache");
        assert!(prompt.starts_with(TRIAGE_PERSONA_PROMPT));
        assert!(prompt.ends_with("I have a headache"));
    }

    #[tokio::test]
    async fn test_free_chat_routes_to_generative_with_persona() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), recorder.clone()).unwrap();

        let reply = dispatcher
            .send("sore throat", None, ChatMode::FreeChat)
            .await
            .unwrap();

        assert_eq!(reply, "<strong>Rest:</strong> stay hydrated");
        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(TRIAGE_PERSONA_PROMPT));
        assert!(recorder.predictions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_predict_routes_rescaled_image() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), recorder.clone()).unwrap();
        let attachment = png_attachment(1200, 1200);

        let reply = dispatcher
            .send("itchy", Some(attachment), ChatMode::Predict)
            .await
            .unwrap();

        assert_eq!(reply, "<li>Likely <em>eczema</em></li>");
        let predictions = recorder.predictions.lock().unwrap();
        assert_eq!(
            predictions.as_slice(),
            &[("itchy".to_string(), Some((600, 600)))]
        );
        assert!(recorder.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_attachment_fails_before_any_call() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(recorder.clone(), recorder.clone()).unwrap();
        let attachment = Attachment::new("x.png", "image/png", b"nope".to_vec());

        let result = dispatcher
            .send("itchy", Some(attachment), ChatMode::Predict)
            .await;

        assert!(matches!(result, Err(DispatchError::Image(_))));
        assert!(recorder.predictions.lock().unwrap().is_empty());
    }
}
