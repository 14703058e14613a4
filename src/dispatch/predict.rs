//! Client for the disease prediction endpoint.

use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::dispatch::ServiceFuture;
use crate::dispatch::error::{DispatchError, DispatchResult};
use crate::dispatch::resize::PreparedImage;

/// A collaborator that answers a text message and optional image.
pub trait PredictionService: Send + Sync {
    /// Submit `text` and `image` once and return the reply message.
    fn predict<'a>(
        &'a self,
        text: &'a str,
        image: Option<&'a PreparedImage>,
    ) -> ServiceFuture<'a, DispatchResult<String>>;
}

#[derive(Deserialize)]
struct PredictResponse {
    message: String,
}

/// Multipart HTTP client for `POST /predict`.
pub struct PredictClient {
    client: Client,
    url: String,
}

impl PredictClient {
    /// Create a client posting to `url`.
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn post_predict(&self, text: &str, image: Option<&PreparedImage>) -> DispatchResult<String> {
        let mut form = Form::new().text("message", text.to_string());
        if let Some(image) = image {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(PreparedImage::CONTENT_TYPE)?;
            form = form.part("file", part);
        }

        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: PredictResponse = serde_json::from_slice(&body)?;
        Ok(parsed.message)
    }
}

impl PredictionService for PredictClient {
    fn predict<'a>(
        &'a self,
        text: &'a str,
        image: Option<&'a PreparedImage>,
    ) -> ServiceFuture<'a, DispatchResult<String>> {
        Box::pin(self.post_predict(text, image))
    }
}
