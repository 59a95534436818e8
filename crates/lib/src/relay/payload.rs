//! Push request and delivery outcome: the shared contract between the API listener and the relay loop.

use serde::{Deserialize, Serialize};

/// A validated push request as it travels through the queue.
///
/// Wire shape: `{ "message_id", "content"?, "image"?, "callback_url"? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub message_id: String,
    /// Text to send; an empty string yields no text segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `http(s)://` URL or base64-encoded image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Where to POST the delivery outcome once processing is done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl PushRequest {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: None,
            image: None,
            callback_url: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Non-empty callback URL, if any.
    pub fn callback(&self) -> Option<&str> {
        self.callback_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Result of processing one push request; posted to the callback URL.
///
/// `error` is set exactly when `success` is false; only `delivered` and `failed` build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    message_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(message_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
