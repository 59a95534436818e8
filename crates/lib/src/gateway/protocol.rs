//! Push API wire types.

use crate::relay::PushRequest;
use serde::{Deserialize, Serialize};

/// Body of `POST /send`. `message_id` is optional; one is assigned when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendParams {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// 200 reply: the request was queued under `message_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendAccepted {
    pub status: String,
    pub message_id: String,
}

/// Error reply body for any non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl SendParams {
    /// Check shape and turn into a queued request. Errors are human-readable reasons for a 400.
    pub fn validate(self) -> Result<PushRequest, String> {
        let content = non_empty(self.content);
        let image = non_empty(self.image).map(|s| s.trim().to_string());
        if content.is_none() && image.is_none() {
            return Err("content or image is required".to_string());
        }
        let callback_url = non_empty(self.callback_url).map(|s| s.trim().to_string());
        if let Some(url) = &callback_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err("callback_url must be an http(s) URL".to_string());
            }
        }
        let message_id = non_empty(self.message_id)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(PushRequest {
            message_id,
            content,
            image,
            callback_url,
        })
    }
}
