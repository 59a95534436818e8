//! Telegram channel: deliver message segments via the Bot API (sendMessage, sendPhoto).

use crate::channels::registry::ChannelHandle;
use crate::relay::{ImageSegment, MessageChain, Segment};
use async_trait::async_trait;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel connector. Conversation ids are chat ids.
pub struct TelegramChannel {
    id: String,
    token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Option<String>) -> Self {
        Self::with_api_base(token, telegram_api_base())
    }

    /// Use a custom Bot API endpoint (self-hosted server or tests).
    pub fn with_api_base(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            id: "telegram".to_string(),
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> Result<String, String> {
        let token = self
            .token
            .as_ref()
            .ok_or("telegram bot token not configured")?;
        Ok(format!("{}/bot{}/{}", self.api_base, token, method))
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let url = self.method_url("sendMessage")?;
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        check_response("sendMessage", res).await
    }

    /// Send a photo: URLs are passed to Telegram to fetch, inline bytes are uploaded.
    pub async fn send_photo(&self, chat_id: &str, image: &ImageSegment) -> Result<(), String> {
        let url = self.method_url("sendPhoto")?;
        let req = match image {
            ImageSegment::Url(photo) => self
                .client
                .post(&url)
                .json(&serde_json::json!({ "chat_id": chat_id, "photo": photo })),
            ImageSegment::Bytes { data, format } => {
                let ext = format.extensions_str().first().copied().unwrap_or("img");
                let part = reqwest::multipart::Part::bytes(data.clone())
                    .file_name(format!("image.{}", ext))
                    .mime_str(format.to_mime_type())
                    .map_err(|e| e.to_string())?;
                let form = reqwest::multipart::Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part("photo", part);
                self.client.post(&url).multipart(form)
            }
        };
        let res = req.send().await.map_err(|e| e.to_string())?;
        check_response("sendPhoto", res).await
    }
}

async fn check_response(method: &str, res: reqwest::Response) -> Result<(), String> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(format!("{} failed: {} {}", method, status, body));
    }
    Ok(())
}

#[async_trait]
impl ChannelHandle for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, conversation_id: &str, message: &MessageChain) -> Result<(), String> {
        if message.is_empty() {
            log::debug!("telegram: empty message for chat {}, nothing to send", conversation_id);
            return Ok(());
        }
        for segment in &message.segments {
            match segment {
                Segment::Text(text) => self.send_text(conversation_id, text).await?,
                Segment::Image(image) => self.send_photo(conversation_id, image).await?,
            }
        }
        Ok(())
    }
}

/// Resolve Telegram bot API base URL (env TELEGRAM_API_BASE overrides the public endpoint).
pub fn telegram_api_base() -> String {
    std::env::var("TELEGRAM_API_BASE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| TELEGRAM_API_BASE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Bytes,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// (method, content-type, body) per Bot API call.
    type Calls = Arc<Mutex<Vec<(String, String, Vec<u8>)>>>;

    async fn fake_bot_api(status: StatusCode) -> (String, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/:bot/:method",
                post(
                    move |State(calls): State<Calls>,
                          Path((_bot, method)): Path<(String, String)>,
                          headers: HeaderMap,
                          body: Bytes| async move {
                        let ct = headers
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        calls.lock().await.push((method, ct, body.to_vec()));
                        status
                    },
                ),
            )
            .with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), calls)
    }

    #[tokio::test]
    async fn sends_segments_in_order() {
        let (base, calls) = fake_bot_api(StatusCode::OK).await;
        let tg = TelegramChannel::with_api_base(Some("T".to_string()), base);
        let chain = MessageChain {
            segments: vec![
                Segment::Text("hello".to_string()),
                Segment::Image(ImageSegment::Url("https://x/cat.png".to_string())),
                Segment::Image(ImageSegment::Bytes {
                    data: vec![1, 2, 3],
                    format: image::ImageFormat::Png,
                }),
            ],
        };
        tg.send_message("42", &chain).await.unwrap();

        let calls = calls.lock().await;
        let methods: Vec<&str> = calls.iter().map(|(m, _, _)| m.as_str()).collect();
        assert_eq!(methods, vec!["sendMessage", "sendPhoto", "sendPhoto"]);

        let text: serde_json::Value = serde_json::from_slice(&calls[0].2).unwrap();
        assert_eq!(text, serde_json::json!({ "chat_id": "42", "text": "hello" }));
        let photo: serde_json::Value = serde_json::from_slice(&calls[1].2).unwrap();
        assert_eq!(photo["photo"], "https://x/cat.png");
        assert!(calls[2].1.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn api_error_is_returned() {
        let (base, _calls) = fake_bot_api(StatusCode::BAD_REQUEST).await;
        let tg = TelegramChannel::with_api_base(Some("T".to_string()), base);
        let chain = MessageChain {
            segments: vec![Segment::Text("hello".to_string())],
        };
        let err = tg.send_message("42", &chain).await.unwrap_err();
        assert!(err.starts_with("sendMessage failed: 400"), "{}", err);
    }

    #[tokio::test]
    async fn missing_token_fails_without_network() {
        let tg = TelegramChannel::with_api_base(None, "http://127.0.0.1:9");
        let chain = MessageChain {
            segments: vec![Segment::Text("hello".to_string())],
        };
        assert_eq!(
            tg.send_message("42", &chain).await.unwrap_err(),
            "telegram bot token not configured"
        );
        assert!(tg.send_message("42", &MessageChain::default()).await.is_ok());
    }
}
