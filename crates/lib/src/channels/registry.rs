//! Channel registry: register and lookup channels by id, and route relay deliveries to them.

use crate::relay::{MessageChain, MessageSender};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle to a channel connector that can deliver messages.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "telegram").
    fn id(&self) -> &str;
    /// Deliver a message to a conversation (e.g. Telegram chat_id), segments in order.
    async fn send_message(&self, conversation_id: &str, message: &MessageChain) -> Result<(), String>;
}

/// Registry of channel ids to handles. Shared between the service and the relay.
#[derive(Clone)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn ChannelHandle>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a handle under its own id, replacing any previous one.
    pub async fn register(&self, handle: Arc<dyn ChannelHandle>) {
        let id = handle.id().to_string();
        let mut g = self.inner.write().await;
        if g.insert(id.clone(), handle).is_some() {
            log::debug!("channel {} re-registered", id);
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn ChannelHandle>> {
        let g = self.inner.read().await;
        g.get(id).cloned()
    }

    pub async fn ids(&self) -> Vec<String> {
        let g = self.inner.read().await;
        let mut ids: Vec<String> = g.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Split `<channel_id>:<conversation_id>`; both parts must be non-empty.
pub fn parse_destination(destination: &str) -> Option<(&str, &str)> {
    let (channel, conversation) = destination.trim().split_once(':')?;
    let (channel, conversation) = (channel.trim(), conversation.trim());
    if channel.is_empty() || conversation.is_empty() {
        None
    } else {
        Some((channel, conversation))
    }
}

/// [`MessageSender`] that resolves each destination through a [`ChannelRegistry`].
#[derive(Clone)]
pub struct RegistrySender {
    registry: ChannelRegistry,
}

impl RegistrySender {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl MessageSender for RegistrySender {
    async fn send(&self, destination: &str, message: &MessageChain) -> Result<(), String> {
        let (channel_id, conversation_id) = parse_destination(destination)
            .ok_or_else(|| format!("malformed destination {:?} (expected channel:conversation)", destination))?;
        let handle = self
            .registry
            .get(channel_id)
            .await
            .ok_or_else(|| format!("unknown channel: {}", channel_id))?;
        handle.send_message(conversation_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::Segment;
    use std::sync::Mutex;

    struct FakeChannel {
        sent: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl ChannelHandle for FakeChannel {
        fn id(&self) -> &str {
            "fake"
        }

        async fn send_message(&self, conversation_id: &str, message: &MessageChain) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), message.len()));
            Ok(())
        }
    }

    #[test]
    fn parse_destination_splits_at_first_colon() {
        assert_eq!(parse_destination("telegram:123"), Some(("telegram", "123")));
        assert_eq!(
            parse_destination("aiocqhttp:GroupMessage:42"),
            Some(("aiocqhttp", "GroupMessage:42"))
        );
        assert_eq!(parse_destination("telegram"), None);
        assert_eq!(parse_destination(":123"), None);
        assert_eq!(parse_destination("telegram: "), None);
    }

    #[tokio::test]
    async fn routes_to_registered_channel() {
        let registry = ChannelRegistry::new();
        let fake = Arc::new(FakeChannel {
            sent: Mutex::new(Vec::new()),
        });
        registry.register(fake.clone()).await;
        assert_eq!(registry.ids().await, vec!["fake".to_string()]);

        let sender = RegistrySender::new(registry);
        let chain = MessageChain {
            segments: vec![Segment::Text("hi".to_string())],
        };
        sender.send("fake:room-1", &chain).await.unwrap();
        assert_eq!(
            fake.sent.lock().unwrap().as_slice(),
            &[("room-1".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn unknown_or_malformed_destination_fails() {
        let sender = RegistrySender::new(ChannelRegistry::new());
        let chain = MessageChain::default();
        let err = sender.send("nope:1", &chain).await.unwrap_err();
        assert_eq!(err, "unknown channel: nope");
        assert!(sender.send("nocolon", &chain).await.is_err());
    }
}
