//! Delivery fan-out: send one message to every configured destination, in list order.

use crate::relay::message::MessageChain;
use crate::relay::RelayError;
use async_trait::async_trait;

/// Messaging transport as seen by the relay: deliver a message to one destination.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, destination: &str, message: &MessageChain) -> Result<(), String>;
}

/// Send `message` to each destination sequentially. An empty destination list is a
/// warning, not an error. The first failing destination aborts the rest.
pub async fn deliver(
    sender: &dyn MessageSender,
    destinations: &[String],
    message: &MessageChain,
    message_id: &str,
) -> Result<(), RelayError> {
    if destinations.is_empty() {
        log::warn!("message {}: no destinations configured, skipping delivery", message_id);
        return Ok(());
    }
    for destination in destinations {
        log::info!("message {}: {} to {}", message_id, message, destination);
        sender
            .send(destination, message)
            .await
            .map_err(|reason| RelayError::Delivery {
                destination: destination.clone(),
                reason,
            })?;
    }
    Ok(())
}
