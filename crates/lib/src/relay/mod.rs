//! Relay core: queued push requests become delivered messages and outcome callbacks.
//!
//! Flow: API listener → [`queue`] → [`relay_loop`] → [`message`] (with [`image`]) →
//! [`delivery`] → destinations, then [`callback`] back to the caller.

pub mod callback;
pub mod delivery;
pub mod image;
pub mod message;
pub mod payload;
pub mod queue;
pub mod relay_loop;

pub use callback::CallbackReporter;
pub use delivery::{deliver, MessageSender};
pub use image::{resolve_image, ResolvedImage};
pub use message::{build_message, ImageSegment, MessageChain, Segment};
pub use payload::{DeliveryOutcome, PushRequest};
pub use queue::{QueueConsumer, QueueDrain, QueueProducer};
pub use relay_loop::RelayLoop;

/// Canonical failure text for any unusable image field.
pub const UNSUPPORTED_IMAGE_FORMAT: &str = "unsupported image format";

/// Why a push request failed. The `Display` text is what the caller sees in the outcome.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The reason is kept for logs; callers only see the canonical message.
    #[error("unsupported image format")]
    UnsupportedImageFormat(String),
    #[error("delivery to {destination} failed: {reason}")]
    Delivery { destination: String, reason: String },
    #[error("internal error: {0}")]
    Internal(String),
}

/// Service lifecycle shared between the owner, the relay loop and the API listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_image_display_hides_reason() {
        let e = RelayError::UnsupportedImageFormat("base64 decode: invalid byte".to_string());
        assert_eq!(e.to_string(), UNSUPPORTED_IMAGE_FORMAT);
    }
}
