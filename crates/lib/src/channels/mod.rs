//! Messaging transports (e.g. Telegram).
//!
//! Channel trait and registry so the relay can deliver messages to destinations of the
//! form `<channel_id>:<conversation_id>` without knowing which transport serves them.

mod registry;
mod telegram;

pub use registry::{parse_destination, ChannelHandle, ChannelRegistry, RegistrySender};
pub use telegram::TelegramChannel;
