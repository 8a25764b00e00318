//! Messaging channels (Telegram).
//!
//! A channel turns platform updates into [`InboundEvent`]s and delivers reply text
//! back through [`ChannelHandle::send_message`].

mod handle;
mod inbound;
mod telegram;

pub use handle::{ChannelError, ChannelHandle};
pub use inbound::{InboundEvent, InboundMessage};
pub use telegram::{TelegramChannel, TelegramUpdate, TELEGRAM_API_BASE};
