//! Inbound events from a channel: delivered to the relay gateway, one per user turn.

/// A text message from a chat. `chat_id` is opaque and only used to route the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: String,
    pub text: String,
}

/// What the user sent: a bot command (`/start`) or free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Command name without the leading `/` or a `@botname` suffix, lowercased.
    Command { chat_id: String, name: String },
    Text(InboundMessage),
}

impl InboundEvent {
    /// Classify raw message text. Only a well-formed `/name` or `/name@bot` at the very start
    /// is a command; anything else starting with `/` (paths, `/ | ...`) is free text.
    pub fn from_text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        let text = text.into();
        if let Some(name) = command_name(&text) {
            return InboundEvent::Command { chat_id, name };
        }
        InboundEvent::Text(InboundMessage { chat_id, text })
    }

    pub fn chat_id(&self) -> &str {
        match self {
            InboundEvent::Command { chat_id, .. } => chat_id,
            InboundEvent::Text(msg) => &msg.chat_id,
        }
    }
}

const MAX_COMMAND_LEN: usize = 32;

fn is_command_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lowercased command name when `text` starts with a Telegram bot command.
fn command_name(text: &str) -> Option<String> {
    let word = text.strip_prefix('/')?.split(char::is_whitespace).next()?;
    let (name, bot) = match word.split_once('@') {
        Some((name, bot)) => (name, Some(bot)),
        None => (word, None),
    };
    if !is_command_word(name) || name.len() > MAX_COMMAND_LEN {
        return None;
    }
    if bot.is_some_and(|b| !is_command_word(b)) {
        return None;
    }
    Some(name.to_lowercase())
}
