//! Per-message orchestration: parse → call → normalize → reply.

use crate::channels::{ChannelError, ChannelHandle, InboundEvent};
use crate::inference::{Failure, InferenceBackend, InferenceOutcome};
use crate::relay::normalize::Normalizer;
use crate::relay::parser::{self, ParseError};
use std::sync::Arc;

/// Reply to text without a delimiter.
pub const USAGE_REPLY: &str = "Please provide input in the format: 'Context | Question'\n\
Example:\n\
The Transformers library provides NLP tools. | What does it provide?";

/// Reply to `/start` and `/help`.
pub const GREETING_REPLY: &str = "Hello! I'm a Question Answering Bot. Send me a message in the format:\n\n\
Context | Question\n\n\
Example:\n\
The Transformers library provides NLP tools. | What does it provide?";

/// Relays user messages to an inference backend. Holds no per-message state; clone freely.
pub struct RelayGateway<B: ?Sized> {
    backend: Arc<B>,
    normalizer: Normalizer,
}

impl<B: ?Sized> Clone for RelayGateway<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            normalizer: self.normalizer,
        }
    }
}

impl<B: InferenceBackend + ?Sized> RelayGateway<B> {
    pub fn new(backend: Arc<B>, normalizer: Normalizer) -> Self {
        Self { backend, normalizer }
    }

    /// Reply for one event, or `None` for commands the bot does not handle.
    pub async fn handle(&self, event: &InboundEvent) -> Option<String> {
        match event {
            InboundEvent::Command { name, chat_id } => match name.as_str() {
                "start" | "help" => Some(GREETING_REPLY.to_string()),
                other => {
                    log::debug!("relay: ignoring command /{} from chat {}", other, chat_id);
                    None
                }
            },
            InboundEvent::Text(msg) => Some(self.handle_text(&msg.text).await),
        }
    }

    /// Reply for free text. Always produces exactly one reply.
    pub async fn handle_text(&self, text: &str) -> String {
        let query = match parser::parse(text) {
            Ok(q) => q,
            Err(ParseError::MissingDelimiter) => {
                log::debug!("relay: input without delimiter, sending usage");
                return USAGE_REPLY.to_string();
            }
        };
        let outcome = self.backend.call(&query).await;
        match &outcome {
            InferenceOutcome::Answered { score, .. } => {
                log::debug!("relay: answered (score {:?})", score);
            }
            InferenceOutcome::Failed(Failure::Unreachable { cause }) => {
                log::error!("relay: inference service unreachable: {}", cause);
            }
            InferenceOutcome::Failed(f) => {
                log::warn!("relay: inference failed: {}", f);
            }
        }
        self.normalizer.normalize(&outcome)
    }

    /// Handle an event and deliver the reply through `channel`. Ignored commands send nothing.
    pub async fn dispatch(
        &self,
        event: &InboundEvent,
        channel: &dyn ChannelHandle,
    ) -> Result<(), ChannelError> {
        let Some(reply) = self.handle(event).await else {
            return Ok(());
        };
        channel.send_message(event.chat_id(), &reply).await
    }
}
