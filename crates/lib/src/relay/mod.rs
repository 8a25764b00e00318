//! Request-relay gateway: parse chat text, ask the inference service, turn the result into a reply.

mod gateway;
mod normalize;
mod parser;

pub use gateway::{RelayGateway, GREETING_REPLY, USAGE_REPLY};
pub use normalize::{
    Normalizer, LEGACY_MIN_CONFIDENCE, NO_ANSWER_REPLY, RETRY_LATER_REPLY, SERVICE_ERROR_REPLY,
    UNEXPECTED_REPLY,
};
pub use parser::{parse, ParseError, ParsedQuery, DELIMITER};
