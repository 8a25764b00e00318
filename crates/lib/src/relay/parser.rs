//! Split raw chat text into a `(context, question)` pair.

use serde::Serialize;

/// Separates context from question in user input.
pub const DELIMITER: char = '|';

/// A parsed user query. Serialized as the inference request body: `{ "context", "question" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub context: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("input does not contain the '|' delimiter")]
    MissingDelimiter,
}

/// Split on the first `|` and trim both halves. Empty halves are accepted as-is.
pub fn parse(raw: &str) -> Result<ParsedQuery, ParseError> {
    let (context, question) = raw
        .split_once(DELIMITER)
        .ok_or(ParseError::MissingDelimiter)?;
    Ok(ParsedQuery {
        context: context.trim().to_string(),
        question: question.trim().to_string(),
    })
}
