//! Map an [`InferenceOutcome`] to the text sent back to the user.

use crate::inference::{Failure, InferenceOutcome};

/// Sent when the inference service could not be reached or timed out.
pub const RETRY_LATER_REPLY: &str =
    "Sorry, the answering service is not available right now. Please try again later.";

/// Sent when the service returned a non-200 status.
pub const SERVICE_ERROR_REPLY: &str =
    "Sorry, the answering service failed to process your question. Please try again later.";

/// Sent when a 200 body carried neither `answer` nor `error`.
pub const UNEXPECTED_REPLY: &str = "Unexpected response from the API.";

/// Sent instead of an answer whose confidence is below the configured threshold.
pub const NO_ANSWER_REPLY: &str = "Sorry, I couldn't find the answer.";

/// Cutoff used by earlier bot revisions. Not applied unless configured.
pub const LEGACY_MIN_CONFIDENCE: f64 = 1e-5;

/// Turns outcomes into reply text. `min_confidence` suppresses low-score answers when set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub min_confidence: Option<f64>,
}

impl Normalizer {
    pub fn new(min_confidence: Option<f64>) -> Self {
        Self { min_confidence }
    }

    pub fn normalize(&self, outcome: &InferenceOutcome) -> String {
        match outcome {
            InferenceOutcome::Answered { text, score } => {
                if self.below_threshold(*score) {
                    NO_ANSWER_REPLY.to_string()
                } else {
                    format!("Answer: {}", text)
                }
            }
            InferenceOutcome::Failed(Failure::Application { reason }) => {
                format!("Error: {}", reason)
            }
            InferenceOutcome::Failed(Failure::Status { .. }) => SERVICE_ERROR_REPLY.to_string(),
            InferenceOutcome::Failed(Failure::Unexpected) => UNEXPECTED_REPLY.to_string(),
            InferenceOutcome::Failed(Failure::Unreachable { .. }) => RETRY_LATER_REPLY.to_string(),
        }
    }

    /// Answers without a score always pass.
    fn below_threshold(&self, score: Option<f64>) -> bool {
        match (self.min_confidence, score) {
            (Some(min), Some(s)) => s < min,
            _ => false,
        }
    }
}
