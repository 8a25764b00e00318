//! Client for the downstream question-answering service.
//!
//! One `POST {endpoint}/answer` per user message, bounded by a timeout, mapped to an [`InferenceOutcome`].

mod client;

pub use client::{
    Failure, InferenceBackend, InferenceClient, InferenceOutcome, InferenceResponse,
    DEFAULT_TIMEOUT,
};
