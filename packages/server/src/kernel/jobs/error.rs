//! Processor failure taxonomy and retry classification.
//!
//! Processors return a [`ProcessorError`]; the worker asks [`ProcessorError::kind`]
//! whether the failure is worth retrying and composes the dead-letter
//! message from the classification tag. No raw `anyhow::Error` crosses the
//! worker boundary.

use std::time::Duration;

use thiserror::Error;

/// Retry classification for a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient failure; retry if attempts remain.
    Retryable,
    /// Will never succeed; dead-letter immediately.
    Permanent,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }

    /// Tag used in composite dead-letter messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Retryable => "retryable",
            ErrorKind::Permanent => "permanent",
        }
    }
}

/// A failed processor attempt.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The input reference resolves to nothing.
    #[error("input not found: {0}")]
    InputNotFound(String),

    /// No processor is registered for the job type.
    #[error("unsupported job type: {0}")]
    UnsupportedType(String),

    /// Required metadata absent for generate/bind.
    #[error("missing job metadata: {0}")]
    MetadataMissing(String),

    /// Spec normalization or validation failed.
    #[error("invalid template spec: {0}")]
    SpecMalformed(String),

    /// The job's input is of a kind this processor does not handle.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// The renderer produced nothing to persist.
    #[error("empty render result: {0}")]
    EmptyResult(String),

    /// The renderer collaborator returned an error.
    #[error("renderer failure: {0}")]
    Renderer(String),

    /// The object-store upload failed.
    #[error("upload failed: {0}")]
    Upload(String),

    /// A persistence call failed while recording the outcome.
    #[error("store failure: {0}")]
    Store(String),

    /// The per-job deadline elapsed.
    #[error("job timed out after {0:?}")]
    Timeout(Duration),

    /// The AI collaborator failed or returned an unusable result.
    #[error("ai provider failure: {0}")]
    Ai(String),
}

impl ProcessorError {
    /// Classify the failure for the retry decision.
    ///
    /// Renderer failures are retryable unless the message signals the spec
    /// itself was rejected.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::InputNotFound(_)
            | ProcessorError::UnsupportedType(_)
            | ProcessorError::MetadataMissing(_)
            | ProcessorError::SpecMalformed(_)
            | ProcessorError::UnsupportedInput(_)
            | ProcessorError::EmptyResult(_) => ErrorKind::Permanent,

            ProcessorError::Renderer(message) => {
                let message = message.to_ascii_lowercase();
                if message.contains("invalid spec") || message.contains("invalid template spec") {
                    ErrorKind::Permanent
                } else {
                    ErrorKind::Retryable
                }
            }

            ProcessorError::Upload(_)
            | ProcessorError::Store(_)
            | ProcessorError::Timeout(_)
            | ProcessorError::Ai(_) => ErrorKind::Retryable,
        }
    }
}

impl From<deckspec::SpecError> for ProcessorError {
    fn from(err: deckspec::SpecError) -> Self {
        ProcessorError::SpecMalformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failures_are_permanent() {
        assert_eq!(
            ProcessorError::InputNotFound("v9".into()).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            ProcessorError::MetadataMissing("prompt".into()).kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            ProcessorError::SpecMalformed("layouts empty".into()).kind(),
            ErrorKind::Permanent
        );
    }

    #[test]
    fn infrastructure_failures_are_retryable() {
        assert_eq!(
            ProcessorError::Upload("connection reset".into()).kind(),
            ErrorKind::Retryable
        );
        assert_eq!(
            ProcessorError::Timeout(Duration::from_secs(2)).kind(),
            ErrorKind::Retryable
        );
        assert_eq!(
            ProcessorError::Ai("rate limited".into()).kind(),
            ErrorKind::Retryable
        );
    }

    #[test]
    fn renderer_failures_classify_by_message() {
        assert_eq!(
            ProcessorError::Renderer("socket closed".into()).kind(),
            ErrorKind::Retryable
        );
        assert_eq!(
            ProcessorError::Renderer("Invalid spec: placeholder off-canvas".into()).kind(),
            ErrorKind::Permanent
        );
    }

    #[test]
    fn metadata_error_message_is_stable() {
        // Clients grep for this phrase when diagnosing dead letters.
        let err = ProcessorError::MetadataMissing("generation metadata required".into());
        assert!(err.to_string().contains("missing job metadata"));
    }
}
