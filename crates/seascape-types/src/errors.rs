//! # Error Types
//!
//! Errors raised while building or decoding bus values.

use thiserror::Error;

/// Errors from parsing or building a [`crate::Topic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    /// Fewer than two segments were supplied.
    #[error("at least organization and project required, got {segments} segment(s)")]
    TooShort { segments: usize },

    /// More than six segments were supplied.
    #[error("topic has {segments} segments, at most 6 allowed")]
    TooLong { segments: usize },

    /// JSON input was not a topic object.
    #[error("invalid topic json: {0}")]
    InvalidJson(String),
}

/// Errors from encoding or decoding an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Bytes were not a JSON object.
    #[error("failed to parse envelope: {0}")]
    Parse(String),

    /// A required key was absent.
    #[error("envelope is missing the '{0}' field")]
    MissingField(&'static str),

    /// A key was present with the wrong JSON shape.
    #[error("envelope field '{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// Broadcast bytes contained no `{`.
    #[error("broadcast has no reply payload")]
    MissingPayload,

    /// Broadcast topic was not UTF-8, or contained `{`.
    #[error("invalid broadcast topic: {0}")]
    InvalidTopic(String),

    /// Serialization failed.
    #[error("failed to encode envelope: {0}")]
    Encode(String),
}

/// Errors from the typed [`crate::Params`] accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// The parameter is absent.
    #[error("parameter '{0}' is missing")]
    Missing(String),

    /// The parameter exists but has the wrong shape.
    #[error("parameter '{key}' is not {expected}")]
    InvalidType { key: String, expected: &'static str },
}
