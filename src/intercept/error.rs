//! Pipeline errors and failure policy.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::coding::ContentCoding;
use crate::intercept::sink::BoxError;

/// Errors surfaced by [`ModifiedResponse`](crate::intercept::ModifiedResponse).
///
/// Every variant except `Sink` is reported after the original response has
/// already been ended, so the client never waits on a failed rewrite.
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("response already ended")]
    AlreadyEnded,

    #[error("failed to decode {coding} body: {source}")]
    Decode {
        coding: ContentCoding,
        #[source]
        source: io::Error,
    },

    #[error("failed to re-encode {coding} body: {source}")]
    Encode {
        coding: ContentCoding,
        #[source]
        source: io::Error,
    },

    #[error("decoded body exceeds {limit} byte limit")]
    BodyTooLarge { limit: usize },

    #[error("transform failed: {0}")]
    Transform(#[source] BoxError),

    #[error("response sink failed: {0}")]
    Sink(#[source] BoxError),
}

/// What to emit when the transform fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformErrorPolicy {
    /// End the response with no body.
    #[default]
    FailClosed,
    /// Emit the decoded body unchanged, re-encoded with the original coding.
    PassThrough,
}

/// Per-response pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct InterceptOptions {
    /// Cap on the decoded body size. `None` buffers without limit.
    pub max_body_bytes: Option<usize>,

    pub on_transform_error: TransformErrorPolicy,
}
