//! The rewriting response decorator.
//!
//! # Responsibilities
//! - Resolve the coding once and pick the compressed, uncompressed or
//!   pass-through path
//! - Drop `content-length` when the body will be rewritten
//! - Buffer the decoded body, transform it, re-encode and emit it through
//!   the original sink
//!
//! # Design Decisions
//! - The original sink is owned, never re-entered through the decorator
//! - The original `end` runs at most once, including on every failure path
//! - Failures after `end` has run are reported as `AlreadyEnded`

use axum::http::{header, HeaderMap};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::coding::{self, ContentCoding, Decoder, Encoder, Selection};
use crate::intercept::error::{InterceptError, InterceptOptions, TransformErrorPolicy};
use crate::intercept::payload::Payload;
use crate::intercept::sink::ResponseSink;
use crate::intercept::transform::{Identity, Transform};
use crate::observability::metrics;

enum Mode {
    /// Coding cannot be reversed; calls go straight to the original.
    Passthrough,
    Uncompressed,
    Compressed { decoder: Decoder, encoder: Encoder },
    /// Original `end` has been called (or the pipeline was aborted).
    Finished,
}

/// A [`ResponseSink`] that rewrites the body written through it before
/// handing it to the wrapped original sink.
pub struct ModifiedResponse<S> {
    original: S,
    mode: Mode,
    coding: ContentCoding,
    body: BytesMut,
    transform: Arc<dyn Transform>,
    options: InterceptOptions,
    started: Instant,
}

impl<S: ResponseSink> ModifiedResponse<S> {
    /// Wrap `original`, decoding with the coding named by `coding_tag`.
    ///
    /// An unsupported coding is logged and the wrapper forwards every call
    /// unchanged.
    pub fn new(mut original: S, coding_tag: Option<&str>) -> Self {
        let (mode, coding) = match coding::select(coding_tag) {
            Selection::Identity => (Mode::Uncompressed, ContentCoding::Identity),
            Selection::Coded {
                coding,
                decoder,
                encoder,
            } => (Mode::Compressed { decoder, encoder }, coding),
            Selection::Unsupported(token) => {
                tracing::warn!(coding = %token, "Unsupported content-encoding, leaving response untouched");
                (Mode::Passthrough, ContentCoding::Identity)
            }
        };

        if !matches!(mode, Mode::Passthrough) {
            // Rewritten length is unknown until the transform has run.
            if let Some(headers) = original.headers_mut() {
                headers.remove(header::CONTENT_LENGTH);
            }
        }

        Self {
            original,
            mode,
            coding,
            body: BytesMut::new(),
            transform: Arc::new(Identity),
            options: InterceptOptions::default(),
            started: Instant::now(),
        }
    }

    /// Wrap `original`, reading the coding from `content-encoding`.
    pub fn from_headers(original: S, headers: &HeaderMap) -> Self {
        Self::new(original, coding::coding_from_headers(headers))
    }

    pub fn with_transform(self, transform: impl Transform + 'static) -> Self {
        self.with_shared_transform(Arc::new(transform))
    }

    pub fn with_shared_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_options(mut self, options: InterceptOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether the body is being rewritten (false for unsupported codings).
    pub fn is_engaged(&self) -> bool {
        !matches!(self.mode, Mode::Passthrough)
    }

    /// The coding being reversed, if engaged.
    pub fn coding(&self) -> Option<ContentCoding> {
        self.is_engaged().then_some(self.coding)
    }

    pub fn get_ref(&self) -> &S {
        &self.original
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.original
    }

    pub fn into_inner(self) -> S {
        self.original
    }

    /// Drop codec state and buffered body without ending the original.
    ///
    /// For hosts tearing the response down (client gone, upstream failed).
    pub fn abort(&mut self) {
        if !self.is_engaged() || matches!(self.mode, Mode::Finished) {
            return;
        }
        tracing::debug!(coding = %self.coding, buffered = self.body.len(), "Response rewrite aborted");
        metrics::record_rewrite(self.coding, "aborted", self.started);
        self.release();
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), InterceptError> {
        let decoded = match &mut self.mode {
            Mode::Passthrough => return self.original.write(chunk).await.map_err(sink_error),
            Mode::Finished => return Err(InterceptError::AlreadyEnded),
            Mode::Uncompressed => chunk,
            Mode::Compressed { decoder, .. } => {
                let pushed = decoder.push(&chunk).await;
                match pushed {
                    Ok(decoded) => decoded,
                    Err(source) => {
                        let error = InterceptError::Decode {
                            coding: self.coding,
                            source,
                        };
                        return self.fail(error, "decode").await;
                    }
                }
            }
        };
        self.accumulate(decoded).await
    }

    async fn finish_body(&mut self) -> Result<(), InterceptError> {
        let encoder = match std::mem::replace(&mut self.mode, Mode::Finished) {
            Mode::Passthrough => {
                self.mode = Mode::Passthrough;
                return self.original.end().await.map_err(sink_error);
            }
            Mode::Finished => return Err(InterceptError::AlreadyEnded),
            Mode::Uncompressed => None,
            Mode::Compressed { decoder, encoder } => {
                match decoder.finish().await {
                    Ok(tail) => self.accumulate(tail).await?,
                    Err(source) => {
                        let error = InterceptError::Decode {
                            coding: self.coding,
                            source,
                        };
                        return self.fail(error, "decode").await;
                    }
                }
                Some(encoder)
            }
        };

        let body = std::mem::take(&mut self.body).freeze();
        let payload = match Payload::parse(&body) {
            Ok(payload) => payload,
            Err((raw, error)) => {
                tracing::warn!(
                    coding = %self.coding,
                    stage = "parse",
                    error = %error,
                    "Body is not valid JSON, transforming it raw"
                );
                raw
            }
        };

        let (output, transform_error) = match self.transform.transform(payload).await {
            Ok(result) => (result.into_bytes(), None),
            Err(error) => match self.options.on_transform_error {
                TransformErrorPolicy::FailClosed => {
                    return self.fail(InterceptError::Transform(error), "transform").await;
                }
                TransformErrorPolicy::PassThrough => {
                    tracing::warn!(
                        coding = %self.coding,
                        stage = "transform",
                        error = %error,
                        "Transform failed, emitting body unchanged"
                    );
                    (body, Some(error))
                }
            },
        };

        self.emit(output, encoder).await?;

        match transform_error {
            Some(error) => {
                metrics::record_rewrite(self.coding, "passed_through", self.started);
                Err(InterceptError::Transform(error))
            }
            None => {
                tracing::debug!(coding = %self.coding, "Response body rewritten");
                metrics::record_rewrite(self.coding, "rewritten", self.started);
                Ok(())
            }
        }
    }

    /// Encode (if coded) and hand the final body to the original sink.
    async fn emit(&mut self, output: Bytes, encoder: Option<Encoder>) -> Result<(), InterceptError> {
        match encoder {
            None => self.forward(output).await?,
            Some(mut encoder) => {
                let coding = self.coding;
                let head = match encoder.push(&output).await {
                    Ok(bytes) => bytes,
                    Err(source) => {
                        return self.fail(InterceptError::Encode { coding, source }, "encode").await;
                    }
                };
                self.forward(head).await?;

                let tail = match encoder.finish().await {
                    Ok(bytes) => bytes,
                    Err(source) => {
                        return self.fail(InterceptError::Encode { coding, source }, "encode").await;
                    }
                };
                self.forward(tail).await?;
            }
        }
        self.original.end().await.map_err(sink_error)
    }

    async fn forward(&mut self, chunk: Bytes) -> Result<(), InterceptError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.original.write(chunk).await.map_err(sink_error)
    }

    async fn accumulate(&mut self, chunk: Bytes) -> Result<(), InterceptError> {
        if let Some(limit) = self.options.max_body_bytes {
            if self.body.len().saturating_add(chunk.len()) > limit {
                return self.fail(InterceptError::BodyTooLarge { limit }, "buffer").await;
            }
        }
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    /// End the original response with no body and report `error`.
    async fn fail(&mut self, error: InterceptError, stage: &'static str) -> Result<(), InterceptError> {
        tracing::error!(
            coding = %self.coding,
            stage,
            error = %error,
            "Response rewrite failed, ending response without body"
        );
        metrics::record_rewrite(self.coding, "failed", self.started);
        self.release();
        if let Err(e) = self.original.end().await {
            tracing::warn!(error = %e, "Failed to end response after rewrite failure");
        }
        Err(error)
    }

    fn release(&mut self) {
        self.mode = Mode::Finished;
        self.body = BytesMut::new();
    }
}

impl<S: ResponseSink> ResponseSink for ModifiedResponse<S> {
    type Error = InterceptError;

    async fn write(&mut self, chunk: Bytes) -> Result<(), InterceptError> {
        self.write_chunk(chunk).await
    }

    async fn end(&mut self) -> Result<(), InterceptError> {
        self.finish_body().await
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        self.original.headers_mut()
    }
}

impl<S> fmt::Debug for ModifiedResponse<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Passthrough => "passthrough",
            Mode::Uncompressed => "uncompressed",
            Mode::Compressed { .. } => "compressed",
            Mode::Finished => "finished",
        };
        f.debug_struct("ModifiedResponse")
            .field("mode", &mode)
            .field("coding", &self.coding)
            .field("buffered", &self.body.len())
            .finish()
    }
}

fn sink_error<E>(error: E) -> InterceptError
where
    E: std::error::Error + Send + Sync + 'static,
{
    InterceptError::Sink(Box::new(error))
}
