//! The response handle the pipeline writes into.

use axum::http::HeaderMap;
use bytes::Bytes;
use std::future::Future;

/// Boxed error for caller-supplied components.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Byte-emission entry points of an outgoing response.
///
/// `write` may be called any number of times, followed by a single `end`.
pub trait ResponseSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Emit a body chunk.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Finish the body.
    fn end(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Mutable response headers, when they have not been sent yet.
    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        None
    }
}
