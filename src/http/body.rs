//! Channel-backed response sink.
//!
//! The rewrite task writes into a bounded channel; the receiving half is the
//! streaming body hyper sends to the client. Dropping the sender ends the body.

use axum::body::Body;
use axum::http::HeaderMap;
use bytes::Bytes;
use futures_util::stream;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::intercept::{BoxError, ResponseSink};

type Frame = Result<Bytes, BoxError>;

#[derive(Debug, Error)]
pub enum ChannelSinkError {
    #[error("client body receiver dropped")]
    Closed,

    #[error("response body already ended")]
    Ended,
}

/// [`ResponseSink`] feeding an axum [`Body`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Frame>>,
    headers: HeaderMap,
}

impl ChannelSink {
    /// Create a sink holding `headers`, plus the body it streams into.
    pub fn new(headers: HeaderMap, capacity: usize) -> (Self, Body) {
        let (tx, rx) = mpsc::channel(capacity);
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        (
            Self {
                tx: Some(tx),
                headers,
            },
            Body::from_stream(frames),
        )
    }

    /// Take the (possibly edited) headers for the outgoing response.
    pub fn take_headers(&mut self) -> HeaderMap {
        std::mem::take(&mut self.headers)
    }

    /// Terminate the body with an error instead of a clean end.
    pub async fn fail(&mut self, error: BoxError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error)).await;
        }
    }

    pub fn is_ended(&self) -> bool {
        self.tx.is_none()
    }

    /// Resolves once the client has dropped the body.
    ///
    /// The returned future holds its own sender handle, so drop it before
    /// ending the sink or the body stays open.
    pub fn client_gone(&self) -> impl Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        async move {
            match tx {
                Some(tx) => tx.closed().await,
                None => std::future::pending().await,
            }
        }
    }
}

impl ResponseSink for ChannelSink {
    type Error = ChannelSinkError;

    async fn write(&mut self, chunk: Bytes) -> Result<(), ChannelSinkError> {
        let tx = self.tx.as_ref().ok_or(ChannelSinkError::Ended)?;
        tx.send(Ok(chunk))
            .await
            .map_err(|_| ChannelSinkError::Closed)
    }

    async fn end(&mut self) -> Result<(), ChannelSinkError> {
        self.tx.take().map(drop).ok_or(ChannelSinkError::Ended)
    }

    fn headers_mut(&mut self) -> Option<&mut HeaderMap> {
        Some(&mut self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[tokio::test]
    async fn test_writes_stream_into_body() {
        let (mut sink, body) = ChannelSink::new(HeaderMap::new(), 4);
        let reader = tokio::spawn(async move { axum::body::to_bytes(body, usize::MAX).await });

        sink.write(Bytes::from_static(b"hello ")).await.unwrap();
        sink.write(Bytes::from_static(b"world")).await.unwrap();
        sink.end().await.unwrap();

        let collected = reader.await.unwrap().unwrap();
        assert_eq!(collected, "hello world");
        assert!(sink.is_ended());
        assert!(matches!(sink.end().await, Err(ChannelSinkError::Ended)));
    }

    #[tokio::test]
    async fn test_fail_surfaces_body_error() {
        let (mut sink, body) = ChannelSink::new(HeaderMap::new(), 1);
        let reader = tokio::spawn(async move { axum::body::to_bytes(body, usize::MAX).await });

        sink.fail("upstream reset".into()).await;
        assert!(reader.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_dropped_body_reports_closed() {
        let (mut sink, body) = ChannelSink::new(HeaderMap::new(), 1);
        drop(body);
        let result = sink.write(Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(ChannelSinkError::Closed)));
    }

    #[tokio::test]
    async fn test_client_gone_resolves_when_body_dropped() {
        let (sink, body) = ChannelSink::new(HeaderMap::new(), 1);
        let gone = sink.client_gone();
        drop(body);
        tokio::time::timeout(std::time::Duration::from_secs(1), gone)
            .await
            .expect("client drop not observed");
    }

    #[test]
    fn test_headers_are_editable_then_taken() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
        let (mut sink, _body) = ChannelSink::new(headers, 1);

        sink.headers_mut().unwrap().remove(header::CONTENT_LENGTH);
        assert!(sink.take_headers().is_empty());
    }
}
