//! Interception hook for axum responses.
//!
//! # Responsibilities
//! - Decide which responses get rewritten (status, media type)
//! - Wire a [`ModifiedResponse`] over a [`ChannelSink`]
//! - Drive the upstream body through it on a spawned task

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use futures_util::StreamExt;
use std::sync::Arc;

use crate::coding::coding_from_headers;
use crate::http::body::ChannelSink;
use crate::intercept::{InterceptOptions, ModifiedResponse, ResponseSink, Transform};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Shared rewrite settings, cloned into every intercepted response.
#[derive(Clone)]
pub struct Interceptor {
    transform: Arc<dyn Transform>,
    options: InterceptOptions,
    content_types: Arc<[String]>,
    channel_capacity: usize,
}

impl Interceptor {
    /// Rewrite `application/json` responses with `transform`.
    pub fn new(transform: impl Transform + 'static) -> Self {
        Self {
            transform: Arc::new(transform),
            options: InterceptOptions::default(),
            content_types: Arc::from(vec!["application/json".to_string()]),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_options(mut self, options: InterceptOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the list of media types to intercept. Matching ignores case
    /// and parameters such as `charset`.
    pub fn with_content_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.content_types = types
            .into_iter()
            .map(|t| t.into().trim().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Whether `response` carries a body this interceptor should rewrite.
    pub fn should_intercept(&self, response: &Response<Body>) -> bool {
        let status = response.status();
        if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            return false;
        }

        let Some(media_type) = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
        else {
            return false;
        };

        self.content_types.iter().any(|t| *t == media_type)
    }

    /// Fire the interception hook on `response`.
    ///
    /// Headers are returned immediately (minus `content-length` when the body
    /// will change); the body is rewritten on a background task. A response
    /// with an unsupported coding is handed back as it came.
    pub fn apply(&self, response: Response<Body>) -> Response<Body> {
        let (mut parts, upstream) = response.into_parts();

        let coding = coding_from_headers(&parts.headers).map(str::to_owned);
        let headers = std::mem::take(&mut parts.headers);
        let (sink, body) = ChannelSink::new(headers, self.channel_capacity);

        let mut modified = ModifiedResponse::new(sink, coding.as_deref())
            .with_shared_transform(self.transform.clone())
            .with_options(self.options.clone());
        parts.headers = modified.get_mut().take_headers();

        if !modified.is_engaged() {
            return Response::from_parts(parts, upstream);
        }

        tokio::spawn(drive(modified, upstream));

        Response::from_parts(parts, body)
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("options", &self.options)
            .field("content_types", &self.content_types)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

/// Feed the upstream body through the pipeline until it ends, fails, or the
/// client goes away.
async fn drive(mut modified: ModifiedResponse<ChannelSink>, upstream: Body) {
    let mut frames = upstream.into_data_stream();

    loop {
        let client_gone = modified.get_ref().client_gone();
        let next = tokio::select! {
            frame = frames.next() => Some(frame),
            _ = client_gone => None,
        };

        let frame = match next {
            Some(Some(frame)) => frame,
            Some(None) => break,
            None => {
                tracing::debug!("Client went away, abandoning response rewrite");
                modified.abort();
                return;
            }
        };

        match frame {
            Ok(chunk) => {
                if let Err(e) = modified.write(chunk).await {
                    // The pipeline has already ended (or lost) the client body.
                    tracing::debug!(error = %e, "Stopped feeding upstream body");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upstream body failed mid-stream");
                modified.abort();
                modified.get_mut().fail(Box::new(e)).await;
                return;
            }
        }
    }

    if let Err(e) = modified.end().await {
        tracing::warn!(error = %e, "Response rewrite did not complete");
    }
}
