//! Content-coding aware JSON response rewriting for reverse proxies.
//!
//! A [`ModifiedResponse`] wraps a response's write/end entry points: it
//! reverses the upstream content-coding, hands the decoded JSON (or text)
//! body to a [`Transform`], then re-encodes the result with the same coding
//! and emits it through the original sink.
//!
//! The [`http`] module hosts the pipeline inside an axum reverse proxy.

pub mod coding;
pub mod config;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod observability;
pub mod rules;

pub use coding::{select, ContentCoding, Selection};
pub use config::ProxyConfig;
pub use http::{HttpServer, Interceptor, ModifyResponseLayer};
pub use intercept::{
    transform_fn, InterceptError, InterceptOptions, ModifiedResponse, Payload, ResponseSink,
    Transform, TransformErrorPolicy,
};
pub use lifecycle::Shutdown;
pub use rules::FieldRules;
