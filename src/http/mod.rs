//! HTTP host integration.
//!
//! # Data Flow
//! ```text
//! client request
//!     → server.rs (axum router, request id, timeout, trace)
//!     → proxy_handler (forward to upstream via hyper client)
//!     → layer.rs (ModifyResponseLayer: should this response be rewritten?)
//!     → interceptor.rs (ModifiedResponse over a ChannelSink, driven by a task)
//!     → body.rs (ChannelSink → streaming axum Body)
//!     → client response
//! ```
//!
//! # Design Decisions
//! - Response headers are released to the client before the body is rewritten
//! - Unsupported codings keep the upstream body as is
//! - A client dropping the body aborts the rewrite
//! - An upstream body error is surfaced to the client as a body error

pub mod body;
pub mod interceptor;
pub mod layer;
pub mod server;

pub use body::ChannelSink;
pub use interceptor::Interceptor;
pub use layer::{ModifyResponseLayer, ModifyResponseService};
pub use server::HttpServer;
