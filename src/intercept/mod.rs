//! Response interception pipeline.
//!
//! # Data Flow
//! ```text
//! upstream chunks
//!     → ModifiedResponse::write (decode stage if coded, accumulate)
//!     → ModifiedResponse::end
//!         → parse (JSON, falling back to text)
//!         → Transform (always awaited)
//!         → serialize
//!         → encode stage (if coded)
//!     → original ResponseSink::write (in encoder order)
//!     → original ResponseSink::end (exactly once)
//! ```
//!
//! # Design Decisions
//! - Decorator over the original sink instead of swapping its methods
//! - Sync and async transforms share one future-based contract
//! - Decode failures end the response immediately with no body
//! - Unsupported codings leave the response untouched

pub mod error;
pub mod payload;
pub mod pipeline;
pub mod sink;
pub mod transform;

pub use error::{InterceptError, InterceptOptions, TransformErrorPolicy};
pub use payload::Payload;
pub use pipeline::ModifiedResponse;
pub use sink::{BoxError, ResponseSink};
pub use transform::{transform_fn, Identity, Transform};
