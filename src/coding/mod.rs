//! Content-coding selection subsystem.
//!
//! # Data Flow
//! ```text
//! content-encoding header / explicit tag
//!     → selector.rs (token → Selection)
//!     → stage.rs (matched Decoder + Encoder pair)
//!     → intercept pipeline (decode → transform → encode)
//! ```
//!
//! # Design Decisions
//! - Selection is a pure mapping; logging is left to the caller
//! - `deflate` means the zlib-wrapped stream, as in HTTP
//! - Brotli is behind the `brotli` cargo feature and reported as
//!   unsupported when compiled out
//! - Codec parameters are library defaults

pub mod selector;
pub mod stage;

pub use selector::{coding_from_headers, select, ContentCoding, Selection};
pub use stage::{Decoder, Encoder};
