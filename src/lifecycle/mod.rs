//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! main: load config → init logging/metrics → bind → HttpServer::run
//! Shutdown::trigger (tests, embedding hosts) or Ctrl+C
//!     → axum stops accepting → in-flight responses drain → run returns
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
