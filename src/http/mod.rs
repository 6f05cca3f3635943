//! HTTP server module.
//!
//! Binds a plain TCP listener and serves the router until SIGTERM or SIGINT
//! arrives, then drains in-flight requests before returning.

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
pub use shutdown::shutdown_signal;
