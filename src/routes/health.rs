//! Liveness probe.
//!
//! Answers as long as the process can serve HTTP. Never touches the Telegram
//! backend.

pub async fn health() -> &'static str {
    "ok"
}
