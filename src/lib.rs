//! telefeed: popular posts from Telegram channels over HTTP.
//!
//! Fetches recent posts from configured channels, keeps only those above a
//! view threshold, caches them briefly, and serves them grouped by category.
//! When live data is unavailable the service substitutes clearly marked demo
//! posts.

pub mod config;
pub mod error;
pub mod feed;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telegram;

pub use error::AppError;
