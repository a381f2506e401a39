//! HTTP gateway: JSON API plus the embedded browser shell.

pub mod auth;
pub mod server;
pub mod types;

pub use server::{GatewayState, RateLimiter, start_server};
