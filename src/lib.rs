#![doc = include_str!("../README.md")]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
mod refresh;
mod session;

// Re-exports for convenient access
pub use auth::User;
pub use client::{ApiClient, ApiResponse};
pub use config::ApiConfig;
pub use error::Error;

/// Re-export for callers passing request methods to [`ApiClient::send`].
pub use reqwest::Method;
