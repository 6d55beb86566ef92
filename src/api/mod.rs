//! Typed client for the code-reviewer backend.

mod api_types;
mod client;
mod error;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
