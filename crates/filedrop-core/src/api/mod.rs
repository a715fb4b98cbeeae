//! HTTP client module for the file-sharing server.
//!
//! Requests pass through the augmenter, which attaches the bearer token, and
//! failed responses pass through the refresh coordinator, which renews the
//! token at most once per burst of 401s and replays the waiting requests.

pub mod augment;
pub mod auth;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod request;

pub use client::{FileClient, FileClientBuilder};
pub use coordinator::{RefreshCoordinator, SESSION_EXPIRED_MESSAGE};
pub use error::ApiError;
pub use request::{ApiRequest, Attempt, RequestBody};
