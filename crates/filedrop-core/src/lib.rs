//! Core library for filedrop.
//!
//! This crate provides:
//! - `SessionState`: identity, authentication flag and the short-lived access token
//! - `RefreshCoordinator`: single-flight token renewal for requests that hit a 401
//! - `FileClient`: the authenticated HTTP client for the file-sharing API
//! - `Config`: application configuration and directory layout
//!
//! The refresh credential never enters this crate's memory. It lives in the
//! HTTP client's cookie jar and is sent automatically on `/refresh` and `/logout`.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;

pub use api::{ApiError, ApiRequest, FileClient};
pub use auth::{SessionFile, SessionState};
pub use config::Config;
pub use notify::{Navigator, NoticeKind, Notifier};
