//! Data models for the file-sharing API.

pub mod file;

pub use file::{Download, FileMetadata, StorageUsage};
