//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionState`: identity, authentication flag and in-memory access token
//! - `SessionFile`: durable storage for the identity and authentication flag
//!
//! Only `{identity, authenticated}` is written to disk. The access token is
//! process-scoped and the refresh credential never leaves the HTTP cookie jar.

pub mod session;
pub mod store;

pub use session::SessionState;
pub use store::{PersistedSession, SessionFile};
