//! Seams to the user interface.
//!
//! The refresh coordinator reports terminal failures through a `Notifier`
//! and sends the user back to the login view through a `Navigator`. The
//! front end decides what those mean; the log-backed versions here are the
//! defaults for headless use.

use tracing::{error, info};

/// Route of the login view
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl NoticeKind {
    pub fn title(&self) -> &'static str {
        match self {
            NoticeKind::Info => "Info",
            NoticeKind::Success => "Success",
            NoticeKind::Error => "Error",
        }
    }
}

/// Shows a message to the user.
pub trait Notifier: Send + Sync {
    fn show(&self, kind: NoticeKind, message: &str);
}

/// Moves the user to another view.
pub trait Navigator: Send + Sync {
    fn go_to(&self, route: &str);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => error!(notice = message, "User notice"),
            NoticeKind::Info | NoticeKind::Success => {
                info!(kind = kind.title(), notice = message, "User notice")
            }
        }
    }
}

/// Records navigation requests in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn go_to(&self, route: &str) {
        info!(route, "Navigation requested");
    }
}
