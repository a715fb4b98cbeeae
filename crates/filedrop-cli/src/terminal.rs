//! Terminal implementations of the notification and navigation seams.

use filedrop_core::notify::LOGIN_ROUTE;
use filedrop_core::{Navigator, NoticeKind, Notifier};

/// Prints notices to stderr.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn show(&self, kind: NoticeKind, message: &str) {
        eprintln!("{}: {}", kind.title(), message);
    }
}

/// A CLI has no views; "navigating" to the login view means telling the
/// user how to get there.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn go_to(&self, route: &str) {
        if route == LOGIN_ROUTE {
            eprintln!("Run `filedrop login` to sign in again.");
        } else {
            eprintln!("Continue at {}", route);
        }
    }
}
