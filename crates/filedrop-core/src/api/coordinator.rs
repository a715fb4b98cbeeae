//! Single-flight access token renewal.
//!
//! Every failed response goes through [`RefreshCoordinator::recover`]. A 401 on
//! a first attempt either starts the one refresh (state `Idle`) or waits for the
//! refresh already running (state `Refreshing`). When the refresh settles, the
//! waiting requests are released in the order they arrived, each replaying
//! itself with the new token or failing with the refresh error.
//!
//! The state check and the transition into `Refreshing` happen inside one
//! critical section, and the lock is never held across an `.await`, so no
//! number of concurrent 401s can start a second refresh.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::notify::{Navigator, NoticeKind, Notifier, LOGIN_ROUTE};

use super::request::Attempt;
use super::ApiError;

/// Shown once when the refresh fails and the session ends
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Error given to waiters when the refreshing task went away without an outcome
const REFRESH_INTERRUPTED_MESSAGE: &str = "Token refresh was interrupted";

type RefreshOutcome = Result<String, ApiError>;
type Waiter = oneshot::Sender<RefreshOutcome>;

enum CoordinatorState {
    Idle,
    /// The waiter queue only exists while a refresh is in flight.
    Refreshing { waiters: VecDeque<Waiter> },
}

enum Entry<'a> {
    /// This request runs the refresh.
    Leader(RefreshGuard<'a>),
    /// A refresh is already running; wait for its outcome.
    Queued(oneshot::Receiver<RefreshOutcome>),
}

/// Returns the coordinator to `Idle` however the leading request exits.
struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshGuard<'_> {
    fn complete(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh abandoned before completing, releasing waiters");
            self.coordinator
                .settle(Err(ApiError::RefreshFailed(REFRESH_INTERRUPTED_MESSAGE.to_string())));
        }
    }
}

pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl RefreshCoordinator {
    pub fn new(notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::Idle),
            notifier,
            navigator,
        }
    }

    /// True while a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), CoordinatorState::Refreshing { .. })
    }

    /// Number of requests waiting on the in-flight refresh
    pub fn queued_waiters(&self) -> usize {
        match &*self.lock_state() {
            CoordinatorState::Idle => 0,
            CoordinatorState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Handle a failed response.
    ///
    /// `refresh` renews the access token and is called at most once across all
    /// concurrent callers of the same refresh cycle. `resubmit` sends the
    /// request again with the new token; its failure is surfaced, never
    /// refreshed again.
    pub async fn recover<'a, T, R, RFut, S, SFut>(
        &self,
        attempt: Attempt<'a>,
        error: ApiError,
        refresh: R,
        resubmit: S,
    ) -> Result<T, ApiError>
    where
        R: FnOnce() -> RFut,
        RFut: Future<Output = RefreshOutcome>,
        S: FnOnce(Attempt<'a>, String) -> SFut,
        SFut: Future<Output = Result<T, ApiError>>,
    {
        if !error.is_unauthorized() || attempt.is_retried() {
            return Err(self.surface(error));
        }

        let retry = attempt.retry();

        let token = match self.enter() {
            Entry::Queued(waiter) => match waiter.await {
                Ok(Ok(token)) => token,
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(ApiError::RefreshFailed(REFRESH_INTERRUPTED_MESSAGE.to_string()))
                }
            },
            Entry::Leader(guard) => match refresh().await {
                Ok(token) => {
                    guard.complete(Ok(token.clone()));
                    info!("Access token refreshed, replaying requests");
                    token
                }
                Err(err) => {
                    guard.complete(Err(err.clone()));
                    error!(error = %err, "Token refresh failed, session ended");
                    self.notifier.show(NoticeKind::Error, SESSION_EXPIRED_MESSAGE);
                    self.navigator.go_to(LOGIN_ROUTE);
                    return Err(err);
                }
            },
        };

        resubmit(retry, token).await.map_err(|err| self.surface(err))
    }

    /// Report an error to the user once and hand it back.
    pub(crate) fn surface(&self, error: ApiError) -> ApiError {
        debug!(error = %error, "Surfacing request error");
        self.notifier.show(NoticeKind::Error, error.user_message());
        error
    }

    fn enter(&self) -> Entry<'_> {
        let mut state = self.lock_state();
        match &mut *state {
            CoordinatorState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                debug!(queued = waiters.len(), "Refresh in flight, queueing request");
                Entry::Queued(rx)
            }
            CoordinatorState::Idle => {
                *state = CoordinatorState::Refreshing {
                    waiters: VecDeque::new(),
                };
                debug!("Starting token refresh");
                Entry::Leader(RefreshGuard {
                    coordinator: self,
                    settled: false,
                })
            }
        }
    }

    /// Release every waiter in arrival order and go back to `Idle`.
    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = match std::mem::replace(&mut *self.lock_state(), CoordinatorState::Idle) {
            CoordinatorState::Refreshing { waiters } => waiters,
            CoordinatorState::Idle => VecDeque::new(),
        };

        debug!(waiters = waiters.len(), success = outcome.is_ok(), "Refresh settled");

        for waiter in waiters {
            // A dropped receiver means that caller stopped waiting.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
