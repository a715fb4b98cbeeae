use std::sync::{PoisonError, RwLock};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::auth::AuthEndpoints;
use crate::api::ApiError;

use super::store::{PersistedSession, SessionFile};

/// Owner of the user's identity, authentication flag and access token.
///
/// `identity` and `authenticated` are persisted through a [`SessionFile`].
/// The access token is held in memory only and is gone when the process ends.
pub struct SessionState {
    endpoints: AuthEndpoints,
    store: SessionFile,
    durable: RwLock<PersistedSession>,
    access_token: RwLock<Option<String>>,
    restored: OnceCell<()>,
}

impl SessionState {
    /// Open the session, restoring whatever the session file holds
    pub fn open(endpoints: AuthEndpoints, store: SessionFile) -> Self {
        let durable = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to load session, starting signed out");
                PersistedSession::default()
            }
        };
        debug!(
            authenticated = durable.authenticated,
            has_identity = durable.identity.is_some(),
            "Session loaded"
        );

        Self {
            endpoints,
            store,
            durable: RwLock::new(durable),
            access_token: RwLock::new(None),
            restored: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> Option<String> {
        self.durable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .identity
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.durable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .authenticated
    }

    /// The current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log in. On failure the session is left as it was.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<(), ApiError> {
        let token = self.endpoints.login(identity, secret).await?;

        self.set_durable(PersistedSession {
            identity: Some(identity.to_string()),
            authenticated: true,
        });
        self.set_access_token(Some(token));

        info!(identity, "Login successful");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, identity: &str, secret: &str) -> Result<(), ApiError> {
        self.endpoints.register(identity, secret).await?;
        info!(identity, "Registration successful");
        Ok(())
    }

    /// Revoke the session on the server if possible, then always clear it locally.
    pub async fn logout(&self) {
        if let Err(e) = self.endpoints.logout().await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.clear();
        info!("Logged out");
    }

    /// Get a new access token from the refresh cookie.
    ///
    /// A failed refresh ends the session through [`SessionState::logout`].
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        match self.endpoints.refresh().await {
            Ok(token) => {
                self.set_access_token(Some(token.clone()));
                debug!("Access token replaced");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, logging out");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Restore the access token after a restart.
    ///
    /// Runs at most once per process; callers arriving while it runs wait for
    /// it to finish. When the persisted session says the user is
    /// authenticated but no token is in memory, one silent refresh is
    /// attempted. If it fails the local session is dropped without calling
    /// `/logout` and nothing is reported to the user.
    pub async fn initialize(&self) {
        self.restored.get_or_init(|| self.restore()).await;
    }

    async fn restore(&self) {
        if !self.is_authenticated() || self.access_token().is_some() {
            return;
        }

        match self.endpoints.refresh().await {
            Ok(token) => {
                self.set_access_token(Some(token));
                info!("Session restored");
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session, signing out locally");
                self.clear();
            }
        }
    }

    /// Drop identity, authentication flag and token from memory and disk.
    pub(crate) fn clear(&self) {
        self.set_access_token(None);
        *self.durable.write().unwrap_or_else(PoisonError::into_inner) = PersistedSession::default();
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove session file");
        }
    }

    fn set_durable(&self, session: PersistedSession) {
        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "Failed to save session");
        }
        *self.durable.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}
