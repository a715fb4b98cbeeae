//! API client for the file-sharing server.
//!
//! Every authenticated request is built from an [`ApiRequest`], gets the
//! current access token attached, and on failure is handed to the
//! [`RefreshCoordinator`] which may renew the token and replay it once.
//!
//! Every error returned by the file and account operations has already been
//! shown through the [`Notifier`]. Login and registration errors have not;
//! they belong to whoever asked for the credentials.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::{SessionFile, SessionState};
use crate::config::{api_url, Config};
use crate::models::{Download, FileMetadata, StorageUsage};
use crate::notify::{LogNavigator, LogNotifier, Navigator, Notifier};

use super::augment::augment;
use super::auth::AuthEndpoints;
use super::coordinator::RefreshCoordinator;
use super::request::{ApiRequest, Attempt, RequestBody};
use super::ApiError;

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

struct ClientInner {
    http: Client,
    base_url: String,
    session: SessionState,
    coordinator: RefreshCoordinator,
}

/// Authenticated client for the file-sharing API.
/// Clone is cheap and clones share one session and one refresh coordinator.
#[derive(Clone)]
pub struct FileClient {
    inner: Arc<ClientInner>,
}

pub struct FileClientBuilder {
    base_url: String,
    store: SessionFile,
    request_timeout: Duration,
    refresh_timeout: Duration,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl FileClientBuilder {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn build(self) -> Result<FileClient, ApiError> {
        let http = Client::builder()
            .timeout(self.request_timeout)
            .cookie_store(true)
            .build()?;

        let endpoints =
            AuthEndpoints::new(http.clone(), self.base_url.clone(), self.refresh_timeout);
        let session = SessionState::open(endpoints, self.store);
        let coordinator = RefreshCoordinator::new(self.notifier, self.navigator);

        Ok(FileClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: self.base_url,
                session,
                coordinator,
            }),
        })
    }
}

impl FileClient {
    pub fn builder(base_url: impl Into<String>, store: SessionFile) -> FileClientBuilder {
        let defaults = Config::default();
        FileClientBuilder {
            base_url: base_url.into(),
            store,
            request_timeout: Duration::from_secs(defaults.request_timeout_secs),
            refresh_timeout: Duration::from_secs(defaults.refresh_timeout_secs),
            notifier: Arc::new(LogNotifier),
            navigator: Arc::new(LogNavigator),
        }
    }

    /// Builder preloaded with the base URL and timeouts from `config`
    pub fn from_config(config: &Config, store: SessionFile) -> FileClientBuilder {
        Self::builder(config.base_url(), store)
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .refresh_timeout(Duration::from_secs(config.refresh_timeout_secs))
    }

    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    /// True while a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    // ===== Session =====

    /// Restore the access token after a restart.
    ///
    /// [`FileClient::send`] runs this too, so requests issued while it is in
    /// flight wait for the restored token instead of refreshing on their own.
    pub async fn initialize(&self) {
        self.inner.session.initialize().await
    }

    pub async fn login(&self, identity: &str, secret: &str) -> Result<(), ApiError> {
        self.inner.session.login(identity, secret).await
    }

    pub async fn register(&self, identity: &str, secret: &str) -> Result<(), ApiError> {
        self.inner.session.register(identity, secret).await
    }

    pub async fn logout(&self) {
        self.inner.session.logout().await
    }

    // ===== Request pipeline =====

    /// Send an authenticated request, renewing the token once on a 401.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        self.inner.session.initialize().await;

        let attempt = Attempt::first(request);
        let token = self.inner.session.access_token();

        match self.dispatch(attempt, token.as_deref()).await {
            Ok(response) => Ok(response),
            Err(error) => {
                self.inner
                    .coordinator
                    .recover(
                        attempt,
                        error,
                        || self.inner.session.refresh_access_token(),
                        |retry, token| async move {
                            self.dispatch(retry, Some(token.as_str())).await
                        },
                    )
                    .await
            }
        }
    }

    async fn dispatch(
        &self,
        attempt: Attempt<'_>,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let request = attempt.request();
        let url = api_url(&self.inner.base_url, &request.path);
        debug!(
            method = %request.method,
            url = %url,
            retried = attempt.is_retried(),
            "Sending request"
        );

        let builder = augment(self.inner.http.request(request.method.clone(), &url), token);
        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::File {
                file_name,
                content_type,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(content_type)
                    .map_err(|_| {
                        ApiError::Validation(format!("Invalid content type: {}", content_type))
                    })?;
                builder.multipart(multipart::Form::new().part("file", part))
            }
        };

        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response.json().await.map_err(|e| {
            self.inner
                .coordinator
                .surface(ApiError::InvalidResponse(format!("{}: {}", request.path, e)))
        })
    }

    async fn send_for_message(&self, request: &ApiRequest) -> Result<String, ApiError> {
        let response: MessageResponse = self.send_json(request).await?;
        Ok(response.message)
    }

    // ===== File operations =====

    /// List the user's files
    pub async fn list_files(&self) -> Result<Vec<FileMetadata>, ApiError> {
        self.send_json(&ApiRequest::get("files")).await
    }

    /// Upload a file, returning the server's confirmation message
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let request = ApiRequest::post("upload").file(file_name, content_type, bytes);
        self.send_for_message(&request).await
    }

    /// Fetch a file as an attachment
    pub async fn download(&self, id: &str) -> Result<Download, ApiError> {
        self.fetch_body(&ApiRequest::get(format!("download/{}", id))).await
    }

    /// Fetch a file for inline display
    pub async fn view(&self, id: &str) -> Result<Download, ApiError> {
        self.fetch_body(&ApiRequest::get(format!("view/{}", id))).await
    }

    async fn fetch_body(&self, request: &ApiRequest) -> Result<Download, ApiError> {
        let response = self.send(request).await?;
        let headers = response.headers();
        let file_name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_file_name);
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.inner.coordinator.surface(e.into()))?
            .to_vec();

        Ok(Download {
            file_name,
            content_type,
            bytes,
        })
    }

    pub async fn delete_file(&self, id: &str) -> Result<String, ApiError> {
        self.send_for_message(&ApiRequest::delete(format!("delete/{}", id))).await
    }

    /// Total bytes stored by the user
    pub async fn storage_usage(&self) -> Result<StorageUsage, ApiError> {
        self.send_json(&ApiRequest::get("usage")).await
    }

    // ===== Account operations =====

    pub async fn change_password(&self, current: &str, new: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post("change-password")
            .json(&PasswordChange {
                current_password: current,
                new_password: new,
            })
            .map_err(|e| self.inner.coordinator.surface(ApiError::Validation(e.to_string())))?;
        self.send_for_message(&request).await
    }

    /// Delete the account and everything in it, then end the local session.
    pub async fn delete_account(&self) -> Result<String, ApiError> {
        let message = self.send_for_message(&ApiRequest::delete("delete-account")).await?;
        // The server already revoked the refresh cookie.
        self.inner.session.clear();
        Ok(message)
    }
}

/// Pull the file name out of a `Content-Disposition` header value.
fn disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, name) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = name.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}
