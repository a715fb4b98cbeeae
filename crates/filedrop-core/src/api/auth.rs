//! Calls to the authentication endpoints.
//!
//! These are the only requests that never pass through the refresh
//! coordinator: their failures go straight back to the caller.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::api_url;

use super::ApiError;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Client for `/login`, `/register`, `/refresh` and `/logout`.
///
/// The refresh cookie set by `/login` stays inside the shared `Client`'s
/// cookie jar and rides along on `/refresh` and `/logout` on its own.
#[derive(Clone)]
pub struct AuthEndpoints {
    client: Client,
    base_url: String,
    refresh_timeout: Duration,
}

impl AuthEndpoints {
    pub fn new(client: Client, base_url: impl Into<String>, refresh_timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            refresh_timeout,
        }
    }

    /// Exchange identity and secret for an access token
    pub async fn login(&self, identity: &str, secret: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(api_url(&self.base_url, "login"))
            .json(&Credentials {
                username: identity,
                password: secret,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    ApiError::InvalidCredentials(ApiError::server_message(&body))
                }
                _ => ApiError::from_status(status, &body),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;
        Ok(token.access_token)
    }

    pub async fn register(&self, identity: &str, secret: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(api_url(&self.base_url, "register"))
            .json(&Credentials {
                username: identity,
                password: secret,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = ApiError::server_message(&body);
        Err(match status {
            StatusCode::CONFLICT => ApiError::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ApiError::Validation(message)
            }
            _ => ApiError::from_status(status, &body),
        })
    }

    /// Mint a new access token from the refresh cookie.
    ///
    /// Every failure, including a timeout, is a `RefreshFailed`.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .post(api_url(&self.base_url, "refresh"))
            .timeout(self.refresh_timeout)
            .send()
            .await
            .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Refresh endpoint rejected the request");
            return Err(ApiError::RefreshFailed(ApiError::server_message(&body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::RefreshFailed(format!("invalid refresh response: {}", e)))?;
        Ok(token.access_token)
    }

    /// Ask the server to revoke the refresh cookie
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .client
            .post(api_url(&self.base_url, "logout"))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}
