//! Attaches the current access token to outgoing requests.

use reqwest::{header, RequestBuilder};
use tracing::warn;

/// Build the authorization headers for a token, if there is one.
fn auth_headers(token: Option<&str>) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    if let Some(token) = token {
        match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(header::AUTHORIZATION, value);
            }
            // Leave the request unauthenticated; the server answers 401.
            Err(_) => warn!("Access token is not a valid header value, sending without it"),
        }
    }
    headers
}

/// Attach `Authorization: Bearer <token>` when a token is present.
pub fn augment(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    builder.headers(auth_headers(token))
}
