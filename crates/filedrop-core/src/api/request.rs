//! Replayable request descriptions.
//!
//! A request that hits a 401 may be sent a second time after a token refresh,
//! so every body here can be rebuilt for each attempt.

use reqwest::Method;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Multipart upload, sent as the `file` form field
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> serde_json::Result<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn file(
        mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.body = RequestBody::File {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        };
        self
    }
}

/// One send of a logical request.
///
/// Retrying yields a new value with `retried` set; the request itself is
/// never touched. A retried attempt is never eligible for another refresh.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    request: &'a ApiRequest,
    retried: bool,
}

impl<'a> Attempt<'a> {
    pub fn first(request: &'a ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }

    pub fn request(&self) -> &'a ApiRequest {
        self.request
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_marks_new_attempt_only() {
        let request = ApiRequest::get("files");
        let first = Attempt::first(&request);
        let second = first.retry();

        assert!(!first.is_retried());
        assert!(second.is_retried());
        assert_eq!(second.request(), &request);
    }

    #[test]
    fn test_json_body() {
        let request = ApiRequest::post("change-password")
            .json(&serde_json::json!({ "currentPassword": "a", "newPassword": "b" }))
            .expect("Failed to serialize body");
        assert_eq!(request.method, Method::POST);
        match request.body {
            RequestBody::Json(value) => assert_eq!(value["newPassword"], "b"),
            other => panic!("unexpected body: {:?}", other),
        }
    }
}
