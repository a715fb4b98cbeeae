// Shared by several test binaries; not every helper is used by each.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filedrop_core::auth::PersistedSession;
use filedrop_core::{FileClient, Navigator, NoticeKind, Notifier, SessionFile};

/// Refresh timeout for tests that never hit it
const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures what the client tells the user and where it sends them.
#[derive(Default)]
pub struct Recorder {
    pub notices: Mutex<Vec<(NoticeKind, String)>>,
    pub routes: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn notices(&self) -> Vec<(NoticeKind, String)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl Notifier for Recorder {
    fn show(&self, kind: NoticeKind, message: &str) {
        self.notices.lock().unwrap().push((kind, message.to_string()));
    }
}

impl Navigator for Recorder {
    fn go_to(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

pub struct Harness {
    pub server: MockServer,
    pub client: FileClient,
    pub recorder: Arc<Recorder>,
    pub dir: TempDir,
}

impl Harness {
    pub fn store(&self) -> SessionFile {
        SessionFile::new(self.dir.path())
    }
}

/// A client pointed at a fresh mock server with an empty session directory.
pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    harness_in(dir, REFRESH_TIMEOUT).await
}

/// Like [`harness`], with a custom timeout on the `/refresh` call.
pub async fn harness_with_refresh_timeout(refresh_timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    harness_in(dir, refresh_timeout).await
}

/// Like [`harness`], but the session file already says a user is logged in.
pub async fn restarted_harness(identity: &str) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    SessionFile::new(dir.path())
        .save(&PersistedSession {
            identity: Some(identity.to_string()),
            authenticated: true,
        })
        .expect("Failed to seed session file");
    harness_in(dir, REFRESH_TIMEOUT).await
}

async fn harness_in(dir: TempDir, refresh_timeout: Duration) -> Harness {
    let server = MockServer::start().await;
    let recorder = Arc::new(Recorder::default());

    let client = FileClient::builder(server.uri(), SessionFile::new(dir.path()))
        .refresh_timeout(refresh_timeout)
        .notifier(recorder.clone())
        .navigator(recorder.clone())
        .build()
        .expect("Failed to build client");

    Harness {
        server,
        client,
        recorder,
        dir,
    }
}

/// Log in as `alice`, receiving `token` and a refresh cookie.
pub async fn login_as(h: &Harness, token: &str) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "refreshToken=r1; Path=/; HttpOnly")
                .set_body_json(json!({
                    "accessToken": token,
                    "username": "alice",
                    "message": "Login successful"
                })),
        )
        .mount(&h.server)
        .await;

    h.client
        .login("alice", "secret")
        .await
        .expect("Login should succeed");
}

pub fn token_body(token: &str) -> serde_json::Value {
    json!({ "accessToken": token, "message": "Token refreshed successfully" })
}

/// The `{"message": ...}` body the server uses for errors and confirmations
pub fn message_body(message: &str) -> serde_json::Value {
    json!({ "message": message })
}

pub fn files_body() -> serde_json::Value {
    json!([{
        "id": "65a1f0c2e4b0a1b2c3d4e5f6",
        "filename": "holiday.mp4",
        "contentType": "video/mp4",
        "size": 1572864,
        "uploadDate": "2024-01-12T09:30:00.000+00:00",
        "ownerId": "6590aa"
    }])
}
