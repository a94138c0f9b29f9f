//! Local stand-in for the Drive v3 and Sheets v4 endpoints the client uses.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;

use xparky_core::auth::TokenProvider;
use xparky_core::GoogleClient;

pub const TEST_TOKEN: &str = "test-token";

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const SHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Default)]
pub struct FakeGoogle {
    /// folder id → (id, name, mimeType) children
    folders: Mutex<HashMap<String, Vec<(String, String, String)>>>,
    /// (spreadsheet id, A1 range) → rows
    sheets: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    /// file id → content
    media: Mutex<HashMap<String, Vec<u8>>>,
    /// ids that answer 500
    failing: Mutex<Vec<String>>,
    /// 429s to serve before answering normally
    rate_limits: AtomicUsize,
    page_size: AtomicUsize,
    /// 401s to serve before checking the bearer token
    unauthorized: AtomicUsize,
    /// form fields of every token request
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    pub requests: AtomicUsize,
}

impl FakeGoogle {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        fake.page_size.store(100, Ordering::SeqCst);
        Arc::new(fake)
    }

    pub fn folder(&self, id: &str, children: &[(&str, &str, &str)]) {
        self.folders.lock().unwrap().insert(
            id.to_string(),
            children
                .iter()
                .map(|(i, n, m)| (i.to_string(), n.to_string(), m.to_string()))
                .collect(),
        );
    }

    pub fn sheet(&self, spreadsheet_id: &str, range: &str, rows: &[&[&str]]) {
        self.sheets.lock().unwrap().insert(
            (spreadsheet_id.to_string(), range.to_string()),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
    }

    pub fn media(&self, file_id: &str, bytes: &[u8]) {
        self.media.lock().unwrap().insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().push(id.to_string());
    }

    pub fn rate_limit_next(&self, count: usize) {
        self.rate_limits.store(count, Ordering::SeqCst);
    }

    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size, Ordering::SeqCst);
    }

    /// Answer the next `count` API calls with 401, as for a revoked token
    pub fn unauthorized_next(&self, count: usize) {
        self.unauthorized.store(count, Ordering::SeqCst);
    }

    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.token_requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn is_failing(&self, id: &str) -> bool {
        self.failing.lock().unwrap().iter().any(|f| f == id)
    }

    /// Common gate: auth, rate limiting, forced failures
    fn gate(&self, headers: &HeaderMap, id: &str) -> Option<Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let revoked = self.unauthorized.load(Ordering::SeqCst);
        if revoked > 0 {
            self.unauthorized.store(revoked - 1, Ordering::SeqCst);
            return Some((StatusCode::UNAUTHORIZED, "token revoked").into_response());
        }

        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TEST_TOKEN))
            .unwrap_or(false);
        if !authorized {
            return Some((StatusCode::UNAUTHORIZED, "missing bearer token").into_response());
        }

        let pending = self.rate_limits.load(Ordering::SeqCst);
        if pending > 0 {
            self.rate_limits.store(pending - 1, Ordering::SeqCst);
            return Some((StatusCode::TOO_MANY_REQUESTS, "slow down").into_response());
        }

        if self.is_failing(id) {
            return Some((StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response());
        }
        None
    }
}

/// Folder id out of `'<id>' in parents and trashed = false`
fn parent_from_query(q: &str) -> Option<&str> {
    let rest = q.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

async fn list_files(
    State(fake): State<Arc<FakeGoogle>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    let Some(folder_id) = parent_from_query(&q) else {
        return (StatusCode::BAD_REQUEST, "bad query").into_response();
    };
    if let Some(response) = fake.gate(&headers, folder_id) {
        return response;
    }

    let Some(children) = fake.folders.lock().unwrap().get(folder_id).cloned() else {
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    let page_size = fake.page_size.load(Ordering::SeqCst).max(1);
    let start: usize = params
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let end = (start + page_size).min(children.len());

    let files: Vec<_> = children[start.min(end)..end]
        .iter()
        .map(|(id, name, mime)| json!({"id": id, "name": name, "mimeType": mime}))
        .collect();

    let mut body = json!({ "files": files });
    if end < children.len() {
        body["nextPageToken"] = json!(end.to_string());
    }
    Json(body).into_response()
}

async fn get_media(
    State(fake): State<Arc<FakeGoogle>>,
    headers: HeaderMap,
    Path(file_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(response) = fake.gate(&headers, &file_id) {
        return response;
    }
    if params.get("alt").map(String::as_str) != Some("media") {
        return (StatusCode::BAD_REQUEST, "metadata not supported").into_response();
    }
    match fake.media.lock().unwrap().get(&file_id).cloned() {
        Some(bytes) => bytes.into_response(),
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

async fn get_values(
    State(fake): State<Arc<FakeGoogle>>,
    headers: HeaderMap,
    Path((spreadsheet_id, range)): Path<(String, String)>,
) -> Response {
    if let Some(response) = fake.gate(&headers, &spreadsheet_id) {
        return response;
    }
    let key = (spreadsheet_id, range.clone());
    match fake.sheets.lock().unwrap().get(&key).cloned() {
        // Sheets omits `values` entirely for an empty range
        Some(rows) if rows.is_empty() => Json(json!({ "range": range })).into_response(),
        Some(rows) => Json(json!({ "range": range, "values": rows })).into_response(),
        None => (StatusCode::BAD_REQUEST, "Unable to parse range").into_response(),
    }
}

/// OAuth token endpoint: records the form and hands out the test token
async fn issue_token(
    State(fake): State<Arc<FakeGoogle>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    fake.token_requests.lock().unwrap().push(form);
    Json(json!({ "access_token": TEST_TOKEN, "expires_in": 3600, "token_type": "Bearer" })).into_response()
}

pub struct TestServer {
    pub fake: Arc<FakeGoogle>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start(fake: Arc<FakeGoogle>) -> Self {
        let app = Router::new()
            .route("/drive/v3/files", get(list_files))
            .route("/drive/v3/files/{file_id}", get(get_media))
            .route("/sheets/v4/spreadsheets/{spreadsheet_id}/values/{range}", get(get_values))
            .route("/token", post(issue_token))
            .with_state(Arc::clone(&fake));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { fake, addr }
    }

    pub fn token_uri(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn client(&self) -> GoogleClient {
        self.with_fake_urls(GoogleClient::with_token_provider(TokenProvider::fixed(TEST_TOKEN)).unwrap())
    }

    /// Point an existing client at this server
    pub fn with_fake_urls(&self, client: GoogleClient) -> GoogleClient {
        client
            .with_base_urls(
                format!("http://{}/drive/v3", self.addr),
                format!("http://{}/sheets/v4", self.addr),
            )
            .with_initial_backoff(Duration::from_millis(5))
    }
}
