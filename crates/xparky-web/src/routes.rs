//! HTTP handlers for the dashboard API.
//!
//! # Endpoints
//!
//! - `GET /api/v1/leaderboard?search=` - ranked cadets
//! - `GET /api/v1/leaderboard.csv?search=` - the same rows as CSV
//! - `POST /api/v1/leaderboard/refresh` - force a refresh (admin)
//! - `GET /api/v1/cadets/{student_number}` - one cadet with achievements
//! - `POST /api/v1/submissions` - submit an achievement for review
//! - `GET /api/v1/submissions?status=` - list submissions (admin)
//! - `POST /api/v1/submissions/{id}/verify`, `/reject` - review (admin)
//! - `GET /api/v1/certificates/events` - certificate events
//! - `GET /api/v1/certificates/events/{event}` - recipients of an event
//! - `GET /api/v1/certificates/events/{event}/{name}` - certificate image
//! - `GET /api/v1/theme` - theme colors and progress bar scale

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use xparky_core::config::ThemeConfig;
use xparky_core::models::NewSubmission;
use xparky_core::utils::entries_to_csv;
use xparky_core::{
    Achievement, AchievementKind, LeaderboardEntry, PointTable, PointsSummary, Submission,
    VerificationStatus,
};

use crate::problem::{from_submission_error, ProblemDetails};
use crate::state::{AppState, ReviewDecision};

/// Header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// File name offered for the CSV export
const CSV_FILE_NAME: &str = "xparky_points.csv";

type ApiResult<T> = Result<T, ProblemDetails>;

/// Generate a unique request ID for tracing.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    format!("req-{:x}", timestamp)
}

fn require_admin(state: &AppState, headers: &HeaderMap, request_id: &str) -> ApiResult<()> {
    let Some(expected) = state.admin_token() else {
        return Err(ProblemDetails::forbidden(
            "Admin endpoints are disabled; set XPARKY_ADMIN_TOKEN to enable them",
            request_id,
        ));
    };

    match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(given) if tokens_match(given, expected) => Ok(()),
        Some(_) => Err(ProblemDetails::forbidden("Invalid admin token", request_id)),
        None => Err(ProblemDetails::unauthorized(
            format!("Missing {} header", ADMIN_TOKEN_HEADER),
            request_id,
        )),
    }
}

/// Compare without short-circuiting on the first differing byte
fn tokens_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Progress bar fill in [0, 1]
fn progress(xp: u32, max: u32) -> f64 {
    if max == 0 {
        return 1.0;
    }
    (f64::from(xp) / f64::from(max)).min(1.0)
}

// ============================================================================
// Leaderboard
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
}

/// A leaderboard row as shown publicly. Student numbers stay private.
#[derive(Debug, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub first_name: String,
    pub last_name: String,
    pub xp: u32,
    pub progress: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<RankedEntry>,
    /// Entries matching the search
    pub found: usize,
    pub total: usize,
    pub roster_available: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

async fn load_leaderboard(
    state: &AppState,
    request_id: &str,
) -> ApiResult<std::sync::Arc<xparky_core::Leaderboard>> {
    state.leaderboard().await.map_err(|e| {
        error!(request_id = %request_id, error = %format!("{:#}", e), "Leaderboard unavailable");
        ProblemDetails::upstream_unavailable(
            "Could not load data from Google Drive or Sheets",
            request_id,
        )
    })
}

/// `GET /api/v1/leaderboard`
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let request_id = generate_request_id();
    let board = load_leaderboard(&state, &request_id).await?;
    let max = state.config().progress_max;

    let query = params.search.unwrap_or_default();
    let entries: Vec<RankedEntry> = board
        .search_ranked(&query)
        .into_iter()
        .map(|(rank, e)| RankedEntry {
            rank,
            first_name: e.first_name.clone(),
            last_name: e.last_name.clone(),
            xp: e.xp,
            progress: progress(e.xp, max),
        })
        .collect();

    Ok(Json(LeaderboardResponse {
        found: entries.len(),
        total: board.entries.len(),
        entries,
        roster_available: board.roster_available,
        warnings: board.warnings.clone(),
        updated_at: state.data_fetched_at().await,
    }))
}

/// `GET /api/v1/leaderboard.csv`
pub async fn get_leaderboard_csv(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Response> {
    let request_id = generate_request_id();
    let board = load_leaderboard(&state, &request_id).await?;

    let query = params.search.unwrap_or_default();
    let rows: Vec<&LeaderboardEntry> = board.search(&query);
    let csv = entries_to_csv(rows).map_err(|e| {
        ProblemDetails::internal_error(format!("Failed to write CSV: {:#}", e), &request_id)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILE_NAME),
            ),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub cadets: usize,
    pub summary: PointsSummaryView,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointsSummaryView {
    pub total_points: u64,
    pub average_points: f64,
    pub highest_points: u32,
    pub lowest_points: u32,
}

impl From<PointsSummary> for PointsSummaryView {
    fn from(summary: PointsSummary) -> Self {
        Self {
            total_points: summary.total_points,
            average_points: summary.average_points,
            highest_points: summary.highest_points,
            lowest_points: summary.lowest_points,
        }
    }
}

/// `POST /api/v1/leaderboard/refresh`
pub async fn refresh_leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RefreshResponse>> {
    let request_id = generate_request_id();
    require_admin(&state, &headers, &request_id)?;

    let board = state.refresh(true).await.map_err(|e| {
        error!(request_id = %request_id, error = %format!("{:#}", e), "Forced refresh failed");
        ProblemDetails::upstream_unavailable(format!("{:#}", e), &request_id)
    })?;

    info!(request_id = %request_id, cadets = board.entries.len(), "Leaderboard refreshed on request");
    Ok(Json(RefreshResponse {
        cadets: board.entries.len(),
        summary: board.summary().into(),
        warnings: board.warnings.clone(),
    }))
}

// ============================================================================
// Cadets
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AchievementView {
    pub kind: AchievementKind,
    pub reference: String,
    pub status: VerificationStatus,
    /// Points this achievement currently contributes
    pub points: u32,
}

impl AchievementView {
    fn new(achievement: &Achievement, table: &PointTable) -> Self {
        Self {
            kind: achievement.kind,
            reference: achievement.reference.clone(),
            status: achievement.status,
            points: table.award(achievement),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CadetResponse {
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub xp: u32,
    pub rank: usize,
    pub progress: f64,
    pub achievements: Vec<AchievementView>,
}

/// `GET /api/v1/cadets/{student_number}`
pub async fn get_cadet(
    State(state): State<AppState>,
    Path(student_number): Path<String>,
) -> ApiResult<Json<CadetResponse>> {
    let request_id = generate_request_id();
    let board = load_leaderboard(&state, &request_id).await?;
    let table = &state.config().points;

    let cadet = board.cadet(&student_number).ok_or_else(|| {
        ProblemDetails::not_found(format!("No cadet with student number '{}'", student_number.trim()), &request_id)
    })?;

    let xp = cadet.total_xp(table);
    Ok(Json(CadetResponse {
        student_number: cadet.student_number.clone(),
        first_name: cadet.first_name.clone(),
        last_name: cadet.last_name.clone(),
        xp,
        rank: board.rank_of(&cadet.student_number).unwrap_or(0),
        progress: progress(xp, state.config().progress_max),
        achievements: cadet
            .achievements
            .iter()
            .map(|a| AchievementView::new(a, table))
            .collect(),
    }))
}

// ============================================================================
// Submissions
// ============================================================================

/// `POST /api/v1/submissions`
pub async fn create_submission(
    State(state): State<AppState>,
    Json(submission): Json<NewSubmission>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let request_id = generate_request_id();

    // Validate against a current roster when one can be had
    if let Err(e) = state.leaderboard().await {
        info!(request_id = %request_id, error = %format!("{:#}", e), "Accepting submission without roster check");
    }

    let created = state
        .submit(submission)
        .await
        .map_err(|e| from_submission_error(&e, &request_id))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/v1/submissions`
pub async fn list_submissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<Submission>>> {
    let request_id = generate_request_id();
    require_admin(&state, &headers, &request_id)?;

    let status = match params.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<VerificationStatus>()
                .map_err(|e| ProblemDetails::bad_request(e, &request_id))?,
        ),
        None => None,
    };

    Ok(Json(state.submissions(status).await))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// The body is optional; an empty body means no note.
fn parse_review(body: &Bytes, request_id: &str) -> ApiResult<ReviewRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReviewRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ProblemDetails::bad_request(format!("Invalid review body: {}", e), request_id))
}

async fn review(
    state: AppState,
    headers: HeaderMap,
    id: u64,
    body: Bytes,
    decision: ReviewDecision,
) -> ApiResult<Json<Submission>> {
    let request_id = generate_request_id();
    require_admin(&state, &headers, &request_id)?;
    let request = parse_review(&body, &request_id)?;

    let reviewed = state
        .review(id, decision, request.note.as_deref())
        .await
        .map_err(|e| from_submission_error(&e, &request_id))?;
    Ok(Json(reviewed))
}

/// `POST /api/v1/submissions/{id}/verify`
pub async fn verify_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    body: Bytes,
) -> ApiResult<Json<Submission>> {
    review(state, headers, id, body, ReviewDecision::Verify).await
}

/// `POST /api/v1/submissions/{id}/reject`
pub async fn reject_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    body: Bytes,
) -> ApiResult<Json<Submission>> {
    review(state, headers, id, body, ReviewDecision::Reject).await
}

// ============================================================================
// Certificates
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipientsResponse {
    pub event: String,
    pub names: Vec<String>,
}

fn require_certificates(state: &AppState, request_id: &str) -> ApiResult<()> {
    if state.certificates_enabled() {
        Ok(())
    } else {
        Err(ProblemDetails::not_found(
            "Certificates are not configured (CERTIFICATES_FOLDER_ID)",
            request_id,
        ))
    }
}

fn certificates_unavailable(e: anyhow::Error, request_id: &str) -> ProblemDetails {
    error!(request_id = %request_id, error = %format!("{:#}", e), "Certificates unavailable");
    ProblemDetails::upstream_unavailable("Could not load certificates from Google Drive", request_id)
}

/// `GET /api/v1/certificates/events`
pub async fn list_certificate_events(State(state): State<AppState>) -> ApiResult<Json<EventsResponse>> {
    let request_id = generate_request_id();
    require_certificates(&state, &request_id)?;

    let events = state
        .certificate_events()
        .await
        .map_err(|e| certificates_unavailable(e, &request_id))?;
    Ok(Json(EventsResponse { events }))
}

/// `GET /api/v1/certificates/events/{event}`
pub async fn list_certificate_names(
    State(state): State<AppState>,
    Path(event): Path<String>,
) -> ApiResult<Json<RecipientsResponse>> {
    let request_id = generate_request_id();
    require_certificates(&state, &request_id)?;

    let names = state
        .certificate_names(&event)
        .await
        .map_err(|e| certificates_unavailable(e, &request_id))?
        .ok_or_else(|| ProblemDetails::not_found(format!("No event named '{}'", event), &request_id))?;
    Ok(Json(RecipientsResponse { event, names }))
}

/// `GET /api/v1/certificates/events/{event}/{name}`
pub async fn download_certificate(
    State(state): State<AppState>,
    Path((event, name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let request_id = generate_request_id();
    require_certificates(&state, &request_id)?;

    let (file, bytes) = state
        .certificate(&event, &name)
        .await
        .map_err(|e| certificates_unavailable(e, &request_id))?
        .ok_or_else(|| {
            ProblemDetails::not_found(
                format!("No certificate for '{}' in event '{}'", name.trim(), event),
                &request_id,
            )
        })?;

    info!(request_id = %request_id, event = %event, recipient = %file.display_name, bytes = bytes.len(), "Certificate downloaded");

    let disposition = format!(
        "attachment; filename=\"{}_certificate.png\"",
        file.display_name.replace(['"', '\\'], "")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"certificate.png\""));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ============================================================================
// Theme
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ThemeResponse {
    pub theme: ThemeConfig,
    pub progress_max: u32,
    pub points: PointTable,
}

/// `GET /api/v1/theme`
pub async fn get_theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    let config = state.config();
    Json(ThemeResponse {
        theme: config.theme.clone(),
        progress_max: config.progress_max,
        points: config.points,
    })
}
