//! RFC 9457 Problem Details for the dashboard API.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use xparky_core::{SubmissionError, ValidationError};

pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";
pub const PROBLEM_NOT_FOUND: &str = "/problems/not-found";
pub const PROBLEM_CONFLICT: &str = "/problems/conflict";
pub const PROBLEM_UNAUTHORIZED: &str = "/problems/unauthorized";
pub const PROBLEM_FORBIDDEN: &str = "/problems/forbidden";
pub const PROBLEM_UPSTREAM_UNAVAILABLE: &str = "/problems/upstream-unavailable";
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_uri: String,

    pub title: String,

    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request identifier, for matching a response to its log lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_INVALID_REQUEST, "Invalid Request", StatusCode::BAD_REQUEST)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn not_found(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn conflict(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_CONFLICT, "Conflict", StatusCode::CONFLICT)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn unauthorized(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_UNAUTHORIZED, "Unauthorized", StatusCode::UNAUTHORIZED)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn forbidden(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_FORBIDDEN, "Forbidden", StatusCode::FORBIDDEN)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    /// Google Drive or Sheets could not be reached and nothing is cached
    pub fn upstream_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_UPSTREAM_UNAVAILABLE,
            "Data Source Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_INTERNAL_ERROR, "Internal Error", StatusCode::INTERNAL_SERVER_ERROR)
            .with_detail(detail)
            .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Map a submission store error to the matching problem.
pub fn from_submission_error(error: &SubmissionError, request_id: &str) -> ProblemDetails {
    match error {
        SubmissionError::Invalid(ValidationError::Duplicate { .. }) => {
            ProblemDetails::conflict(error.to_string(), request_id)
        }
        SubmissionError::Invalid(_) => ProblemDetails::bad_request(error.to_string(), request_id),
        SubmissionError::NotFound(_) => ProblemDetails::not_found(error.to_string(), request_id),
        SubmissionError::Transition(_) => ProblemDetails::conflict(error.to_string(), request_id),
        SubmissionError::Storage(e) => ProblemDetails::internal_error(format!("{:#}", e), request_id),
    }
}
