//! API client for the Google Drive v3 and Sheets v4 REST APIs.
//!
//! Every operation exists in a fallible `try_` form returning `Result`, so
//! callers can tell "no data" from "API failure". The plain forms log the
//! failure and return an empty/absent result instead.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{ServiceAccountKey, TokenProvider};
use crate::models::{DriveFile, FileListResponse, SheetTable, ValueRange};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for Drive v3 endpoints
const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Sheets v4 endpoints
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Largest page size Drive accepts for files.list
const DRIVE_PAGE_SIZE: &str = "1000";

/// Columns fetched from every sheet
const SHEET_COLUMNS: &str = "A1:Z";

/// Google API client.
/// Clone is cheap - reqwest::Client and the token provider are shared.
#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
    tokens: Arc<TokenProvider>,
    drive_base: String,
    sheets_base: String,
    initial_backoff: Duration,
}

impl GoogleClient {
    /// Create a client authenticating as the given service account
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let client = Self::http_client()?;
        let tokens = TokenProvider::service_account(key, client.clone());
        Ok(Self::from_parts(client, tokens))
    }

    /// Create a client with an explicit token provider
    pub fn with_token_provider(tokens: TokenProvider) -> Result<Self> {
        Ok(Self::from_parts(Self::http_client()?, tokens))
    }

    fn http_client() -> Result<Client> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?)
    }

    fn from_parts(client: Client, tokens: TokenProvider) -> Self {
        Self {
            client,
            tokens: Arc::new(tokens),
            drive_base: DRIVE_BASE_URL.to_string(),
            sheets_base: SHEETS_BASE_URL.to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Point the client at other Drive/Sheets hosts (emulators, tests)
    pub fn with_base_urls(mut self, drive_base: impl Into<String>, sheets_base: impl Into<String>) -> Self {
        self.drive_base = drive_base.into();
        self.sheets_base = sheets_base.into();
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    // ===== Request plumbing =====

    fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base).with_context(|| format!("Invalid base URL {}", base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Base URL {} cannot have path segments", base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send_get(&self, url: &Url) -> Result<Response> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let token = self.tokens.token().await?;
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(token)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url.path()))?;

            if response.status().as_u16() == 401 {
                // Force a fresh token for the next call
                self.tokens.invalidate().await;
            }

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(path = url.path(), retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        self.send_get(url)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url.path()))
    }

    // ===== Drive =====

    /// List the non-trashed children of a Drive folder, following pagination.
    pub async fn try_list_files_in_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!("'{}' in parents and trashed = false", escape_query_literal(folder_id));
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Self::endpoint(&self.drive_base, &["files"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", &query)
                    .append_pair("fields", "nextPageToken, files(id, name, mimeType)")
                    .append_pair("pageSize", DRIVE_PAGE_SIZE)
                    .append_pair("supportsAllDrives", "true")
                    .append_pair("includeItemsFromAllDrives", "true");
                if let Some(ref token) = page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let page: FileListResponse = self
                .get(&url)
                .await
                .with_context(|| format!("Failed to list files in folder {}", folder_id))?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder_id = %folder_id, count = files.len(), "Listed folder");
        Ok(files)
    }

    /// List a folder, logging failures and returning an empty list instead.
    pub async fn list_files_in_folder(&self, folder_id: &str) -> Vec<DriveFile> {
        match self.try_list_files_in_folder(folder_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(folder_id = %folder_id, error = %format!("{:#}", e), "Error listing files");
                Vec::new()
            }
        }
    }

    /// Download a Drive file's content (`alt=media`)
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let mut url = Self::endpoint(&self.drive_base, &["files", file_id])?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true");

        let bytes = self
            .send_get(&url)
            .await
            .with_context(|| format!("Failed to download file {}", file_id))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read content of file {}", file_id))?;
        Ok(bytes.to_vec())
    }

    // ===== Sheets =====

    /// Fetch columns A–Z of a sheet. The first row becomes the headers;
    /// `Ok(None)` when the sheet has no data rows.
    pub async fn try_get_sheet_data(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<Option<SheetTable>> {
        let range = a1_range(sheet_name);
        let url = Self::endpoint(&self.sheets_base, &["spreadsheets", spreadsheet_id, "values", range.as_str()])?;

        let values: ValueRange = self
            .get(&url)
            .await
            .with_context(|| format!("Failed to get sheet data for {} ({})", spreadsheet_id, range))?;

        let table = SheetTable::from_values(values.into_strings());
        debug!(
            spreadsheet_id = %spreadsheet_id,
            range = %range,
            rows = table.as_ref().map(|t| t.len()).unwrap_or(0),
            "Fetched sheet"
        );
        Ok(table)
    }

    /// Fetch a sheet, logging failures and returning `None` instead.
    pub async fn get_sheet_data(&self, spreadsheet_id: &str, sheet_name: &str) -> Option<SheetTable> {
        match self.try_get_sheet_data(spreadsheet_id, sheet_name).await {
            Ok(table) => table,
            Err(e) => {
                warn!(spreadsheet_id = %spreadsheet_id, sheet = %sheet_name, error = %format!("{:#}", e), "Error getting sheet data");
                None
            }
        }
    }
}

/// Escape a value for use inside a single-quoted Drive query literal
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A1 range covering columns A–Z of `sheet_name`. Names made only of ASCII
/// letters, digits and `_` are left bare; anything else is quoted, with
/// embedded quotes doubled.
pub fn a1_range(sheet_name: &str) -> String {
    let plain = !sheet_name.is_empty() && sheet_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        format!("{}!{}", sheet_name, SHEET_COLUMNS)
    } else {
        format!("'{}'!{}", sheet_name.replace('\'', "''"), SHEET_COLUMNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a1_range() {
        assert_eq!(a1_range("Data"), "Data!A1:Z");
        assert_eq!(a1_range("Form_Responses1"), "Form_Responses1!A1:Z");
        assert_eq!(a1_range("Form Responses 1"), "'Form Responses 1'!A1:Z");
        assert_eq!(a1_range("Cadet's Sheet"), "'Cadet''s Sheet'!A1:Z");
    }

    #[test]
    fn test_a1_range_quotes_everything_but_word_characters() {
        assert_eq!(a1_range("_"), "_!A1:Z");
        assert_eq!(a1_range("Week_2_2024"), "Week_2_2024!A1:Z");
        assert_eq!(a1_range("Week-2"), "'Week-2'!A1:Z");
        assert_eq!(a1_range("Résumé"), "'Résumé'!A1:Z");
        assert_eq!(a1_range(""), "''!A1:Z");
    }

    #[test]
    fn test_escape_query_literal() {
        assert_eq!(escape_query_literal("1AbC"), "1AbC");
        assert_eq!(escape_query_literal("o'brien"), "o\\'brien");
        assert_eq!(escape_query_literal("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = GoogleClient::endpoint(
            "https://sheets.googleapis.com/v4/",
            &["spreadsheets", "abc", "values", "'Form Responses 1'!A1:Z"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Form%20Responses%201'!A1:Z"
        );
    }
}
