use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Token endpoint used when the key file omits `token_uri`
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The fields of a Google service account JSON key that token minting needs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

// Keep the private key out of logs
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut key: ServiceAccountKey =
            serde_json::from_str(json).context("Failed to parse service account key JSON")?;

        // Keys pasted through env files often carry literal "\n" sequences
        if !key.private_key.contains('\n') && key.private_key.contains("\\n") {
            key.private_key = key.private_key.replace("\\n", "\n");
        }

        if key.client_email.trim().is_empty() {
            anyhow::bail!("Service account key has an empty client_email");
        }
        if !key.private_key.contains("PRIVATE KEY") {
            anyhow::bail!("Service account key does not contain a PEM private key");
        }
        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key file {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Load from the `GOOGLE_SHEETS_CREDENTIALS` value, which holds either
    /// the key JSON itself or a path to the key file.
    pub fn from_env_value(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.starts_with('{') {
            Self::from_json(trimmed)
        } else {
            Self::from_file(Path::new(trimmed))
        }
    }
}
