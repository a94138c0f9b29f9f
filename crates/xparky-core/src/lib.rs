//! Core library for the XParky points dashboard.
//!
//! - [`api`]: `GoogleClient` for the read-only Drive v3 and Sheets v4 APIs
//! - [`auth`]: service account keys and OAuth2 access tokens
//! - [`models`]: cadets, achievements, sheet tables, Drive files
//! - [`points`]: the point table and XP totals
//! - [`validators`]: submission and file-name checks
//! - [`processor`]: turns Drive/Sheets contents into a ranked leaderboard
//! - [`submissions`]: persisted self-reported achievements awaiting review
//! - [`cache`]: timestamped JSON snapshots
//! - [`config`]: environment settings and the JSON config file

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod points;
pub mod processor;
pub mod submissions;
pub mod utils;
pub mod validators;

pub use api::{ApiError, GoogleClient};
pub use config::{Config, ConfigError, Settings};
pub use models::{
    Achievement, AchievementKind, Cadet, DriveFile, LeaderboardEntry, SheetRow, SheetTable,
    Submission, VerificationStatus,
};
pub use points::{PointTable, PointsSummary};
pub use processor::{CertificateIndex, DataSource, DriveSnapshot, Leaderboard, Sources, XpProcessor};
pub use submissions::{SubmissionChecks, SubmissionError, SubmissionStore};
pub use validators::ValidationError;
