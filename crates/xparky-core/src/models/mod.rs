//! Data models for XParky entities.
//!
//! - `Cadet`, `LeaderboardEntry`: program participants and their ranking
//! - `Achievement`, `AchievementKind`, `VerificationStatus`: credit-bearing records
//! - `Submission`: a self-reported achievement with review metadata
//! - `SheetTable`, `SheetRow`: header-keyed spreadsheet rows
//! - `DriveFile`: Drive file metadata

pub mod achievement;
pub mod cadet;
pub mod drive;
pub mod sheet;
pub mod submission;

pub use achievement::{Achievement, AchievementKind, TransitionError, VerificationStatus};
pub use cadet::{Cadet, LeaderboardEntry};
pub use drive::{DriveFile, FileListResponse};
pub use sheet::{SheetRow, SheetTable, ValueRange};
pub use submission::{NewSubmission, Submission};
