use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Achievement, AchievementKind};

/// A submission as received from a cadet, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub student_number: String,
    pub kind: AchievementKind,
    /// Proof link or Drive file id
    pub proof: String,
}

/// A self-reported achievement tracked through review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    pub student_number: String,
    pub achievement: Achievement,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_note: Option<String>,
}

impl Submission {
    pub fn kind(&self) -> AchievementKind {
        self.achievement.kind
    }

    pub fn proof(&self) -> &str {
        &self.achievement.reference
    }
}
