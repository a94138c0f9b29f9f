//! Self-reported achievements awaiting staff review.
//!
//! Stored as a JSON array in `submissions.json`. Every mutation is written
//! through before it returns; a failed write leaves memory unchanged.
//! Submissions are never deleted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Achievement, NewSubmission, Submission, TransitionError, VerificationStatus};
use crate::processor::AwardedAchievement;
use crate::validators::{normalize_student_number, validate_submission, KnownIssuances, ValidationContext, ValidationError};

pub const SUBMISSIONS_FILE: &str = "submissions.json";

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("submission {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What a new submission is checked against besides the store itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubmissionChecks<'a> {
    pub known_students: Option<&'a HashSet<String>>,
    pub issuances: Option<&'a KnownIssuances>,
}

pub struct SubmissionStore {
    path: PathBuf,
    submissions: Vec<Submission>,
    next_id: u64,
}

impl SubmissionStore {
    /// Open the store in `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let path = data_dir.join(SUBMISSIONS_FILE);

        let submissions: Vec<Submission> = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Vec::new()
        };

        let next_id = submissions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        debug!(path = %path.display(), count = submissions.len(), "Opened submission store");
        Ok(Self {
            path,
            submissions,
            next_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(&self.submissions)?;
        // Write to a sibling file and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Validate and store a new pending submission
    pub fn submit(
        &mut self,
        submission: &NewSubmission,
        checks: SubmissionChecks<'_>,
    ) -> Result<Submission, SubmissionError> {
        let ctx = ValidationContext {
            known_students: checks.known_students,
            existing: &self.submissions,
            issuances: checks.issuances,
        };
        let valid = validate_submission(submission, &ctx)?;

        let created = Submission {
            id: self.next_id,
            student_number: valid.student_number,
            achievement: Achievement::pending(valid.kind, valid.proof),
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewer_note: None,
        };

        self.submissions.push(created.clone());
        if let Err(e) = self.persist() {
            self.submissions.pop();
            return Err(e.into());
        }
        self.next_id += 1;

        info!(id = created.id, student = %created.student_number, kind = %created.kind(), "Submission received");
        Ok(created)
    }

    pub fn verify(&mut self, id: u64, note: Option<&str>) -> Result<Submission, SubmissionError> {
        self.review(id, VerificationStatus::Verified, note)
    }

    pub fn reject(&mut self, id: u64, note: Option<&str>) -> Result<Submission, SubmissionError> {
        self.review(id, VerificationStatus::Rejected, note)
    }

    fn review(
        &mut self,
        id: u64,
        to: VerificationStatus,
        note: Option<&str>,
    ) -> Result<Submission, SubmissionError> {
        let index = self
            .submissions
            .iter()
            .position(|s| s.id == id)
            .ok_or(SubmissionError::NotFound(id))?;

        let before = self.submissions[index].clone();
        let submission = &mut self.submissions[index];
        match to {
            VerificationStatus::Verified => submission.achievement.verify()?,
            VerificationStatus::Rejected => submission.achievement.reject()?,
            VerificationStatus::Pending => {
                return Err(TransitionError {
                    from: submission.achievement.status,
                    to,
                }
                .into())
            }
        }
        submission.reviewed_at = Some(Utc::now());
        submission.reviewer_note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        let reviewed = submission.clone();

        if let Err(e) = self.persist() {
            self.submissions[index] = before;
            return Err(e.into());
        }

        info!(id, status = ?to, student = %reviewed.student_number, "Submission reviewed");
        Ok(reviewed)
    }

    pub fn get(&self, id: u64) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    /// Submissions in id order, optionally only those with `status`
    pub fn list(&self, status: Option<VerificationStatus>) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| status.map_or(true, |wanted| s.achievement.status == wanted))
            .collect()
    }

    pub fn for_student(&self, student_number: &str) -> Vec<&Submission> {
        let key = normalize_student_number(student_number);
        self.submissions
            .iter()
            .filter(|s| s.student_number == key)
            .collect()
    }

    pub fn all(&self) -> &[Submission] {
        &self.submissions
    }

    /// Every submission as an achievement credited to its student
    pub fn achievements(&self) -> Vec<AwardedAchievement> {
        self.submissions
            .iter()
            .map(|s| AwardedAchievement::new(s.student_number.clone(), s.achievement.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}
