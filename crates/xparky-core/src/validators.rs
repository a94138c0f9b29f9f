//! Validation of submitted achievements and classroom submission files.
//!
//! Classroom files follow the naming scheme `<STUDENT NUMBER>_<anything>`
//! with one of CERTIFICATE, BADGE or PROJECT somewhere in the name.

use std::collections::HashSet;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{AchievementKind, NewSubmission, SheetTable, Submission, VerificationStatus};

/// Maximum length of a student number
const MAX_STUDENT_NUMBER_LENGTH: usize = 32;

/// Drive file ids are long URL-safe tokens; anything shorter is a typo
const MIN_DRIVE_FILE_ID_LENGTH: usize = 10;

/// Columns of a known-issuance sheet
pub const ISSUANCE_COLUMNS: [&str; 3] = ["Student Number", "Kind", "Reference"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("student number is empty")]
    EmptyStudentNumber,

    #[error("student number '{0}' is longer than 32 characters")]
    StudentNumberTooLong(String),

    #[error("student number '{0}' may only contain letters, digits and '-'")]
    InvalidStudentNumber(String),

    #[error("student number '{0}' is not on the cadet roster")]
    UnknownCadet(String),

    #[error("proof is empty")]
    EmptyProof,

    #[error("proof link must use https: {0}")]
    InsecureProofLink(String),

    #[error("proof is neither an https link nor a Drive file id: {0}")]
    MalformedProof(String),

    #[error("this {kind} has already been submitted for {student_number}")]
    Duplicate {
        student_number: String,
        kind: AchievementKind,
    },

    #[error("no {kind} matching this proof was issued to {student_number}")]
    NotIssued {
        student_number: String,
        kind: AchievementKind,
    },
}

/// Canonical form of a student number used as a join key everywhere
pub fn normalize_student_number(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn validate_student_number(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyStudentNumber);
    }
    if trimmed.chars().count() > MAX_STUDENT_NUMBER_LENGTH {
        return Err(ValidationError::StudentNumberTooLong(trimmed.to_string()));
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidStudentNumber(trimmed.to_string()));
    }
    Ok(normalize_student_number(trimmed))
}

/// A classroom submission file recognised as worth points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    pub student_number: String,
    pub kind: AchievementKind,
}

/// Classify a classroom submission by its file name.
///
/// PROJECT takes precedence over CERTIFICATE, which takes precedence over
/// BADGE. Names without a keyword, or without a valid student number
/// before the first `_`, are not worth points.
pub fn classify_submission_file(name: &str) -> Option<ClassifiedFile> {
    let upper = name.to_uppercase();

    let kind = if upper.contains("PROJECT") {
        AchievementKind::Project
    } else if upper.contains("CERTIFICATE") {
        AchievementKind::Certificate
    } else if upper.contains("BADGE") {
        AchievementKind::Badge
    } else {
        return None;
    };

    let prefix = upper.split('_').next().unwrap_or_default();
    match validate_student_number(prefix) {
        Ok(student_number) => Some(ClassifiedFile { student_number, kind }),
        Err(e) => {
            debug!(file = %name, error = %e, "Skipping submission file without a student number");
            None
        }
    }
}

/// True when `s` looks like a Drive file id
fn is_drive_file_id(s: &str) -> bool {
    s.len() >= MIN_DRIVE_FILE_ID_LENGTH
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check a proof reference: an https link with a host, or a bare Drive file id.
pub fn validate_proof(raw: &str) -> Result<String, ValidationError> {
    let proof = raw.trim();
    if proof.is_empty() {
        return Err(ValidationError::EmptyProof);
    }

    if proof.contains("://") {
        let url = Url::parse(proof).map_err(|_| ValidationError::MalformedProof(proof.to_string()))?;
        if url.scheme() != "https" {
            return Err(ValidationError::InsecureProofLink(proof.to_string()));
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(ValidationError::MalformedProof(proof.to_string()));
        }
        return Ok(proof.to_string());
    }

    if is_drive_file_id(proof) {
        Ok(proof.to_string())
    } else {
        Err(ValidationError::MalformedProof(proof.to_string()))
    }
}

/// Issuances recorded by program staff, used to cross-check submissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnownIssuances {
    entries: HashSet<(String, AchievementKind, String)>,
}

impl KnownIssuances {
    /// Build from a sheet with `Student Number`, `Kind` and `Reference` columns.
    /// Rows with an unrecognised kind are skipped.
    pub fn from_table(table: &SheetTable) -> Self {
        let entries = table
            .rows
            .iter()
            .filter_map(|row| {
                let student = normalize_student_number(row.get("Student Number")?);
                let kind = row.get("Kind")?.parse::<AchievementKind>().ok()?;
                let reference = row.get("Reference")?.trim().to_lowercase();
                if student.is_empty() || reference.is_empty() {
                    return None;
                }
                Some((student, kind, reference))
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, student_number: &str, kind: AchievementKind, reference: &str) -> bool {
        self.entries.contains(&(
            normalize_student_number(student_number),
            kind,
            reference.trim().to_lowercase(),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a submission is checked against.
#[derive(Debug, Default)]
pub struct ValidationContext<'a> {
    /// Normalized student numbers of the roster, when the roster is available
    pub known_students: Option<&'a HashSet<String>>,
    pub existing: &'a [Submission],
    pub issuances: Option<&'a KnownIssuances>,
}

/// Validate a submission, returning it with normalized student number and proof.
pub fn validate_submission(
    submission: &NewSubmission,
    ctx: &ValidationContext<'_>,
) -> Result<NewSubmission, ValidationError> {
    let student_number = validate_student_number(&submission.student_number)?;

    if let Some(known) = ctx.known_students {
        if !known.contains(&student_number) {
            return Err(ValidationError::UnknownCadet(student_number));
        }
    }

    let proof = validate_proof(&submission.proof)?;

    let duplicate = ctx.existing.iter().any(|s| {
        s.student_number == student_number
            && s.kind() == submission.kind
            && s.achievement.status != VerificationStatus::Rejected
            && s.proof().eq_ignore_ascii_case(&proof)
    });
    if duplicate {
        return Err(ValidationError::Duplicate {
            student_number,
            kind: submission.kind,
        });
    }

    if let Some(issuances) = ctx.issuances {
        if !issuances.contains(&student_number, submission.kind, &proof) {
            return Err(ValidationError::NotIssued {
                student_number,
                kind: submission.kind,
            });
        }
    }

    Ok(NewSubmission {
        student_number,
        kind: submission.kind,
        proof,
    })
}
