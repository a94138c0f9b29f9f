use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What an achievement was awarded for. The point value is a function of
/// the kind alone (see [`crate::points::PointTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Certificate,
    Badge,
    Project,
    Attendance,
    OnboardingAttendance,
}

impl AchievementKind {
    pub const ALL: [AchievementKind; 5] = [
        AchievementKind::Certificate,
        AchievementKind::Badge,
        AchievementKind::Project,
        AchievementKind::Attendance,
        AchievementKind::OnboardingAttendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::Certificate => "certificate",
            AchievementKind::Badge => "badge",
            AchievementKind::Project => "project",
            AchievementKind::Attendance => "attendance",
            AchievementKind::OnboardingAttendance => "onboarding_attendance",
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementKind {
    type Err = String;

    /// Lenient parse used for sheet cells: case-insensitive, accepts
    /// spaces or dashes in place of underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "certificate" => Ok(AchievementKind::Certificate),
            "badge" => Ok(AchievementKind::Badge),
            "project" => Ok(AchievementKind::Project),
            "attendance" => Ok(AchievementKind::Attendance),
            "onboarding_attendance" | "onboarding" => Ok(AchievementKind::OnboardingAttendance),
            _ => Err(format!("unknown achievement kind '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            _ => Err(format!("unknown status '{}'", s.trim())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot move achievement from {from} to {to}")]
pub struct TransitionError {
    pub from: VerificationStatus,
    pub to: VerificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub kind: AchievementKind,
    /// File name for Drive-derived achievements, proof link or file id for submissions
    pub reference: String,
    pub status: VerificationStatus,
}

impl Achievement {
    pub fn pending(kind: AchievementKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            status: VerificationStatus::Pending,
        }
    }

    /// Achievements read from instructor-managed Drive folders are verified
    /// by their presence there.
    pub fn verified(kind: AchievementKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            status: VerificationStatus::Verified,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }

    pub fn verify(&mut self) -> Result<(), TransitionError> {
        self.transition(VerificationStatus::Verified)
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        self.transition(VerificationStatus::Rejected)
    }

    // Only pending achievements can be reviewed.
    fn transition(&mut self, to: VerificationStatus) -> Result<(), TransitionError> {
        if self.status != VerificationStatus::Pending {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_lenient() {
        assert_eq!("Certificate".parse::<AchievementKind>(), Ok(AchievementKind::Certificate));
        assert_eq!(" BADGE ".parse::<AchievementKind>(), Ok(AchievementKind::Badge));
        assert_eq!("onboarding attendance".parse::<AchievementKind>(), Ok(AchievementKind::OnboardingAttendance));
        assert_eq!("Onboarding".parse::<AchievementKind>(), Ok(AchievementKind::OnboardingAttendance));
        assert!("trophy".parse::<AchievementKind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&AchievementKind::OnboardingAttendance).unwrap();
        assert_eq!(json, "\"onboarding_attendance\"");
        for kind in AchievementKind::ALL {
            assert_eq!(kind.as_str().parse::<AchievementKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_pending_transitions() {
        let mut a = Achievement::pending(AchievementKind::Badge, "link");
        assert!(!a.is_verified());
        a.verify().unwrap();
        assert!(a.is_verified());

        let mut b = Achievement::pending(AchievementKind::Badge, "link");
        b.reject().unwrap();
        assert_eq!(b.status, VerificationStatus::Rejected);
    }

    #[test]
    fn test_reviewed_achievements_are_final() {
        let mut a = Achievement::verified(AchievementKind::Project, "p");
        let err = a.reject().unwrap_err();
        assert_eq!(err.from, VerificationStatus::Verified);
        assert_eq!(err.to, VerificationStatus::Rejected);

        let mut b = Achievement::pending(AchievementKind::Project, "p");
        b.reject().unwrap();
        assert!(b.verify().is_err());
        assert_eq!(b.status, VerificationStatus::Rejected);
    }
}
