//! XP point values and totals.
//!
//! Every achievement kind is worth a fixed number of points taken from a
//! single [`PointTable`]. Only verified achievements count toward a total.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{Achievement, AchievementKind};

/// Points per certificate
pub const CERTIFICATE_POINTS: u32 = 100;

/// Points per badge
pub const BADGE_POINTS: u32 = 100;

/// Points per project
pub const PROJECT_POINTS: u32 = 150;

/// Points per regular evaluation form (class attendance)
pub const ATTENDANCE_POINTS: u32 = 200;

/// Points per onboarding evaluation form
pub const ONBOARDING_ATTENDANCE_POINTS: u32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointTable {
    pub certificate: u32,
    pub badge: u32,
    pub project: u32,
    pub attendance: u32,
    pub onboarding_attendance: u32,
}

impl Default for PointTable {
    fn default() -> Self {
        Self {
            certificate: CERTIFICATE_POINTS,
            badge: BADGE_POINTS,
            project: PROJECT_POINTS,
            attendance: ATTENDANCE_POINTS,
            onboarding_attendance: ONBOARDING_ATTENDANCE_POINTS,
        }
    }
}

impl PointTable {
    pub fn points_for(&self, kind: AchievementKind) -> u32 {
        match kind {
            AchievementKind::Certificate => self.certificate,
            AchievementKind::Badge => self.badge,
            AchievementKind::Project => self.project,
            AchievementKind::Attendance => self.attendance,
            AchievementKind::OnboardingAttendance => self.onboarding_attendance,
        }
    }

    /// Points an achievement currently contributes (zero unless verified)
    pub fn award(&self, achievement: &Achievement) -> u32 {
        if achievement.is_verified() {
            self.points_for(achievement.kind)
        } else {
            0
        }
    }

    /// Sum of awarded points, capped at `u32::MAX`
    pub fn total_xp<'a>(&self, achievements: impl IntoIterator<Item = &'a Achievement>) -> u32 {
        achievements
            .into_iter()
            .fold(0u32, |total, a| total.saturating_add(self.award(a)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsSummary {
    pub total_students: usize,
    pub total_points: u64,
    pub average_points: f64,
    pub highest_points: u32,
    pub lowest_points: u32,
}

impl PointsSummary {
    pub fn from_points(points: impl IntoIterator<Item = u32>) -> Self {
        let points: Vec<u32> = points.into_iter().collect();
        let total_points: u64 = points.iter().map(|&p| u64::from(p)).sum();
        let average_points = if points.is_empty() {
            0.0
        } else {
            total_points as f64 / points.len() as f64
        };

        Self {
            total_students: points.len(),
            total_points,
            average_points,
            highest_points: points.iter().copied().max().unwrap_or(0),
            lowest_points: points.iter().copied().min().unwrap_or(0),
        }
    }

    pub fn log(&self) {
        info!(
            total_students = self.total_students,
            total_points = self.total_points,
            average_points = %format!("{:.2}", self.average_points),
            highest_points = self.highest_points,
            lowest_points = self.lowest_points,
            "XParky points summary"
        );
    }
}
