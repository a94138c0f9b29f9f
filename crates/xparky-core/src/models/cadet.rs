use serde::{Deserialize, Serialize};

use super::Achievement;
use crate::points::PointTable;

/// A program participant. XP is always derived from `achievements`,
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadet {
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl Cadet {
    pub fn new(
        student_number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            student_number: student_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            achievements: Vec::new(),
        }
    }

    /// Placeholder for a student number that earned points but is missing
    /// from the roster.
    pub fn unknown(student_number: impl Into<String>) -> Self {
        Self::new(student_number, "Unknown", "Student")
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn total_xp(&self, table: &PointTable) -> u32 {
        table.total_xp(&self.achievements)
    }

    pub fn to_entry(&self, table: &PointTable) -> LeaderboardEntry {
        LeaderboardEntry {
            student_number: self.student_number.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            xp: self.total_xp(table),
        }
    }
}

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub student_number: String,
    pub first_name: String,
    pub last_name: String,
    pub xp: u32,
}
