use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Achievement, AchievementKind, Cadet, LeaderboardEntry, Submission};
use crate::points::{PointTable, PointsSummary};
use crate::utils::{cmp_ignore_case, contains_ignore_case};
use crate::validators::{normalize_student_number, KnownIssuances};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("roster sheet has no data rows")]
    Empty,

    #[error("roster sheet is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// An achievement credited to a student number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardedAchievement {
    pub student_number: String,
    pub achievement: Achievement,
}

impl AwardedAchievement {
    pub fn new(student_number: impl Into<String>, achievement: Achievement) -> Self {
        Self {
            student_number: student_number.into(),
            achievement,
        }
    }
}

/// Where a part of the snapshot is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Roster,
    Classroom,
    EvaluationForms,
}

impl DataSource {
    /// The source that awards achievements of `kind`
    pub fn of(kind: AchievementKind) -> Self {
        match kind {
            AchievementKind::Certificate | AchievementKind::Badge | AchievementKind::Project => {
                DataSource::Classroom
            }
            AchievementKind::Attendance | AchievementKind::OnboardingAttendance => {
                DataSource::EvaluationForms
            }
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSource::Roster => "roster",
            DataSource::Classroom => "classroom",
            DataSource::EvaluationForms => "evaluation forms",
        })
    }
}

/// Everything read from Drive and Sheets in one refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveSnapshot {
    /// `None` when the roster could not be read
    pub roster: Option<Vec<Cadet>>,
    pub achievements: Vec<AwardedAchievement>,
    #[serde(default)]
    pub issuances: Option<KnownIssuances>,
    /// Sources that failed during the refresh
    #[serde(default)]
    pub failed: Vec<DataSource>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DriveSnapshot {
    /// Normalized student numbers on the roster, when the roster is known
    pub fn known_students(&self) -> Option<HashSet<String>> {
        self.roster
            .as_ref()
            .map(|cadets| cadets.iter().map(|c| c.student_number.clone()).collect())
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Fill every failed source with what `previous` had for it, so a
    /// transient Drive error does not zero anyone's points. Failed sources
    /// stay listed in `failed`. Returns the sources that were filled.
    pub fn carry_forward(&mut self, previous: &DriveSnapshot) -> Vec<DataSource> {
        let mut carried = Vec::new();
        for source in self.failed.clone() {
            match source {
                DataSource::Roster => {
                    if self.roster.is_none() && previous.roster.is_some() {
                        self.roster = previous.roster.clone();
                        carried.push(source);
                    }
                }
                DataSource::Classroom | DataSource::EvaluationForms => {
                    self.achievements.extend(
                        previous
                            .achievements
                            .iter()
                            .filter(|a| DataSource::of(a.achievement.kind) == source)
                            .cloned(),
                    );
                    carried.push(source);
                }
            }
        }

        for source in &carried {
            self.warnings
                .push(format!("{}: showing data from the previous refresh", source));
        }
        carried
    }
}

/// Ranked cadets with their achievements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    /// Same order as `entries`
    pub cadets: Vec<Cadet>,
    pub roster_available: bool,
    pub warnings: Vec<String>,
}

impl Leaderboard {
    /// Join the roster with Drive-derived achievements and submissions.
    ///
    /// With a roster every cadet appears (0 XP when nothing was earned) and
    /// achievements of unlisted student numbers are dropped. Without one,
    /// every student number with a verified achievement gets an
    /// `Unknown Student` row.
    pub fn build(snapshot: &DriveSnapshot, submissions: &[Submission], table: &PointTable) -> Self {
        let roster_available = snapshot.roster.is_some();
        let mut order: Vec<String> = Vec::new();
        let mut cadets: HashMap<String, Cadet> = HashMap::new();

        if let Some(ref roster) = snapshot.roster {
            for cadet in roster {
                let key = normalize_student_number(&cadet.student_number);
                if cadets.contains_key(&key) {
                    continue;
                }
                let mut cadet = cadet.clone();
                cadet.student_number = key.clone();
                cadet.achievements.clear();
                order.push(key.clone());
                cadets.insert(key, cadet);
            }
        }

        let awarded = snapshot.achievements.iter().cloned().chain(
            submissions
                .iter()
                .map(|s| AwardedAchievement::new(s.student_number.clone(), s.achievement.clone())),
        );

        // Verified first so points-only rows exist before pending ones attach
        let (verified, unverified): (Vec<_>, Vec<_>) =
            awarded.partition(|a| a.achievement.is_verified());

        for item in verified.into_iter().chain(unverified) {
            let key = normalize_student_number(&item.student_number);
            if !cadets.contains_key(&key) {
                if roster_available || !item.achievement.is_verified() {
                    continue;
                }
                order.push(key.clone());
                cadets.insert(key.clone(), Cadet::unknown(key.clone()));
            }
            if let Some(cadet) = cadets.get_mut(&key) {
                cadet.achievements.push(item.achievement);
            }
        }

        let mut ranked: Vec<(LeaderboardEntry, Cadet)> = order
            .into_iter()
            .filter_map(|key| cadets.remove(&key))
            .map(|cadet| (cadet.to_entry(table), cadet))
            .collect();

        ranked.sort_by(|(a, _), (b, _)| {
            b.xp.cmp(&a.xp)
                .then_with(|| cmp_ignore_case(&a.last_name, &b.last_name))
                .then_with(|| cmp_ignore_case(&a.first_name, &b.first_name))
                .then_with(|| a.student_number.cmp(&b.student_number))
        });

        let (entries, cadets) = ranked.into_iter().unzip();
        Self {
            entries,
            cadets,
            roster_available,
            warnings: snapshot.warnings.clone(),
        }
    }

    /// Entries whose first or last name contains `query`, ignoring case
    pub fn search(&self, query: &str) -> Vec<&LeaderboardEntry> {
        self.search_ranked(query).into_iter().map(|(_, e)| e).collect()
    }

    /// Like [`Leaderboard::search`], with each entry's 1-based rank computed
    /// in one pass over the sorted entries. Ties share the better rank.
    pub fn search_ranked(&self, query: &str) -> Vec<(usize, &LeaderboardEntry)> {
        let query = query.trim().to_lowercase();
        let mut rank = 0;
        let mut previous_xp = None;
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                if previous_xp != Some(e.xp) {
                    rank = i + 1;
                    previous_xp = Some(e.xp);
                }
                let matched = contains_ignore_case(&e.first_name, &query)
                    || contains_ignore_case(&e.last_name, &query);
                matched.then_some((rank, e))
            })
            .collect()
    }

    pub fn cadet(&self, student_number: &str) -> Option<&Cadet> {
        let key = normalize_student_number(student_number);
        self.cadets.iter().find(|c| c.student_number == key)
    }

    /// 1-based rank of a student, ties share the better rank
    pub fn rank_of(&self, student_number: &str) -> Option<usize> {
        let key = normalize_student_number(student_number);
        let entry = self.entries.iter().find(|e| e.student_number == key)?;
        Some(self.entries.iter().filter(|e| e.xp > entry.xp).count() + 1)
    }

    pub fn summary(&self) -> PointsSummary {
        PointsSummary::from_points(self.entries.iter().map(|e| e.xp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AchievementKind, VerificationStatus};
    use chrono::Utc;

    fn roster() -> Vec<Cadet> {
        vec![
            Cadet::new("a1", "Ada", "Lovelace"),
            Cadet::new("B2", "Grace", "Hopper"),
            Cadet::new("C3", "Alan", "Turing"),
        ]
    }

    fn award(student: &str, kind: AchievementKind) -> AwardedAchievement {
        AwardedAchievement::new(student, Achievement::verified(kind, format!("{}_{}", student, kind)))
    }

    fn submission(id: u64, student: &str, kind: AchievementKind, status: VerificationStatus) -> Submission {
        let mut achievement = Achievement::pending(kind, "https://example.com/proof");
        achievement.status = status;
        Submission {
            id,
            student_number: student.to_string(),
            achievement,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewer_note: None,
        }
    }

    #[test]
    fn test_left_join_keeps_every_cadet() {
        let snapshot = DriveSnapshot {
            roster: Some(roster()),
            achievements: vec![
                award("A1", AchievementKind::Project),
                award("B2", AchievementKind::Attendance),
                award("B2", AchievementKind::Badge),
                award("ZZ", AchievementKind::Project),
            ],
            ..Default::default()
        };

        let board = Leaderboard::build(&snapshot, &[], &PointTable::default());
        let xp: Vec<(&str, u32)> = board
            .entries
            .iter()
            .map(|e| (e.student_number.as_str(), e.xp))
            .collect();
        assert_eq!(xp, vec![("B2", 300), ("A1", 150), ("C3", 0)]);
        assert!(board.roster_available);
        assert!(board.cadet("zz").is_none());
    }

    #[test]
    fn test_points_only_rows_without_roster() {
        let snapshot = DriveSnapshot {
            roster: None,
            achievements: vec![award("Q7", AchievementKind::Certificate)],
            ..Default::default()
        };
        let submissions = vec![submission(1, "R8", AchievementKind::Badge, VerificationStatus::Pending)];

        let board = Leaderboard::build(&snapshot, &submissions, &PointTable::default());
        assert_eq!(board.entries.len(), 1);
        assert_eq!(board.entries[0].first_name, "Unknown");
        assert_eq!(board.entries[0].last_name, "Student");
        assert_eq!(board.entries[0].xp, 100);
        assert!(!board.roster_available);
    }

    #[test]
    fn test_only_verified_submissions_score() {
        let snapshot = DriveSnapshot {
            roster: Some(roster()),
            ..Default::default()
        };
        let submissions = vec![
            submission(1, "C3", AchievementKind::Project, VerificationStatus::Verified),
            submission(2, "C3", AchievementKind::Badge, VerificationStatus::Pending),
            submission(3, "C3", AchievementKind::Certificate, VerificationStatus::Rejected),
        ];

        let board = Leaderboard::build(&snapshot, &submissions, &PointTable::default());
        assert_eq!(board.entries[0].student_number, "C3");
        assert_eq!(board.entries[0].xp, 150);
        assert_eq!(board.cadet("c3").unwrap().achievements.len(), 3);
    }

    #[test]
    fn test_ties_sort_by_last_then_first_name() {
        let snapshot = DriveSnapshot {
            roster: Some(vec![
                Cadet::new("1", "Zoe", "Adams"),
                Cadet::new("2", "amy", "adams"),
                Cadet::new("3", "Bob", "Brown"),
            ]),
            ..Default::default()
        };
        let board = Leaderboard::build(&snapshot, &[], &PointTable::default());
        let order: Vec<&str> = board.entries.iter().map(|e| e.student_number.as_str()).collect();
        assert_eq!(order, vec!["2", "1", "3"]);
        assert_eq!(board.rank_of("3"), Some(1));

        let ranks: Vec<usize> = board.search_ranked("").into_iter().map(|(rank, _)| rank).collect();
        assert_eq!(ranks, vec![1, 1, 1]);
        assert_eq!(board.search_ranked("brown")[0].0, 1);
    }

    #[test]
    fn test_tied_ranks_skip_ahead() {
        let snapshot = DriveSnapshot {
            roster: Some(roster()),
            achievements: vec![
                award("A1", AchievementKind::Badge),
                award("B2", AchievementKind::Certificate),
            ],
            ..Default::default()
        };
        let board = Leaderboard::build(&snapshot, &[], &PointTable::default());

        let ranks: Vec<(usize, &str)> = board
            .search_ranked("")
            .into_iter()
            .map(|(rank, e)| (rank, e.last_name.as_str()))
            .collect();
        assert_eq!(ranks, vec![(1, "Hopper"), (1, "Lovelace"), (3, "Turing")]);
        assert_eq!(board.search_ranked("turing"), vec![(3, &board.entries[2])]);
        for (rank, entry) in board.search_ranked("") {
            assert_eq!(board.rank_of(&entry.student_number), Some(rank));
        }
    }

    #[test]
    fn test_carry_forward_fills_failed_sources() {
        let previous = DriveSnapshot {
            roster: Some(roster()),
            achievements: vec![
                award("A1", AchievementKind::Project),
                award("B2", AchievementKind::Attendance),
            ],
            ..Default::default()
        };
        let mut current = DriveSnapshot {
            roster: None,
            achievements: vec![award("C3", AchievementKind::Attendance)],
            failed: vec![DataSource::Roster, DataSource::Classroom],
            warnings: vec!["classroom: boom".to_string(), "roster: boom".to_string()],
            ..Default::default()
        };

        let carried = current.carry_forward(&previous);
        assert_eq!(carried, vec![DataSource::Roster, DataSource::Classroom]);
        assert_eq!(current.roster.as_ref().map(Vec::len), Some(3));
        // Evaluation forms loaded fine, so only the classroom project comes back
        let kinds: Vec<(&str, AchievementKind)> = current
            .achievements
            .iter()
            .map(|a| (a.student_number.as_str(), a.achievement.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![("C3", AchievementKind::Attendance), ("A1", AchievementKind::Project)]
        );
        assert!(current.is_partial());
        assert_eq!(current.warnings.len(), 4);
        assert!(current.warnings[3].contains("previous refresh"));
    }

    #[test]
    fn test_carry_forward_without_previous_roster() {
        let mut current = DriveSnapshot {
            failed: vec![DataSource::Roster],
            ..Default::default()
        };
        assert!(current.carry_forward(&DriveSnapshot::default()).is_empty());
        assert!(current.roster.is_none());
    }

    #[test]
    fn test_data_source_of_kind() {
        assert_eq!(DataSource::of(AchievementKind::Badge), DataSource::Classroom);
        assert_eq!(DataSource::of(AchievementKind::OnboardingAttendance), DataSource::EvaluationForms);
    }

    #[test]
    fn test_search_and_summary() {
        let snapshot = DriveSnapshot {
            roster: Some(roster()),
            achievements: vec![award("A1", AchievementKind::Project), award("C3", AchievementKind::Badge)],
            ..Default::default()
        };
        let board = Leaderboard::build(&snapshot, &[], &PointTable::default());

        let found: Vec<&str> = board.search("  LOVE ").iter().map(|e| e.first_name.as_str()).collect();
        assert_eq!(found, vec!["Ada"]);
        assert_eq!(board.search("").len(), 3);
        assert!(board.search("nobody").is_empty());

        let ranked: Vec<(usize, &str)> = board
            .search_ranked("")
            .into_iter()
            .map(|(rank, e)| (rank, e.student_number.as_str()))
            .collect();
        assert_eq!(ranked, vec![(1, "A1"), (2, "C3"), (3, "B2")]);

        let summary = board.summary();
        assert_eq!(summary.total_students, 3);
        assert_eq!(summary.total_points, 250);
        assert_eq!(summary.highest_points, 150);
        assert_eq!(summary.lowest_points, 0);
    }
}
