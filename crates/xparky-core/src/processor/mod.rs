//! Turns Drive folders and spreadsheets into achievements and a leaderboard.
//!
//! The pure transforms (`classroom_achievements`, `evaluation_achievements`,
//! `roster_from_table`) are separate from [`XpProcessor`], which only does
//! the fetching.

pub mod certificates;
pub mod leaderboard;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::GoogleClient;
use crate::config::{RosterConfig, Settings};
use crate::models::{Achievement, AchievementKind, Cadet, DriveFile, SheetTable};
use crate::validators::{classify_submission_file, normalize_student_number, KnownIssuances};

pub use certificates::{recipients_from_files, CertificateFile, CertificateIndex, EventFolder};
pub use leaderboard::{AwardedAchievement, DataSource, DriveSnapshot, Leaderboard, RosterError};

// ============================================================================
// Constants
// ============================================================================

/// Subfolder of the classroom folder that holds evaluation forms, not courses
pub const EVALUATION_FORMS_FOLDER: &str = "evaluationForms";

/// Sheet read from every evaluation form
pub const EVALUATION_SHEET: &str = "Data";

pub const STUDENT_NUMBER_COLUMN: &str = "Student Number";

pub const ROSTER_COLUMNS: [&str; 3] = ["Student Number", "First Name", "Last Name"];

const POSITION_COLUMN: &str = "Position";

/// Evaluation sheets fetched at once
const MAX_CONCURRENT: usize = 5;

// ============================================================================
// Pure transforms
// ============================================================================

/// One verified achievement per unique classroom file name worth points.
pub fn classroom_achievements<'a>(file_names: impl IntoIterator<Item = &'a str>) -> Vec<AwardedAchievement> {
    let unique: BTreeSet<&str> = file_names.into_iter().collect();
    unique
        .into_iter()
        .filter_map(|name| {
            let classified = classify_submission_file(name)?;
            Some(AwardedAchievement::new(
                classified.student_number,
                Achievement::verified(classified.kind, name),
            ))
        })
        .collect()
}

/// Attendance kind for an evaluation form, judged by its file name
pub fn attendance_kind(form_name: &str) -> AchievementKind {
    if form_name.to_lowercase().contains("onboarding") {
        AchievementKind::OnboardingAttendance
    } else {
        AchievementKind::Attendance
    }
}

/// One verified attendance per unique student number in an evaluation sheet.
/// Sheets without a `Student Number` column yield nothing.
pub fn evaluation_achievements(form: &DriveFile, table: &SheetTable) -> Vec<AwardedAchievement> {
    if !table.has_column(STUDENT_NUMBER_COLUMN) {
        debug!(form = %form.name, "Evaluation sheet has no Student Number column");
        return Vec::new();
    }

    let kind = attendance_kind(&form.name);
    let mut seen = HashSet::new();
    table
        .unique_values(STUDENT_NUMBER_COLUMN)
        .into_iter()
        .map(|raw| normalize_student_number(&raw))
        .filter(|student| seen.insert(student.clone()))
        .map(|student| AwardedAchievement::new(student, Achievement::verified(kind, form.name.clone())))
        .collect()
}

/// Cadets listed in the roster sheet. When `position` is set only rows
/// whose `Position` matches it exactly (after trimming) are kept.
pub fn roster_from_table(table: &SheetTable, position: Option<&str>) -> Result<Vec<Cadet>, RosterError> {
    let mut required: Vec<&str> = ROSTER_COLUMNS.to_vec();
    if position.is_some() {
        required.push(POSITION_COLUMN);
    }
    let missing = table.missing_columns(&required);
    if !missing.is_empty() {
        return Err(RosterError::MissingColumns(
            missing.into_iter().map(String::from).collect(),
        ));
    }

    let mut seen = HashSet::new();
    let cadets = table
        .rows
        .iter()
        .filter(|row| match position {
            Some(wanted) => row.get(POSITION_COLUMN).map(str::trim) == Some(wanted.trim()),
            None => true,
        })
        .filter_map(|row| {
            let student_number = normalize_student_number(row.get("Student Number")?);
            if student_number.is_empty() || !seen.insert(student_number.clone()) {
                return None;
            }
            Some(Cadet::new(
                student_number,
                row.get("First Name")?.trim(),
                row.get("Last Name")?.trim(),
            ))
        })
        .collect();
    Ok(cadets)
}

// ============================================================================
// Fetching
// ============================================================================

/// Where the processor reads from.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub spreadsheet_id: String,
    pub classroom_folder_id: Option<String>,
    pub eval_forms_folder_id: Option<String>,
    pub certificates_folder_id: Option<String>,
}

impl Sources {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            spreadsheet_id: settings.spreadsheet_id.clone(),
            classroom_folder_id: settings.classroom_folder_id.clone(),
            eval_forms_folder_id: settings.eval_forms_folder_id.clone(),
            certificates_folder_id: settings.certificates_folder_id.clone(),
        }
    }
}

#[derive(Clone)]
pub struct XpProcessor {
    client: GoogleClient,
    sources: Sources,
    roster: RosterConfig,
}

impl XpProcessor {
    pub fn new(client: GoogleClient, sources: Sources, roster: RosterConfig) -> Self {
        Self {
            client,
            sources,
            roster,
        }
    }

    pub fn client(&self) -> &GoogleClient {
        &self.client
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Achievements from classroom submission files. Fails only when the
    /// classroom folder itself cannot be listed; unreadable course folders
    /// are skipped.
    pub async fn try_classroom_achievements(&self, folder_id: &str) -> Result<Vec<AwardedAchievement>> {
        let courses: Vec<DriveFile> = self
            .client
            .try_list_files_in_folder(folder_id)
            .await
            .context("Failed to list classroom folder")?
            .into_iter()
            .filter(|f| f.name.trim() != EVALUATION_FORMS_FOLDER)
            .collect();

        let mut names: Vec<String> = Vec::new();
        for course in &courses {
            let files = self.client.list_files_in_folder(&course.id).await;
            debug!(course = %course.name, files = files.len(), "Listed course folder");
            names.extend(files.into_iter().map(|f| f.name));
        }

        let achievements = classroom_achievements(names.iter().map(String::as_str));
        info!(courses = courses.len(), files = names.len(), achievements = achievements.len(), "Processed classroom submissions");
        Ok(achievements)
    }

    /// Attendance from evaluation forms. Fails only when the forms folder
    /// cannot be listed; unreadable sheets are skipped.
    pub async fn try_evaluation_achievements(&self, folder_id: &str) -> Result<Vec<AwardedAchievement>> {
        let forms: Vec<DriveFile> = self
            .client
            .try_list_files_in_folder(folder_id)
            .await
            .context("Failed to list evaluation forms folder")?
            .into_iter()
            .filter(DriveFile::is_spreadsheet)
            .collect();

        let mut achievements = Vec::new();
        for chunk in forms.chunks(MAX_CONCURRENT) {
            let futures: Vec<_> = chunk
                .iter()
                .map(|form| {
                    let client = self.client.clone();
                    async move {
                        let table = client.get_sheet_data(&form.id, EVALUATION_SHEET).await;
                        (form, table)
                    }
                })
                .collect();

            let results = futures::future::join_all(futures).await;
            for (form, table) in results {
                match table {
                    Some(table) => achievements.extend(evaluation_achievements(form, &table)),
                    None => debug!(form = %form.name, "Evaluation form has no data"),
                }
            }
        }

        info!(forms = forms.len(), achievements = achievements.len(), "Processed evaluation forms");
        Ok(achievements)
    }

    pub async fn try_roster(&self) -> Result<Vec<Cadet>> {
        let table = self
            .client
            .try_get_sheet_data(&self.sources.spreadsheet_id, &self.roster.sheet_name)
            .await
            .context("Failed to read roster")?
            .ok_or(RosterError::Empty)?;

        let cadets = roster_from_table(&table, self.roster.position.as_deref())?;
        info!(rows = table.len(), cadets = cadets.len(), "Loaded roster");
        Ok(cadets)
    }

    /// The staff issuance sheet, when one is configured and has rows
    pub async fn try_known_issuances(&self) -> Result<Option<KnownIssuances>> {
        let Some(ref sheet) = self.roster.issuance_sheet else {
            return Ok(None);
        };
        let table = self
            .client
            .try_get_sheet_data(&self.sources.spreadsheet_id, sheet)
            .await
            .context("Failed to read issuance sheet")?;
        Ok(table.map(|t| KnownIssuances::from_table(&t)))
    }

    /// Read every configured source. A failing source is recorded in
    /// `failed` and `warnings` and the rest still count; the call fails only
    /// when every attempted source failed.
    pub async fn snapshot(&self) -> Result<DriveSnapshot> {
        let mut snapshot = DriveSnapshot::default();
        let mut attempted = 1;
        let mut failures: Vec<String> = Vec::new();

        match self.try_roster().await {
            Ok(cadets) => snapshot.roster = Some(cadets),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Roster unavailable, showing points only");
                failures.push(format!("roster: {:#}", e));
                snapshot.failed.push(DataSource::Roster);
            }
        }

        if let Some(ref folder_id) = self.sources.classroom_folder_id {
            attempted += 1;
            match self.try_classroom_achievements(folder_id).await {
                Ok(found) => snapshot.achievements.extend(found),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Classroom submissions unavailable");
                    failures.push(format!("classroom: {:#}", e));
                    snapshot.failed.push(DataSource::Classroom);
                }
            }
        } else {
            debug!("CLASSROOM_FOLDER_ID not set, skipping classroom submissions");
        }

        if let Some(ref folder_id) = self.sources.eval_forms_folder_id {
            attempted += 1;
            match self.try_evaluation_achievements(folder_id).await {
                Ok(found) => snapshot.achievements.extend(found),
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Evaluation forms unavailable");
                    failures.push(format!("evaluation forms: {:#}", e));
                    snapshot.failed.push(DataSource::EvaluationForms);
                }
            }
        } else {
            debug!("EVAL_FORMS_FOLDER_ID not set, skipping evaluation forms");
        }

        if failures.len() == attempted {
            anyhow::bail!("Every data source failed: {}", failures.join("; "));
        }

        match self.try_known_issuances().await {
            Ok(issuances) => snapshot.issuances = issuances,
            Err(e) => warn!(error = %format!("{:#}", e), "Issuance sheet unavailable"),
        }

        snapshot.warnings = failures;
        Ok(snapshot)
    }

    // ===== Certificates =====

    /// Event folders of the certificates folder, recipients not yet listed
    pub async fn try_certificate_index(&self) -> Result<CertificateIndex> {
        let folder_id = self
            .sources
            .certificates_folder_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("CERTIFICATES_FOLDER_ID is not set"))?;

        let children = self
            .client
            .try_list_files_in_folder(folder_id)
            .await
            .context("Failed to list certificates folder")?;
        let index = CertificateIndex::from_event_folders(&children);
        info!(events = index.len(), "Loaded certificate events");
        Ok(index)
    }

    /// Recipients of one event folder
    pub async fn try_event_recipients(&self, folder_id: &str) -> Result<BTreeMap<String, CertificateFile>> {
        let files = self
            .client
            .try_list_files_in_folder(folder_id)
            .await
            .with_context(|| format!("Failed to list event folder {}", folder_id))?;
        Ok(recipients_from_files(&files))
    }

    pub async fn download_certificate(&self, file: &CertificateFile) -> Result<Vec<u8>> {
        self.client.download_file(&file.file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> SheetTable {
        SheetTable::from_values(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_classroom_names_are_deduplicated() {
        let names = [
            "S100_Intro_CERTIFICATE.pdf",
            "S100_Intro_CERTIFICATE.pdf",
            "s200_final_project.zip",
            "S300_notes.txt",
            "_BADGE.png",
        ];
        let achievements = classroom_achievements(names);
        let got: Vec<(&str, AchievementKind)> = achievements
            .iter()
            .map(|a| (a.student_number.as_str(), a.achievement.kind))
            .collect();
        assert_eq!(
            got,
            vec![
                ("S100", AchievementKind::Certificate),
                ("S200", AchievementKind::Project)
            ]
        );
        assert!(achievements.iter().all(|a| a.achievement.is_verified()));
    }

    #[test]
    fn test_evaluation_attendance_is_unique_per_form() {
        let form = DriveFile::new("f1", "Week 3 Evaluation");
        let sheet = table(&[
            &["Timestamp", "Student Number"],
            &["t1", "s100"],
            &["t2", " S100 "],
            &["t3", "S200"],
            &["t4", ""],
        ]);
        let achievements = evaluation_achievements(&form, &sheet);
        assert_eq!(achievements.len(), 2);
        assert_eq!(achievements[0].student_number, "S100");
        assert_eq!(achievements[0].achievement.kind, AchievementKind::Attendance);
        assert_eq!(achievements[0].achievement.reference, "Week 3 Evaluation");
    }

    #[test]
    fn test_onboarding_form_and_missing_column() {
        assert_eq!(attendance_kind("ONBOARDING session"), AchievementKind::OnboardingAttendance);
        assert_eq!(attendance_kind("Week 1"), AchievementKind::Attendance);

        let form = DriveFile::new("f2", "Onboarding Form");
        let sheet = table(&[&["Name"], &["Ada"]]);
        assert!(evaluation_achievements(&form, &sheet).is_empty());
    }

    #[test]
    fn test_roster_filters_position_and_trims() {
        let sheet = table(&[
            &["Student Number", "First Name", "Last Name", "Position"],
            &[" a1 ", " Ada ", "Lovelace ", "Data and ML Cadet"],
            &["B2", "Grace", "Hopper", "Mentor"],
            &["C3", "Alan", "Turing", " Data and ML Cadet "],
            &["A1", "Duplicate", "Row", "Data and ML Cadet"],
            &["", "No", "Number", "Data and ML Cadet"],
        ]);
        let cadets = roster_from_table(&sheet, Some("Data and ML Cadet")).unwrap();
        assert_eq!(cadets.len(), 2);
        assert_eq!(cadets[0], Cadet::new("A1", "Ada", "Lovelace"));
        assert_eq!(cadets[1].student_number, "C3");

        assert_eq!(roster_from_table(&sheet, None).unwrap().len(), 3);
    }

    #[test]
    fn test_roster_missing_columns() {
        let sheet = table(&[&["Student Number", "First Name"], &["A1", "Ada"]]);
        let err = roster_from_table(&sheet, Some("Data and ML Cadet")).unwrap_err();
        assert_eq!(
            err,
            RosterError::MissingColumns(vec!["Last Name".to_string(), "Position".to_string()])
        );
    }
}
