mod common;

use common::{FakeGoogle, TestServer, FOLDER_MIME, SHEET_MIME};
use xparky_core::config::RosterConfig;
use xparky_core::{AchievementKind, DataSource, Leaderboard, PointTable, Sources, XpProcessor};

const PDF: &str = "application/pdf";

fn seed(fake: &FakeGoogle) {
    fake.folder(
        "classroom",
        &[
            ("c1", "Python Basics", FOLDER_MIME),
            ("c2", "Machine Learning", FOLDER_MIME),
            ("ev", "evaluationForms", FOLDER_MIME),
        ],
    );
    fake.folder(
        "c1",
        &[
            ("f1", "S100_python_CERTIFICATE.pdf", PDF),
            ("f2", "S200_python_BADGE.png", "image/png"),
            ("f3", "notes.txt", "text/plain"),
        ],
    );
    fake.folder(
        "c2",
        &[
            ("f4", "S100_ml_PROJECT.zip", "application/zip"),
            ("f5", "S100_python_CERTIFICATE.pdf", PDF),
        ],
    );
    // Never read as a course
    fake.folder("ev", &[("f6", "S300_PROJECT.zip", "application/zip")]);

    fake.folder(
        "evals",
        &[
            ("w1", "Week 1 Evaluation", SHEET_MIME),
            ("on", "Onboarding Evaluation", SHEET_MIME),
            ("bad", "Week 2 Evaluation", SHEET_MIME),
            ("img", "poster.png", "image/png"),
        ],
    );
    fake.sheet(
        "w1",
        "Data!A1:Z",
        &[&["Timestamp", "Student Number"], &["t", "S100"], &["t", "s200"], &["t", "S100"]],
    );
    fake.sheet("on", "Data!A1:Z", &[&["Student Number"], &["S300"]]);
    fake.fail("bad");

    fake.sheet(
        "db",
        "Data!A1:Z",
        &[
            &["Student Number", "First Name", "Last Name", "Position"],
            &["S100", "Ada", "Lovelace", "Data and ML Cadet"],
            &["S200", "Grace", "Hopper", "Data and ML Cadet"],
            &["S300", "Alan", "Turing", "Data and ML Cadet"],
            &["S400", "Katherine", "Johnson", "Data and ML Cadet"],
            &["M1", "Mentor", "Person", "Mentor"],
        ],
    );
}

fn processor(server: &TestServer, sources: Sources) -> XpProcessor {
    XpProcessor::new(server.client(), sources, RosterConfig::default())
}

fn all_sources() -> Sources {
    Sources {
        spreadsheet_id: "db".to_string(),
        classroom_folder_id: Some("classroom".to_string()),
        eval_forms_folder_id: Some("evals".to_string()),
        certificates_folder_id: None,
    }
}

#[tokio::test]
async fn test_snapshot_to_leaderboard() {
    let fake = FakeGoogle::new();
    seed(&fake);
    let server = TestServer::start(fake).await;

    let snapshot = processor(&server, all_sources()).snapshot().await.unwrap();
    assert_eq!(snapshot.roster.as_ref().unwrap().len(), 4);
    assert!(snapshot.warnings.is_empty());
    assert!(!snapshot
        .achievements
        .iter()
        .any(|a| a.student_number == "S300" && a.achievement.kind == AchievementKind::Project));

    let board = Leaderboard::build(&snapshot, &[], &PointTable::default());
    let xp: Vec<(&str, u32)> = board
        .entries
        .iter()
        .map(|e| (e.student_number.as_str(), e.xp))
        .collect();
    // S100: certificate 100 + project 150 + attendance 200
    // S200: badge 100 + attendance 200
    // S300: onboarding attendance 70
    assert_eq!(xp, vec![("S100", 450), ("S200", 300), ("S300", 70), ("S400", 0)]);
}

#[tokio::test]
async fn test_missing_roster_falls_back_to_points_only() {
    let fake = FakeGoogle::new();
    seed(&fake);
    fake.fail("db");
    let server = TestServer::start(fake).await;

    let snapshot = processor(&server, all_sources()).snapshot().await.unwrap();
    assert!(snapshot.roster.is_none());
    assert_eq!(snapshot.warnings.len(), 1);
    assert!(snapshot.warnings[0].starts_with("roster"));
    assert_eq!(snapshot.failed, vec![DataSource::Roster]);

    let board = Leaderboard::build(&snapshot, &[], &PointTable::default());
    assert!(!board.roster_available);
    assert_eq!(board.entries.len(), 3);
    assert!(board
        .entries
        .iter()
        .all(|e| e.first_name == "Unknown" && e.last_name == "Student"));
}

#[tokio::test]
async fn test_snapshot_fails_when_every_source_fails() {
    let fake = FakeGoogle::new();
    fake.fail("db");
    fake.fail("classroom");
    fake.fail("evals");
    let server = TestServer::start(fake).await;

    assert!(processor(&server, all_sources()).snapshot().await.is_err());
}

#[tokio::test]
async fn test_failed_classroom_is_recorded_as_a_source() {
    let fake = FakeGoogle::new();
    seed(&fake);
    fake.fail("classroom");
    let server = TestServer::start(fake).await;

    let snapshot = processor(&server, all_sources()).snapshot().await.unwrap();
    assert!(snapshot.roster.is_some());
    assert_eq!(snapshot.failed, vec![DataSource::Classroom]);
    assert!(snapshot
        .achievements
        .iter()
        .all(|a| DataSource::of(a.achievement.kind) == DataSource::EvaluationForms));
}

#[tokio::test]
async fn test_unconfigured_folders_are_skipped() {
    let fake = FakeGoogle::new();
    seed(&fake);
    let server = TestServer::start(fake).await;

    let sources = Sources {
        spreadsheet_id: "db".to_string(),
        ..Default::default()
    };
    let snapshot = processor(&server, sources).snapshot().await.unwrap();
    assert!(snapshot.achievements.is_empty());
    assert_eq!(snapshot.roster.unwrap().len(), 4);
}

#[tokio::test]
async fn test_certificate_index_and_download() {
    let fake = FakeGoogle::new();
    fake.folder(
        "certs",
        &[("e1", "Bootcamp 2024", FOLDER_MIME), ("x", "readme.txt", "text/plain")],
    );
    fake.folder(
        "e1",
        &[("p1", "Ada Lovelace.png", "image/png"), ("p2", "Grace Hopper.png", "image/png")],
    );
    fake.media("p2", b"png-bytes");
    let server = TestServer::start(fake).await;

    let sources = Sources {
        certificates_folder_id: Some("certs".to_string()),
        ..all_sources()
    };
    let processor = processor(&server, sources);

    let mut index = processor.try_certificate_index().await.unwrap();
    assert_eq!(index.event_names(), vec!["Bootcamp 2024"]);

    let folder_id = index.event("Bootcamp 2024").unwrap().folder_id.clone();
    let recipients = processor.try_event_recipients(&folder_id).await.unwrap();
    index.set_recipients("Bootcamp 2024", recipients);

    let file = index.find("Bootcamp 2024", "grace hopper").unwrap().clone();
    assert_eq!(processor.download_certificate(&file).await.unwrap(), b"png-bytes".to_vec());
}
