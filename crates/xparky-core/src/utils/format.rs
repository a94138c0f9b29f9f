use std::cmp::Ordering;

use anyhow::Result;

use crate::models::LeaderboardEntry;

/// Case-insensitive substring match. `query` should already be lowercased.
pub fn contains_ignore_case(haystack: &str, query: &str) -> bool {
    query.is_empty() || haystack.to_lowercase().contains(query)
}

/// Case-insensitive ordering without allocating
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Leaderboard rows as CSV. Student numbers are left out of the export.
pub fn entries_to_csv<'a>(entries: impl IntoIterator<Item = &'a LeaderboardEntry>) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["First Name", "Last Name", "XParky Points"])?;
    for entry in entries {
        writer.write_record([
            entry.first_name.as_str(),
            entry.last_name.as_str(),
            entry.xp.to_string().as_str(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Lovelace", "love"));
        assert!(contains_ignore_case("Lovelace", ""));
        assert!(!contains_ignore_case("Lovelace", "hopper"));
    }

    #[test]
    fn test_cmp_ignore_case() {
        assert_eq!(cmp_ignore_case("ada", "ADA"), Ordering::Equal);
        assert_eq!(cmp_ignore_case("Ada", "bob"), Ordering::Less);
        assert_eq!(cmp_ignore_case("zed", "Amy"), Ordering::Greater);
    }

    #[test]
    fn test_entries_to_csv() {
        let entries = vec![
            LeaderboardEntry {
                student_number: "A1".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace, Countess".to_string(),
                xp: 450,
            },
            LeaderboardEntry {
                student_number: "B2".to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                xp: 0,
            },
        ];
        let csv = entries_to_csv(&entries).unwrap();
        assert_eq!(
            csv,
            "First Name,Last Name,XParky Points\nAda,\"Lovelace, Countess\",450\nGrace,Hopper,0\n"
        );
    }
}
