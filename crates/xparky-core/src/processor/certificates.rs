use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DriveFile;
use crate::utils::cmp_ignore_case;

/// A recipient's certificate image inside an event folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFile {
    pub display_name: String,
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFolder {
    pub folder_id: String,
    /// Lowercase recipient name → file. `None` until the folder is listed.
    #[serde(default)]
    pub recipients: Option<BTreeMap<String, CertificateFile>>,
}

impl EventFolder {
    pub fn is_loaded(&self) -> bool {
        self.recipients.is_some()
    }

    /// Recipient display names, sorted ignoring case
    pub fn available_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .recipients
            .iter()
            .flat_map(|r| r.values().map(|c| c.display_name.clone()))
            .collect();
        names.sort_by(|a, b| cmp_ignore_case(a, b));
        names
    }
}

/// Event name → event folder, filled lazily per event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIndex {
    events: BTreeMap<String, EventFolder>,
}

impl CertificateIndex {
    /// Build from the children of the certificates folder. Only folders are
    /// events; entries without MIME info are assumed to be folders.
    pub fn from_event_folders(children: &[DriveFile]) -> Self {
        let mut events = BTreeMap::new();
        for child in children {
            if child.mime_type.is_some() && !child.is_folder() {
                continue;
            }
            let name = child.name.trim();
            if name.is_empty() {
                continue;
            }
            events.entry(name.to_string()).or_insert_with(|| EventFolder {
                folder_id: child.id.clone(),
                recipients: None,
            });
        }
        Self { events }
    }

    /// Event names, sorted ignoring case
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_by(|a, b| cmp_ignore_case(a, b));
        names
    }

    pub fn event(&self, name: &str) -> Option<&EventFolder> {
        self.events.get(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Store the listed recipients of an event. Returns false for unknown events.
    pub fn set_recipients(&mut self, event: &str, recipients: BTreeMap<String, CertificateFile>) -> bool {
        match self.events.get_mut(event) {
            Some(folder) => {
                folder.recipients = Some(recipients);
                true
            }
            None => false,
        }
    }

    /// Look up a recipient's certificate, ignoring case and surrounding whitespace
    pub fn find(&self, event: &str, name: &str) -> Option<&CertificateFile> {
        self.events
            .get(event)?
            .recipients
            .as_ref()?
            .get(&name.trim().to_lowercase())
    }
}

/// Index the files of an event folder by lowercase recipient name. The
/// recipient name is the file name without its extension; the first file
/// wins when two names collide.
pub fn recipients_from_files(files: &[DriveFile]) -> BTreeMap<String, CertificateFile> {
    let mut recipients = BTreeMap::new();
    for file in files.iter().filter(|f| !f.is_folder()) {
        let display_name = file.stem().trim();
        if display_name.is_empty() {
            continue;
        }
        recipients
            .entry(display_name.to_lowercase())
            .or_insert_with(|| CertificateFile {
                display_name: display_name.to_string(),
                file_id: file.id.clone(),
            });
    }
    recipients
}
