use super::ImportFormat;
use crate::error::{ImportError, Result};
use crate::models::SessionRecord;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Importer for JSON arrays of session records
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase() == "json")
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<SessionRecord>> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let records: Vec<SessionRecord> = serde_json::from_reader(reader)?;

        if records.is_empty() {
            return Err(ImportError::Empty {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        Ok(records)
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
