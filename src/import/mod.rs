use crate::error::{ImportError, Result};
use crate::models::SessionRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

pub mod csv;
pub mod json;

/// Trait for importing session records from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import session records from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<SessionRecord>>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<SessionRecord>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        for importer in &self.importers {
            if importer.can_import(file_path) {
                println!(
                    "Importing {} using {} format...",
                    file_path.display(),
                    importer.get_format_name()
                );
                return importer.import_file(file_path);
            }
        }

        Err(ImportError::UnsupportedFormat {
            format: file_path.display().to_string(),
        }
        .into())
    }

    /// Import all files from a directory
    pub fn import_directory(&self, dir_path: &Path) -> Result<Vec<SessionRecord>> {
        let mut all_records = Vec::new();

        let files = self.collect_importable_files(dir_path)?;

        if files.is_empty() {
            println!("No importable files found in {}", dir_path.display());
            return Ok(all_records);
        }

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );

        for file_path in files {
            pb.set_message(format!(
                "Processing {}",
                file_path.file_name().unwrap_or_default().to_string_lossy()
            ));

            match self.import_file(&file_path) {
                Ok(mut records) => {
                    pb.println(format!(
                        "✓ Imported {} records from {}",
                        records.len(),
                        file_path.file_name().unwrap_or_default().to_string_lossy()
                    ));
                    all_records.append(&mut records);
                }
                Err(e) => {
                    pb.println(format!(
                        "✗ Failed to import {}: {}",
                        file_path.file_name().unwrap_or_default().to_string_lossy(),
                        e
                    ));
                }
            }

            pb.inc(1);
        }

        pb.finish_with_message("Import complete");
        Ok(all_records)
    }

    /// Collect all files that can be imported from a directory
    fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<std::path::PathBuf>> {
        let mut files = Vec::new();

        if !dir_path.is_dir() {
            return Err(ImportError::FileNotFound {
                path: dir_path.to_path_buf(),
            }
            .into());
        }

        for entry in std::fs::read_dir(dir_path)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() && self.can_import_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Validate a file without keeping the imported data
    pub fn validate_file(&self, file_path: &Path) -> Result<usize> {
        let records = self.import_file(file_path)?;
        println!("✓ File is valid: {} records found", records.len());
        Ok(records.len())
    }

    /// Check if any registered importer accepts the file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers
            .iter()
            .any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
