use super::ImportFormat;
use crate::error::{ImportError, Result};
use crate::models::SessionRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::warn;

/// CSV importer with configurable column mapping
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut importer = Self {
            column_mapping: HashMap::new(),
        };

        // Map common export headers to session record fields
        importer.add_mapping("timestamp", &["timestamp", "time", "recorded_at", "date"]);
        importer.add_mapping(
            "recording_session_id",
            &[
                "recording_session_id",
                "recordingsessionid",
                "session_id",
                "session",
            ],
        );
        importer.add_mapping("heart_rate", &["heart_rate", "heartrate", "hr", "bpm"]);
        importer.add_mapping("mean_rr", &["mean_rr", "meanrr", "rr_mean"]);
        importer.add_mapping("sdnn", &["sdnn"]);
        importer.add_mapping("rmssd", &["rmssd"]);
        importer.add_mapping("pnn50", &["pnn50"]);
        importer.add_mapping("cv_rr", &["cv_rr", "cvrr"]);
        importer.add_mapping("rr_count", &["rr_count", "rrcount"]);
        importer.add_mapping("lf_power", &["lf_power", "lfpower"]);
        importer.add_mapping("hf_power", &["hf_power", "hfpower"]);
        importer.add_mapping("lf_hf_ratio", &["lf_hf_ratio", "lfhfratio", "lf_hf"]);
        importer.add_mapping(
            "breathing_rate",
            &["breathing_rate", "breathingrate", "respiration_rate"],
        );
        importer.add_mapping(
            "valid_rr_percentage",
            &["valid_rr_percentage", "validrrpercentage", "valid_rr_pct"],
        );
        importer.add_mapping(
            "quality_score",
            &["quality_score", "qualityscore", "quality"],
        );
        importer.add_mapping(
            "outlier_count",
            &["outlier_count", "outliercount", "outliers"],
        );
        importer.add_mapping("filter_method", &["filter_method", "filtermethod", "filter"]);
        importer.add_mapping("valid", &["valid", "is_valid"]);
        importer.add_mapping("tags", &["tags", "labels"]);

        importer
    }

    fn add_mapping(&mut self, standard_name: &str, variations: &[&str]) {
        for variation in variations {
            self.column_mapping
                .insert(variation.to_string(), standard_name.to_string());
        }
    }

    fn normalize_column_name(&self, column: &str) -> String {
        let normalized = column.to_lowercase().replace([' ', '-'], "_");
        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_timestamp(&self, value: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Ok(dt.with_timezone(&Utc));
        }

        let naive_formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%m/%d/%Y %H:%M:%S",
            "%d.%m.%Y %H:%M:%S",
        ];
        for format in &naive_formats {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(naive.and_utc());
            }
        }

        // Last resort: epoch seconds
        if let Ok(seconds) = value.parse::<i64>() {
            if let Some(dt) = DateTime::from_timestamp(seconds, 0) {
                return Ok(dt);
            }
        }

        Err(ImportError::InvalidTimestamp {
            value: value.to_string(),
        }
        .into())
    }

    fn field<'a>(
        &self,
        record: &'a StringRecord,
        columns: &HashMap<String, usize>,
        name: &str,
    ) -> Option<&'a str> {
        columns
            .get(name)
            .and_then(|&index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn parse_f64(
        &self,
        record: &StringRecord,
        columns: &HashMap<String, usize>,
        name: &str,
    ) -> Option<f64> {
        self.field(record, columns, name)
            .and_then(|value| value.parse().ok())
    }

    fn parse_u32(
        &self,
        record: &StringRecord,
        columns: &HashMap<String, usize>,
        name: &str,
    ) -> Option<u32> {
        self.field(record, columns, name)
            .and_then(|value| value.parse().ok())
    }

    fn parse_valid_flag(&self, value: Option<&str>) -> bool {
        match value.map(|v| v.to_lowercase()) {
            Some(v) => matches!(v.as_str(), "true" | "t" | "1" | "yes"),
            None => true,
        }
    }

    fn parse_tags(&self, value: Option<&str>) -> BTreeSet<String> {
        value
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        columns: &HashMap<String, usize>,
        fallback_id: String,
    ) -> Result<SessionRecord> {
        let raw_timestamp =
            self.field(record, columns, "timestamp")
                .ok_or_else(|| ImportError::InvalidTimestamp {
                    value: String::new(),
                })?;
        let timestamp = self.parse_timestamp(raw_timestamp)?;

        let heart_rate = self
            .field(record, columns, "heart_rate")
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: "missing or invalid heart_rate value".to_string(),
            })?;

        let recording_session_id = self
            .field(record, columns, "recording_session_id")
            .map(str::to_string)
            .unwrap_or(fallback_id);

        Ok(SessionRecord {
            timestamp,
            recording_session_id,
            heart_rate,
            mean_rr: self.parse_f64(record, columns, "mean_rr"),
            sdnn: self.parse_f64(record, columns, "sdnn"),
            rmssd: self.parse_f64(record, columns, "rmssd"),
            pnn50: self.parse_f64(record, columns, "pnn50"),
            cv_rr: self.parse_f64(record, columns, "cv_rr"),
            rr_count: self.parse_u32(record, columns, "rr_count"),
            lf_power: self.parse_f64(record, columns, "lf_power"),
            hf_power: self.parse_f64(record, columns, "hf_power"),
            lf_hf_ratio: self.parse_f64(record, columns, "lf_hf_ratio"),
            breathing_rate: self.parse_f64(record, columns, "breathing_rate"),
            valid_rr_percentage: self.parse_f64(record, columns, "valid_rr_percentage"),
            quality_score: self.parse_f64(record, columns, "quality_score"),
            outlier_count: self.parse_u32(record, columns, "outlier_count"),
            filter_method: self
                .field(record, columns, "filter_method")
                .map(str::to_string),
            valid: self.parse_valid_flag(self.field(record, columns, "valid")),
            tags: self.parse_tags(self.field(record, columns, "tags")),
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase() == "csv")
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<SessionRecord>> {
        let mut reader =
            csv::Reader::from_path(file_path).map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?
            .clone();

        let mut columns = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            columns
                .entry(self.normalize_column_name(header))
                .or_insert(index);
        }

        for required in ["timestamp", "heart_rate"] {
            if !columns.contains_key(required) {
                return Err(ImportError::MissingColumn {
                    column: required.to_string(),
                }
                .into());
            }
        }

        let file_stem = file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import".to_string());

        let mut records = Vec::new();
        for (row_index, result) in reader.records().enumerate() {
            let row = result.map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?;

            let fallback_id = format!("{}-{}", file_stem, row_index + 1);
            match self.parse_record(&row, &columns, fallback_id) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        row = row_index + 2,
                        file = %file_path.display(),
                        "skipping unparseable row: {e}"
                    );
                }
            }
        }

        if records.is_empty() {
            return Err(ImportError::Empty {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        Ok(records)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}
