//! Unified error hierarchy for hrvrs
//!
//! Provides a structured error type system with context preservation and
//! integration with the tracing system. Recoverable analysis conditions
//! (missing metrics, degenerate baselines) are modeled as `Option` values
//! inside the pipeline; these error types cover the cases where a caller
//! asked for something that cannot be produced at all.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all hrvrs operations
#[derive(Debug, Error)]
pub enum HrvError {
    /// Record import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Analysis errors
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Record import specific errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// No registered importer accepts the file
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Required column absent from the input table
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// Timestamp that matches none of the accepted formats
    #[error("Unparseable timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// File parsed but produced no records
    #[error("No records found in {path}")]
    Empty { path: PathBuf },
}

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Insufficient data for a calculation
    #[error("Insufficient data for {calculation}: {reason}")]
    InsufficientData { calculation: String, reason: String },

    /// No sleep-tagged records anywhere in the dataset
    #[error("No sleep data: {reason}")]
    NoSleepData { reason: String },

    /// Baseline key absent because its window had no qualifying records
    #[error("Missing baseline: {metric}")]
    MissingBaseline { metric: String },

    /// Baseline denominator is zero or negative
    #[error("Degenerate baseline for {metric}: {value}")]
    DegenerateBaseline { metric: String, value: f64 },
}

/// Result type alias for hrvrs operations
pub type Result<T> = std::result::Result<T, HrvError>;

impl HrvError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HrvError::Import(ImportError::FileNotFound { .. }) => ErrorSeverity::Warning,
            HrvError::Import(ImportError::Empty { .. }) => ErrorSeverity::Warning,
            HrvError::Analysis(_) => ErrorSeverity::Warning,
            HrvError::Validation(_) => ErrorSeverity::Warning,
            HrvError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HrvError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find records file: {}", path.display())
            }
            HrvError::Import(ImportError::ParseError { format, reason }) => {
                format!("Records file is not valid {}: {}", format, reason)
            }
            HrvError::Analysis(AnalysisError::NoSleepData { .. }) => {
                "No sleep data found. Tag some records with 'Sleep' to enable night analysis."
                    .to_string()
            }
            HrvError::Analysis(AnalysisError::InsufficientData { calculation, .. }) => {
                format!("Not enough data to calculate {}.", calculation)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = HrvError::Import(ImportError::FileNotFound {
            path: PathBuf::from("/test/records.csv"),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = HrvError::Internal("test".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_messages() {
        let err = HrvError::Import(ImportError::FileNotFound {
            path: PathBuf::from("records.csv"),
        });
        assert!(err.user_message().contains("Could not find"));

        let err = HrvError::Analysis(AnalysisError::NoSleepData {
            reason: "dataset has no Sleep tags".to_string(),
        });
        assert!(err.user_message().contains("Sleep"));
    }

    #[test]
    fn test_analysis_error_display() {
        let err = AnalysisError::DegenerateBaseline {
            metric: "rhr".to_string(),
            value: 0.0,
        };
        assert!(err.to_string().contains("rhr"));
    }
}
