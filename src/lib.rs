// Library interface for the hrvrs modules
// This allows integration tests to access the core functionality

pub mod baseline;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod night;
pub mod report;
pub mod scores;
pub mod stages;
pub mod stats;

// Re-export commonly used types for convenience
pub use baseline::{
    BaselineCalculator, BaselineConfig, Baselines, DailyBaselineRow, DynamicBaselineCalculator,
    DynamicBaselineState,
};
pub use error::{HrvError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use night::{NightAggregator, NightMetrics};
pub use report::{DailyReport, DatasetSummary, ReportBuilder, WeeklySleepTrend};
pub use scores::{NightScores, RecoveryBand, ScoreEngine, StressZone};
pub use stages::{SleepStage, StageBreakdown, StageClassifier};
