use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag marking a record as part of a sleep session
pub const SLEEP_TAG: &str = "Sleep";

/// Reference timezone used for all calendar-date bucketing
pub const REFERENCE_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// One physiological record per recording session.
///
/// Records arrive with RR-interval processing already done upstream; the
/// time- and frequency-domain metrics here are session-level summaries.
/// Any of them may be absent when the upstream pipeline could not compute
/// them for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Moment the session was recorded, in UTC
    pub timestamp: DateTime<Utc>,

    /// Identifier assigned by the upstream recorder
    pub recording_session_id: String,

    /// Session-average heart rate in beats per minute
    pub heart_rate: f64,

    /// Mean RR interval in milliseconds
    pub mean_rr: Option<f64>,

    /// Standard deviation of RR intervals in milliseconds
    pub sdnn: Option<f64>,

    /// Root mean square of successive RR differences in milliseconds
    pub rmssd: Option<f64>,

    /// Percentage of successive RR differences exceeding 50 ms
    pub pnn50: Option<f64>,

    /// Coefficient of variation of RR intervals
    pub cv_rr: Option<f64>,

    /// Number of RR intervals in the session
    pub rr_count: Option<u32>,

    /// Low-frequency spectral power
    pub lf_power: Option<f64>,

    /// High-frequency spectral power
    pub hf_power: Option<f64>,

    /// Ratio of low- to high-frequency power
    pub lf_hf_ratio: Option<f64>,

    /// Breathing rate in breaths per minute
    pub breathing_rate: Option<f64>,

    /// Percentage of RR intervals that passed artifact filtering
    pub valid_rr_percentage: Option<f64>,

    /// Upstream signal-quality score for the session
    pub quality_score: Option<f64>,

    /// Number of RR outliers removed by filtering
    pub outlier_count: Option<u32>,

    /// Artifact filter applied upstream
    pub filter_method: Option<String>,

    /// Whether the upstream pipeline considers the session usable
    pub valid: bool,

    /// Activity labels; presence of "Sleep" marks a sleep session
    pub tags: BTreeSet<String>,
}

impl SessionRecord {
    /// Calendar date of `timestamp` in the given reference timezone.
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        self.timestamp.with_timezone(&tz).date_naive()
    }

    /// Whether this record belongs to a sleep session.
    pub fn is_sleep(&self) -> bool {
        self.tags.contains(SLEEP_TAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_at(ts: &str) -> SessionRecord {
        SessionRecord {
            timestamp: ts.parse().unwrap(),
            recording_session_id: "rec-1".to_string(),
            heart_rate: 58.0,
            mean_rr: Some(1034.5),
            sdnn: Some(48.2),
            rmssd: Some(41.7),
            pnn50: Some(22.0),
            cv_rr: Some(4.6),
            rr_count: Some(312),
            lf_power: Some(820.0),
            hf_power: Some(1100.0),
            lf_hf_ratio: Some(0.75),
            breathing_rate: Some(13.2),
            valid_rr_percentage: Some(97.5),
            quality_score: Some(88.0),
            outlier_count: Some(4),
            filter_method: Some("kamath".to_string()),
            valid: true,
            tags: BTreeSet::from([SLEEP_TAG.to_string()]),
        }
    }

    #[test]
    fn test_sleep_tag_detection() {
        let mut record = record_at("2024-03-10T02:30:00Z");
        assert!(record.is_sleep());

        record.tags.clear();
        assert!(!record.is_sleep());

        record.tags.insert("Meditation".to_string());
        assert!(!record.is_sleep());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 23:30 UTC is already the next day in Berlin (UTC+1 in winter)
        let record = record_at("2024-01-15T23:30:00Z");
        assert_eq!(
            record.local_date(REFERENCE_TIMEZONE),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
        assert_eq!(
            record.timestamp.date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_local_date_summer_offset() {
        // Berlin is UTC+2 in summer
        let record = record_at("2024-07-01T22:30:00Z");
        assert_eq!(
            record.local_date(REFERENCE_TIMEZONE),
            NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
        );
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = record_at("2024-03-10T02:30:00Z");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_record_with_missing_metrics_deserializes() {
        let json = r#"{
            "timestamp": "2024-03-10T02:30:00Z",
            "recording_session_id": "rec-9",
            "heart_rate": 61.5,
            "mean_rr": null,
            "sdnn": null,
            "rmssd": null,
            "pnn50": null,
            "cv_rr": null,
            "rr_count": null,
            "lf_power": null,
            "hf_power": null,
            "lf_hf_ratio": null,
            "breathing_rate": null,
            "valid_rr_percentage": null,
            "quality_score": null,
            "outlier_count": null,
            "filter_method": null,
            "valid": false,
            "tags": []
        }"#;
        let parsed: SessionRecord = serde_json::from_str(json).unwrap();
        assert!(parsed.rmssd.is_none());
        assert!(!parsed.is_sleep());
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 2, 30, 0).unwrap();
        assert_eq!(parsed.timestamp, expected);
    }
}
