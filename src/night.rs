use crate::models::{SessionRecord, REFERENCE_TIMEZONE};
use crate::stats;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum sample count for a percentile-based resting heart rate
pub const MIN_RHR_SAMPLES: usize = 3;

/// Consolidated metrics for one night of sleep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightMetrics {
    /// Calendar date the sleep records fall on
    pub date: NaiveDate,

    /// Mean RR interval across the night in milliseconds
    pub mean_rr: Option<f64>,

    /// Heart rate derived from the mean RR interval (60000 / mean_rr)
    pub mean_hr: Option<f64>,

    /// Resting heart rate: 10th percentile of heart rate, or the minimum
    /// when fewer than three records exist
    pub rhr: Option<f64>,

    /// Mean SDNN in milliseconds
    pub sdnn: Option<f64>,

    /// Mean RMSSD in milliseconds
    pub rmssd: Option<f64>,

    /// Mean pNN50 percentage
    pub pnn50: Option<f64>,

    /// Mean RR coefficient of variation
    pub cv_rr: Option<f64>,

    /// Mean low-frequency power
    pub lf_power: Option<f64>,

    /// Mean high-frequency power
    pub hf_power: Option<f64>,

    /// Mean LF/HF ratio
    pub lf_hf_ratio: Option<f64>,

    /// Mean breathing rate in breaths per minute
    pub breathing_rate: Option<f64>,

    /// Mean upstream quality score across the night's records
    pub session_quality: Option<f64>,

    /// Number of records in the night
    pub record_count: usize,

    /// Wall-clock span between the first and last record, in minutes.
    /// Sparse sampling understates true sleep duration; the span is the
    /// agreed approximation.
    pub duration_minutes: f64,

    /// Composite sleep-quality score, attached by the score engine
    pub sleep_quality: Option<f64>,

    /// Recovery score, attached by the score engine
    pub recovery_score: Option<f64>,
}

/// Resting heart rate from a night's heart-rate samples.
///
/// The 10th percentile needs enough samples to be meaningful; below
/// `MIN_RHR_SAMPLES` the minimum is used instead.
pub fn resting_heart_rate(heart_rates: &[f64]) -> Option<f64> {
    if heart_rates.len() >= MIN_RHR_SAMPLES {
        stats::quantile(heart_rates, 0.1)
    } else {
        stats::min(heart_rates)
    }
}

/// Configuration for night aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightAggregatorConfig {
    /// Reference timezone for calendar-date bucketing
    pub tz: Tz,
}

impl Default for NightAggregatorConfig {
    fn default() -> Self {
        Self {
            tz: REFERENCE_TIMEZONE,
        }
    }
}

/// Groups sleep-tagged records by calendar night and reduces each night
/// to a single [`NightMetrics`] row.
#[derive(Debug, Clone, Default)]
pub struct NightAggregator {
    config: NightAggregatorConfig,
}

impl NightAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: NightAggregatorConfig) -> Self {
        Self { config }
    }

    /// Aggregate all sleep-tagged records into per-night metrics, keyed
    /// ascending by date. Records without the sleep tag are ignored; no
    /// sleep data at all yields an empty map.
    pub fn aggregate(&self, records: &[SessionRecord]) -> BTreeMap<NaiveDate, NightMetrics> {
        let mut by_date: BTreeMap<NaiveDate, Vec<&SessionRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.is_sleep()) {
            by_date
                .entry(record.local_date(self.config.tz))
                .or_default()
                .push(record);
        }

        let nights: BTreeMap<NaiveDate, NightMetrics> = by_date
            .into_iter()
            .map(|(date, group)| (date, self.reduce_night(date, &group)))
            .collect();

        debug!(nights = nights.len(), "aggregated sleep records into nights");
        nights
    }

    fn reduce_night(&self, date: NaiveDate, group: &[&SessionRecord]) -> NightMetrics {
        let mean_of = |extract: fn(&SessionRecord) -> Option<f64>| -> Option<f64> {
            let values: Vec<f64> = group.iter().filter_map(|r| extract(r)).collect();
            stats::mean(&values)
        };

        let mean_rr = mean_of(|r| r.mean_rr);
        let mean_hr = mean_rr.filter(|rr| *rr > 0.0).map(|rr| 60000.0 / rr);

        let heart_rates: Vec<f64> = group.iter().map(|r| r.heart_rate).collect();
        let rhr = resting_heart_rate(&heart_rates);

        let first = group.iter().map(|r| r.timestamp).min();
        let last = group.iter().map(|r| r.timestamp).max();
        let duration_minutes = match (first, last) {
            (Some(first), Some(last)) => (last - first).num_milliseconds() as f64 / 60_000.0,
            _ => 0.0,
        };

        NightMetrics {
            date,
            mean_rr,
            mean_hr,
            rhr,
            sdnn: mean_of(|r| r.sdnn),
            rmssd: mean_of(|r| r.rmssd),
            pnn50: mean_of(|r| r.pnn50),
            cv_rr: mean_of(|r| r.cv_rr),
            lf_power: mean_of(|r| r.lf_power),
            hf_power: mean_of(|r| r.hf_power),
            lf_hf_ratio: mean_of(|r| r.lf_hf_ratio),
            breathing_rate: mean_of(|r| r.breathing_rate),
            session_quality: mean_of(|r| r.quality_score),
            record_count: group.len(),
            duration_minutes,
            sleep_quality: None,
            recovery_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SLEEP_TAG;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    fn sleep_record(ts: &str, heart_rate: f64, rmssd: f64) -> SessionRecord {
        SessionRecord {
            timestamp: ts.parse::<DateTime<Utc>>().unwrap(),
            recording_session_id: "rec".to_string(),
            heart_rate,
            mean_rr: Some(60000.0 / heart_rate),
            sdnn: Some(rmssd + 5.0),
            rmssd: Some(rmssd),
            pnn50: Some(20.0),
            cv_rr: Some(4.0),
            rr_count: Some(300),
            lf_power: Some(800.0),
            hf_power: Some(1000.0),
            lf_hf_ratio: Some(0.8),
            breathing_rate: Some(13.0),
            valid_rr_percentage: Some(98.0),
            quality_score: Some(90.0),
            outlier_count: Some(2),
            filter_method: None,
            valid: true,
            tags: BTreeSet::from([SLEEP_TAG.to_string()]),
        }
    }

    #[test]
    fn test_no_sleep_records_yields_empty_map() {
        let mut record = sleep_record("2024-03-10T02:00:00Z", 55.0, 40.0);
        record.tags.clear();
        let nights = NightAggregator::new().aggregate(&[record]);
        assert!(nights.is_empty());
    }

    #[test]
    fn test_rhr_uses_min_below_three_records() {
        let records = vec![
            sleep_record("2024-03-10T01:00:00Z", 58.0, 40.0),
            sleep_record("2024-03-10T02:00:00Z", 52.0, 40.0),
        ];
        let nights = NightAggregator::new().aggregate(&records);
        let night = nights.values().next().unwrap();
        assert_eq!(night.rhr, Some(52.0));
    }

    #[test]
    fn test_rhr_uses_percentile_at_three_records() {
        let records = vec![
            sleep_record("2024-03-10T01:00:00Z", 50.0, 40.0),
            sleep_record("2024-03-10T02:00:00Z", 60.0, 40.0),
            sleep_record("2024-03-10T03:00:00Z", 70.0, 40.0),
        ];
        let nights = NightAggregator::new().aggregate(&records);
        let night = nights.values().next().unwrap();
        // idx = 0.1 * 2 = 0.2 between 50 and 60
        assert!((night.rhr.unwrap() - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_hr_derived_from_mean_rr() {
        let mut a = sleep_record("2024-03-10T01:00:00Z", 60.0, 40.0);
        let mut b = sleep_record("2024-03-10T02:00:00Z", 60.0, 40.0);
        a.mean_rr = Some(900.0);
        b.mean_rr = Some(1100.0);
        let nights = NightAggregator::new().aggregate(&[a, b]);
        let night = nights.values().next().unwrap();
        assert_eq!(night.mean_rr, Some(1000.0));
        assert_eq!(night.mean_hr, Some(60.0));
    }

    #[test]
    fn test_mean_hr_absent_when_mean_rr_missing() {
        let mut record = sleep_record("2024-03-10T01:00:00Z", 60.0, 40.0);
        record.mean_rr = None;
        let nights = NightAggregator::new().aggregate(&[record]);
        let night = nights.values().next().unwrap();
        assert_eq!(night.mean_hr, None);
    }

    #[test]
    fn test_duration_is_wall_clock_span() {
        let records = vec![
            sleep_record("2024-03-10T00:30:00Z", 55.0, 40.0),
            sleep_record("2024-03-10T03:00:00Z", 54.0, 41.0),
            sleep_record("2024-03-10T06:30:00Z", 56.0, 42.0),
        ];
        let nights = NightAggregator::new().aggregate(&records);
        let night = nights.values().next().unwrap();
        assert!((night.duration_minutes - 360.0).abs() < 1e-9);
        assert_eq!(night.record_count, 3);
    }

    #[test]
    fn test_missing_metric_values_are_skipped_not_zeroed() {
        let mut a = sleep_record("2024-03-10T01:00:00Z", 60.0, 40.0);
        let b = sleep_record("2024-03-10T02:00:00Z", 60.0, 50.0);
        a.rmssd = None;
        let nights = NightAggregator::new().aggregate(&[a, b]);
        let night = nights.values().next().unwrap();
        assert_eq!(night.rmssd, Some(50.0));
    }

    #[test]
    fn test_grouping_follows_reference_timezone() {
        // 23:30 UTC in winter lands on the next Berlin date
        let records = vec![
            sleep_record("2024-01-15T23:30:00Z", 55.0, 40.0),
            sleep_record("2024-01-16T05:30:00Z", 54.0, 41.0),
        ];
        let nights = NightAggregator::new().aggregate(&records);
        assert_eq!(nights.len(), 1);
        assert_eq!(
            *nights.keys().next().unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap()
        );
    }

    #[test]
    fn test_nights_sorted_ascending() {
        let records = vec![
            sleep_record("2024-03-12T02:00:00Z", 55.0, 40.0),
            sleep_record("2024-03-10T02:00:00Z", 56.0, 41.0),
            sleep_record("2024-03-11T02:00:00Z", 57.0, 42.0),
        ];
        let nights = NightAggregator::new().aggregate(&records);
        let dates: Vec<NaiveDate> = nights.keys().copied().collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            ]
        );
    }
}
