//! Per-night sleep stage labeling from within-night percentile thresholds.

use crate::models::{SessionRecord, REFERENCE_TIMEZONE};
use crate::stats;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Stage label for one sleep record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepStage {
    Deep,
    Rem,
    Light,
    Unknown,
}

impl SleepStage {
    pub fn label(&self) -> &'static str {
        match self {
            SleepStage::Deep => "Deep",
            SleepStage::Rem => "REM",
            SleepStage::Light => "Light",
            SleepStage::Unknown => "Unknown",
        }
    }
}

/// Heuristic cut points for stage classification.
///
/// These are unvalidated constants inherited from the reference analysis,
/// kept configurable rather than baked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    /// Heart-rate percentile a record must sit at or below for Deep
    pub hr_low_percentile: f64,

    /// RMSSD percentile a record must sit at or below for REM
    pub rmssd_low_percentile: f64,

    /// RMSSD percentile a record must sit at or above for Deep
    pub rmssd_high_percentile: f64,

    /// LF/HF ceiling for Deep (exclusive)
    pub deep_lf_hf_max: f64,

    /// LF/HF floor for REM (exclusive)
    pub rem_lf_hf_min: f64,

    /// Lookback from the final sleep timestamp scanned for slow-wave sleep
    pub sws_window_minutes: i64,

    /// Rolling-median width applied to heart rate in the lookback window
    pub sws_rolling_window: usize,

    /// Number of lowest-rolling-value records kept as the SWS estimate
    pub sws_sample_count: usize,

    /// Below this many survivors the whole night is returned instead
    pub sws_min_samples: usize,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            hr_low_percentile: 0.2,
            rmssd_low_percentile: 0.3,
            rmssd_high_percentile: 0.8,
            deep_lf_hf_max: 1.0,
            rem_lf_hf_min: 2.0,
            sws_window_minutes: 90,
            sws_rolling_window: 5,
            sws_sample_count: 30,
            sws_min_samples: 3,
        }
    }
}

/// Configuration for the stage classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageClassifierConfig {
    pub thresholds: StageThresholds,

    /// Reference timezone for night bucketing
    pub tz: Tz,
}

impl Default for StageClassifierConfig {
    fn default() -> Self {
        Self {
            thresholds: StageThresholds::default(),
            tz: REFERENCE_TIMEZONE,
        }
    }
}

/// Stage composition of one night, in records and wall-clock minutes.
///
/// Minutes distribute the night's span proportionally to each stage's
/// share of classified records. Unknown records stay in the denominator
/// but own no minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageBreakdown {
    /// Wall-clock span of the night, minutes
    pub total_minutes: f64,

    pub deep_minutes: f64,
    pub rem_minutes: f64,
    pub light_minutes: f64,

    /// Share of the night spent in each stage, percent of total_minutes
    pub deep_pct: f64,
    pub rem_pct: f64,
    pub light_pct: f64,

    pub deep_records: usize,
    pub rem_records: usize,
    pub light_records: usize,
    pub unknown_records: usize,
}

impl StageBreakdown {
    /// All records that entered classification, Unknown included.
    pub fn classified_records(&self) -> usize {
        self.deep_records + self.rem_records + self.light_records + self.unknown_records
    }
}

/// Labels sleep records Deep, REM, Light, or Unknown using thresholds
/// derived from the night itself.
#[derive(Debug, Clone, Default)]
pub struct StageClassifier {
    config: StageClassifierConfig,
}

impl StageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StageClassifierConfig) -> Self {
        Self { config }
    }

    /// Label each record of one night. Output order matches input order.
    ///
    /// Deep is checked before REM before Light; records missing RMSSD or
    /// LF/HF are Unknown.
    pub fn classify_night(&self, night: &[&SessionRecord]) -> Vec<SleepStage> {
        let hr_values: Vec<f64> = night.iter().map(|r| r.heart_rate).collect();
        let rmssd_values: Vec<f64> = night.iter().filter_map(|r| r.rmssd).collect();

        let thresholds = &self.config.thresholds;
        let cuts = match (
            stats::quantile(&hr_values, thresholds.hr_low_percentile),
            stats::mean(&hr_values),
            stats::quantile(&rmssd_values, thresholds.rmssd_low_percentile),
            stats::quantile(&rmssd_values, thresholds.rmssd_high_percentile),
        ) {
            (Some(hr_low), Some(hr_mean), Some(rmssd_low), Some(rmssd_high)) => {
                NightCuts {
                    hr_low,
                    hr_mean,
                    rmssd_low,
                    rmssd_high,
                }
            }
            // no record carries rmssd, so nothing can classify
            _ => return vec![SleepStage::Unknown; night.len()],
        };

        night.iter().map(|r| self.classify_record(r, &cuts)).collect()
    }

    fn classify_record(&self, record: &SessionRecord, cuts: &NightCuts) -> SleepStage {
        let thresholds = &self.config.thresholds;
        let (rmssd, lf_hf) = match (record.rmssd, record.lf_hf_ratio) {
            (Some(rmssd), Some(lf_hf)) => (rmssd, lf_hf),
            _ => return SleepStage::Unknown,
        };
        let hr = record.heart_rate;

        if hr <= cuts.hr_low && rmssd >= cuts.rmssd_high && lf_hf < thresholds.deep_lf_hf_max {
            SleepStage::Deep
        } else if hr > cuts.hr_mean && rmssd <= cuts.rmssd_low && lf_hf > thresholds.rem_lf_hf_min {
            SleepStage::Rem
        } else {
            SleepStage::Light
        }
    }

    /// Stage composition of one night's records.
    pub fn breakdown(&self, night: &[&SessionRecord]) -> StageBreakdown {
        if night.is_empty() {
            return StageBreakdown::default();
        }
        let stages = self.classify_night(night);

        let mut deep = 0usize;
        let mut rem = 0usize;
        let mut light = 0usize;
        let mut unknown = 0usize;
        for stage in &stages {
            match stage {
                SleepStage::Deep => deep += 1,
                SleepStage::Rem => rem += 1,
                SleepStage::Light => light += 1,
                SleepStage::Unknown => unknown += 1,
            }
        }

        let first = night.iter().map(|r| r.timestamp).min();
        let last = night.iter().map(|r| r.timestamp).max();
        let total_minutes = match (first, last) {
            (Some(first), Some(last)) => {
                stats::round1((last - first).num_milliseconds() as f64 / 60_000.0)
            }
            _ => 0.0,
        };

        let total = stages.len() as f64;
        let minutes_for = |count: usize| stats::round1(total_minutes * count as f64 / total);
        let deep_minutes = minutes_for(deep);
        let rem_minutes = minutes_for(rem);
        let light_minutes = minutes_for(light);

        let pct_of_night = |minutes: f64| {
            if total_minutes > 0.0 {
                stats::round1(minutes / total_minutes * 100.0)
            } else {
                0.0
            }
        };

        StageBreakdown {
            total_minutes,
            deep_minutes,
            rem_minutes,
            light_minutes,
            deep_pct: pct_of_night(deep_minutes),
            rem_pct: pct_of_night(rem_minutes),
            light_pct: pct_of_night(light_minutes),
            deep_records: deep,
            rem_records: rem,
            light_records: light,
            unknown_records: unknown,
        }
    }

    /// Stage composition for every night in the record set, keyed by the
    /// night's calendar date.
    pub fn nightly_breakdowns(
        &self,
        records: &[SessionRecord],
    ) -> BTreeMap<NaiveDate, StageBreakdown> {
        let tz = self.config.tz;
        let mut by_night: BTreeMap<NaiveDate, Vec<&SessionRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.is_sleep()) {
            by_night.entry(record.local_date(tz)).or_default().push(record);
        }

        let breakdowns: BTreeMap<NaiveDate, StageBreakdown> = by_night
            .into_iter()
            .map(|(date, night)| (date, self.breakdown(&night)))
            .collect();
        debug!(nights = breakdowns.len(), "classified sleep stages");
        breakdowns
    }

    /// Approximate slow-wave-sleep periods: within the last stretch of the
    /// night, the records with the calmest rolling heart rate. Falls back
    /// to the whole night when the window is empty or too sparse.
    pub fn slow_wave_window<'a>(&self, night: &[&'a SessionRecord]) -> Vec<&'a SessionRecord> {
        let thresholds = &self.config.thresholds;
        let mut ordered: Vec<&SessionRecord> = night.to_vec();
        ordered.sort_by_key(|r| r.timestamp);

        let end = match ordered.last() {
            Some(record) => record.timestamp,
            None => return Vec::new(),
        };
        let cutoff = end - Duration::minutes(thresholds.sws_window_minutes);
        let window: Vec<&SessionRecord> = ordered
            .iter()
            .copied()
            .filter(|r| r.timestamp >= cutoff)
            .collect();
        if window.is_empty() {
            return ordered;
        }

        let hr: Vec<f64> = window.iter().map(|r| r.heart_rate).collect();
        let rolling = stats::rolling_median(&hr, thresholds.sws_rolling_window);

        let mut ranked: Vec<(f64, &SessionRecord)> =
            rolling.into_iter().zip(window.iter().copied()).collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        ranked.truncate(thresholds.sws_sample_count);

        if ranked.len() < thresholds.sws_min_samples {
            return ordered;
        }
        ranked.into_iter().map(|(_, record)| record).collect()
    }
}

struct NightCuts {
    hr_low: f64,
    hr_mean: f64,
    rmssd_low: f64,
    rmssd_high: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SLEEP_TAG;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;

    fn sleep_record(
        ts: &str,
        heart_rate: f64,
        rmssd: Option<f64>,
        lf_hf_ratio: Option<f64>,
    ) -> SessionRecord {
        SessionRecord {
            timestamp: ts.parse::<DateTime<Utc>>().unwrap(),
            recording_session_id: "rec".to_string(),
            heart_rate,
            mean_rr: Some(60000.0 / heart_rate),
            sdnn: rmssd.map(|v| v + 5.0),
            rmssd,
            pnn50: Some(22.0),
            cv_rr: Some(4.0),
            rr_count: Some(300),
            lf_power: Some(600.0),
            hf_power: Some(700.0),
            lf_hf_ratio,
            breathing_rate: Some(13.0),
            valid_rr_percentage: Some(98.0),
            quality_score: Some(88.0),
            outlier_count: Some(2),
            filter_method: None,
            valid: true,
            tags: BTreeSet::from([SLEEP_TAG.to_string()]),
        }
    }

    /// Nine records spanning 80 minutes with clearly separated phases:
    /// three calm high-rmssd (Deep), three hot low-rmssd (REM), three in
    /// the middle (Light).
    fn staged_night() -> Vec<SessionRecord> {
        let mut records = Vec::new();
        for i in 0..3 {
            let ts = format!("2024-03-10T01:{:02}:00Z", i * 10);
            records.push(sleep_record(&ts, 48.0, Some(80.0), Some(0.5)));
        }
        for i in 0..3 {
            let ts = format!("2024-03-10T01:{:02}:00Z", 30 + i * 10);
            records.push(sleep_record(&ts, 62.0 + i as f64, Some(50.0), Some(1.2)));
        }
        for i in 0..3 {
            let ts = format!("2024-03-10T02:{:02}:00Z", i * 10);
            records.push(sleep_record(&ts, 70.0 + i as f64, Some(20.0), Some(2.5)));
        }
        records
    }

    #[test]
    fn test_classifies_separated_phases() {
        let records = staged_night();
        let night: Vec<&SessionRecord> = records.iter().collect();
        let stages = StageClassifier::new().classify_night(&night);

        assert_eq!(&stages[0..3], &[SleepStage::Deep; 3]);
        assert_eq!(&stages[3..6], &[SleepStage::Light; 3]);
        assert_eq!(&stages[6..9], &[SleepStage::Rem; 3]);
    }

    #[test]
    fn test_missing_metrics_are_unknown() {
        let records = vec![
            sleep_record("2024-03-10T01:00:00Z", 50.0, None, Some(0.5)),
            sleep_record("2024-03-10T01:10:00Z", 52.0, Some(60.0), None),
            sleep_record("2024-03-10T01:20:00Z", 54.0, Some(55.0), Some(1.0)),
        ];
        let night: Vec<&SessionRecord> = records.iter().collect();
        let stages = StageClassifier::new().classify_night(&night);

        assert_eq!(stages[0], SleepStage::Unknown);
        assert_eq!(stages[1], SleepStage::Unknown);
        assert_ne!(stages[2], SleepStage::Unknown);
    }

    #[test]
    fn test_all_unknown_without_rmssd() {
        let records = vec![
            sleep_record("2024-03-10T01:00:00Z", 50.0, None, Some(0.5)),
            sleep_record("2024-03-10T01:10:00Z", 52.0, None, Some(0.6)),
        ];
        let night: Vec<&SessionRecord> = records.iter().collect();
        let stages = StageClassifier::new().classify_night(&night);
        assert_eq!(stages, vec![SleepStage::Unknown; 2]);
    }

    #[test]
    fn test_breakdown_distributes_span_proportionally() {
        let records = staged_night();
        let night: Vec<&SessionRecord> = records.iter().collect();
        let breakdown = StageClassifier::new().breakdown(&night);

        // 01:00 to 02:20
        assert_eq!(breakdown.total_minutes, 80.0);
        assert_eq!(breakdown.deep_records, 3);
        assert_eq!(breakdown.rem_records, 3);
        assert_eq!(breakdown.light_records, 3);
        // each phase holds a third of the records
        assert!((breakdown.deep_minutes - 26.7).abs() < 0.05);
        assert_eq!(breakdown.deep_minutes, breakdown.rem_minutes);
    }

    #[test]
    fn test_unknown_records_dilute_stage_minutes() {
        let mut records = staged_night();
        records.push(sleep_record("2024-03-10T02:20:00Z", 60.0, None, None));
        let night: Vec<&SessionRecord> = records.iter().collect();
        let breakdown = StageClassifier::new().breakdown(&night);

        assert_eq!(breakdown.unknown_records, 1);
        let staged = breakdown.deep_minutes + breakdown.rem_minutes + breakdown.light_minutes;
        assert!(staged < breakdown.total_minutes);
    }

    #[test]
    fn test_stage_minutes_never_exceed_total() {
        let records = staged_night();
        let night: Vec<&SessionRecord> = records.iter().collect();
        let breakdown = StageClassifier::new().breakdown(&night);

        let staged = breakdown.deep_minutes + breakdown.rem_minutes + breakdown.light_minutes;
        // rounding each term to one decimal can add at most 0.15
        assert!(staged <= breakdown.total_minutes + 0.2);
    }

    #[test]
    fn test_empty_night_breakdown_is_zeroed() {
        let breakdown = StageClassifier::new().breakdown(&[]);
        assert_eq!(breakdown, StageBreakdown::default());
    }

    #[test]
    fn test_nightly_breakdowns_keyed_by_local_date() {
        let mut records = staged_night();
        // late-evening UTC record lands on the next local date
        records.push(sleep_record("2024-03-10T23:30:00Z", 55.0, Some(40.0), Some(1.0)));
        let breakdowns = StageClassifier::new().nightly_breakdowns(&records);

        assert_eq!(breakdowns.len(), 2);
        let second_night = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        assert_eq!(breakdowns[&second_night].classified_records(), 1);
    }

    #[test]
    fn test_slow_wave_window_prefers_calm_tail() {
        // two hours of records one minute apart, calm stretch near the end
        let mut records = Vec::new();
        for i in 0..120 {
            let ts = format!("2024-03-10T{:02}:{:02}:00Z", i / 60, i % 60);
            let hr = if (95..110).contains(&i) { 45.0 } else { 60.0 };
            records.push(sleep_record(&ts, hr, Some(50.0), Some(1.0)));
        }
        let night: Vec<&SessionRecord> = records.iter().collect();
        let sws = StageClassifier::new().slow_wave_window(&night);

        assert_eq!(sws.len(), 30);
        let mean_hr: f64 = sws.iter().map(|r| r.heart_rate).sum::<f64>() / sws.len() as f64;
        assert!(mean_hr < 55.0);
    }

    #[test]
    fn test_slow_wave_window_sparse_night_returns_everything() {
        let records = vec![
            sleep_record("2024-03-10T01:00:00Z", 50.0, Some(60.0), Some(1.0)),
            sleep_record("2024-03-10T04:00:00Z", 52.0, Some(55.0), Some(1.1)),
        ];
        let night: Vec<&SessionRecord> = records.iter().collect();
        let sws = StageClassifier::new().slow_wave_window(&night);

        // only one record falls in the final window, below the minimum
        assert_eq!(sws.len(), 2);
    }

    #[test]
    fn test_slow_wave_window_empty_input() {
        assert!(StageClassifier::new().slow_wave_window(&[]).is_empty());
    }
}
