use crate::baseline::Baselines;
use crate::models::SessionRecord;
use crate::night::NightMetrics;
use crate::stages::StageBreakdown;
use crate::stats;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Days covered by the weekly sleep trend, latest night included
pub const TREND_WINDOW_DAYS: i64 = 7;

/// One metric of the daily report: the night's value next to its baseline.
///
/// `change_pct`, `score`, and `delta` are filled only where the comparison
/// is meaningful for that metric; absent values stay absent so renderers
/// can show an explicit marker instead of a fake zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub value: Option<f64>,
    pub baseline: Option<f64>,

    /// Relative change against baseline, percent
    pub change_pct: Option<f64>,

    /// Ratio score against baseline, two decimals
    pub score: Option<f64>,

    /// Absolute difference from baseline
    pub delta: Option<f64>,
}

/// Summary of the most recent night against the static baselines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub hr: MetricComparison,
    pub hrv: MetricComparison,
    pub rhr: MetricComparison,
    pub breathing_rate: MetricComparison,
    pub recovery_score: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub sleep_duration_minutes: f64,
}

/// Stage hours for one calendar day of the trend window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepTrendDay {
    pub date: NaiveDate,
    pub deep_hours: f64,
    pub rem_hours: f64,
    pub light_hours: f64,
}

impl SleepTrendDay {
    pub fn total_hours(&self) -> f64 {
        self.deep_hours + self.rem_hours + self.light_hours
    }
}

/// Mean stage hours over the trend days that actually have sleep data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyAverages {
    pub total_hours: f64,
    pub deep_hours: f64,
    pub rem_hours: f64,
    pub light_hours: f64,
    pub deep_pct: f64,
    pub rem_pct: f64,
    pub light_pct: f64,
}

/// Seven days of sleep-stage composition ending at the latest night
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySleepTrend {
    /// One entry per calendar day, oldest first; days without sleep data
    /// carry zero hours
    pub days: Vec<SleepTrendDay>,

    /// Absent when no day in the window has sleep data
    pub averages: Option<WeeklyAverages>,
}

/// Data quality indicators over the whole record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub mean_quality: Option<f64>,
    pub min_quality: Option<f64>,
    pub max_quality: Option<f64>,
    pub valid_records: usize,
    pub valid_pct: f64,
}

/// Overview of the ingested record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_records: usize,

    /// Tag name and record count, most frequent first
    pub tag_distribution: Vec<(String, usize)>,

    pub first_date: NaiveDate,
    pub last_date: NaiveDate,

    /// Inclusive span between first and last date, days
    pub span_days: i64,

    pub quality: QualityStats,
}

impl DatasetSummary {
    pub fn unique_tags(&self) -> usize {
        self.tag_distribution.len()
    }
}

/// Assembles presentation-ready structures from the computed series.
pub struct ReportBuilder;

impl ReportBuilder {
    /// Daily report for the most recent night, or `None` when no night
    /// metrics exist.
    pub fn daily_report(
        nights: &BTreeMap<NaiveDate, NightMetrics>,
        baselines: &Baselines,
    ) -> Option<DailyReport> {
        let (date, night) = nights.iter().next_back()?;

        let hr = MetricComparison {
            value: night.mean_hr.map(stats::round1),
            baseline: baselines.hr.map(stats::round1),
            change_pct: match (night.mean_hr, baselines.hr) {
                (Some(value), Some(baseline)) if baseline > 0.0 => {
                    Some(stats::round1((value / baseline - 1.0) * 100.0))
                }
                _ => None,
            },
            ..MetricComparison::default()
        };
        let hrv = MetricComparison {
            value: night.rmssd.map(stats::round1),
            baseline: baselines.hrv.map(stats::round1),
            score: match (night.rmssd, baselines.hrv) {
                (Some(value), Some(baseline)) if baseline > 0.0 => {
                    Some(stats::round2(value / baseline))
                }
                _ => None,
            },
            ..MetricComparison::default()
        };
        let rhr = MetricComparison {
            value: night.rhr.map(stats::round1),
            baseline: baselines.rhr.map(stats::round1),
            score: match (night.rhr, baselines.rhr) {
                (Some(value), Some(baseline)) if value > 0.0 => {
                    Some(stats::round2(baseline / value))
                }
                _ => None,
            },
            ..MetricComparison::default()
        };
        let breathing_rate = MetricComparison {
            value: night.breathing_rate.map(stats::round1),
            baseline: baselines.breathing_rate.map(stats::round1),
            delta: match (night.breathing_rate, baselines.breathing_rate) {
                (Some(value), Some(baseline)) => Some(stats::round1(value - baseline)),
                _ => None,
            },
            ..MetricComparison::default()
        };

        Some(DailyReport {
            date: *date,
            hr,
            hrv,
            rhr,
            breathing_rate,
            recovery_score: night.recovery_score,
            sleep_quality: night.sleep_quality,
            sleep_duration_minutes: night.duration_minutes,
        })
    }

    /// Stage hours per day for the week ending at the latest night.
    pub fn weekly_sleep_trend(
        breakdowns: &BTreeMap<NaiveDate, StageBreakdown>,
    ) -> Option<WeeklySleepTrend> {
        let latest = *breakdowns.keys().next_back()?;
        let hours = |minutes: f64| stats::round2(minutes / 60.0);

        let days: Vec<SleepTrendDay> = (0..TREND_WINDOW_DAYS)
            .rev()
            .map(|offset| {
                let date = latest - Duration::days(offset);
                match breakdowns.get(&date) {
                    Some(breakdown) => SleepTrendDay {
                        date,
                        deep_hours: hours(breakdown.deep_minutes),
                        rem_hours: hours(breakdown.rem_minutes),
                        light_hours: hours(breakdown.light_minutes),
                    },
                    None => SleepTrendDay {
                        date,
                        deep_hours: 0.0,
                        rem_hours: 0.0,
                        light_hours: 0.0,
                    },
                }
            })
            .collect();

        let valid: Vec<&SleepTrendDay> = days.iter().filter(|d| d.total_hours() > 0.0).collect();
        let averages = if valid.is_empty() {
            None
        } else {
            let count = valid.len() as f64;
            let deep = valid.iter().map(|d| d.deep_hours).sum::<f64>() / count;
            let rem = valid.iter().map(|d| d.rem_hours).sum::<f64>() / count;
            let light = valid.iter().map(|d| d.light_hours).sum::<f64>() / count;
            let total = deep + rem + light;
            let pct = |share: f64| {
                if total > 0.0 {
                    stats::round1(share / total * 100.0)
                } else {
                    0.0
                }
            };
            Some(WeeklyAverages {
                total_hours: stats::round2(total),
                deep_hours: stats::round2(deep),
                rem_hours: stats::round2(rem),
                light_hours: stats::round2(light),
                deep_pct: pct(deep),
                rem_pct: pct(rem),
                light_pct: pct(light),
            })
        };

        debug!(nights = valid.len(), "built weekly sleep trend");
        Some(WeeklySleepTrend { days, averages })
    }

    /// Dataset overview for the full record set.
    pub fn dataset_summary(records: &[SessionRecord], tz: Tz) -> Option<DatasetSummary> {
        if records.is_empty() {
            return None;
        }

        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            for tag in &record.tags {
                *tag_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        let mut tag_distribution: Vec<(String, usize)> = tag_counts.into_iter().collect();
        tag_distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let dates: Vec<NaiveDate> = records.iter().map(|r| r.local_date(tz)).collect();
        let first_date = *dates.iter().min()?;
        let last_date = *dates.iter().max()?;
        let span_days = (last_date - first_date).num_days() + 1;

        let quality_values: Vec<f64> = records.iter().filter_map(|r| r.quality_score).collect();
        let valid_records = records.iter().filter(|r| r.valid).count();
        let quality = QualityStats {
            mean_quality: stats::mean(&quality_values).map(stats::round2),
            min_quality: stats::min(&quality_values).map(stats::round2),
            max_quality: stats::max(&quality_values).map(stats::round2),
            valid_records,
            valid_pct: stats::round1(valid_records as f64 / records.len() as f64 * 100.0),
        };

        Some(DatasetSummary {
            total_records: records.len(),
            tag_distribution,
            first_date,
            last_date,
            span_days,
            quality,
        })
    }
}

/// One row of the metric interpretation tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceRange {
    pub range: &'static str,
    pub label: &'static str,
}

pub const HR_REFERENCE: &[ReferenceRange] = &[
    ReferenceRange { range: "< 60", label: "Bradycardic" },
    ReferenceRange { range: "60-75", label: "Optimal resting HR" },
    ReferenceRange { range: "75-85", label: "Mild activation" },
    ReferenceRange { range: "> 85", label: "High sympathetic tone" },
];

pub const RMSSD_REFERENCE: &[ReferenceRange] = &[
    ReferenceRange { range: "> 60", label: "Very high vagal tone" },
    ReferenceRange { range: "40-60", label: "High parasympathetic activity" },
    ReferenceRange { range: "25-40", label: "Healthy variability" },
    ReferenceRange { range: "15-25", label: "Reduced vagal tone" },
    ReferenceRange { range: "< 15", label: "Low vagal input" },
];

pub const SDNN_REFERENCE: &[ReferenceRange] = &[
    ReferenceRange { range: "> 80", label: "Excellent resilience" },
    ReferenceRange { range: "50-80", label: "Good adaptability" },
    ReferenceRange { range: "30-50", label: "Moderate variability" },
    ReferenceRange { range: "20-30", label: "Low HRV" },
    ReferenceRange { range: "< 20", label: "Very low HRV" },
];

pub const LF_HF_REFERENCE: &[ReferenceRange] = &[
    ReferenceRange { range: "< 0.5", label: "High parasympathetic" },
    ReferenceRange { range: "0.5-2.0", label: "Balanced" },
    ReferenceRange { range: "2.0-4.0", label: "Mild sympathetic" },
    ReferenceRange { range: "4.0-10.0", label: "High sympathetic" },
    ReferenceRange { range: "> 10.0", label: "Likely invalid" },
];
