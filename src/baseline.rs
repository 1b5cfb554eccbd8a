use crate::models::{SessionRecord, REFERENCE_TIMEZONE};
use crate::night::resting_heart_rate;
use crate::scores::stress_index;
use crate::stats;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

/// Days of history after which baselines are considered developed
pub const STABILITY_TARGET_DAYS: u32 = 14;

/// Baseline calculation errors
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("Out-of-order date: {current} does not follow {previous}")]
    OutOfOrderDates {
        previous: NaiveDate,
        current: NaiveDate,
    },
}

/// Reference values computed over a trailing window of history.
///
/// A field is `None` when its window had no qualifying records; callers
/// fall back to documented neutral defaults instead of fabricated numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    /// Median RMSSD over windowed sleep records, milliseconds
    pub hrv: Option<f64>,

    /// 10th-percentile heart rate over windowed sleep records
    pub rhr: Option<f64>,

    /// Median SDNN over windowed sleep records, milliseconds
    pub sdnn: Option<f64>,

    /// Median breathing rate over windowed sleep records
    pub breathing_rate: Option<f64>,

    /// Mean heart rate over all windowed records, sleep and non-sleep
    pub hr: Option<f64>,

    /// Median LF/HF ratio over windowed sleep records
    pub lf_hf_ratio: Option<f64>,
}

impl Baselines {
    /// True when no window produced any reference value.
    pub fn is_empty(&self) -> bool {
        self.hrv.is_none()
            && self.rhr.is_none()
            && self.sdnn.is_none()
            && self.breathing_rate.is_none()
            && self.hr.is_none()
            && self.lf_hf_ratio.is_none()
    }
}

/// Configuration shared by the static and dynamic baseline calculators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Reference timezone for calendar-date bucketing
    pub tz: Tz,

    /// Trailing window length in days for the static baseline
    pub window_days: u32,

    /// Fraction of lowest values the dynamic RHR/HRV baselines draw from
    pub lowest_fraction: f64,

    /// Minimum cumulative sleep records before the lowest-fraction
    /// baselines apply; below it the day's own value is used
    pub min_sleep_samples: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            tz: REFERENCE_TIMEZONE,
            window_days: 14,
            lowest_fraction: 0.3,
            min_sleep_samples: 3,
        }
    }
}

/// Computes trailing-window and expanding-window baselines from the full
/// record history.
#[derive(Debug, Clone, Default)]
pub struct BaselineCalculator {
    config: BaselineConfig,
}

impl BaselineCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Static baseline over the trailing window ending at the latest date
    /// present in the data. Returns an all-`None` mapping when no sleep
    /// records fall in the window.
    pub fn trailing(&self, records: &[SessionRecord]) -> Baselines {
        let tz = self.config.tz;
        let latest = match records.iter().map(|r| r.local_date(tz)).max() {
            Some(date) => date,
            None => return Baselines::default(),
        };
        let cutoff = latest - Duration::days(i64::from(self.config.window_days));

        let windowed: Vec<&SessionRecord> = records
            .iter()
            .filter(|r| r.local_date(tz) >= cutoff)
            .collect();
        let sleep: Vec<&SessionRecord> =
            windowed.iter().copied().filter(|r| r.is_sleep()).collect();

        if sleep.is_empty() {
            debug!(%latest, "no sleep records in baseline window");
            return Baselines::default();
        }

        let sleep_values = |extract: fn(&SessionRecord) -> Option<f64>| -> Vec<f64> {
            sleep.iter().filter_map(|r| extract(r)).collect()
        };
        let sleep_hr: Vec<f64> = sleep.iter().map(|r| r.heart_rate).collect();
        let all_hr: Vec<f64> = windowed.iter().map(|r| r.heart_rate).collect();

        let baselines = Baselines {
            hrv: stats::median(&sleep_values(|r| r.rmssd)),
            rhr: stats::quantile(&sleep_hr, 0.1),
            sdnn: stats::median(&sleep_values(|r| r.sdnn)),
            breathing_rate: stats::median(&sleep_values(|r| r.breathing_rate)),
            hr: stats::mean(&all_hr),
            lf_hf_ratio: stats::median(&sleep_values(|r| r.lf_hf_ratio)),
        };
        debug!(
            window_days = self.config.window_days,
            sleep_records = sleep.len(),
            "computed trailing baseline"
        );
        baselines
    }
}

/// One output row of the dynamic baseline engine: the day's raw metrics,
/// the expanding-window baselines in force that day, and the stress index
/// derived from both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBaselineRow {
    /// Calendar date of the day
    pub date: NaiveDate,

    /// 1-based ordinal over unique processed dates, gaps ignored
    pub day_number: u32,

    /// Resting heart rate from the day's sleep records
    pub rhr: Option<f64>,

    /// Mean heart rate over the day's non-sleep records
    pub avg_hr: Option<f64>,

    /// Mean RMSSD over the day's sleep records, milliseconds
    pub hrv: Option<f64>,

    /// Mean breathing rate over the day's sleep records
    pub breathing_rate: Option<f64>,

    /// Median of the lowest heart rates accumulated during sleep
    pub baseline_rhr: Option<f64>,

    /// Median of all non-sleep heart rates accumulated so far
    pub baseline_hr: Option<f64>,

    /// Median of the lowest RMSSD values accumulated during sleep
    pub baseline_hrv: Option<f64>,

    /// Median of all sleep breathing rates accumulated so far
    pub baseline_breathing_rate: Option<f64>,

    /// Stress index for the day (0-3 scale)
    pub stress_index: Option<f64>,
}

/// Accumulated history carried between fold steps.
///
/// Holds the cumulative sleep and non-sleep value pools the expanding
/// window draws from, plus the ordering bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct DynamicBaselineState {
    sleep_records: usize,
    sleep_rmssd: Vec<f64>,
    sleep_heart_rate: Vec<f64>,
    sleep_breathing_rate: Vec<f64>,
    non_sleep_heart_rate: Vec<f64>,
    day_number: u32,
    last_date: Option<NaiveDate>,
}

impl DynamicBaselineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unique dates folded so far.
    pub fn days_processed(&self) -> u32 {
        self.day_number
    }
}

/// Expanding-window baseline engine.
///
/// Implemented as an ordered fold: [`step`](Self::step) consumes one day's
/// records and the prior state and emits that day's row, so the same code
/// path serves both whole-history recomputation and incremental feeding.
#[derive(Debug, Clone, Default)]
pub struct DynamicBaselineCalculator {
    config: BaselineConfig,
}

impl DynamicBaselineCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Fold the full record history into one row per unique date, in
    /// ascending date order. Recomputed from scratch on every call; there
    /// is no persisted incremental state.
    pub fn compute(&self, records: &[SessionRecord]) -> Vec<DailyBaselineRow> {
        let tz = self.config.tz;
        let mut by_date: BTreeMap<NaiveDate, Vec<&SessionRecord>> = BTreeMap::new();
        for record in records {
            by_date.entry(record.local_date(tz)).or_default().push(record);
        }

        let mut state = DynamicBaselineState::new();
        let rows: Vec<DailyBaselineRow> = by_date
            .into_iter()
            .map(|(date, group)| self.step_unchecked(&mut state, date, &group))
            .collect();

        info!(days = rows.len(), "computed dynamic baselines");
        rows
    }

    /// One fold step: append `day_records` to the cumulative pools, then
    /// compute the day's metrics and the baselines now in force.
    ///
    /// Dates must arrive in strictly ascending order; anything else
    /// invalidates the expanding-window semantics and is rejected.
    pub fn step(
        &self,
        state: &mut DynamicBaselineState,
        date: NaiveDate,
        day_records: &[&SessionRecord],
    ) -> Result<DailyBaselineRow, BaselineError> {
        if let Some(previous) = state.last_date {
            if date <= previous {
                return Err(BaselineError::OutOfOrderDates {
                    previous,
                    current: date,
                });
            }
        }
        Ok(self.step_unchecked(state, date, day_records))
    }

    fn step_unchecked(
        &self,
        state: &mut DynamicBaselineState,
        date: NaiveDate,
        day_records: &[&SessionRecord],
    ) -> DailyBaselineRow {
        let (day_sleep, day_non_sleep): (Vec<&SessionRecord>, Vec<&SessionRecord>) =
            day_records.iter().copied().partition(|r| r.is_sleep());

        // The day's own records join the window before its baseline is read.
        state.sleep_records += day_sleep.len();
        state
            .sleep_rmssd
            .extend(day_sleep.iter().filter_map(|r| r.rmssd));
        state
            .sleep_heart_rate
            .extend(day_sleep.iter().map(|r| r.heart_rate));
        state
            .sleep_breathing_rate
            .extend(day_sleep.iter().filter_map(|r| r.breathing_rate));
        state
            .non_sleep_heart_rate
            .extend(day_non_sleep.iter().map(|r| r.heart_rate));

        let day_sleep_hr: Vec<f64> = day_sleep.iter().map(|r| r.heart_rate).collect();
        let rhr = resting_heart_rate(&day_sleep_hr);

        let day_non_sleep_hr: Vec<f64> = day_non_sleep.iter().map(|r| r.heart_rate).collect();
        let avg_hr = stats::mean(&day_non_sleep_hr);

        let day_rmssd: Vec<f64> = day_sleep.iter().filter_map(|r| r.rmssd).collect();
        let hrv = stats::mean(&day_rmssd);

        let day_breathing: Vec<f64> = day_sleep.iter().filter_map(|r| r.breathing_rate).collect();
        let breathing_rate = stats::mean(&day_breathing);

        let baseline_hrv = self.lowest_pool_median(state, &state.sleep_rmssd, hrv);
        let baseline_rhr = self.lowest_pool_median(state, &state.sleep_heart_rate, rhr);

        let baseline_hr = if state.non_sleep_heart_rate.is_empty() {
            avg_hr
        } else {
            stats::median(&state.non_sleep_heart_rate)
        };
        let baseline_breathing_rate = if state.sleep_records == 0 {
            breathing_rate
        } else {
            stats::median(&state.sleep_breathing_rate)
        };

        let stress = stress_index(avg_hr, baseline_rhr, hrv, baseline_hrv);

        state.day_number += 1;
        state.last_date = Some(date);

        DailyBaselineRow {
            date,
            day_number: state.day_number,
            rhr,
            avg_hr,
            hrv,
            breathing_rate,
            baseline_rhr,
            baseline_hr,
            baseline_hrv,
            baseline_breathing_rate,
            stress_index: stress,
        }
    }

    /// Median of the lowest fraction of the cumulative pool, or the day's
    /// own value while fewer than `min_sleep_samples` sleep records exist.
    fn lowest_pool_median(
        &self,
        state: &DynamicBaselineState,
        pool: &[f64],
        day_value: Option<f64>,
    ) -> Option<f64> {
        if state.sleep_records >= self.config.min_sleep_samples {
            let count = ((state.sleep_records as f64 * self.config.lowest_fraction) as usize).max(1);
            stats::median(&stats::smallest(pool, count))
        } else {
            day_value
        }
    }
}

/// Stability classification of a baseline series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineStability {
    Stable,
    ModeratelyStable,
    StillDeveloping,
}

impl BaselineStability {
    /// Classify a coefficient of variation, in percent.
    pub fn from_variability(cv_percent: f64) -> Self {
        if cv_percent < 5.0 {
            BaselineStability::Stable
        } else if cv_percent < 10.0 {
            BaselineStability::ModeratelyStable
        } else {
            BaselineStability::StillDeveloping
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BaselineStability::Stable => "Stable",
            BaselineStability::ModeratelyStable => "Moderately Stable",
            BaselineStability::StillDeveloping => "Still Developing",
        }
    }
}

/// Variability of one baseline series over the trailing week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStabilityRow {
    /// Baseline series the row describes
    pub metric: String,

    /// Coefficient of variation over the trailing window, in percent
    pub variability_pct: f64,

    /// Stability classification of the variability
    pub status: BaselineStability,
}

/// Coefficient-of-variation stability of each baseline series over the
/// trailing `min(7, len)` days. Needs at least three processed days.
pub fn baseline_stability(rows: &[DailyBaselineRow]) -> Vec<BaselineStabilityRow> {
    if rows.len() < 3 {
        return Vec::new();
    }
    let window = &rows[rows.len() - rows.len().min(7)..];

    let series: [(&str, fn(&DailyBaselineRow) -> Option<f64>); 4] = [
        ("Heart Rate", |r| r.baseline_hr),
        ("Resting HR", |r| r.baseline_rhr),
        ("HRV", |r| r.baseline_hrv),
        ("Breathing Rate", |r| r.baseline_breathing_rate),
    ];

    series
        .iter()
        .map(|(metric, extract)| {
            let values: Vec<f64> = window.iter().filter_map(|r| extract(r)).collect();
            let cv = match (stats::mean(&values), stats::std_dev(&values)) {
                (Some(mean), Some(sd)) if mean > 0.0 => sd / mean * 100.0,
                _ => 0.0,
            };
            let cv = stats::round1(cv);
            BaselineStabilityRow {
                metric: metric.to_string(),
                variability_pct: cv,
                status: BaselineStability::from_variability(cv),
            }
        })
        .collect()
}

/// Days of additional data recommended before baselines are considered
/// stable.
pub fn days_to_stability(days_processed: u32) -> u32 {
    STABILITY_TARGET_DAYS.saturating_sub(days_processed)
}

/// Normalized distance of each metric from its baseline for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub date: NaiveDate,
    pub day_number: u32,

    /// |rhr - baseline_rhr| scaled by the series maximum, in [0, 1]
    pub rhr: Option<f64>,

    /// |avg_hr - baseline_hr| scaled by the series maximum
    pub hr: Option<f64>,

    /// |hrv - baseline_hrv| scaled by the series maximum
    pub hrv: Option<f64>,

    /// |breathing_rate - baseline_breathing_rate| scaled by the maximum
    pub breathing_rate: Option<f64>,
}

/// How far each day's metrics sit from their baselines, normalized per
/// metric by the largest gap in the series.
pub fn convergence_series(rows: &[DailyBaselineRow]) -> Vec<ConvergencePoint> {
    let diff = |value: Option<f64>, baseline: Option<f64>| -> Option<f64> {
        Some((value? - baseline?).abs())
    };

    let diffs: Vec<(Option<f64>, Option<f64>, Option<f64>, Option<f64>)> = rows
        .iter()
        .map(|r| {
            (
                diff(r.rhr, r.baseline_rhr),
                diff(r.avg_hr, r.baseline_hr),
                diff(r.hrv, r.baseline_hrv),
                diff(r.breathing_rate, r.baseline_breathing_rate),
            )
        })
        .collect();

    let max_of = |select: fn(&(Option<f64>, Option<f64>, Option<f64>, Option<f64>)) -> Option<f64>| {
        diffs
            .iter()
            .filter_map(select)
            .fold(0.0_f64, |acc, v| acc.max(v))
    };
    let maxima = (
        max_of(|d| d.0),
        max_of(|d| d.1),
        max_of(|d| d.2),
        max_of(|d| d.3),
    );

    let normalize = |value: Option<f64>, max: f64| -> Option<f64> {
        if max > 0.0 {
            value.map(|v| v / max)
        } else {
            Some(0.0)
        }
    };

    rows.iter()
        .zip(diffs.iter())
        .map(|(row, d)| ConvergencePoint {
            date: row.date,
            day_number: row.day_number,
            rhr: normalize(d.0, maxima.0),
            hr: normalize(d.1, maxima.1),
            hrv: normalize(d.2, maxima.2),
            breathing_rate: normalize(d.3, maxima.3),
        })
        .collect()
}
