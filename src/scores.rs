use crate::baseline::Baselines;
use crate::night::NightMetrics;
use crate::stats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Sleep duration that earns the full duration score, minutes (7 hours)
pub const DURATION_TARGET_MINUTES: f64 = 420.0;

/// Component value used when a ratio cannot be formed
pub const NEUTRAL_COMPONENT_SCORE: f64 = 0.5;

/// Stress index for one day from current and baseline cardiovascular state.
///
/// Undefined when any input is missing or non-finite or either baseline is
/// zero; callers surface that as "not available" rather than zero stress.
pub fn stress_index(
    hr: Option<f64>,
    baseline_rhr: Option<f64>,
    hrv: Option<f64>,
    baseline_hrv: Option<f64>,
) -> Option<f64> {
    let hr = hr?;
    let baseline_rhr = baseline_rhr?;
    let hrv = hrv?;
    let baseline_hrv = baseline_hrv?;
    if [hr, baseline_rhr, hrv, baseline_hrv]
        .iter()
        .any(|v| !v.is_finite())
        || baseline_rhr == 0.0
        || baseline_hrv == 0.0
    {
        return None;
    }

    let hr_component = ((hr / baseline_rhr - 0.8) * 2.0).clamp(0.0, 1.5);
    // inverted: suppressed HRV raises stress
    let hrv_component = ((1.0 - hrv / baseline_hrv) * 2.0).clamp(0.0, 1.5);

    Some(stats::round1((hr_component + hrv_component).clamp(0.0, 3.0)))
}

/// Presentation zones for the stress index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressZone {
    Low,
    Medium,
    High,
}

impl StressZone {
    pub fn from_index(value: f64) -> Self {
        if value < 0.8 {
            StressZone::Low
        } else if value <= 1.8 {
            StressZone::Medium
        } else {
            StressZone::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StressZone::Low => "Low",
            StressZone::Medium => "Medium",
            StressZone::High => "High",
        }
    }
}

/// Sleep quality and recovery for one night
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NightScores {
    /// Composite sleep quality, 0-100
    pub sleep_quality: f64,

    /// Composite recovery score, 0-100
    pub recovery_score: f64,
}

/// Weighted scoring of night metrics against a baseline mapping.
///
/// Weights are fixed design constants. Missing or degenerate inputs fall
/// back to documented neutral values so one bad night never aborts the
/// pipeline.
pub struct ScoreEngine;

impl ScoreEngine {
    /// Score a single night. Sleep quality feeds into recovery, so it is
    /// always computed first.
    pub fn score_night(night: &NightMetrics, baselines: &Baselines) -> NightScores {
        let rmssd_score = Self::capped_ratio(night.rmssd, baselines.hrv);
        let rhr_score = Self::capped_ratio(baselines.rhr, night.rhr);
        let hr_drop_score = Self::hr_drop_score(night.mean_hr, baselines.hr);
        let duration_score = (night.duration_minutes / DURATION_TARGET_MINUTES).min(1.0);
        let lf_hf_score = Self::lf_hf_penalty(night.lf_hf_ratio);

        let sleep_quality = (100.0
            * (0.4 * rmssd_score + 0.3 * hr_drop_score + 0.2 * duration_score + 0.1 * lf_hf_score))
            .clamp(0.0, 100.0);
        let recovery_score = (100.0
            * (0.5 * rmssd_score + 0.3 * rhr_score + 0.2 * (sleep_quality / 100.0)))
            .clamp(0.0, 100.0);

        NightScores {
            sleep_quality: stats::round1(sleep_quality),
            recovery_score: stats::round1(recovery_score),
        }
    }

    /// Attach sleep quality and recovery to every night in the series.
    pub fn attach_scores(nights: &mut BTreeMap<NaiveDate, NightMetrics>, baselines: &Baselines) {
        for night in nights.values_mut() {
            let scores = Self::score_night(night, baselines);
            night.sleep_quality = Some(scores.sleep_quality);
            night.recovery_score = Some(scores.recovery_score);
        }
        debug!(nights = nights.len(), "attached night scores");
    }

    /// `min(1.0, numerator / denominator)`, neutral 0.5 unless both sides
    /// are present and positive.
    fn capped_ratio(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
        match (numerator, denominator) {
            (Some(n), Some(d)) if n > 0.0 && d > 0.0 => (n / d).min(1.0),
            _ => NEUTRAL_COMPONENT_SCORE,
        }
    }

    /// Relative heart-rate drop below baseline. Negative when the night ran
    /// above baseline; 0 when either side is unusable.
    fn hr_drop_score(mean_hr: Option<f64>, baseline_hr: Option<f64>) -> f64 {
        match (mean_hr, baseline_hr) {
            (Some(hr), Some(baseline)) if baseline > 0.0 => (baseline - hr) / baseline,
            _ => 0.0,
        }
    }

    fn lf_hf_penalty(lf_hf_ratio: Option<f64>) -> f64 {
        match lf_hf_ratio {
            Some(v) if v < 2.0 => 1.0,
            Some(v) if v < 4.0 => 0.8,
            _ => 0.5,
        }
    }
}

/// Training guidance bands keyed on the recovery score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryBand {
    RecoveryFocus,
    ModerateTraining,
    Performance,
}

impl RecoveryBand {
    pub fn from_score(recovery_score: f64) -> Self {
        if recovery_score < 33.0 {
            RecoveryBand::RecoveryFocus
        } else if recovery_score < 67.0 {
            RecoveryBand::ModerateTraining
        } else {
            RecoveryBand::Performance
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RecoveryBand::RecoveryFocus => "Recovery Focus Day",
            RecoveryBand::ModerateTraining => "Moderate Training Day",
            RecoveryBand::Performance => "Performance Day",
        }
    }

    /// Suggested strain range for the day, inclusive.
    pub fn target_strain(&self) -> (u8, u8) {
        match self {
            RecoveryBand::RecoveryFocus => (0, 7),
            RecoveryBand::ModerateTraining => (8, 14),
            RecoveryBand::Performance => (14, 21),
        }
    }

    pub fn guidance(&self) -> &'static [&'static str] {
        match self {
            RecoveryBand::RecoveryFocus => &[
                "Light walking or yoga",
                "Stretching and mobility work",
                "Extra sleep or naps if possible",
                "Hydration and nutrition focus",
                "Avoid high-intensity training",
            ],
            RecoveryBand::ModerateTraining => &[
                "Moderate cardio (zone 2)",
                "Strength training with moderate loads",
                "Technical skill work",
                "Adequate warm-up and cool-down",
                "Normal sleep duration",
            ],
            RecoveryBand::Performance => &[
                "High-intensity interval training",
                "Competition or race day",
                "Personal record attempts",
                "Heavy strength training",
                "Longer duration endurance work",
            ],
        }
    }
}

/// Qualitative label for the sleep quality score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepQualityBand {
    Poor,
    Fair,
    Good,
}

impl SleepQualityBand {
    pub fn from_score(sleep_quality: f64) -> Self {
        if sleep_quality < 40.0 {
            SleepQualityBand::Poor
        } else if sleep_quality < 80.0 {
            SleepQualityBand::Fair
        } else {
            SleepQualityBand::Good
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SleepQualityBand::Poor => "Poor",
            SleepQualityBand::Fair => "Fair",
            SleepQualityBand::Good => "Good",
        }
    }
}

/// Status label for a nightly breathing rate, breaths per minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreathingStatus {
    Hypoventilation,
    Optimal,
    Elevated,
    VeryElevated,
}

impl BreathingStatus {
    pub fn from_rate(breaths_per_minute: f64) -> Self {
        if breaths_per_minute < 12.0 {
            BreathingStatus::Hypoventilation
        } else if breaths_per_minute <= 16.0 {
            BreathingStatus::Optimal
        } else if breaths_per_minute <= 18.0 {
            BreathingStatus::Elevated
        } else {
            BreathingStatus::VeryElevated
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BreathingStatus::Hypoventilation => "Hypoventilation",
            BreathingStatus::Optimal => "Optimal",
            BreathingStatus::Elevated => "Elevated",
            BreathingStatus::VeryElevated => "Very Elevated",
        }
    }
}
