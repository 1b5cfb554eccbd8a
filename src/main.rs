use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use hrvrs::baseline::{
    baseline_stability, convergence_series, days_to_stability, BaselineCalculator,
    DynamicBaselineCalculator,
};
use hrvrs::config::AppConfig;
use hrvrs::error::{AnalysisError, HrvError};
use hrvrs::import::ImportManager;
use hrvrs::logging::{init_logging, LogConfig};
use hrvrs::models::SessionRecord;
use hrvrs::night::{NightAggregator, NightAggregatorConfig};
use hrvrs::report::{
    ReferenceRange, ReportBuilder, HR_REFERENCE, LF_HF_REFERENCE, RMSSD_REFERENCE, SDNN_REFERENCE,
};
use hrvrs::scores::{
    BreathingStatus, RecoveryBand, ScoreEngine, SleepQualityBand, StressZone,
};
use hrvrs::stages::StageClassifier;
use hrvrs::stats;

/// hrvrs - HRV Sleep Analytics CLI
///
/// A Rust-based tool for analyzing nightly HRV recordings and deriving
/// recovery, sleep quality, and stress metrics against personal baselines.
#[derive(Parser)]
#[command(name = "hrvrs")]
#[command(author = "hrvrs contributors")]
#[command(version = "0.1.0")]
#[command(about = "HRV Sleep Analytics CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import session records from CSV or JSON files
    Import {
        /// Input file or directory
        #[arg(short, long)]
        file: PathBuf,

        /// Validate the file without reporting on it
        #[arg(long)]
        validate: bool,
    },

    /// Daily report for the most recent night
    Report {
        /// Records file or directory
        #[arg(short, long)]
        file: PathBuf,

        /// Include the weekly sleep trend table
        #[arg(short, long)]
        trend: bool,

        /// Print metric interpretation tables
        #[arg(short, long)]
        reference: bool,
    },

    /// Evolving personal baselines, day by day
    Baselines {
        /// Records file or directory
        #[arg(short, long)]
        file: PathBuf,

        /// Show the trailing-window baselines instead of the daily fold
        #[arg(long)]
        trailing: bool,

        /// Append the baseline stability table
        #[arg(short, long)]
        stability: bool,

        /// Append the normalized baseline convergence series
        #[arg(long)]
        convergence: bool,
    },

    /// Per-night sleep stage composition
    Stages {
        /// Records file or directory
        #[arg(short, long)]
        file: PathBuf,

        /// Show the estimated slow-wave-sleep window per night
        #[arg(long)]
        sws: bool,
    },

    /// Overview of the whole record set
    Summary {
        /// Records file or directory
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose))?;

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    match cli.command {
        Commands::Import { file, validate } => cmd_import(&file, validate)?,
        Commands::Report {
            file,
            trend,
            reference,
        } => cmd_report(&config, &file, trend, reference)?,
        Commands::Baselines {
            file,
            trailing,
            stability,
            convergence,
        } => cmd_baselines(&config, &file, trailing, stability, convergence)?,
        Commands::Stages { file, sws } => cmd_stages(&config, &file, sws)?,
        Commands::Summary { file } => cmd_summary(&config, &file)?,
    }

    Ok(())
}

fn load_records(path: &Path) -> Result<Vec<SessionRecord>> {
    let manager = ImportManager::new();
    let records = if path.is_dir() {
        manager.import_directory(path)?
    } else {
        manager.import_file(path)?
    };
    Ok(records)
}

fn fmt1(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "N/A".to_string())
}

fn cmd_import(file: &Path, validate: bool) -> Result<()> {
    println!("{}", "Importing session records...".green().bold());

    let manager = ImportManager::new();
    if validate {
        let count = manager.validate_file(file)?;
        println!("{}", format!("✓ {count} records validated").green());
    } else {
        let records = load_records(file)?;
        println!(
            "{}",
            format!("✓ Imported {} records", records.len()).green()
        );
    }

    Ok(())
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Tonight")]
    value: String,
    #[tabled(rename = "Baseline")]
    baseline: String,
    #[tabled(rename = "vs Baseline")]
    comparison: String,
}

fn cmd_report(config: &AppConfig, file: &Path, trend: bool, reference: bool) -> Result<()> {
    let records = load_records(file)?;
    let tz = config.reference_timezone()?;

    let aggregator = NightAggregator::with_config(NightAggregatorConfig { tz });
    let mut nights = aggregator.aggregate(&records);
    let baselines = BaselineCalculator::with_config(config.baseline_config()?).trailing(&records);
    ScoreEngine::attach_scores(&mut nights, &baselines);

    let Some(report) = ReportBuilder::daily_report(&nights, &baselines) else {
        let err = HrvError::from(AnalysisError::NoSleepData {
            reason: "no Sleep-tagged records in the input".to_string(),
        });
        println!("{}", err.user_message().yellow());
        return Ok(());
    };

    println!();
    println!(
        "{}",
        format!("Daily Report for {}", report.date).cyan().bold()
    );

    let rows = vec![
        MetricRow {
            metric: "Heart Rate (bpm)".to_string(),
            value: fmt1(report.hr.value),
            baseline: fmt1(report.hr.baseline),
            comparison: report
                .hr
                .change_pct
                .map(|p| format!("{p:+.1}%"))
                .unwrap_or_else(|| "N/A".to_string()),
        },
        MetricRow {
            metric: "HRV RMSSD (ms)".to_string(),
            value: fmt1(report.hrv.value),
            baseline: fmt1(report.hrv.baseline),
            comparison: report
                .hrv
                .score
                .map(|s| format!("{s:.2}x"))
                .unwrap_or_else(|| "N/A".to_string()),
        },
        MetricRow {
            metric: "Resting HR (bpm)".to_string(),
            value: fmt1(report.rhr.value),
            baseline: fmt1(report.rhr.baseline),
            comparison: report
                .rhr
                .score
                .map(|s| format!("{s:.2}x"))
                .unwrap_or_else(|| "N/A".to_string()),
        },
        MetricRow {
            metric: "Breathing (br/min)".to_string(),
            value: fmt1(report.breathing_rate.value),
            baseline: fmt1(report.breathing_rate.baseline),
            comparison: report
                .breathing_rate
                .delta
                .map(|d| format!("{d:+.1}"))
                .unwrap_or_else(|| "N/A".to_string()),
        },
    ];

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "Sleep duration: {:.1} h",
        report.sleep_duration_minutes / 60.0
    );

    if let Some(quality) = report.sleep_quality {
        let band = SleepQualityBand::from_score(quality);
        println!("Sleep quality:  {:.1}/100 ({})", quality, band.label());
    }

    if let Some(rate) = report.breathing_rate.value {
        println!(
            "Breathing:      {}",
            BreathingStatus::from_rate(rate).label()
        );
    }

    if let Some(recovery) = report.recovery_score {
        let band = RecoveryBand::from_score(recovery);
        let title = match band {
            RecoveryBand::Performance => band.title().green().bold(),
            RecoveryBand::ModerateTraining => band.title().yellow().bold(),
            RecoveryBand::RecoveryFocus => band.title().red().bold(),
        };
        let (low, high) = band.target_strain();

        println!();
        println!("Recovery score: {recovery:.1}/100");
        println!("{title}");
        println!("Target strain: {low}-{high}");
        for item in band.guidance() {
            println!("  - {item}");
        }
    }

    if trend {
        print_weekly_trend(config, &records)?;
    }

    if reference {
        print_reference_tables();
    }

    Ok(())
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Deep (h)")]
    deep: String,
    #[tabled(rename = "REM (h)")]
    rem: String,
    #[tabled(rename = "Light (h)")]
    light: String,
    #[tabled(rename = "Total (h)")]
    total: String,
}

fn print_weekly_trend(config: &AppConfig, records: &[SessionRecord]) -> Result<()> {
    let classifier = StageClassifier::with_config(config.stage_config()?);
    let breakdowns = classifier.nightly_breakdowns(records);

    let Some(weekly) = ReportBuilder::weekly_sleep_trend(&breakdowns) else {
        println!("{}", "No nights available for a weekly trend".yellow());
        return Ok(());
    };

    println!();
    println!("{}", "Weekly Sleep Trend".cyan().bold());

    let rows: Vec<TrendRow> = weekly
        .days
        .iter()
        .map(|day| TrendRow {
            date: day.date.to_string(),
            deep: format!("{:.2}", day.deep_hours),
            rem: format!("{:.2}", day.rem_hours),
            light: format!("{:.2}", day.light_hours),
            total: format!("{:.2}", day.total_hours()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if let Some(avg) = &weekly.averages {
        println!(
            "Average night: {:.2} h ({:.1}% deep, {:.1}% REM, {:.1}% light)",
            avg.total_hours, avg.deep_pct, avg.rem_pct, avg.light_pct
        );
    }

    Ok(())
}

#[derive(Tabled)]
struct ReferenceRow {
    #[tabled(rename = "Range")]
    range: &'static str,
    #[tabled(rename = "Interpretation")]
    label: &'static str,
}

fn print_reference_tables() {
    let sections: [(&str, &[ReferenceRange]); 4] = [
        ("Heart Rate (bpm)", HR_REFERENCE),
        ("RMSSD (ms)", RMSSD_REFERENCE),
        ("SDNN (ms)", SDNN_REFERENCE),
        ("LF/HF Ratio", LF_HF_REFERENCE),
    ];

    for (title, ranges) in sections {
        println!();
        println!("{}", title.cyan().bold());

        let rows: Vec<ReferenceRow> = ranges
            .iter()
            .map(|r| ReferenceRow {
                range: r.range,
                label: r.label,
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}

#[derive(Tabled)]
struct BaselineRow {
    #[tabled(rename = "Day")]
    day: u32,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "RHR")]
    rhr: String,
    #[tabled(rename = "Base RHR")]
    baseline_rhr: String,
    #[tabled(rename = "HRV")]
    hrv: String,
    #[tabled(rename = "Base HRV")]
    baseline_hrv: String,
    #[tabled(rename = "Avg HR")]
    avg_hr: String,
    #[tabled(rename = "Base HR")]
    baseline_hr: String,
    #[tabled(rename = "Breathing")]
    breathing: String,
    #[tabled(rename = "Base Br")]
    baseline_breathing: String,
    #[tabled(rename = "Stress")]
    stress: String,
}

#[derive(Tabled)]
struct TrailingBaselineRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Baseline")]
    value: String,
}

#[derive(Tabled)]
struct StabilityRow {
    #[tabled(rename = "Series")]
    metric: String,
    #[tabled(rename = "Variability")]
    variability: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

#[derive(Tabled)]
struct ConvergenceRow {
    #[tabled(rename = "Day")]
    day: u32,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "RHR")]
    rhr: String,
    #[tabled(rename = "HR")]
    hr: String,
    #[tabled(rename = "HRV")]
    hrv: String,
    #[tabled(rename = "Breathing")]
    breathing: String,
}

fn cmd_baselines(
    config: &AppConfig,
    file: &Path,
    trailing: bool,
    stability: bool,
    convergence: bool,
) -> Result<()> {
    let records = load_records(file)?;
    let baseline_config = config.baseline_config()?;

    if trailing {
        let baselines = BaselineCalculator::with_config(baseline_config).trailing(&records);
        if baselines.is_empty() {
            println!("{}", "No sleep data in the trailing window".yellow());
            return Ok(());
        }

        println!();
        println!("{}", "Trailing-Window Baselines".cyan().bold());

        let rows = vec![
            TrailingBaselineRow {
                metric: "HRV RMSSD (ms)",
                value: fmt1(baselines.hrv),
            },
            TrailingBaselineRow {
                metric: "Resting HR (bpm)",
                value: fmt1(baselines.rhr),
            },
            TrailingBaselineRow {
                metric: "SDNN (ms)",
                value: fmt1(baselines.sdnn),
            },
            TrailingBaselineRow {
                metric: "Breathing (br/min)",
                value: fmt1(baselines.breathing_rate),
            },
            TrailingBaselineRow {
                metric: "Mean HR (bpm)",
                value: fmt1(baselines.hr),
            },
            TrailingBaselineRow {
                metric: "LF/HF Ratio",
                value: baselines
                    .lf_hf_ratio
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "N/A".to_string()),
            },
        ];

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        return Ok(());
    }

    let rows = DynamicBaselineCalculator::with_config(baseline_config).compute(&records);
    if rows.is_empty() {
        println!("{}", "No records to compute baselines from".yellow());
        return Ok(());
    }

    println!();
    println!("{}", "Daily Baselines".cyan().bold());

    let table_rows: Vec<BaselineRow> = rows
        .iter()
        .map(|row| BaselineRow {
            day: row.day_number,
            date: row.date.to_string(),
            rhr: fmt1(row.rhr),
            baseline_rhr: fmt1(row.baseline_rhr),
            hrv: fmt1(row.hrv),
            baseline_hrv: fmt1(row.baseline_hrv),
            avg_hr: fmt1(row.avg_hr),
            baseline_hr: fmt1(row.baseline_hr),
            breathing: fmt1(row.breathing_rate),
            baseline_breathing: fmt1(row.baseline_breathing_rate),
            stress: row
                .stress_index
                .map(|s| format!("{s:.1} ({})", StressZone::from_index(s).label()))
                .unwrap_or_else(|| "N/A".to_string()),
        })
        .collect();

    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    let days = rows.len() as u32;
    let remaining = days_to_stability(days);
    if remaining > 0 {
        println!("Baselines still developing: {remaining} more days of data recommended");
    } else {
        println!("Baselines are fully developed ({days} days of history)");
    }

    if stability {
        let stability_rows = baseline_stability(&rows);
        if stability_rows.is_empty() {
            let err = HrvError::from(AnalysisError::InsufficientData {
                calculation: "baseline stability".to_string(),
                reason: "at least three processed days are needed".to_string(),
            });
            println!("{}", err.user_message().yellow());
        } else {
            println!();
            println!("{}", "Baseline Stability".cyan().bold());

            let table_rows: Vec<StabilityRow> = stability_rows
                .iter()
                .map(|row| StabilityRow {
                    metric: row.metric.clone(),
                    variability: format!("{:.1}% CV", row.variability_pct),
                    status: row.status.description(),
                })
                .collect();

            let mut table = Table::new(table_rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }

    if convergence {
        let fmt_norm =
            |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "N/A".to_string());
        let table_rows: Vec<ConvergenceRow> = convergence_series(&rows)
            .iter()
            .map(|point| ConvergenceRow {
                day: point.day_number,
                date: point.date.to_string(),
                rhr: fmt_norm(point.rhr),
                hr: fmt_norm(point.hr),
                hrv: fmt_norm(point.hrv),
                breathing: fmt_norm(point.breathing_rate),
            })
            .collect();

        println!();
        println!("{}", "Baseline Convergence (0 = at baseline)".cyan().bold());

        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    Ok(())
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Total (min)")]
    total: String,
    #[tabled(rename = "Deep")]
    deep: String,
    #[tabled(rename = "REM")]
    rem: String,
    #[tabled(rename = "Light")]
    light: String,
    #[tabled(rename = "Unclassified")]
    unknown: String,
}

fn cmd_stages(config: &AppConfig, file: &Path, sws: bool) -> Result<()> {
    let records = load_records(file)?;
    let tz = config.reference_timezone()?;
    let classifier = StageClassifier::with_config(config.stage_config()?);

    let breakdowns = classifier.nightly_breakdowns(&records);
    if breakdowns.is_empty() {
        let err = HrvError::from(AnalysisError::NoSleepData {
            reason: "no Sleep-tagged records in the input".to_string(),
        });
        println!("{}", err.user_message().yellow());
        return Ok(());
    }

    println!();
    println!("{}", "Sleep Stage Composition".cyan().bold());

    let rows: Vec<StageRow> = breakdowns
        .iter()
        .map(|(date, b)| StageRow {
            date: date.to_string(),
            total: format!("{:.0}", b.total_minutes),
            deep: format!("{:.0} min ({:.1}%)", b.deep_minutes, b.deep_pct),
            rem: format!("{:.0} min ({:.1}%)", b.rem_minutes, b.rem_pct),
            light: format!("{:.0} min ({:.1}%)", b.light_minutes, b.light_pct),
            unknown: format!("{} records", b.unknown_records),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if sws {
        let mut nights: BTreeMap<_, Vec<&SessionRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.is_sleep()) {
            nights.entry(record.local_date(tz)).or_default().push(record);
        }

        println!();
        println!("{}", "Slow-Wave Sleep Windows".cyan().bold());
        for (date, night) in &nights {
            let window = classifier.slow_wave_window(night);
            let heart_rates: Vec<f64> = window.iter().map(|r| r.heart_rate).collect();
            println!(
                "{date}: {} records, mean HR {}",
                window.len(),
                fmt1(stats::mean(&heart_rates))
            );
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Records")]
    count: usize,
}

fn cmd_summary(config: &AppConfig, file: &Path) -> Result<()> {
    let records = load_records(file)?;
    let tz = config.reference_timezone()?;

    let Some(summary) = ReportBuilder::dataset_summary(&records, tz) else {
        println!("{}", "The record set is empty".yellow());
        return Ok(());
    };

    println!();
    println!("{}", "Dataset Summary".cyan().bold());
    println!("Records:    {}", summary.total_records);
    println!(
        "Date range: {} to {} ({} days)",
        summary.first_date, summary.last_date, summary.span_days
    );
    println!(
        "Valid:      {} ({:.1}%)",
        summary.quality.valid_records, summary.quality.valid_pct
    );

    if let Some(mean) = summary.quality.mean_quality {
        println!(
            "Quality:    mean {:.2}, range {:.2} to {:.2}",
            mean,
            summary.quality.min_quality.unwrap_or(mean),
            summary.quality.max_quality.unwrap_or(mean)
        );
    }

    if !summary.tag_distribution.is_empty() {
        println!();
        let rows: Vec<TagRow> = summary
            .tag_distribution
            .iter()
            .map(|(tag, count)| TagRow {
                tag: tag.clone(),
                count: *count,
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    Ok(())
}
