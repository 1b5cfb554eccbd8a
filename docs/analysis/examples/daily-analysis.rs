// End-to-end daily analysis example
//
// This example imports a directory of session records and walks the whole
// pipeline: night aggregation, baselines, scores, and the daily report.

use hrvrs::baseline::{BaselineCalculator, DynamicBaselineCalculator};
use hrvrs::import::ImportManager;
use hrvrs::night::NightAggregator;
use hrvrs::report::ReportBuilder;
use hrvrs::scores::{RecoveryBand, ScoreEngine};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let directory = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());

    let records = ImportManager::new().import_directory(Path::new(&directory))?;
    println!("Loaded {} records", records.len());
    println!();

    // Group sleep records into nights and score them against the
    // trailing-window baselines
    let mut nights = NightAggregator::new().aggregate(&records);
    let baselines = BaselineCalculator::new().trailing(&records);
    ScoreEngine::attach_scores(&mut nights, &baselines);

    println!("Night Summaries");
    println!("===============");
    for (date, night) in &nights {
        let recovery = night
            .recovery_score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{}: {:.0} min of sleep data, recovery {}",
            date, night.duration_minutes, recovery
        );
    }
    println!();

    // The daily report covers the most recent night
    if let Some(report) = ReportBuilder::daily_report(&nights, &baselines) {
        println!("Latest Night");
        println!("============");
        println!("Date: {}", report.date);

        if let Some(quality) = report.sleep_quality {
            println!("Sleep quality: {:.1}/100", quality);
        }

        if let Some(recovery) = report.recovery_score {
            let band = RecoveryBand::from_score(recovery);
            println!("Recovery: {:.1}/100 ({})", recovery, band.title());
        }

        println!();
    }

    // Day-by-day baselines carry the stress index
    let rows = DynamicBaselineCalculator::new().compute(&records);

    println!("Stress Index (last 7 days)");
    println!("==========================");
    for row in rows.iter().skip(rows.len().saturating_sub(7)) {
        match row.stress_index {
            Some(stress) => println!("{}: {:.1}", row.date, stress),
            None => println!("{}: n/a", row.date),
        }
    }

    Ok(())
}
