// Simple session record import example
//
// This example demonstrates the most basic usage of the import manager.

use hrvrs::import::ImportManager;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create the manager with the CSV and JSON importers registered
    let manager = ImportManager::new();

    // Import a CSV export
    let records = manager.import_file(Path::new("records.csv"))?;

    println!("Imported {} records", records.len());
    println!();

    // Display basic information about the first few records
    for record in records.iter().take(5) {
        println!("Record {}", record.recording_session_id);
        println!("  Timestamp: {}", record.timestamp);
        println!("  Heart rate: {:.1} bpm", record.heart_rate);

        if let Some(rmssd) = record.rmssd {
            println!("  RMSSD: {:.1} ms", rmssd);
        }

        if let Some(breathing) = record.breathing_rate {
            println!("  Breathing: {:.1} br/min", breathing);
        }

        if record.is_sleep() {
            println!("  Tagged as sleep");
        }

        println!();
    }

    Ok(())
}
