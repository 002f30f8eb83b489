use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use ddi_screen::config::{self, ScreeningConfig};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <input.csv> [output.csv]", config::APP_NAME);
        eprintln!("Without an output path the alert report goes to stdout.");
        eprintln!("Set DDI_OFFLINE=1 to screen against the knowledge base only.");
        eprintln!(
            "The drug product database is created at {} unless DDI_DRUG_DB names another path (or \"off\").",
            config::drug_db_path().display()
        );
        return ExitCode::from(2);
    }

    ddi_screen::init_tracing();

    let input = PathBuf::from(&args[1]);
    let output = args.get(2).map(PathBuf::from);
    let config = ScreeningConfig::from_env();

    match ddi_screen::run(&config, &input, output.as_deref()) {
        Ok(report) => {
            eprintln!(
                "Screened {} prescriptions ({} failed): {} alerts ({} high, {} moderate, {} low) in {} ms",
                report.rows_processed,
                report.rows_failed,
                report.alerts.len(),
                report.counts.high,
                report.counts.moderate,
                report.counts.low,
                report.processing_time_ms,
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Screening failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
