pub mod config;
pub mod db;
pub mod ingest;
pub mod screening;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use config::ScreeningConfig;
use db::SqliteDrugDatabase;
use ingest::IngestError;
use screening::{
    BatchReport, LabelError, OpenFdaLabelClient, ReferenceError, RowAnalyzer,
    ScreeningReferenceData,
};

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the
/// built-in filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Analyzer wired from configuration: bundled reference data, the drug
/// product database when a path is configured and opens, and the openFDA
/// label client unless label scanning is disabled.
pub fn build_analyzer(config: &ScreeningConfig) -> Result<RowAnalyzer, ScreenError> {
    let reference = Arc::new(ScreeningReferenceData::bundled()?);
    tracing::info!(
        drugs = reference.vocabulary().len(),
        interactions = reference.interaction_count(),
        "Reference data ready"
    );

    let mut analyzer = RowAnalyzer::new(reference, config);

    if let Some(path) = &config.drug_db_path {
        match SqliteDrugDatabase::open(path, config.drug_db_fuzzy_threshold) {
            Ok(db) => {
                tracing::info!(path = %path.display(), products = db.product_count(), "Drug database ready");
                analyzer = analyzer.with_drug_database(Box::new(db));
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Drug database unavailable, continuing without it"
                );
            }
        }
    }

    if config.label_scan_enabled {
        let client = OpenFdaLabelClient::new(&config.label_base_url, config.label_timeout_secs)?;
        analyzer = analyzer.with_label_provider(Box::new(client));
    } else {
        tracing::info!("Label scanning disabled, knowledge base only");
    }

    Ok(analyzer)
}

/// Screen a CSV of prescriptions and write the alert report to `output`
/// (or stdout when `None`).
pub fn run(
    config: &ScreeningConfig,
    input: &Path,
    output: Option<&Path>,
) -> Result<BatchReport, ScreenError> {
    tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);

    let rows = ingest::read_rows(input, &config.text_column, Some(&config.id_column))?;
    let analyzer = build_analyzer(config)?;
    let report = analyzer.analyze_batch(&rows);

    match output {
        Some(path) => ingest::write_alerts(path, &report.alerts)?,
        None => ingest::write_alerts_to(std::io::stdout().lock(), &report.alerts)?,
    }

    Ok(report)
}
