//! CSV adapters: prescription rows in, alerts out.

use std::io::{Read, Write};
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord, Writer};
use serde::Serialize;
use thiserror::Error;

use crate::screening::{Alert, PrescriptionRow};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column '{0}' not found in input header")]
    MissingColumn(String),
}

/// Read prescription rows from a CSV file with a header line.
///
/// `text_column` is required. A missing `id_column` is tolerated: rows then
/// carry no identifier and get positional ids downstream.
pub fn read_rows(
    path: &Path,
    text_column: &str,
    id_column: Option<&str>,
) -> Result<Vec<PrescriptionRow>, IngestError> {
    let reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let rows = collect_rows(reader, text_column, id_column)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Loaded prescription rows");
    Ok(rows)
}

pub fn read_rows_from<R: Read>(
    input: R,
    text_column: &str,
    id_column: Option<&str>,
) -> Result<Vec<PrescriptionRow>, IngestError> {
    collect_rows(
        ReaderBuilder::new().flexible(true).from_reader(input),
        text_column,
        id_column,
    )
}

fn collect_rows<R: Read>(
    mut reader: Reader<R>,
    text_column: &str,
    id_column: Option<&str>,
) -> Result<Vec<PrescriptionRow>, IngestError> {
    let headers = reader.headers()?.clone();
    let text_idx = column_index(&headers, text_column)
        .ok_or_else(|| IngestError::MissingColumn(text_column.to_string()))?;
    let id_idx = match id_column {
        Some(name) => {
            let idx = column_index(&headers, name);
            if idx.is_none() {
                tracing::warn!(column = name, "Id column not found, using row positions");
            }
            idx
        }
        None => None,
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = record.get(text_idx).unwrap_or_default().to_string();
        let id = id_idx
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        rows.push(PrescriptionRow { id, text });
    }
    Ok(rows)
}

/// Header lookup, ignoring case and surrounding whitespace.
fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    let wanted = name.trim();
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(wanted))
}

/// One output line.
#[derive(Serialize)]
struct AlertRecord<'a> {
    #[serde(rename = "Prescription ID")]
    prescription_id: &'a str,
    #[serde(rename = "Context")]
    context: &'static str,
    #[serde(rename = "Drug Pair")]
    drug_pair: &'a str,
    #[serde(rename = "Warning")]
    warning: &'a str,
    #[serde(rename = "Severity")]
    severity: &'static str,
    #[serde(rename = "Source")]
    source: &'static str,
}

impl<'a> From<&'a Alert> for AlertRecord<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            prescription_id: &alert.prescription_id,
            context: alert.context.label(),
            drug_pair: &alert.drug_pair,
            warning: &alert.warning,
            severity: alert.severity.as_str(),
            source: alert.provenance.as_str(),
        }
    }
}

/// Write alerts as CSV to `path`.
pub fn write_alerts(path: &Path, alerts: &[Alert]) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = Writer::from_path(path)?;
    write_records(writer, alerts)?;
    tracing::info!(path = %path.display(), alerts = alerts.len(), "Wrote alert report");
    Ok(())
}

pub fn write_alerts_to<W: Write>(output: W, alerts: &[Alert]) -> Result<(), IngestError> {
    write_records(Writer::from_writer(output), alerts)
}

fn write_records<W: Write>(mut writer: Writer<W>, alerts: &[Alert]) -> Result<(), IngestError> {
    if alerts.is_empty() {
        // serialize() only emits headers with the first record.
        writer.write_record(ALERT_HEADERS)?;
    }
    for alert in alerts {
        writer.serialize(AlertRecord::from(alert))?;
    }
    writer.flush()?;
    Ok(())
}

const ALERT_HEADERS: [&str; 6] = [
    "Prescription ID",
    "Context",
    "Drug Pair",
    "Warning",
    "Severity",
    "Source",
];
