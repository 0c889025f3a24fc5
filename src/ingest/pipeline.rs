use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::db::{Database, InsertOutcome};
use crate::ingest::{
    filename::{FilenameMatch, FilenamePattern},
    normalize::{normalize_row, ColumnMap},
    report::{FileTally, IngestionReport},
};
use crate::{log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source_dir: PathBuf,
    /// Delete every stored reading before importing.
    pub clear_existing: bool,
    pub file_prefix: String,
}

struct Table {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

struct TableError {
    rows_read: u64,
    error: anyhow::Error,
}

fn read_table(path: &Path) -> Result<Table, TableError> {
    let fail = |rows_read: usize, error: anyhow::Error| TableError {
        rows_read: rows_read as u64,
        error,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| fail(0, anyhow::Error::new(err).context("failed to open file")))?;

    let headers = reader
        .headers()
        .map_err(|err| fail(0, anyhow::Error::new(err).context("failed to read header row")))?
        .clone();

    let mut records = Vec::new();
    for result in reader.records() {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                let rows_read = records.len();
                return Err(fail(
                    rows_read,
                    anyhow::Error::new(err).context(format!("failed after {rows_read} rows")),
                ));
            }
        }
    }

    Ok(Table { headers, records })
}

/// Directory entries as (file name, path), sorted by name.
fn list_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list data directory {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Import every matching extract in `options.source_dir`.
///
/// Bad files and rows are counted and reported, never fatal. The run fails
/// only when the directory is unusable or the requested clear fails.
pub async fn ingest(db: &Database, options: &IngestOptions) -> Result<IngestionReport> {
    let source_dir = options.source_dir.as_path();
    if !source_dir.is_dir() {
        bail!("Data directory does not exist: {}", source_dir.display());
    }

    let pattern = FilenamePattern::new(&options.file_prefix)?;
    let mut report = IngestionReport::default();

    if options.clear_existing {
        log_warn!("Clearing all existing segment snapshots...");
        let removed = db
            .clear_snapshots()
            .await
            .context("failed to clear existing snapshots")?;
        log_info!("Existing data cleared ({removed} rows).");
        report.cleared_rows = Some(removed);
    }

    log_info!("Starting data import from: {}", source_dir.display());

    let dir = source_dir.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || list_entries(&dir))
        .await
        .context("directory listing task failed")??;

    for (file_name, path) in entries {
        match pattern.extract_timestamp(&file_name) {
            FilenameMatch::NotMatching => {
                log_warn!("Skipping non-matching file: {file_name}");
                report.non_matching.push(file_name);
            }
            FilenameMatch::InvalidTimestamp { raw, reason } => {
                report.files_matched += 1;
                report.files_skipped += 1;
                log_error!(
                    "Skipping {file_name}: invalid datetime '{raw}' in filename: {reason}"
                );
                report.record_failure(
                    &file_name,
                    None,
                    format!("invalid datetime '{raw}' in filename: {reason}"),
                );
            }
            FilenameMatch::Matched(recorded_at) => {
                report.files_matched += 1;
                log_info!("Processing {file_name}...");
                ingest_file(db, &path, &file_name, recorded_at, &mut report).await;
            }
        }
    }

    Ok(report)
}

async fn ingest_file(
    db: &Database,
    path: &Path,
    file_name: &str,
    recorded_at: NaiveDateTime,
    report: &mut IngestionReport,
) {
    let owned_path = path.to_path_buf();
    let read = tokio::task::spawn_blocking(move || read_table(&owned_path))
        .await
        .unwrap_or_else(|err| {
            Err(TableError {
                rows_read: 0,
                error: anyhow::Error::new(err).context("file read task failed"),
            })
        });

    let table = match read {
        Ok(table) => table,
        Err(TableError { rows_read, error }) => {
            log_error!("Failed to read or process file {file_name}: {error:#}");
            report.files_skipped += 1;
            report.add_file(&FileTally {
                rows_read,
                skipped: rows_read,
                ..FileTally::default()
            });
            report.record_failure(file_name, None, format!("{error:#}"));
            return;
        }
    };

    let columns = ColumnMap::from_headers(&table.headers);
    let missing = columns.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|column| column.header()).collect();
        log_warn!(
            "{file_name} has no {} column; its rows cannot be imported",
            names.join(", ")
        );
    }
    if !columns.unknown_headers().is_empty() {
        log::debug!(
            "{file_name}: ignoring unknown columns {:?}",
            columns.unknown_headers()
        );
    }

    let mut tally = FileTally::default();
    let mut readings = Vec::with_capacity(table.records.len());
    let mut row_numbers = Vec::with_capacity(table.records.len());

    for (index, record) in table.records.iter().enumerate() {
        let row_number = index as u64 + 1;
        tally.rows_read += 1;
        match normalize_row(record, &columns) {
            Ok(reading) => {
                readings.push(reading);
                row_numbers.push(row_number);
            }
            Err(reason) => {
                log_warn!("Skipping row {row_number} in {file_name}: {reason}");
                tally.skipped += 1;
                report.record_failure(file_name, Some(row_number), reason.to_string());
            }
        }
    }

    if !readings.is_empty() {
        let pending = readings.len() as u64;
        match db.insert_snapshot_batch(recorded_at, readings).await {
            Ok(outcomes) => {
                for (outcome, row_number) in outcomes.into_iter().zip(row_numbers) {
                    match outcome {
                        InsertOutcome::Inserted => tally.inserted += 1,
                        InsertOutcome::Duplicate => tally.duplicate += 1,
                        InsertOutcome::Failed(err) => {
                            log_error!(
                                "Error inserting row {row_number} from {file_name}: {err}"
                            );
                            tally.skipped += 1;
                            report.record_failure(
                                file_name,
                                Some(row_number),
                                format!("insert failed: {err}"),
                            );
                        }
                    }
                }
            }
            Err(err) => {
                log_error!("Failed to store rows from {file_name}: {err:#}");
                tally.skipped += pending;
                report.files_skipped += 1;
                report.add_file(&tally);
                report.record_failure(file_name, None, format!("{err:#}"));
                return;
            }
        }
    }

    report.add_file(&tally);
    report.files_processed += 1;

    if tally.duplicate > 0 {
        log_info!(
            "{file_name}: {} rows were already stored for {recorded_at}",
            tally.duplicate
        );
    }
    log_info!(
        "Finished {file_name}: {}/{} rows inserted, {} skipped.",
        tally.inserted,
        tally.rows_read,
        tally.skipped
    );
}
