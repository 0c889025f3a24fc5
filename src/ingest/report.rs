use std::fmt;

use serde::Serialize;

/// Failure reasons kept for operator review. Counters stay exact beyond this.
pub const MAX_RETAINED_FAILURES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    pub file: String,
    /// 1-based data row; `None` for file-level failures.
    pub row: Option<u64>,
    pub reason: String,
}

impl fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} row {}: {}", self.file, row, self.reason),
            None => write!(f, "{}: {}", self.file, self.reason),
        }
    }
}

/// Row counts for a single extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTally {
    pub rows_read: u64,
    pub inserted: u64,
    pub skipped: u64,
    pub duplicate: u64,
}

/// Outcome of one ingestion run.
///
/// `rows_attempted == rows_inserted + rows_skipped + rows_duplicate` holds
/// for every report the pipeline produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionReport {
    /// Rows removed by the clear step, when one was requested.
    pub cleared_rows: Option<u64>,
    pub files_matched: u64,
    pub files_processed: u64,
    pub files_skipped: u64,
    pub non_matching: Vec<String>,
    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub rows_duplicate: u64,
    pub failures: Vec<IngestFailure>,
    pub failures_omitted: u64,
}

impl IngestionReport {
    pub fn record_failure(&mut self, file: &str, row: Option<u64>, reason: impl Into<String>) {
        if self.failures.len() < MAX_RETAINED_FAILURES {
            self.failures.push(IngestFailure {
                file: file.to_string(),
                row,
                reason: reason.into(),
            });
        } else {
            self.failures_omitted += 1;
        }
    }

    pub fn add_file(&mut self, tally: &FileTally) {
        self.rows_attempted += tally.rows_read;
        self.rows_inserted += tally.inserted;
        self.rows_skipped += tally.skipped;
        self.rows_duplicate += tally.duplicate;
    }

    pub fn needs_review(&self) -> bool {
        self.files_skipped > 0 || self.rows_skipped > 0
    }
}

impl fmt::Display for IngestionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Import Summary ---")?;
        if let Some(cleared) = self.cleared_rows {
            writeln!(f, "Existing rows cleared: {cleared}")?;
        }
        writeln!(f, "Total files found matching pattern: {}", self.files_matched)?;
        writeln!(f, "Files successfully processed: {}", self.files_processed)?;
        writeln!(f, "Files skipped: {}", self.files_skipped)?;
        writeln!(f, "Non-matching entries ignored: {}", self.non_matching.len())?;
        writeln!(f, "Total rows attempted: {}", self.rows_attempted)?;
        writeln!(f, "Total rows inserted: {}", self.rows_inserted)?;
        writeln!(
            f,
            "Total rows skipped (due to errors or missing data): {}",
            self.rows_skipped
        )?;
        writeln!(f, "Rows already stored: {}", self.rows_duplicate)?;
        write!(f, "----------------------")?;
        if self.needs_review() {
            write!(
                f,
                "\nPlease review the logs above for skipped files or rows with errors."
            )?;
        }
        Ok(())
    }
}
