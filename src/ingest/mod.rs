//! Batch import of congestion extracts into the snapshot store.

pub mod filename;
pub mod normalize;
pub mod pipeline;
pub mod report;

pub use filename::{FilenameMatch, FilenamePattern, DEFAULT_FILE_PREFIX};
pub use pipeline::{ingest, IngestOptions};
pub use report::{IngestFailure, IngestionReport};
