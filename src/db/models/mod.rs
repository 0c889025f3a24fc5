pub mod segment_snapshot;

pub use segment_snapshot::{
    SegmentReading, SegmentSnapshot, SnapshotSummary, SPEED_NOT_REPORTED,
};
