//! Segment snapshot data models.
//!
//! A snapshot is every row sharing one `recorded_at`, i.e. the contents of
//! one ingested extract.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Sentinel for `current_speed` when the feed did not report a speed.
pub const SPEED_NOT_REPORTED: i64 = -1;

/// One normalized reading before it is bound to a snapshot timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReading {
    pub segment_id: i64,
    pub street: String,
    pub direction: String,
    pub from_street: String,
    pub to_street: String,
    pub length: f64,
    pub street_heading: String,
    pub comments: String,
    pub start_longitude: f64,
    pub start_latitude: f64,
    pub end_longitude: f64,
    pub end_latitude: f64,
    pub current_speed: i64,
}

impl SegmentReading {
    pub fn at(self, recorded_at: NaiveDateTime) -> SegmentSnapshot {
        SegmentSnapshot {
            id: None,
            reading: self,
            recorded_at,
        }
    }
}

/// A persisted reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub reading: SegmentReading,
    pub recorded_at: NaiveDateTime,
}

/// Row count of one stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub recorded_at: NaiveDateTime,
    pub row_count: u64,
}
