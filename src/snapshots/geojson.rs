use serde::Serialize;

use crate::db::{helpers::format_timestamp, models::SegmentSnapshot};
use crate::snapshots::query::ResolvedSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: SegmentProperties,
    pub geometry: LineString,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentProperties {
    pub segment_id: i64,
    pub street: String,
    pub direction: String,
    pub from_street: String,
    pub to_street: String,
    pub length: f64,
    pub street_heading: String,
    pub comments: String,
    pub current_speed: i64,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[longitude, latitude]` pairs.
    pub coordinates: [[f64; 2]; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotMetadata {
    pub current_timestamp: String,
    pub next_timestamp: String,
    pub previous_timestamp: String,
    pub oldest_timestamp: String,
    pub latest_timestamp: String,
}

fn encode_feature(row: &SegmentSnapshot, last_updated: &str) -> Feature {
    let reading = &row.reading;
    Feature {
        kind: "Feature",
        properties: SegmentProperties {
            segment_id: reading.segment_id,
            street: reading.street.clone(),
            direction: reading.direction.clone(),
            from_street: reading.from_street.clone(),
            to_street: reading.to_street.clone(),
            length: reading.length,
            street_heading: reading.street_heading.clone(),
            comments: reading.comments.clone(),
            current_speed: reading.current_speed,
            last_updated: last_updated.to_string(),
        },
        geometry: LineString {
            kind: "LineString",
            coordinates: [
                [reading.start_longitude, reading.start_latitude],
                [reading.end_longitude, reading.end_latitude],
            ],
        },
    }
}

/// Encode a resolved snapshot, preserving row order.
pub fn encode_feature_collection(snapshot: &ResolvedSnapshot) -> FeatureCollection {
    let current = format_timestamp(&snapshot.actual);
    FeatureCollection {
        kind: "FeatureCollection",
        features: snapshot
            .rows
            .iter()
            .map(|row| encode_feature(row, &current))
            .collect(),
        metadata: SnapshotMetadata {
            next_timestamp: format_timestamp(&snapshot.next),
            previous_timestamp: format_timestamp(&snapshot.previous),
            oldest_timestamp: format_timestamp(&snapshot.oldest),
            latest_timestamp: format_timestamp(&snapshot.latest),
            current_timestamp: current,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SegmentReading;
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn snapshot_row(segment_id: i64) -> SegmentSnapshot {
        SegmentReading {
            segment_id,
            street: "Halsted".into(),
            direction: "NB".into(),
            from_street: "Roosevelt".into(),
            to_street: "Harrison".into(),
            length: 0.49,
            street_heading: "S".into(),
            comments: "".into(),
            start_longitude: -87.6468,
            start_latitude: 41.8671,
            end_longitude: -87.6470,
            end_latitude: 41.8742,
            current_speed: -1,
        }
        .at(ts(1))
    }

    #[test]
    fn encodes_geojson_with_navigation_metadata() {
        let snapshot = ResolvedSnapshot {
            actual: ts(1),
            rows: vec![snapshot_row(1)],
            next: ts(0),
            previous: ts(0),
            oldest: ts(0),
            latest: ts(1),
        };

        let value = serde_json::to_value(encode_feature_collection(&snapshot)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {
                        "segment_id": 1,
                        "street": "Halsted",
                        "direction": "NB",
                        "from_street": "Roosevelt",
                        "to_street": "Harrison",
                        "length": 0.49,
                        "street_heading": "S",
                        "comments": "",
                        "current_speed": -1,
                        "last_updated": "2025-01-01T01:00:00"
                    },
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[-87.6468, 41.8671], [-87.6470, 41.8742]]
                    }
                }],
                "metadata": {
                    "current_timestamp": "2025-01-01T01:00:00",
                    "next_timestamp": "2025-01-01T00:00:00",
                    "previous_timestamp": "2025-01-01T00:00:00",
                    "oldest_timestamp": "2025-01-01T00:00:00",
                    "latest_timestamp": "2025-01-01T01:00:00"
                }
            })
        );
    }

    #[test]
    fn keeps_row_order_and_longitude_first() {
        let mut second = snapshot_row(7);
        second.reading.start_longitude = -87.1;
        second.reading.start_latitude = 41.1;
        let snapshot = ResolvedSnapshot {
            actual: ts(1),
            rows: vec![snapshot_row(3), second],
            next: ts(1),
            previous: ts(1),
            oldest: ts(1),
            latest: ts(1),
        };

        let collection = encode_feature_collection(&snapshot);
        let ids: Vec<i64> = collection
            .features
            .iter()
            .map(|f| f.properties.segment_id)
            .collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(collection.features[1].geometry.coordinates[0], [-87.1, 41.1]);
    }
}
