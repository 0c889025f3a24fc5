//! Maps raw extract rows onto the fixed segment schema.
//!
//! Headers are matched once per file: each header is trimmed and uppercased
//! and looked up in [`Column`]. Unknown headers are ignored, and when a
//! canonical name occurs more than once the first occurrence wins.

use std::fmt;

use csv::StringRecord;
use thiserror::Error;

use crate::db::models::{SegmentReading, SPEED_NOT_REPORTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    SegmentId,
    Street,
    Direction,
    FromStreet,
    ToStreet,
    Length,
    StreetHeading,
    Comments,
    StartLongitude,
    StartLatitude,
    EndLongitude,
    EndLatitude,
    CurrentSpeed,
    /// Accepted but never read; the snapshot time comes from the file name.
    LastUpdated,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::SegmentId,
        Column::Street,
        Column::Direction,
        Column::FromStreet,
        Column::ToStreet,
        Column::Length,
        Column::StreetHeading,
        Column::Comments,
        Column::StartLongitude,
        Column::StartLatitude,
        Column::EndLongitude,
        Column::EndLatitude,
        Column::CurrentSpeed,
        Column::LastUpdated,
    ];

    pub const REQUIRED: [Column; 6] = [
        Column::SegmentId,
        Column::Street,
        Column::StartLongitude,
        Column::StartLatitude,
        Column::EndLongitude,
        Column::EndLatitude,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Column::SegmentId => "SEGMENTID",
            Column::Street => "STREET",
            Column::Direction => "DIRECTION",
            Column::FromStreet => "FROM_STREET",
            Column::ToStreet => "TO_STREET",
            Column::Length => "LENGTH",
            Column::StreetHeading => "STREET_HEADING",
            Column::Comments => "COMMENTS",
            Column::StartLongitude => "START_LONGITUDE",
            Column::StartLatitude => "START_LATITUDE",
            Column::EndLongitude => "END_LONGITUDE",
            Column::EndLatitude => "END_LATITUDE",
            Column::CurrentSpeed => "CURRENT_SPEED",
            Column::LastUpdated => "LAST_UPDATED",
        }
    }

    /// Case- and whitespace-insensitive header lookup.
    pub fn from_header(raw: &str) -> Option<Column> {
        let canonical = raw.trim_start_matches('\u{feff}').trim().to_uppercase();
        Column::ALL
            .into_iter()
            .find(|column| column.header() == canonical)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("missing required field {0}")]
    MissingField(Column),
    #[error("invalid number '{value}' in {column}")]
    InvalidNumber { column: Column, value: String },
}

/// Positions of the known columns in one file's header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    positions: [Option<usize>; 14],
    unknown: Vec<String>,
}

impl ColumnMap {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut map = ColumnMap::default();
        for (position, header) in headers.iter().enumerate() {
            match Column::from_header(header) {
                Some(column) => {
                    let slot = &mut map.positions[column.index()];
                    if slot.is_none() {
                        *slot = Some(position);
                    }
                }
                None => map.unknown.push(header.trim().to_string()),
            }
        }
        map
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.index()]
    }

    /// Headers that did not match any known column.
    pub fn unknown_headers(&self) -> &[String] {
        &self.unknown
    }

    /// Required columns absent from the header row. Every row of such a file
    /// fails validation.
    pub fn missing_required(&self) -> Vec<Column> {
        Column::REQUIRED
            .into_iter()
            .filter(|column| self.position(*column).is_none())
            .collect()
    }
}

struct RowView<'a> {
    record: &'a StringRecord,
    columns: &'a ColumnMap,
}

impl<'a> RowView<'a> {
    /// Trimmed value, `None` when the column or cell is absent or blank.
    fn value(&self, column: Column) -> Option<&'a str> {
        let position = self.columns.position(column)?;
        let value = self.record.get(position)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn text(&self, column: Column) -> String {
        self.value(column).unwrap_or_default().to_string()
    }

    fn float(&self, column: Column) -> Result<Option<f64>, SkipReason> {
        self.value(column)
            .map(|value| parse_float(column, value))
            .transpose()
    }

    fn required_float(&self, column: Column) -> Result<f64, SkipReason> {
        self.float(column)?.ok_or(SkipReason::MissingField(column))
    }
}

fn parse_float(column: Column, value: &str) -> Result<f64, SkipReason> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(SkipReason::InvalidNumber {
            column,
            value: value.to_string(),
        }),
    }
}

/// `None` when the truncated value does not fit in an `i64`.
fn speed_to_int(truncated: f64) -> Option<i64> {
    (i64::MIN as f64..i64::MAX as f64)
        .contains(&truncated)
        .then_some(truncated as i64)
}

pub fn normalize_row(
    record: &StringRecord,
    columns: &ColumnMap,
) -> Result<SegmentReading, SkipReason> {
    let row = RowView { record, columns };

    if let Some(missing) = Column::REQUIRED
        .into_iter()
        .find(|column| row.value(*column).is_none())
    {
        return Err(SkipReason::MissingField(missing));
    }

    let segment_id = match row.value(Column::SegmentId) {
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| SkipReason::InvalidNumber {
                column: Column::SegmentId,
                value: value.to_string(),
            })?,
        None => -1,
    };

    let current_speed = match row.float(Column::CurrentSpeed)? {
        Some(speed) => {
            speed_to_int(speed.trunc()).ok_or_else(|| SkipReason::InvalidNumber {
                column: Column::CurrentSpeed,
                value: row.text(Column::CurrentSpeed),
            })?
        }
        None => SPEED_NOT_REPORTED,
    };

    Ok(SegmentReading {
        segment_id,
        street: row.text(Column::Street),
        direction: row.text(Column::Direction),
        from_street: row.text(Column::FromStreet),
        to_street: row.text(Column::ToStreet),
        length: row.float(Column::Length)?.unwrap_or(0.0),
        street_heading: row.text(Column::StreetHeading),
        comments: row.text(Column::Comments),
        start_longitude: row.required_float(Column::StartLongitude)?,
        start_latitude: row.required_float(Column::StartLatitude)?,
        end_longitude: row.required_float(Column::EndLongitude)?,
        end_latitude: row.required_float(Column::EndLatitude)?,
        current_speed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[&str] = &[
        "SEGMENTID",
        "STREET",
        "DIRECTION",
        "FROM_STREET",
        "TO_STREET",
        "LENGTH",
        "STREET_HEADING",
        "COMMENTS",
        "START_LONGITUDE",
        "START_LATITUDE",
        "END_LONGITUDE",
        "END_LATITUDE",
        "CURRENT_SPEED",
        "LAST_UPDATED",
    ];

    fn full_row() -> Vec<&'static str> {
        vec![
            " 1309 ",
            "Western",
            "NB",
            "79th",
            "75th",
            "0.5",
            "S",
            "",
            "-87.683",
            "41.750",
            "-87.683",
            "41.757",
            "23.9",
            "2025-01-01 00:00:00",
        ]
    }

    fn normalize(header: &[&str], row: &[&str]) -> Result<SegmentReading, SkipReason> {
        let columns = ColumnMap::from_headers(&StringRecord::from(header.to_vec()));
        normalize_row(&StringRecord::from(row.to_vec()), &columns)
    }

    #[test]
    fn normalizes_complete_row() {
        let reading = normalize(HEADER, &full_row()).unwrap();
        assert_eq!(reading.segment_id, 1309);
        assert_eq!(reading.street, "Western");
        assert_eq!(reading.length, 0.5);
        assert_eq!(reading.comments, "");
        assert_eq!(reading.start_longitude, -87.683);
        assert_eq!(reading.end_latitude, 41.757);
        assert_eq!(reading.current_speed, 23);
    }

    #[test]
    fn headers_are_matched_case_and_whitespace_insensitively() {
        let messy: Vec<String> = HEADER
            .iter()
            .map(|h| format!("  {} ", h.to_lowercase()))
            .collect();
        let messy: Vec<&str> = messy.iter().map(String::as_str).collect();
        let reading = normalize(&messy, &full_row()).unwrap();
        assert_eq!(reading.segment_id, 1309);
        assert_eq!(reading.to_street, "75th");
    }

    #[test]
    fn column_map_records_unknown_and_missing_columns() {
        let columns = ColumnMap::from_headers(&StringRecord::from(vec![
            "segmentid",
            "Street",
            "extra",
            "STREET",
        ]));
        assert_eq!(columns.position(Column::Street), Some(1));
        assert_eq!(columns.unknown_headers(), ["extra".to_string()]);
        assert_eq!(
            columns.missing_required(),
            vec![
                Column::StartLongitude,
                Column::StartLatitude,
                Column::EndLongitude,
                Column::EndLatitude
            ]
        );
    }

    #[test]
    fn each_required_field_is_enforced() {
        for column in Column::REQUIRED {
            let mut row = full_row();
            row[column as usize] = "   ";
            assert_eq!(
                normalize(HEADER, &row),
                Err(SkipReason::MissingField(column)),
                "{column}"
            );
        }
    }

    #[test]
    fn short_rows_are_missing_fields() {
        let full = full_row();
        assert_eq!(
            normalize(HEADER, &full[..9]),
            Err(SkipReason::MissingField(Column::StartLatitude))
        );
    }

    #[test]
    fn optional_numbers_take_defaults() {
        let mut row = full_row();
        row[Column::Length as usize] = "";
        row[Column::CurrentSpeed as usize] = "";
        let reading = normalize(HEADER, &row).unwrap();
        assert_eq!(reading.length, 0.0);
        assert_eq!(reading.current_speed, SPEED_NOT_REPORTED);

        let without_optional: Vec<&str> = HEADER
            .iter()
            .copied()
            .filter(|h| *h != "LENGTH" && *h != "CURRENT_SPEED")
            .collect();
        let row: Vec<&str> = full_row()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| {
                *i != Column::Length as usize && *i != Column::CurrentSpeed as usize
            })
            .map(|(_, v)| v)
            .collect();
        let reading = normalize(&without_optional, &row).unwrap();
        assert_eq!(reading.current_speed, -1);
    }

    #[test]
    fn speed_is_truncated_toward_zero() {
        let mut row = full_row();
        row[Column::CurrentSpeed as usize] = "-1";
        assert_eq!(normalize(HEADER, &row).unwrap().current_speed, -1);
        row[Column::CurrentSpeed as usize] = "31.99";
        assert_eq!(normalize(HEADER, &row).unwrap().current_speed, 31);
    }

    #[test]
    fn out_of_range_speed_is_rejected() {
        for raw in ["1e30", "-1e30", "9223372036854775808"] {
            let mut row = full_row();
            row[Column::CurrentSpeed as usize] = raw;
            assert_eq!(
                normalize(HEADER, &row),
                Err(SkipReason::InvalidNumber {
                    column: Column::CurrentSpeed,
                    value: raw.into()
                }),
                "{raw}"
            );
        }
    }

    #[test]
    fn non_numeric_values_are_coercion_failures() {
        let mut row = full_row();
        row[Column::StartLatitude as usize] = "north";
        assert_eq!(
            normalize(HEADER, &row),
            Err(SkipReason::InvalidNumber {
                column: Column::StartLatitude,
                value: "north".into()
            })
        );

        let mut row = full_row();
        row[Column::SegmentId as usize] = "12.5";
        assert!(matches!(
            normalize(HEADER, &row),
            Err(SkipReason::InvalidNumber {
                column: Column::SegmentId,
                ..
            })
        ));

        let mut row = full_row();
        row[Column::Length as usize] = "NaN";
        assert!(normalize(HEADER, &row).is_err());
    }

    #[test]
    fn skip_reasons_read_well() {
        assert_eq!(
            SkipReason::MissingField(Column::Street).to_string(),
            "missing required field STREET"
        );
        assert_eq!(
            SkipReason::InvalidNumber {
                column: Column::Length,
                value: "x".into()
            }
            .to_string(),
            "invalid number 'x' in LENGTH"
        );
    }
}
