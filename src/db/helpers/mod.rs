use anyhow::{Context, Result};
use chrono::NaiveDateTime;

/// Storage form of `recorded_at`. Fixed width, so lexical order is
/// chronological order for four-digit years.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str, field: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .with_context(|| format!("failed to parse {field} '{value}'"))
}

pub fn parse_optional_timestamp(
    value: Option<String>,
    field: &str,
) -> Result<Option<NaiveDateTime>> {
    match value {
        Some(raw) => parse_timestamp(&raw, field).map(Some),
        None => Ok(None),
    }
}

/// Wraps a conversion failure so it can be returned from a rusqlite row mapper.
pub fn conversion_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn storage_format_sorts_chronologically() {
        let earlier = NaiveDate::from_ymd_opt(2025, 1, 9)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();

        assert_eq!(format_timestamp(&earlier), "2025-01-09T23:00:00");
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(
            parse_timestamp(&format_timestamp(&later), "recorded_at").unwrap(),
            later
        );
    }

    #[test]
    fn optional_values() {
        assert_eq!(parse_optional_timestamp(None, "x").unwrap(), None);
        assert!(parse_optional_timestamp(Some("garbage".into()), "x").is_err());
    }
}
