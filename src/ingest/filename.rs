use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;

/// Prefix used by the City of Chicago congestion extracts.
pub const DEFAULT_FILE_PREFIX: &str = "Chicago_Traffic_Tracker_-_Congestion_Estimates_by_Segments";

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Clone, PartialEq)]
pub enum FilenameMatch {
    Matched(NaiveDateTime),
    /// Not an extract; ignored.
    NotMatching,
    /// Shaped like an extract but the encoded date is not a real one.
    InvalidTimestamp { raw: String, reason: String },
}

/// Recognizes `<prefix>_YYYY-MM-DD-HH-MM-SS.csv`.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    regex: Regex,
}

impl FilenamePattern {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = format!(
            r"^{}_([0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}}-[0-9]{{2}}-[0-9]{{2}}-[0-9]{{2}})\.csv$",
            regex::escape(prefix)
        );
        let regex = Regex::new(&pattern)
            .with_context(|| format!("invalid file prefix '{prefix}'"))?;
        Ok(Self { regex })
    }

    pub fn extract_timestamp(&self, file_name: &str) -> FilenameMatch {
        let Some(captures) = self.regex.captures(file_name) else {
            return FilenameMatch::NotMatching;
        };
        let raw = &captures[1];

        match NaiveDateTime::parse_from_str(raw, FILENAME_TIMESTAMP_FORMAT) {
            Ok(timestamp) => FilenameMatch::Matched(timestamp),
            Err(err) => FilenameMatch::InvalidTimestamp {
                raw: raw.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn pattern() -> FilenamePattern {
        FilenamePattern::new(DEFAULT_FILE_PREFIX).unwrap()
    }

    #[test]
    fn extracts_encoded_timestamp() {
        let name = format!("{DEFAULT_FILE_PREFIX}_2025-06-03-14-05-09.csv");
        let expected = NaiveDate::from_ymd_opt(2025, 6, 3)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(
            pattern().extract_timestamp(&name),
            FilenameMatch::Matched(expected)
        );
    }

    #[test]
    fn ignores_names_that_do_not_match() {
        let p = pattern();
        let names = [
            "notes.txt".to_string(),
            format!("{DEFAULT_FILE_PREFIX}.csv"),
            format!("{DEFAULT_FILE_PREFIX}_2025-06-03-14-05.csv"),
            format!("{DEFAULT_FILE_PREFIX}_2025-06-03-14-05-09.csv.bak"),
            format!("old_{DEFAULT_FILE_PREFIX}_2025-06-03-14-05-09.csv"),
            format!("{DEFAULT_FILE_PREFIX}_2025-6-03-14-05-09.csv"),
        ];
        for name in &names {
            assert_eq!(p.extract_timestamp(name), FilenameMatch::NotMatching, "{name}");
        }
    }

    #[test]
    fn reports_impossible_dates() {
        let name = format!("{DEFAULT_FILE_PREFIX}_2025-13-03-14-05-09.csv");
        match pattern().extract_timestamp(&name) {
            FilenameMatch::InvalidTimestamp { raw, .. } => {
                assert_eq!(raw, "2025-13-03-14-05-09")
            }
            other => panic!("unexpected {other:?}"),
        }

        let name = format!("{DEFAULT_FILE_PREFIX}_2025-02-30-00-00-00.csv");
        assert!(matches!(
            pattern().extract_timestamp(&name),
            FilenameMatch::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn prefix_is_matched_literally() {
        let p = FilenamePattern::new("speeds.v2").unwrap();
        assert!(matches!(
            p.extract_timestamp("speeds.v2_2024-01-01-00-00-00.csv"),
            FilenameMatch::Matched(_)
        ));
        assert_eq!(
            p.extract_timestamp("speedsXv2_2024-01-01-00-00-00.csv"),
            FilenameMatch::NotMatching
        );
    }
}
