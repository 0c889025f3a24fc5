//! "State of the network as of T" resolution.
//!
//! A requested time resolves to the newest stored snapshot at or before it,
//! falling back to the oldest snapshot when the request is missing, malformed
//! or older than every snapshot. `next` after the latest snapshot wraps to the
//! oldest, and `previous` before the oldest wraps to the latest, so a client
//! can cycle through history by feeding back the returned timestamps.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use rusqlite::Connection;
use thiserror::Error;

use crate::db::{
    models::SegmentSnapshot,
    repositories::snapshots::{
        snapshot_after, snapshot_at_or_before, snapshot_before, snapshot_bounds, snapshot_rows,
    },
    Database,
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("No traffic data available")]
    NoData,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSnapshot {
    pub actual: NaiveDateTime,
    pub rows: Vec<SegmentSnapshot>,
    pub next: NaiveDateTime,
    pub previous: NaiveDateTime,
    pub oldest: NaiveDateTime,
    pub latest: NaiveDateTime,
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Lenient ISO-8601 parsing of a requested time. Offsets are converted to
/// UTC; a bare date means midnight.
pub fn parse_requested(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Resolve a request against the store.
///
/// An absent or unparsable `requested` is not an error; it selects the oldest
/// snapshot.
pub async fn resolve_snapshot(
    db: &Database,
    requested: Option<&str>,
) -> Result<ResolvedSnapshot, QueryError> {
    let target = requested.and_then(|raw| {
        let parsed = parse_requested(raw);
        if parsed.is_none() {
            debug!("Unparsable datetime '{raw}', using oldest snapshot");
        }
        parsed
    });

    let resolved = db
        .read(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open snapshot read transaction")?;
            let resolved = resolve_on(&tx, target)?;
            tx.commit().context("failed to close snapshot read transaction")?;
            Ok(resolved)
        })
        .await?;

    resolved.ok_or(QueryError::NoData)
}

fn resolve_on(
    conn: &Connection,
    target: Option<NaiveDateTime>,
) -> anyhow::Result<Option<ResolvedSnapshot>> {
    let Some((oldest, latest)) = snapshot_bounds(conn)? else {
        return Ok(None);
    };

    // Stored timestamps are whole seconds.
    let target = target
        .map(|t| t.with_nanosecond(0).unwrap_or(t))
        .unwrap_or(oldest);

    let actual = if target <= oldest {
        oldest
    } else if target >= latest {
        latest
    } else {
        snapshot_at_or_before(conn, &target)?.unwrap_or(oldest)
    };

    let next = snapshot_after(conn, &actual)?.unwrap_or(oldest);
    let previous = snapshot_before(conn, &actual)?.unwrap_or(latest);
    let rows = snapshot_rows(conn, &actual)?;

    Ok(Some(ResolvedSnapshot {
        actual,
        rows,
        next,
        previous,
        oldest,
        latest,
    }))
}
