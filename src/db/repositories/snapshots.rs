use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{conversion_error, format_timestamp, parse_optional_timestamp, parse_timestamp},
    models::{SegmentReading, SegmentSnapshot, SnapshotSummary},
};

/// Result of inserting one reading of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A reading for this segment at this timestamp already exists.
    Duplicate,
    Failed(String),
}

fn row_to_snapshot(row: &Row) -> Result<SegmentSnapshot, rusqlite::Error> {
    let recorded_at: String = row.get("recorded_at")?;

    Ok(SegmentSnapshot {
        id: row.get("id")?,
        reading: SegmentReading {
            segment_id: row.get("segment_id")?,
            street: row.get("street")?,
            direction: row.get("direction")?,
            from_street: row.get("from_street")?,
            to_street: row.get("to_street")?,
            length: row.get("length")?,
            street_heading: row.get("street_heading")?,
            comments: row.get("comments")?,
            start_longitude: row.get("start_longitude")?,
            start_latitude: row.get("start_latitude")?,
            end_longitude: row.get("end_longitude")?,
            end_latitude: row.get("end_latitude")?,
            current_speed: row.get("current_speed")?,
        },
        recorded_at: parse_timestamp(&recorded_at, "recorded_at").map_err(conversion_error)?,
    })
}

fn single_timestamp(
    conn: &Connection,
    sql: &str,
    at: &NaiveDateTime,
    field: &str,
) -> Result<Option<NaiveDateTime>> {
    let value = conn.query_row(sql, params![format_timestamp(at)], |row| {
        row.get::<_, Option<String>>(0)
    })?;
    parse_optional_timestamp(value, field)
}

/// Oldest and latest `recorded_at` in the store, or `None` when it is empty.
pub fn snapshot_bounds(conn: &Connection) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
    let (oldest, latest): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT MIN(recorded_at), MAX(recorded_at) FROM segment_snapshots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("failed to read snapshot bounds")?;

    let oldest = parse_optional_timestamp(oldest, "oldest recorded_at")?;
    let latest = parse_optional_timestamp(latest, "latest recorded_at")?;
    Ok(oldest.zip(latest))
}

pub fn snapshot_at_or_before(
    conn: &Connection,
    at: &NaiveDateTime,
) -> Result<Option<NaiveDateTime>> {
    single_timestamp(
        conn,
        "SELECT MAX(recorded_at) FROM segment_snapshots WHERE recorded_at <= ?1",
        at,
        "recorded_at",
    )
}

pub fn snapshot_after(conn: &Connection, at: &NaiveDateTime) -> Result<Option<NaiveDateTime>> {
    single_timestamp(
        conn,
        "SELECT MIN(recorded_at) FROM segment_snapshots WHERE recorded_at > ?1",
        at,
        "recorded_at",
    )
}

pub fn snapshot_before(conn: &Connection, at: &NaiveDateTime) -> Result<Option<NaiveDateTime>> {
    single_timestamp(
        conn,
        "SELECT MAX(recorded_at) FROM segment_snapshots WHERE recorded_at < ?1",
        at,
        "recorded_at",
    )
}

/// All readings of one snapshot, ordered by segment id.
pub fn snapshot_rows(conn: &Connection, at: &NaiveDateTime) -> Result<Vec<SegmentSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT
            id,
            segment_id,
            street,
            direction,
            from_street,
            to_street,
            length,
            street_heading,
            comments,
            start_longitude,
            start_latitude,
            end_longitude,
            end_latitude,
            current_speed,
            recorded_at
        FROM segment_snapshots
        WHERE recorded_at = ?1
        ORDER BY segment_id ASC, id ASC",
    )?;

    let rows_iter = stmt.query_map(params![format_timestamp(at)], row_to_snapshot)?;

    let mut rows = Vec::new();
    for row_result in rows_iter {
        rows.push(row_result?);
    }

    Ok(rows)
}

impl Database {
    /// Delete every stored reading. Returns the number of rows removed.
    pub async fn clear_snapshots(&self) -> Result<u64> {
        self.execute(|conn| {
            let removed = conn
                .execute("DELETE FROM segment_snapshots", [])
                .context("failed to clear segment snapshots")?;
            Ok(removed as u64)
        })
        .await
    }

    /// Insert one file's readings under a shared timestamp.
    ///
    /// Each row is attempted independently; a failing row is reported in the
    /// returned outcomes and does not stop the batch.
    pub async fn insert_snapshot_batch(
        &self,
        recorded_at: NaiveDateTime,
        readings: Vec<SegmentReading>,
    ) -> Result<Vec<InsertOutcome>> {
        self.execute(move |conn| {
            let recorded_at = format_timestamp(&recorded_at);
            let tx = conn
                .transaction()
                .context("failed to open insert transaction")?;

            let mut outcomes = Vec::with_capacity(readings.len());
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO segment_snapshots (
                        segment_id,
                        street,
                        direction,
                        from_street,
                        to_street,
                        length,
                        street_heading,
                        comments,
                        start_longitude,
                        start_latitude,
                        end_longitude,
                        end_latitude,
                        current_speed,
                        recorded_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                    ON CONFLICT(segment_id, recorded_at) DO NOTHING",
                )?;

                for reading in &readings {
                    let result = stmt.execute(params![
                        reading.segment_id,
                        reading.street,
                        reading.direction,
                        reading.from_street,
                        reading.to_street,
                        reading.length,
                        reading.street_heading,
                        reading.comments,
                        reading.start_longitude,
                        reading.start_latitude,
                        reading.end_longitude,
                        reading.end_latitude,
                        reading.current_speed,
                        recorded_at,
                    ]);

                    outcomes.push(match result {
                        Ok(0) => InsertOutcome::Duplicate,
                        Ok(_) => InsertOutcome::Inserted,
                        Err(err) => InsertOutcome::Failed(err.to_string()),
                    });
                }
            }

            tx.commit().context("failed to commit snapshot batch")?;
            Ok(outcomes)
        })
        .await
    }

    /// Every stored snapshot with its row count, oldest first.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT recorded_at, COUNT(*)
                 FROM segment_snapshots
                 GROUP BY recorded_at
                 ORDER BY recorded_at ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut snapshots = Vec::new();
            while let Some(row) = rows.next()? {
                let recorded_at: String = row.get(0)?;
                let row_count: i64 = row.get(1)?;
                snapshots.push(SnapshotSummary {
                    recorded_at: parse_timestamp(&recorded_at, "recorded_at")?,
                    row_count: row_count.max(0) as u64,
                });
            }

            Ok(snapshots)
        })
        .await
    }

    pub async fn count_snapshot_rows(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM segment_snapshots", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
