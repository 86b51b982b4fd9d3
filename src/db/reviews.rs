//! Review state persistence, due queue and bucket queries

use chrono::{Duration, NaiveDate};
use rusqlite::{params, Connection, Result};

use crate::domain::{Bucket, BucketCounts, DueItem, Item, ReviewState};
use crate::srs;

use super::items::{row_to_item, ITEM_COLUMNS};
use super::{fmt_date, fmt_timestamp, parse_date, parse_timestamp};

const REVIEW_COLUMNS: &str =
    "r.item_id, r.due_date, r.interval_days, r.repetitions, r.ease, r.last_quality, r.last_reviewed_at";

pub fn insert_review_state(conn: &Connection, state: &ReviewState) -> Result<()> {
    conn.execute(
        r#"
    INSERT INTO review_states (item_id, due_date, interval_days, repetitions, ease, last_quality, last_reviewed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    "#,
        params![
            state.item_id,
            fmt_date(state.due_date),
            state.interval_days,
            state.repetitions,
            state.ease,
            state.last_quality,
            state.last_reviewed_at.map(fmt_timestamp),
        ],
    )?;
    Ok(())
}

pub fn get_review_state(conn: &Connection, item_id: i64) -> Result<Option<ReviewState>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM review_states r WHERE r.item_id = ?1",
        REVIEW_COLUMNS
    ))?;

    let mut rows = stmt.query(params![item_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_review_state(row, 0)?))
    } else {
        Ok(None)
    }
}

/// Overwrite the scheduling fields. Returns false if the item has no state.
pub fn save_review_state(conn: &Connection, state: &ReviewState) -> Result<bool> {
    let updated = conn.execute(
        r#"
    UPDATE review_states
    SET due_date = ?1, interval_days = ?2, repetitions = ?3, ease = ?4,
        last_quality = ?5, last_reviewed_at = ?6
    WHERE item_id = ?7
    "#,
        params![
            fmt_date(state.due_date),
            state.interval_days,
            state.repetitions,
            state.ease,
            state.last_quality,
            state.last_reviewed_at.map(fmt_timestamp),
            state.item_id,
        ],
    )?;
    Ok(updated > 0)
}

/// Items whose due date is on or before `as_of`, earliest first.
pub fn get_due_items(conn: &Connection, as_of: NaiveDate) -> Result<Vec<DueItem>> {
    let query = format!(
        r#"
    SELECT {}, {}
    FROM items i
    JOIN review_states r ON r.item_id = i.id
    WHERE date(r.due_date) <= date(?1)
    ORDER BY date(r.due_date) ASC, i.id ASC
    "#,
        ITEM_COLUMNS, REVIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;

    let due = stmt
        .query_map(params![fmt_date(as_of)], |row| row_to_due_item(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(due)
}

pub fn get_item_with_review(conn: &Connection, item_id: i64) -> Result<Option<DueItem>> {
    let query = format!(
        r#"
    SELECT {}, {}
    FROM items i
    JOIN review_states r ON r.item_id = i.id
    WHERE i.id = ?1
    "#,
        ITEM_COLUMNS, REVIEW_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;

    let mut rows = stmt.query(params![item_id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_due_item(row)?))
    } else {
        Ok(None)
    }
}

/// Count every item by difficulty bucket. Items without a state count as new.
pub fn bucket_counts(conn: &Connection) -> Result<BucketCounts> {
    let mut stmt = conn.prepare(
        r#"
    SELECT r.last_quality
    FROM items i
    LEFT JOIN review_states r ON r.item_id = i.id
    "#,
    )?;

    let mut counts = BucketCounts::default();
    let grades = stmt.query_map([], |row| row.get::<_, Option<i64>>(0))?;
    for grade in grades {
        counts.add(srs::bucket(grade?));
    }
    Ok(counts)
}

/// Items in one bucket, earliest due first.
pub fn items_in_bucket(conn: &Connection, bucket: Bucket) -> Result<Vec<Item>> {
    let query = format!(
        r#"
    SELECT {}, r.last_quality
    FROM items i
    LEFT JOIN review_states r ON r.item_id = i.id
    ORDER BY date(r.due_date) ASC, i.id ASC
    "#,
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;

    let rows = stmt.query_map([], |row| {
        let item = row_to_item(row)?;
        let grade: Option<i64> = row.get(9)?;
        Ok((item, grade))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (item, grade) = row?;
        if srs::bucket(grade) == bucket {
            items.push(item);
        }
    }
    Ok(items)
}

/// Cumulative due counts for `days` consecutive days starting at `from`.
///
/// Each entry counts the items that will be due on or before that day if
/// nothing is reviewed in the meantime, so overdue items appear on day one.
pub fn due_forecast(conn: &Connection, from: NaiveDate, days: u32) -> Result<Vec<(NaiveDate, i64)>> {
    let mut stmt = conn.prepare(
        r#"
    SELECT date(r.due_date) AS day, COUNT(*)
    FROM review_states r
    JOIN items i ON i.id = r.item_id
    GROUP BY day
    ORDER BY day ASC
    "#,
    )?;
    let per_day = stmt
        .query_map([], |row| {
            let raw: String = row.get(0)?;
            Ok((parse_date(0, &raw)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>>>()?;

    let mut forecast = Vec::with_capacity(days as usize);
    let mut pending = per_day.into_iter().peekable();
    let mut running = 0;
    for offset in 0..days as i64 {
        let day = from + Duration::days(offset);
        while let Some((_, count)) = pending.next_if(|(due, _)| *due <= day) {
            running += count;
        }
        forecast.push((day, running));
    }
    Ok(forecast)
}

/// Read review columns starting at `offset` (see `REVIEW_COLUMNS`)
fn row_to_review_state(row: &rusqlite::Row, offset: usize) -> Result<ReviewState> {
    let due_date: String = row.get(offset + 1)?;
    let last_reviewed_at: Option<String> = row.get(offset + 6)?;

    Ok(ReviewState {
        item_id: row.get(offset)?,
        due_date: parse_date(offset + 1, &due_date)?,
        interval_days: row.get(offset + 2)?,
        repetitions: row.get(offset + 3)?,
        ease: row.get(offset + 4)?,
        last_quality: row.get(offset + 5)?,
        last_reviewed_at: last_reviewed_at
            .map(|raw| parse_timestamp(offset + 6, &raw))
            .transpose()?,
    })
}

fn row_to_due_item(row: &rusqlite::Row) -> Result<DueItem> {
    Ok(DueItem {
        item: row_to_item(row)?,
        review: row_to_review_state(row, 9)?,
    })
}
