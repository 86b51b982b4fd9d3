//! Item CRUD and query operations

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Result};
use std::collections::BTreeSet;

use crate::domain::{split_tags, Item, ItemFields, ReviewState};

use super::reviews::insert_review_state;
use super::{fmt_date, fmt_timestamp, parse_timestamp};

pub(crate) const ITEM_COLUMNS: &str =
    "i.id, i.language, i.front, i.back, i.tags, i.example, i.notes, i.created_at, i.updated_at";

/// Insert an item row only. Callers normally want [`create_item`].
pub fn insert_item(conn: &Connection, fields: &ItemFields, now: DateTime<Utc>) -> Result<i64> {
    let ts = fmt_timestamp(now);
    conn.execute(
        r#"
    INSERT INTO items (language, front, back, tags, example, notes, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
    "#,
        params![
            fields.language,
            fields.front,
            fields.back,
            fields.tags,
            fields.example,
            fields.notes,
            ts,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert an item together with its default review state, atomically.
pub fn create_item(
    conn: &mut Connection,
    fields: &ItemFields,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<i64> {
    let tx = conn.transaction()?;
    let id = insert_item(&tx, fields, now)?;
    insert_review_state(&tx, &ReviewState::new(id, today))?;
    tx.commit()?;
    Ok(id)
}

/// Replace an item's content. Returns false if the item does not exist.
pub fn update_item(conn: &Connection, id: i64, fields: &ItemFields, now: DateTime<Utc>) -> Result<bool> {
    let updated = conn.execute(
        r#"
    UPDATE items
    SET language = ?1, front = ?2, back = ?3, tags = ?4, example = ?5, notes = ?6, updated_at = ?7
    WHERE id = ?8
    "#,
        params![
            fields.language,
            fields.front,
            fields.back,
            fields.tags,
            fields.example,
            fields.notes,
            fmt_timestamp(now),
            id,
        ],
    )?;
    Ok(updated > 0)
}

/// Delete an item and its review state. Returns false if nothing was deleted.
pub fn delete_item(conn: &mut Connection, id: i64) -> Result<bool> {
    let tx = conn.transaction()?;
    // Explicit so the cascade does not depend on PRAGMA foreign_keys
    tx.execute("DELETE FROM review_states WHERE item_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM items WHERE id = ?1", params![id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<Item>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS))?;

    let mut rows = stmt.query(params![id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_item(row)?))
    } else {
        Ok(None)
    }
}

pub fn count_items(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
}

/// Search items, most recently edited first.
///
/// `filter_text` is a case-insensitive substring match on front, back,
/// example and notes. `tag` must equal one of the item's tags, ignoring
/// whitespace. Empty values disable the respective filter.
pub fn list_items(conn: &Connection, filter_text: &str, tag: &str) -> Result<Vec<Item>> {
    let needle = filter_text.trim();
    let query = format!(
        r#"
    SELECT {}
    FROM items i
    WHERE ?1 = ''
       OR i.front LIKE ?2 ESCAPE '\'
       OR i.back LIKE ?2 ESCAPE '\'
       OR i.example LIKE ?2 ESCAPE '\'
       OR i.notes LIKE ?2 ESCAPE '\'
    ORDER BY i.updated_at DESC, i.id DESC
    "#,
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;

    let pattern = format!("%{}%", escape_like(needle));
    let items = stmt
        .query_map(params![needle, pattern], |row| row_to_item(row))?
        .collect::<Result<Vec<_>>>()?;

    if tag.trim().is_empty() {
        return Ok(items);
    }
    Ok(items.into_iter().filter(|item| item.has_tag(tag)).collect())
}

/// Every distinct tag in use, sorted.
pub fn all_tags(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT tags FROM items")?;
    let raw = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;

    let tags: BTreeSet<String> = raw.iter().flat_map(|t| split_tags(t)).collect();
    Ok(tags.into_iter().collect())
}

/// Items created on the given (UTC) date, newest first.
pub fn items_created_on(conn: &Connection, date: NaiveDate) -> Result<Vec<Item>> {
    let query = format!(
        r#"
    SELECT {}
    FROM items i
    WHERE substr(i.created_at, 1, 10) = ?1
    ORDER BY i.created_at DESC, i.id DESC
    "#,
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&query)?;

    let items = stmt
        .query_map(params![fmt_date(date)], |row| row_to_item(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(items)
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Convert the first nine columns of a row (see `ITEM_COLUMNS`) to an Item
pub(crate) fn row_to_item(row: &rusqlite::Row) -> Result<Item> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Item {
        id: row.get(0)?,
        language: row.get(1)?,
        front: row.get(2)?,
        back: row.get(3)?,
        tags: row.get(4)?,
        example: row.get(5)?,
        notes: row.get(6)?,
        created_at: parse_timestamp(7, &created_at)?,
        updated_at: parse_timestamp(8, &updated_at)?,
    })
}
