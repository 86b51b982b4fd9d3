//! Gamification progress (single row)

use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::progress::Progress;

use super::{fmt_date, parse_date};

/// Load progress, or the starting values when nothing was saved yet.
pub fn get_progress(conn: &Connection) -> Result<Progress> {
    let row = conn
        .query_row(
            "SELECT xp, streak, last_xp_date FROM user_state WHERE id = 1",
            [],
            |row| {
                let last: Option<String> = row.get(2)?;
                Ok(Progress {
                    xp: row.get(0)?,
                    streak: row.get(1)?,
                    last_xp_date: last.map(|raw| parse_date(2, &raw)).transpose()?,
                })
            },
        )
        .optional()?;
    Ok(row.unwrap_or_default())
}

pub fn save_progress(conn: &Connection, progress: &Progress) -> Result<()> {
    conn.execute(
        r#"
    INSERT INTO user_state (id, xp, streak, last_xp_date)
    VALUES (1, ?1, ?2, ?3)
    ON CONFLICT(id) DO UPDATE SET
      xp = excluded.xp,
      streak = excluded.streak,
      last_xp_date = excluded.last_xp_date
    "#,
        params![
            progress.xp,
            progress.streak,
            progress.last_xp_date.map(fmt_date),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_in_memory, try_lock};
    use chrono::NaiveDate;

    #[test]
    fn test_progress_defaults_when_unsaved() {
        let pool = open_in_memory().unwrap();
        let conn = try_lock(&pool).unwrap();
        assert_eq!(get_progress(&conn).unwrap(), Progress::default());
    }

    #[test]
    fn test_progress_upsert() {
        let pool = open_in_memory().unwrap();
        let conn = try_lock(&pool).unwrap();
        let mut progress = Progress {
            xp: 12,
            streak: 3,
            last_xp_date: NaiveDate::from_ymd_opt(2024, 4, 2),
        };
        save_progress(&conn, &progress).unwrap();
        progress.xp = 13;
        save_progress(&conn, &progress).unwrap();

        assert_eq!(get_progress(&conn).unwrap(), progress);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_state", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
