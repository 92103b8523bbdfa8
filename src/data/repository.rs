use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> Result<usize, AppError> {
    let count = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
    Ok(count)
}

pub fn get_json<T>(conn: &Connection, key: &str) -> Result<Option<T>, AppError>
where
    T: serde::de::DeserializeOwned,
{
    match get_setting(conn, key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn set_json<T>(conn: &Connection, key: &str, value: &T) -> Result<(), AppError>
where
    T: serde::Serialize,
{
    set_setting(conn, key, &serde_json::to_string(value)?)
}
