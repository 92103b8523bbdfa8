pub mod migrations;
pub mod repository;

use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;

pub fn open(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
