pub mod schema;
pub mod settings;

use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the tabmux database and bring its schema up to date.
pub fn open(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    schema::initialize(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema, for tests and `--db :memory:`.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    schema::initialize(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabmux.db");

        let conn = open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(schema::version(&conn).unwrap(), schema::CURRENT_VERSION);

        settings::set(&conn, "shell", "/bin/zsh").unwrap();
        drop(conn);

        let reopened = open(&path).unwrap();
        assert_eq!(
            settings::get(&reopened, "shell").unwrap().as_deref(),
            Some("/bin/zsh")
        );
    }
}
