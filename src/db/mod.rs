pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Database connection wrapper for the video cache
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let db = Self {
      conn: Connection::open(path)?,
    };
    db.run_migrations()?;

    Ok(db)
  }

  /// Open a private in-memory database
  pub fn open_in_memory() -> Result<Self, StorageError> {
    let db = Self {
      conn: Connection::open_in_memory()?,
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Get the default database path
  pub fn default_path() -> Option<PathBuf> {
    let data_dir = dirs::data_dir().or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))?;

    Some(data_dir.join("devbytes").join("videos.db"))
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<(), StorageError> {
    self.conn.execute_batch(schema::SCHEMA)?;
    Ok(())
  }

  /// Get a reference to the connection
  pub fn conn(&self) -> &Connection {
    &self.conn
  }

  /// Get a mutable reference to the connection, needed for transactions
  pub fn conn_mut(&mut self) -> &mut Connection {
    &mut self.conn
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_creates_parent_and_is_reopenable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("videos.db");

    drop(Database::open(&path).unwrap());
    let db = Database::open(&path).unwrap();

    let count: i64 = db
      .conn()
      .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
      .unwrap();
    assert_eq!(count, 0);
  }
}
