use rusqlite::Connection;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::config::Config;
use crate::db::migrations::MigrationManager;

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Get database path from configuration file or default
    pub fn resolve_path() -> Result<PathBuf> {
        Config::load()?.database_path()
    }

    /// Connect to the configured database, creating it and parent directories if needed
    pub fn connect() -> Result<Connection> {
        let db_path = Self::resolve_path()?;
        Self::connect_at(&db_path)
    }

    /// Connect to a database at an explicit path
    pub fn connect_at(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        log::debug!("opened database {}", db_path.display());

        MigrationManager::initialize(&conn)
            .context("Failed to initialize database schema")?;

        Ok(conn)
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;

        MigrationManager::initialize(&conn)
            .context("Failed to initialize database schema")?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connect_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let conn = DbConnection::connect_at(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(MigrationManager::get_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_connect_in_memory() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(enabled, 1);
    }
}
