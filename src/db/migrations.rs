use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys=ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version = Self::get_version(conn).unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            log::debug!("applying schema migration v{}", version);
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: agents, lists, campaigns, leads
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE agents (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            email TEXT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    // fields_json: ordered array of {name, kind, show}
    // settings_json: ListSettings object
    tx.execute(
        "CREATE TABLE lists (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NULL,
            fields_json TEXT NOT NULL DEFAULT '[]',
            settings_json TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','archived','blocklist')),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE campaigns (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','paused','completed')),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE leads (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            data_json TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL CHECK(status IN ('new','contacted','qualified','callback','won','lost','archived')),
            list_id INTEGER NULL REFERENCES lists(id) ON DELETE CASCADE,
            campaign_id INTEGER NULL REFERENCES campaigns(id) ON DELETE SET NULL,
            assigned_to INTEGER NULL REFERENCES agents(id) ON DELETE SET NULL,
            claimed_by INTEGER NULL REFERENCES agents(id) ON DELETE SET NULL,
            claimed_at INTEGER NULL,
            call_attempts INTEGER NOT NULL DEFAULT 0,
            last_contacted_at INTEGER NULL,
            callback_scheduled_at INTEGER NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute("CREATE INDEX idx_leads_list_id ON leads(list_id)", [])?;
    tx.execute("CREATE INDEX idx_leads_campaign_id ON leads(campaign_id)", [])?;
    tx.execute("CREATE INDEX idx_leads_claimed_by ON leads(claimed_by)", [])?;
    tx.execute("CREATE INDEX idx_leads_status ON leads(status)", [])?;
    tx.execute("CREATE INDEX idx_leads_created_ts ON leads(created_ts)", [])?;
    tx.execute(
        "CREATE INDEX idx_leads_callback ON leads(callback_scheduled_at)",
        [],
    )?;

    Ok(())
}

/// Migration v2: call and SMS logs
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE call_logs (
            id INTEGER PRIMARY KEY,
            lead_id INTEGER NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            agent_id INTEGER NOT NULL REFERENCES agents(id),
            outcome TEXT NOT NULL CHECK(outcome IN ('answered','no_answer','busy','voicemail','callback','won','lost')),
            notes TEXT NULL,
            duration_secs INTEGER NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_call_logs_lead ON call_logs(lead_id, created_ts)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE sms_logs (
            id INTEGER PRIMARY KEY,
            lead_id INTEGER NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            agent_id INTEGER NOT NULL REFERENCES agents(id),
            message TEXT NOT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_sms_logs_lead ON sms_logs(lead_id, created_ts)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        assert_eq!(MigrationManager::get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, CURRENT_VERSION as i64);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO leads (uuid, status, created_ts, modified_ts) VALUES ('u1', 'pending', 0, 0)",
            [],
        );
        assert!(result.is_err(), "unknown lead status must be rejected");
    }

    #[test]
    fn test_deleting_list_cascades_to_leads() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO lists (name, created_ts, modified_ts) VALUES ('l', 0, 0)",
            [],
        ).unwrap();
        let list_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO leads (uuid, status, list_id, created_ts, modified_ts) VALUES ('u1', 'new', ?1, 0, 0)",
            [list_id],
        ).unwrap();

        conn.execute("DELETE FROM lists WHERE id = ?1", [list_id]).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
