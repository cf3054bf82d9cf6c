use rusqlite::{Connection, OptionalExtension, Row};
use crate::error::CrmError;
use crate::models::Agent;
use anyhow::{Context, Result};

/// Agent repository for database operations
pub struct AgentRepo;

const AGENT_COLUMNS: &str = "id, name, email, created_ts";

fn agent_from_row(row: &Row) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        created_ts: row.get(3)?,
    })
}

impl AgentRepo {
    /// Create a new agent
    pub fn create(conn: &Connection, name: &str, email: Option<&str>) -> Result<Agent> {
        if Self::get_by_name(conn, name)?.is_some() {
            return Err(CrmError::DuplicateName { kind: "Agent", name: name.to_string() }.into());
        }
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO agents (name, email, created_ts) VALUES (?1, ?2, ?3)",
            rusqlite::params![name, email, now],
        )
        .with_context(|| format!("Failed to create agent: {}", name))?;

        let id = conn.last_insert_rowid();
        log::info!("created agent {} ({})", name, id);
        Ok(Agent {
            id: Some(id),
            name: name.to_string(),
            email: email.map(str::to_string),
            created_ts: now,
        })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS);
        Ok(conn.query_row(&sql, [id], agent_from_row).optional()?)
    }

    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE name = ?1", AGENT_COLUMNS);
        Ok(conn.query_row(&sql, [name], agent_from_row).optional()?)
    }

    /// Agent by name, or `CrmError::AgentNotFound`
    pub fn require_by_name(conn: &Connection, name: &str) -> Result<Agent> {
        Self::get_by_name(conn, name)?
            .ok_or_else(|| CrmError::AgentNotFound(name.to_string()).into())
    }

    pub fn list(conn: &Connection) -> Result<Vec<Agent>> {
        let sql = format!("SELECT {} FROM agents ORDER BY name", AGENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], agent_from_row)?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }
}
