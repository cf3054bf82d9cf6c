use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use crate::error::CrmError;
use crate::models::{Lead, LeadStatus};
use anyhow::{Context, Result};

/// Lead repository for database operations
pub struct LeadRepo;

pub(crate) const LEAD_COLUMNS: &str = "id, uuid, data_json, status, list_id, campaign_id, assigned_to, \
     claimed_by, claimed_at, call_attempts, last_contacted_at, callback_scheduled_at, created_ts, modified_ts";

pub(crate) fn lead_from_row(row: &Row) -> rusqlite::Result<Lead> {
    let data_json: String = row.get(2)?;
    let data: Map<String, Value> = serde_json::from_str(&data_json).unwrap_or_else(|e| {
        log::warn!("lead {}: unreadable attributes: {}", row.get::<_, i64>(0).unwrap_or(0), e);
        Map::new()
    });
    let status_str: String = row.get(3)?;

    Ok(Lead {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        data,
        status: LeadStatus::from_str(&status_str).unwrap_or(LeadStatus::New),
        list_id: row.get(4)?,
        campaign_id: row.get(5)?,
        assigned_to: row.get(6)?,
        claimed_by: row.get(7)?,
        claimed_at: row.get(8)?,
        call_attempts: row.get(9)?,
        last_contacted_at: row.get(10)?,
        callback_scheduled_at: row.get(11)?,
        created_ts: row.get(12)?,
        modified_ts: row.get(13)?,
    })
}

/// Run a lead query and collect the rows
pub(crate) fn query_leads(conn: &Connection, sql: &str, params: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<Lead>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, lead_from_row)?;

    let mut leads = Vec::new();
    for row in rows {
        leads.push(row?);
    }
    Ok(leads)
}

/// Criteria for [`LeadRepo::list`]. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub list_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub status: Option<LeadStatus>,
    pub claimed_by: Option<i64>,
    pub assigned_to: Option<i64>,
    pub limit: Option<usize>,
}

/// Result of a CSV import
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

impl LeadRepo {
    /// Insert a lead built in memory. Returns it with its new id.
    pub fn insert(conn: &Connection, lead: &Lead) -> Result<Lead> {
        conn.execute(
            "INSERT INTO leads (uuid, data_json, status, list_id, campaign_id, assigned_to, claimed_by,
                 claimed_at, call_attempts, last_contacted_at, callback_scheduled_at, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                lead.uuid,
                serde_json::to_string(&lead.data)?,
                lead.status.as_str(),
                lead.list_id,
                lead.campaign_id,
                lead.assigned_to,
                lead.claimed_by,
                lead.claimed_at,
                lead.call_attempts,
                lead.last_contacted_at,
                lead.callback_scheduled_at,
                lead.created_ts,
                lead.modified_ts
            ],
        )
        .context("Failed to insert lead")?;

        let id = conn.last_insert_rowid();
        log::debug!("inserted lead {} ({})", id, lead.uuid);
        Ok(Lead { id: Some(id), ..lead.clone() })
    }

    /// Create a lead from an attribute map
    pub fn create(conn: &Connection, data: Map<String, Value>, list_id: Option<i64>, campaign_id: Option<i64>) -> Result<Lead> {
        let mut lead = Lead::new(data);
        lead.list_id = list_id;
        lead.campaign_id = campaign_id;
        Self::insert(conn, &lead)
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Lead>> {
        let sql = format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLUMNS);
        Ok(conn.query_row(&sql, [id], lead_from_row).optional()?)
    }

    /// Lead by id, or `CrmError::LeadNotFound`
    pub fn require(conn: &Connection, id: i64) -> Result<Lead> {
        Self::get_by_id(conn, id)?.ok_or_else(|| CrmError::LeadNotFound(id).into())
    }

    /// Leads matching `filter`, oldest first (ties by id)
    pub fn list(conn: &Connection, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(list_id) = filter.list_id {
            conditions.push("list_id = ?");
            params.push(Box::new(list_id));
        }
        if let Some(campaign_id) = filter.campaign_id {
            conditions.push("campaign_id = ?");
            params.push(Box::new(campaign_id));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }
        if let Some(agent_id) = filter.claimed_by {
            conditions.push("claimed_by = ?");
            params.push(Box::new(agent_id));
        }
        if let Some(agent_id) = filter.assigned_to {
            conditions.push("assigned_to = ?");
            params.push(Box::new(agent_id));
        }

        let mut sql = format!("SELECT {} FROM leads", LEAD_COLUMNS);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_ts ASC, id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        query_leads(conn, &sql, param_refs.as_slice())
    }

    /// Every lead, oldest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Lead>> {
        Self::list(conn, &LeadFilter::default())
    }

    fn touch(conn: &Connection, id: i64, set_clause: &str, value: &dyn rusqlite::types::ToSql) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let sql = format!("UPDATE leads SET {} = ?1, modified_ts = ?2 WHERE id = ?3", set_clause);
        let updated = conn
            .execute(&sql, rusqlite::params![value, now, id])
            .with_context(|| format!("Failed to update {} of lead {}", set_clause, id))?;
        if updated == 0 {
            return Err(CrmError::LeadNotFound(id).into());
        }
        Ok(())
    }

    /// Replace the attribute map
    pub fn update_data(conn: &Connection, id: i64, data: &Map<String, Value>) -> Result<()> {
        Self::touch(conn, id, "data_json", &serde_json::to_string(data)?)
    }

    pub fn set_status(conn: &Connection, id: i64, status: LeadStatus) -> Result<()> {
        Self::touch(conn, id, "status", &status.as_str())?;
        log::info!("lead {} status -> {}", id, status.as_str());
        Ok(())
    }

    /// Set or clear the callback time.
    ///
    /// Scheduling moves a non-terminal lead to `callback`; clearing leaves
    /// the status alone.
    pub fn schedule_callback(conn: &Connection, id: i64, at: Option<i64>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE leads SET callback_scheduled_at = ?1,
                 status = CASE WHEN ?1 IS NOT NULL AND status NOT IN ('won', 'lost', 'archived')
                          THEN 'callback' ELSE status END,
                 modified_ts = ?2
             WHERE id = ?3",
            rusqlite::params![at, now, id],
        )?;
        if updated == 0 {
            return Err(CrmError::LeadNotFound(id).into());
        }
        log::info!("lead {} callback -> {:?}", id, at);
        Ok(())
    }

    /// Assign to an agent, or unassign with `None`
    pub fn assign(conn: &Connection, id: i64, agent_id: Option<i64>) -> Result<()> {
        Self::touch(conn, id, "assigned_to", &agent_id)
    }

    pub fn set_campaign(conn: &Connection, id: i64, campaign_id: Option<i64>) -> Result<()> {
        Self::touch(conn, id, "campaign_id", &campaign_id)
    }

    /// Delete a lead. Its call and SMS logs go with it.
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn.execute("DELETE FROM leads WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CrmError::LeadNotFound(id).into());
        }
        log::info!("deleted lead {}", id);
        Ok(())
    }

    /// Leads with a passed callback time still in `callback` status, earliest first.
    /// With `agent_id`, only leads that agent may work.
    pub fn due_callbacks(conn: &Connection, agent_id: Option<i64>, now: i64, limit: usize) -> Result<Vec<Lead>> {
        let sql = format!(
            "SELECT {} FROM leads
             WHERE status = 'callback' AND callback_scheduled_at IS NOT NULL AND callback_scheduled_at <= ?1
               AND (?2 IS NULL OR claimed_by IS NULL OR claimed_by = ?2)
             ORDER BY callback_scheduled_at ASC, id ASC
             LIMIT ?3",
            LEAD_COLUMNS
        );
        query_leads(conn, &sql, rusqlite::params![now, agent_id, limit as i64])
    }

    /// Non-terminal leads claimed by the agent, most recently claimed first
    pub fn claimed_by_agent(conn: &Connection, agent_id: i64) -> Result<Vec<Lead>> {
        let sql = format!(
            "SELECT {} FROM leads
             WHERE claimed_by = ?1 AND status NOT IN ('won', 'lost', 'archived')
             ORDER BY claimed_at DESC, id ASC",
            LEAD_COLUMNS
        );
        query_leads(conn, &sql, rusqlite::params![agent_id])
    }

    /// The agent's claimed leads that have a callback time, soonest first
    pub fn scheduled_for_agent(conn: &Connection, agent_id: i64) -> Result<Vec<Lead>> {
        let sql = format!(
            "SELECT {} FROM leads
             WHERE claimed_by = ?1 AND callback_scheduled_at IS NOT NULL
             ORDER BY callback_scheduled_at ASC, id ASC",
            LEAD_COLUMNS
        );
        query_leads(conn, &sql, rusqlite::params![agent_id])
    }

    /// Insert parsed CSV rows into a list in one transaction.
    ///
    /// Rows whose cells are all blank are skipped. Cell values are stored as
    /// strings; empty cells are kept as empty strings.
    pub fn import_rows(
        conn: &Connection,
        list_id: i64,
        campaign_id: Option<i64>,
        rows: &[Vec<(String, String)>],
    ) -> Result<ImportSummary> {
        let tx = conn.unchecked_transaction()?;
        let mut summary = ImportSummary::default();

        for (line, row) in rows.iter().enumerate() {
            if row.iter().all(|(_, value)| value.trim().is_empty()) {
                log::warn!("import into list {}: skipping blank row {}", list_id, line + 2);
                summary.skipped += 1;
                continue;
            }
            let data: Map<String, Value> = row
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect();
            Self::create(&tx, data, Some(list_id), campaign_id)
                .with_context(|| format!("Failed to import row {}", line + 2))?;
            summary.imported += 1;
        }

        tx.commit()?;
        log::info!("imported {} leads into list {} ({} skipped)", summary.imported, list_id, summary.skipped);
        Ok(summary)
    }
}
