use rusqlite::{Connection, OptionalExtension, Row};
use crate::error::CrmError;
use crate::models::{Campaign, CampaignStats, CampaignStatus};
use crate::repo::lead::{LeadFilter, LeadRepo};
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};

/// Campaign repository for database operations
pub struct CampaignRepo;

const CAMPAIGN_COLUMNS: &str = "id, name, description, status, created_ts, modified_ts";

fn campaign_from_row(row: &Row) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        status: CampaignStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(CampaignStatus::Active),
        created_ts: row.get(4)?,
        modified_ts: row.get(5)?,
    })
}

/// End of the local day containing `now`, as a Unix timestamp
fn end_of_local_day(now: i64) -> i64 {
    Local
        .timestamp_opt(now, 0)
        .single()
        .and_then(|dt| dt.date_naive().and_hms_opt(23, 59, 59))
        .and_then(|end| Local.from_local_datetime(&end).earliest())
        .map(|end| end.timestamp())
        .unwrap_or(now)
}

impl CampaignRepo {
    pub fn create(conn: &Connection, name: &str, description: Option<&str>) -> Result<Campaign> {
        if Self::get_by_name(conn, name)?.is_some() {
            return Err(CrmError::DuplicateName { kind: "Campaign", name: name.to_string() }.into());
        }
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO campaigns (name, description, status, created_ts, modified_ts)
             VALUES (?1, ?2, 'active', ?3, ?3)",
            rusqlite::params![name, description, now],
        )
        .with_context(|| format!("Failed to create campaign: {}", name))?;

        let id = conn.last_insert_rowid();
        log::info!("created campaign '{}' ({})", name, id);
        Ok(Campaign {
            id: Some(id),
            name: name.to_string(),
            description: description.map(str::to_string),
            status: CampaignStatus::Active,
            created_ts: now,
            modified_ts: now,
        })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns WHERE id = ?1", CAMPAIGN_COLUMNS);
        Ok(conn.query_row(&sql, [id], campaign_from_row).optional()?)
    }

    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Campaign>> {
        let sql = format!("SELECT {} FROM campaigns WHERE name = ?1", CAMPAIGN_COLUMNS);
        Ok(conn.query_row(&sql, [name], campaign_from_row).optional()?)
    }

    /// Look a campaign up by numeric id or by name
    pub fn resolve(conn: &Connection, id_or_name: &str) -> Result<Campaign> {
        let by_id = match id_or_name.parse::<i64>() {
            Ok(id) => Self::get_by_id(conn, id)?,
            Err(_) => None,
        };
        match by_id {
            Some(campaign) => Ok(campaign),
            None => Self::get_by_name(conn, id_or_name)?
                .ok_or_else(|| CrmError::CampaignNotFound(id_or_name.to_string()).into()),
        }
    }

    /// Campaigns ordered by name. `active_only` hides paused and completed ones.
    pub fn list(conn: &Connection, active_only: bool) -> Result<Vec<Campaign>> {
        let sql = if active_only {
            format!("SELECT {} FROM campaigns WHERE status = 'active' ORDER BY name", CAMPAIGN_COLUMNS)
        } else {
            format!("SELECT {} FROM campaigns ORDER BY name", CAMPAIGN_COLUMNS)
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], campaign_from_row)?;

        let mut campaigns = Vec::new();
        for row in rows {
            campaigns.push(row?);
        }
        Ok(campaigns)
    }

    pub fn set_status(conn: &Connection, campaign_id: i64, status: CampaignStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE campaigns SET status = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), now, campaign_id],
        )?;
        if updated == 0 {
            return Err(CrmError::CampaignNotFound(campaign_id.to_string()).into());
        }
        Ok(())
    }

    /// Work-screen numbers as seen by `agent_id`.
    ///
    /// Only leads the agent may work (unclaimed or their own) count, matching
    /// what the agent's queue would show.
    pub fn stats(conn: &Connection, campaign_id: i64, agent_id: i64, now: i64) -> Result<CampaignStats> {
        let filter = LeadFilter { campaign_id: Some(campaign_id), ..LeadFilter::default() };
        let leads: Vec<_> = LeadRepo::list(conn, &filter)?
            .into_iter()
            .filter(|lead| lead.claimed_by.map_or(true, |holder| holder == agent_id))
            .collect();

        let total_leads = leads.len();
        let done = leads.iter().filter(|l| l.status.is_terminal()).count();
        let done_percentage = if total_leads > 0 {
            done as f64 / total_leads as f64 * 100.0
        } else {
            0.0
        };
        let today_end = end_of_local_day(now);

        Ok(CampaignStats {
            campaign_id,
            total_leads,
            done_percentage,
            queued_now: total_leads - done,
            followups_now: leads.iter().filter(|l| l.callback_due(now)).count(),
            followups_later_today: leads
                .iter()
                .filter(|l| l.callback_scheduled_at.is_some_and(|ts| ts > now && ts <= today_end))
                .count(),
        })
    }
}
